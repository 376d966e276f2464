//! Segment schema
//!
//! An ordered set of field definitions with stable ids. At most one field
//! is the primary key; system pseudo-fields live in a reserved id range and
//! are never declared here.

mod types;

pub use types::{
    DataType, FieldId, FieldMeta, Schema, SystemFieldType, ROW_FIELD_ID, START_USER_FIELD_ID,
    TIMESTAMP_FIELD_ID,
};
