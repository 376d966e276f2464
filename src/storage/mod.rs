//! Columnar segment storage
//!
//! Column payloads, insert batches and the storage strategies a segment
//! can be built on. Materialization is addressed by field id and a list of
//! row offsets and returns a typed payload in offset-list order.

mod batch;
mod columns;
mod data;
mod growing;
mod sealed;
mod strategy;

pub use batch::InsertBatch;
pub use columns::ColumnChunks;
pub use data::{FieldData, ScalarField, ScalarValue, ValueRef, VectorField};
pub use growing::GrowingStorage;
pub use sealed::SealedStorage;
pub use strategy::{new_storage, SegmentKind, SegmentStorage};
