//! Schema type definitions
//!
//! Field identifiers below `START_USER_FIELD_ID` are reserved for system
//! pseudo-fields. Only two are defined: the row identifier and the ingestion
//! timestamp. Both are materialized as 64-bit integers and never appear in a
//! user schema.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};

/// First field id available to user schemas
pub const START_USER_FIELD_ID: i64 = 100;

/// Row identifier pseudo-field
pub const ROW_FIELD_ID: FieldId = FieldId(0);

/// Ingestion timestamp pseudo-field
pub const TIMESTAMP_FIELD_ID: FieldId = FieldId(1);

/// Stable integer identifier of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(i64);

impl FieldId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Returns true if the id falls in the reserved system range
    pub fn is_system(self) -> bool {
        (0..START_USER_FIELD_ID).contains(&self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// System pseudo-field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemFieldType {
    RowId,
    Timestamp,
}

impl SystemFieldType {
    /// Resolves a reserved field id to its system field.
    ///
    /// Returns `None` for user ids and for reserved ids with no
    /// system field assigned.
    pub fn of(field_id: FieldId) -> Option<Self> {
        match field_id {
            ROW_FIELD_ID => Some(SystemFieldType::RowId),
            TIMESTAMP_FIELD_ID => Some(SystemFieldType::Timestamp),
            _ => None,
        }
    }
}

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    #[serde(rename = "VARCHAR")]
    VarChar,
    Json,
    Array,
    FloatVector,
}

impl DataType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Int8 => "INT8",
            DataType::Int16 => "INT16",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::VarChar => "VARCHAR",
            DataType::Json => "JSON",
            DataType::Array => "ARRAY",
            DataType::FloatVector => "FLOAT_VECTOR",
        }
    }

    /// Variable-length types have no fixed row width
    pub fn is_variable(&self) -> bool {
        matches!(self, DataType::VarChar | DataType::Json | DataType::Array)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::FloatVector)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// Only INT64 and VARCHAR may serve as primary key
    pub fn is_primary_key_type(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::VarChar)
    }

    /// Element width in bytes for fixed-length scalar types
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            DataType::Bool | DataType::Int8 => Some(1),
            DataType::Int16 => Some(2),
            DataType::Int32 | DataType::Float => Some(4),
            DataType::Int64 | DataType::Double => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Metadata of a single schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub field_id: FieldId,
    pub name: String,
    pub data_type: DataType,
    /// Element type of ARRAY fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<DataType>,
    /// Dimension of vector fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
    #[serde(default)]
    pub is_primary_key: bool,
}

impl FieldMeta {
    /// Create a plain scalar field
    pub fn scalar(field_id: i64, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field_id: FieldId::new(field_id),
            name: name.into(),
            data_type,
            element_type: None,
            dim: None,
            is_primary_key: false,
        }
    }

    /// Create a primary key field
    pub fn primary(field_id: i64, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            is_primary_key: true,
            ..Self::scalar(field_id, name, data_type)
        }
    }

    /// Create a float vector field
    pub fn vector(field_id: i64, name: impl Into<String>, dim: usize) -> Self {
        Self {
            dim: Some(dim),
            ..Self::scalar(field_id, name, DataType::FloatVector)
        }
    }

    /// Create an array field with the given element type
    pub fn array(field_id: i64, name: impl Into<String>, element_type: DataType) -> Self {
        Self {
            element_type: Some(element_type),
            ..Self::scalar(field_id, name, DataType::Array)
        }
    }

    /// Fixed row width in bytes, or `None` for variable-length fields
    pub fn size_of(&self) -> Option<i64> {
        match self.data_type {
            DataType::FloatVector => self.dim.map(|dim| (dim * std::mem::size_of::<f32>()) as i64),
            other => other.fixed_width().map(|w| w as i64),
        }
    }
}

/// Ordered mapping from field id to field metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    fields: Vec<FieldMeta>,
    positions: HashMap<FieldId, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDef {
    fields: Vec<FieldMeta>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SegcoreError;

    fn try_from(def: SchemaDef) -> SegcoreResult<Self> {
        Schema::new(def.fields)
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        SchemaDef {
            fields: schema.fields,
        }
    }
}

impl Schema {
    /// Builds a schema from ordered field definitions.
    ///
    /// Rejects duplicate ids, ids in the system range, more than one
    /// primary key, vectors without a dimension and arrays without an
    /// element type. The primary key's data type is checked by
    /// [`Schema::validate`], not here.
    pub fn new(fields: Vec<FieldMeta>) -> SegcoreResult<Self> {
        let mut positions = HashMap::with_capacity(fields.len());
        let mut primary_count = 0;

        for (pos, field) in fields.iter().enumerate() {
            if field.field_id.get() < START_USER_FIELD_ID {
                return Err(SegcoreError::field_id_invalid(
                    field.field_id,
                    format!("user field id must be >= {}", START_USER_FIELD_ID),
                ));
            }
            if positions.insert(field.field_id, pos).is_some() {
                return Err(SegcoreError::field_id_invalid(
                    field.field_id,
                    "duplicate field id",
                ));
            }
            if field.is_primary_key {
                primary_count += 1;
            }
            if field.data_type.is_vector() && field.dim.map_or(true, |d| d == 0) {
                return Err(SegcoreError::field_id_invalid(
                    field.field_id,
                    "vector field requires a positive dimension",
                ));
            }
            if field.data_type == DataType::Array && field.element_type.is_none() {
                return Err(SegcoreError::field_id_invalid(
                    field.field_id,
                    "array field requires an element type",
                ));
            }
        }

        if primary_count > 1 {
            return Err(SegcoreError::schema_inconsistency(
                "schema defines more than one primary key",
            ));
        }

        Ok(Self { fields, positions })
    }

    /// Checks that the primary key, if any, is INT64 or VARCHAR
    pub fn validate(&self) -> SegcoreResult<()> {
        if let Some(pk) = self.primary_field() {
            if !pk.data_type.is_primary_key_type() {
                return Err(SegcoreError::schema_inconsistency(format!(
                    "primary key field {} is {}, expected INT64 or VARCHAR",
                    pk.field_id, pk.data_type
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, field_id: FieldId) -> Option<&FieldMeta> {
        self.positions.get(&field_id).map(|&pos| &self.fields[pos])
    }

    /// Looks up a field, failing for ids the schema does not declare
    pub fn field(&self, field_id: FieldId) -> SegcoreResult<&FieldMeta> {
        self.get(field_id)
            .ok_or_else(|| SegcoreError::field_id_invalid(field_id, "field not found in schema"))
    }

    pub fn contains(&self, field_id: FieldId) -> bool {
        self.positions.contains_key(&field_id)
    }

    pub fn primary_field_id(&self) -> Option<FieldId> {
        self.primary_field().map(|f| f.field_id)
    }

    pub fn primary_field(&self) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.is_primary_key)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
