//! Columnar field payloads
//!
//! `FieldData` is the unit both of chunk storage and of materialized
//! output. Scalar payloads follow the usual wire layout: INT8/INT16/INT32
//! share `Int`, INT64 uses `Long`, JSON rows are raw bytes and ARRAY rows
//! are nested scalar payloads.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::errors::{SegcoreError, SegcoreResult};
use crate::schema::{DataType, FieldMeta};

/// Scalar column payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarField {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    Json(Vec<Vec<u8>>),
    Array {
        /// Stamped on retrieve output; unset in storage
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_type: Option<DataType>,
        data: Vec<ScalarField>,
    },
}

/// Dense float vector payload, `dim` floats per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub dim: usize,
    pub data: Vec<f32>,
}

impl VectorField {
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.dim..(row + 1) * self.dim]
    }
}

/// Column payload of any field type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldData {
    Scalars(ScalarField),
    Vectors(VectorField),
}

/// Borrowed view of one scalar cell, used by predicate evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
}

/// Owned scalar literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ScalarValue {
    pub fn as_value_ref(&self) -> ValueRef<'_> {
        match self {
            ScalarValue::Bool(v) => ValueRef::Bool(*v),
            ScalarValue::Int(v) => ValueRef::Int(*v),
            ScalarValue::Float(v) => ValueRef::Float(*v),
            ScalarValue::String(v) => ValueRef::Str(v),
        }
    }
}

impl<'a> ValueRef<'a> {
    /// Orders two cells of compatible kinds. Integers and floats compare
    /// numerically; any other mix is incomparable.
    pub fn compare(&self, other: &ValueRef<'_>) -> Option<Ordering> {
        match (self, other) {
            (ValueRef::Bool(a), ValueRef::Bool(b)) => Some(a.cmp(b)),
            (ValueRef::Int(a), ValueRef::Int(b)) => Some(a.cmp(b)),
            (ValueRef::Float(a), ValueRef::Float(b)) => a.partial_cmp(b),
            (ValueRef::Int(a), ValueRef::Float(b)) => (*a as f64).partial_cmp(b),
            (ValueRef::Float(a), ValueRef::Int(b)) => a.partial_cmp(&(*b as f64)),
            (ValueRef::Str(a), ValueRef::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, ValueRef::Float(v) if v.is_nan())
    }

    pub fn to_scalar_value(&self) -> ScalarValue {
        match self {
            ValueRef::Bool(v) => ScalarValue::Bool(*v),
            ValueRef::Int(v) => ScalarValue::Int(*v),
            ValueRef::Float(v) => ScalarValue::Float(*v),
            ValueRef::Str(v) => ScalarValue::String((*v).to_string()),
        }
    }
}

impl ScalarField {
    /// Empty payload of the variant that stores `data_type`
    pub fn empty_for(data_type: DataType) -> Option<Self> {
        let field = match data_type {
            DataType::Bool => ScalarField::Bool(Vec::new()),
            DataType::Int8 | DataType::Int16 | DataType::Int32 => ScalarField::Int(Vec::new()),
            DataType::Int64 => ScalarField::Long(Vec::new()),
            DataType::Float => ScalarField::Float(Vec::new()),
            DataType::Double => ScalarField::Double(Vec::new()),
            DataType::VarChar => ScalarField::String(Vec::new()),
            DataType::Json => ScalarField::Json(Vec::new()),
            DataType::Array => ScalarField::Array {
                element_type: None,
                data: Vec::new(),
            },
            DataType::FloatVector => return None,
        };
        Some(field)
    }

    pub fn len(&self) -> usize {
        match self {
            ScalarField::Bool(v) => v.len(),
            ScalarField::Int(v) => v.len(),
            ScalarField::Long(v) => v.len(),
            ScalarField::Float(v) => v.len(),
            ScalarField::Double(v) => v.len(),
            ScalarField::String(v) => v.len(),
            ScalarField::Json(v) => v.len(),
            ScalarField::Array { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes, not counting container overhead
    pub fn byte_size(&self) -> usize {
        match self {
            ScalarField::Bool(v) => v.len(),
            ScalarField::Int(v) => v.len() * 4,
            ScalarField::Long(v) => v.len() * 8,
            ScalarField::Float(v) => v.len() * 4,
            ScalarField::Double(v) => v.len() * 8,
            ScalarField::String(v) => v.iter().map(String::len).sum(),
            ScalarField::Json(v) => v.iter().map(Vec::len).sum(),
            ScalarField::Array { data, .. } => data.iter().map(ScalarField::byte_size).sum(),
        }
    }

    /// Whether this payload variant can hold `data_type`
    pub fn stores(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (ScalarField::Bool(_), DataType::Bool)
                | (ScalarField::Int(_), DataType::Int8 | DataType::Int16 | DataType::Int32)
                | (ScalarField::Long(_), DataType::Int64)
                | (ScalarField::Float(_), DataType::Float)
                | (ScalarField::Double(_), DataType::Double)
                | (ScalarField::String(_), DataType::VarChar)
                | (ScalarField::Json(_), DataType::Json)
                | (ScalarField::Array { .. }, DataType::Array)
        )
    }

    /// Cell view for comparable types; JSON and ARRAY cells have none
    pub fn value_at(&self, row: usize) -> Option<ValueRef<'_>> {
        match self {
            ScalarField::Bool(v) => v.get(row).map(|x| ValueRef::Bool(*x)),
            ScalarField::Int(v) => v.get(row).map(|x| ValueRef::Int(*x as i64)),
            ScalarField::Long(v) => v.get(row).map(|x| ValueRef::Int(*x)),
            ScalarField::Float(v) => v.get(row).map(|x| ValueRef::Float(*x as f64)),
            ScalarField::Double(v) => v.get(row).map(|x| ValueRef::Float(*x)),
            ScalarField::String(v) => v.get(row).map(|x| ValueRef::Str(x.as_str())),
            ScalarField::Json(_) | ScalarField::Array { .. } => None,
        }
    }

    fn push_row(&mut self, src: &ScalarField, row: usize) -> bool {
        match (self, src) {
            (ScalarField::Bool(dst), ScalarField::Bool(s)) => dst.push(s[row]),
            (ScalarField::Int(dst), ScalarField::Int(s)) => dst.push(s[row]),
            (ScalarField::Long(dst), ScalarField::Long(s)) => dst.push(s[row]),
            (ScalarField::Float(dst), ScalarField::Float(s)) => dst.push(s[row]),
            (ScalarField::Double(dst), ScalarField::Double(s)) => dst.push(s[row]),
            (ScalarField::String(dst), ScalarField::String(s)) => dst.push(s[row].clone()),
            (ScalarField::Json(dst), ScalarField::Json(s)) => dst.push(s[row].clone()),
            (ScalarField::Array { data: dst, .. }, ScalarField::Array { data: s, .. }) => {
                dst.push(s[row].clone())
            }
            _ => return false,
        }
        true
    }

    fn slice(&self, start: usize, end: usize) -> ScalarField {
        match self {
            ScalarField::Bool(v) => ScalarField::Bool(v[start..end].to_vec()),
            ScalarField::Int(v) => ScalarField::Int(v[start..end].to_vec()),
            ScalarField::Long(v) => ScalarField::Long(v[start..end].to_vec()),
            ScalarField::Float(v) => ScalarField::Float(v[start..end].to_vec()),
            ScalarField::Double(v) => ScalarField::Double(v[start..end].to_vec()),
            ScalarField::String(v) => ScalarField::String(v[start..end].to_vec()),
            ScalarField::Json(v) => ScalarField::Json(v[start..end].to_vec()),
            ScalarField::Array { element_type, data } => ScalarField::Array {
                element_type: *element_type,
                data: data[start..end].to_vec(),
            },
        }
    }

    fn append(&mut self, other: ScalarField) -> bool {
        match (self, other) {
            (ScalarField::Bool(dst), ScalarField::Bool(s)) => dst.extend(s),
            (ScalarField::Int(dst), ScalarField::Int(s)) => dst.extend(s),
            (ScalarField::Long(dst), ScalarField::Long(s)) => dst.extend(s),
            (ScalarField::Float(dst), ScalarField::Float(s)) => dst.extend(s),
            (ScalarField::Double(dst), ScalarField::Double(s)) => dst.extend(s),
            (ScalarField::String(dst), ScalarField::String(s)) => dst.extend(s),
            (ScalarField::Json(dst), ScalarField::Json(s)) => dst.extend(s),
            (ScalarField::Array { data: dst, .. }, ScalarField::Array { data: s, .. }) => {
                dst.extend(s)
            }
            _ => return false,
        }
        true
    }
}

impl FieldData {
    /// Empty payload matching a field's declared type
    pub fn empty_for(meta: &FieldMeta) -> Self {
        match meta.data_type {
            DataType::FloatVector => FieldData::Vectors(VectorField {
                dim: meta.dim.unwrap_or_default(),
                data: Vec::new(),
            }),
            other => FieldData::Scalars(
                ScalarField::empty_for(other).unwrap_or(ScalarField::Bool(Vec::new())),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldData::Scalars(s) => s.len(),
            FieldData::Vectors(v) if v.dim == 0 => 0,
            FieldData::Vectors(v) => v.data.len() / v.dim,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_size(&self) -> usize {
        match self {
            FieldData::Scalars(s) => s.byte_size(),
            FieldData::Vectors(v) => v.data.len() * std::mem::size_of::<f32>(),
        }
    }

    /// Whether this payload is shaped for the given field
    pub fn conforms_to(&self, meta: &FieldMeta) -> bool {
        match self {
            FieldData::Scalars(s) => s.stores(meta.data_type),
            FieldData::Vectors(v) => {
                meta.data_type == DataType::FloatVector
                    && Some(v.dim) == meta.dim
                    && v.dim > 0
                    && v.data.len() % v.dim == 0
            }
        }
    }

    pub fn as_scalars(&self) -> Option<&ScalarField> {
        match self {
            FieldData::Scalars(s) => Some(s),
            FieldData::Vectors(_) => None,
        }
    }

    pub fn as_vectors(&self) -> Option<&VectorField> {
        match self {
            FieldData::Vectors(v) => Some(v),
            FieldData::Scalars(_) => None,
        }
    }

    /// Copies row `row` of `src` onto the end of `self`
    pub fn push_row(&mut self, src: &FieldData, row: usize) -> SegcoreResult<()> {
        let ok = match (&mut *self, src) {
            (FieldData::Scalars(dst), FieldData::Scalars(s)) => dst.push_row(s, row),
            (FieldData::Vectors(dst), FieldData::Vectors(s)) if dst.dim == s.dim => {
                dst.data.extend_from_slice(s.row(row));
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(SegcoreError::internal(
                "column payload variants disagree during materialization",
            ))
        }
    }

    /// Rows `[start, end)` as a new payload
    pub fn slice(&self, start: usize, end: usize) -> FieldData {
        match self {
            FieldData::Scalars(s) => FieldData::Scalars(s.slice(start, end)),
            FieldData::Vectors(v) => FieldData::Vectors(VectorField {
                dim: v.dim,
                data: v.data[start * v.dim..end * v.dim].to_vec(),
            }),
        }
    }

    /// Appends all rows of `other`
    pub fn append(&mut self, other: FieldData) -> SegcoreResult<()> {
        let ok = match (&mut *self, other) {
            (FieldData::Scalars(dst), FieldData::Scalars(s)) => dst.append(s),
            (FieldData::Vectors(dst), FieldData::Vectors(s)) if dst.dim == s.dim => {
                dst.data.extend(s.data);
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(SegcoreError::invalid_insert(
                "column payload does not match existing chunk",
            ))
        }
    }
}
