//! Segment error types
//!
//! Error codes:
//! - SEGCORE_INVALID_PLAN (ERROR)
//! - SEGCORE_RETRIEVE_LIMIT (ERROR)
//! - SEGCORE_METRIC_MISMATCH (ERROR)
//! - SEGCORE_FIELD_ID_INVALID (ERROR)
//! - SEGCORE_INVALID_INSERT (ERROR)
//! - SEGCORE_SCHEMA_INCONSISTENCY (FATAL)
//! - SEGCORE_DATA_TYPE_INVALID (FATAL)
//! - SEGCORE_INTERNAL (FATAL)
//!
//! FATAL errors mean an invariant that upstream validation should have
//! guaranteed was broken. They are still returned as values; the caller
//! decides whether to abort.

use std::fmt;

use crate::schema::FieldId;

/// Severity levels for segment errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request failed, segment is healthy
    Error,
    /// Internal invariant violated
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Segment error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegcoreErrorCode {
    /// Empty or structurally malformed plan
    InvalidPlan,
    /// Estimated retrieve output exceeds the byte budget
    RetrieveLimit,
    /// Query metric disagrees with the index metric
    MetricMismatch,
    /// Negative, unknown or unsupported field id
    FieldIdInvalid,
    /// Writer-side batch rejected
    InvalidInsert,
    /// Schema contradicts what the query path requires (FATAL)
    SchemaInconsistency,
    /// Unsupported data type reached materialization (FATAL)
    DataTypeInvalid,
    /// Internal result shape violated (FATAL)
    Internal,
}

impl SegcoreErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            SegcoreErrorCode::InvalidPlan => "SEGCORE_INVALID_PLAN",
            SegcoreErrorCode::RetrieveLimit => "SEGCORE_RETRIEVE_LIMIT",
            SegcoreErrorCode::MetricMismatch => "SEGCORE_METRIC_MISMATCH",
            SegcoreErrorCode::FieldIdInvalid => "SEGCORE_FIELD_ID_INVALID",
            SegcoreErrorCode::InvalidInsert => "SEGCORE_INVALID_INSERT",
            SegcoreErrorCode::SchemaInconsistency => "SEGCORE_SCHEMA_INCONSISTENCY",
            SegcoreErrorCode::DataTypeInvalid => "SEGCORE_DATA_TYPE_INVALID",
            SegcoreErrorCode::Internal => "SEGCORE_INTERNAL",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SegcoreErrorCode::SchemaInconsistency
            | SegcoreErrorCode::DataTypeInvalid
            | SegcoreErrorCode::Internal => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for SegcoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Segment error with context
#[derive(Debug, Clone)]
pub struct SegcoreError {
    code: SegcoreErrorCode,
    message: String,
    field_id: Option<FieldId>,
}

impl SegcoreError {
    fn new(code: SegcoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field_id: None,
        }
    }

    /// Create an invalid plan error
    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        Self::new(SegcoreErrorCode::InvalidPlan, reason)
    }

    /// Create a retrieve size-limit error
    pub fn retrieve_limit(estimated: i64, limit: i64) -> Self {
        Self::new(
            SegcoreErrorCode::RetrieveLimit,
            format!(
                "query results exceed the limit size {} (estimated {} bytes)",
                limit, estimated
            ),
        )
    }

    /// Create a metric mismatch error
    pub fn metric_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(
            SegcoreErrorCode::MetricMismatch,
            format!(
                "metric type not match, expected {}, actual {}",
                expected, actual
            ),
        )
    }

    /// Create an invalid field id error
    pub fn field_id_invalid(field_id: FieldId, reason: impl Into<String>) -> Self {
        Self {
            field_id: Some(field_id),
            ..Self::new(SegcoreErrorCode::FieldIdInvalid, reason)
        }
    }

    /// Create an invalid insert error
    pub fn invalid_insert(reason: impl Into<String>) -> Self {
        Self::new(SegcoreErrorCode::InvalidInsert, reason)
    }

    /// Create a schema inconsistency error (FATAL)
    pub fn schema_inconsistency(reason: impl Into<String>) -> Self {
        Self::new(SegcoreErrorCode::SchemaInconsistency, reason)
    }

    /// Create a data type error (FATAL)
    pub fn data_type_invalid(field_id: FieldId, reason: impl Into<String>) -> Self {
        Self {
            field_id: Some(field_id),
            ..Self::new(SegcoreErrorCode::DataTypeInvalid, reason)
        }
    }

    /// Create an internal error (FATAL)
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(SegcoreErrorCode::Internal, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> SegcoreErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the field the error refers to, if any
    pub fn field_id(&self) -> Option<FieldId> {
        self.field_id
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Expected refusal the caller can retry with a narrower request
    pub fn is_rejection(&self) -> bool {
        self.code == SegcoreErrorCode::RetrieveLimit
    }
}

impl fmt::Display for SegcoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(field_id) = self.field_id {
            write!(f, " (field {})", field_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for SegcoreError {}

/// Result type for segment operations
pub type SegcoreResult<T> = Result<T, SegcoreError>;
