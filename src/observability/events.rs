//! Observable segment events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events of a segment's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Segment constructed
    SegmentCreated,
    /// Configuration loaded
    ConfigLoaded,

    // Writer side
    /// Rows appended to one or more chunks
    ChunkAppended,
    /// Skip index entry (re)built for a chunk
    SkipIndexLoaded,
    /// Primary keys marked deleted
    DeleteApplied,

    // Query side; begin/complete lines come from `ObservationScope`
    /// Retrieve rejected by the byte budget
    RetrieveLimitExceeded,
    /// Search metric disagrees with index metric
    MetricMismatch,
    /// Schema contradicts the query path (FATAL)
    SchemaInconsistency,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SegmentCreated => "SEGMENT_CREATED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ChunkAppended => "CHUNK_APPENDED",
            Event::SkipIndexLoaded => "SKIP_INDEX_LOADED",
            Event::DeleteApplied => "DELETE_APPLIED",
            Event::RetrieveLimitExceeded => "RETRIEVE_LIMIT_EXCEEDED",
            Event::MetricMismatch => "METRIC_MISMATCH",
            Event::SchemaInconsistency => "SCHEMA_INCONSISTENCY",
        }
    }

    /// Returns true if this event signals a broken invariant
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::SchemaInconsistency)
    }

    /// Returns true if this event reports a rejected request
    pub fn is_rejection(&self) -> bool {
        matches!(self, Event::RetrieveLimitExceeded | Event::MetricMismatch)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
