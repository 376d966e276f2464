//! Observability subsystem
//!
//! This module provides:
//! - Structured logging (JSON lines over `tracing`)
//! - Atomic operational counters
//! - Typed lifecycle events
//! - Begin/complete scopes around queries
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No background threads
//!
//! # Usage
//!
//! ```ignore
//! use segcore::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::ChunkAppended, &[("rows", "42")]);
//!
//! let scope = ObservationScope::new("RETRIEVE");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields, at a severity derived from the event
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else if event.is_rejection() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
