//! segcore - query-execution core of a columnar vector segment
//!
//! A segment answers filtered top-k searches and scalar retrieves at a
//! caller-supplied timestamp, over append-only chunked column storage.

pub mod cli;
pub mod config;
pub mod errors;
pub mod estimator;
pub mod executor;
pub mod mvcc;
pub mod observability;
pub mod plan;
pub mod rerank;
pub mod result;
pub mod schema;
pub mod segment;
pub mod skip_index;
pub mod storage;
