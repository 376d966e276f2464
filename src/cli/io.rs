//! JSON I/O handling for CLI
//!
//! - Input: a segment dump file (single JSON document)
//! - Output: single JSON object per command on stdout
//! - Errors: single JSON object on stderr

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SegcoreConfig;
use crate::mvcc::Timestamp;
use crate::plan::IndexMeta;
use crate::result::PrimaryKey;
use crate::schema::Schema;
use crate::segment::Segment;
use crate::storage::{InsertBatch, SegmentKind};

use super::errors::{CliError, CliResult};

/// Keys deleted at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub pks: Vec<PrimaryKey>,
    pub ts: Timestamp,
}

/// On-disk form of a segment: schema plus the writes to replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDump {
    pub schema: Schema,
    #[serde(default = "default_kind")]
    pub kind: SegmentKind,
    #[serde(default)]
    pub index_meta: Option<IndexMeta>,
    #[serde(default)]
    pub batches: Vec<InsertBatch>,
    #[serde(default)]
    pub deletes: Vec<DeleteEntry>,
}

fn default_kind() -> SegmentKind {
    SegmentKind::Growing
}

impl SegmentDump {
    /// Read a dump file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| CliError::Dump {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replays the dump into a fresh segment. Sealed dumps are sealed
    /// after their last batch.
    pub fn into_segment(self, config: SegcoreConfig) -> CliResult<Segment> {
        let mut segment = Segment::new(self.kind, self.schema, config);
        if let Some(index_meta) = self.index_meta {
            segment = segment.with_index_meta(index_meta);
        }
        for batch in self.batches {
            segment.insert(batch)?;
        }
        for entry in self.deletes {
            segment.delete(&entry.pks, entry.ts)?;
        }
        if self.kind == SegmentKind::Sealed {
            segment.seal()?;
        }
        Ok(segment)
    }
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write an error response to stderr
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stderr = io::stderr().lock();
    serde_json::to_writer(&mut stderr, &response)?;
    writeln!(stderr)?;
    stderr.flush()?;
    Ok(())
}
