//! CLI argument definitions using clap
//!
//! Commands:
//! - segcore count --data <dump> [--ts T]
//! - segcore retrieve --data <dump> --fields a,b [--filter <expr json>] [--limit-bytes N]
//! - segcore search --data <dump> --field v --vector 0.1,0.2 --topk K [--metric M]
//! - segcore hybrid-search --data <dump> --request <json> --request <json> [--rank rrf|weighted]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::mvcc::Timestamp;
use crate::plan::MetricType;

/// segcore - query a columnar vector segment from a JSON dump
#[derive(Parser, Debug)]
#[command(name = "segcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    /// Path to configuration file; defaults plus environment when absent
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the segment dump
    #[arg(long)]
    pub data: PathBuf,

    /// Query timestamp; every row is visible when absent
    #[arg(long)]
    pub ts: Option<Timestamp>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the number of live rows
    Count {
        #[command(flatten)]
        segment: SegmentArgs,
    },

    /// Materialize output fields of the rows matching a filter
    Retrieve {
        #[command(flatten)]
        segment: SegmentArgs,

        /// Output fields, by name or id (`row_id` and `timestamp` allowed)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Predicate as an expression JSON document
        #[arg(long)]
        filter: Option<String>,

        /// Keep at most this many rows
        #[arg(long)]
        limit: Option<usize>,

        /// Output byte budget; the configured default when absent
        #[arg(long, allow_hyphen_values = true)]
        limit_bytes: Option<i64>,
    },

    /// Run a top-k vector search
    Search {
        #[command(flatten)]
        segment: SegmentArgs,

        /// Vector field, by name or id
        #[arg(long)]
        field: String,

        /// Query vector, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Vec<f32>,

        #[arg(long, default_value_t = 10)]
        topk: usize,

        /// L2, IP or COSINE; the index metric when absent
        #[arg(long)]
        metric: Option<MetricType>,

        /// Predicate as an expression JSON document
        #[arg(long)]
        filter: Option<String>,

        /// Output fields filled for every hit
        #[arg(long, value_delimiter = ',')]
        output_fields: Vec<String>,
    },

    /// Run several vector searches and fuse their hits by primary key
    HybridSearch {
        #[command(flatten)]
        segment: SegmentArgs,

        /// One sub-search per occurrence:
        /// `{"field": .., "vector": [..], "metric": .., "filter": ..}`
        #[arg(long = "request", required = true)]
        requests: Vec<String>,

        #[arg(long, default_value_t = 10)]
        topk: usize,

        /// rrf or weighted; rrf with k = 60 when absent
        #[arg(long)]
        rank: Option<String>,

        /// Rank parameters, e.g. {"k": 60} or {"weights": [0.3, 0.7]}
        #[arg(long, default_value = "{}")]
        rank_params: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
