//! CLI command implementations
//!
//! Every command rebuilds the segment from its dump, runs one query and
//! prints one JSON response. Nothing is written back.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SegcoreConfig;
use crate::mvcc::MAX_TIMESTAMP;
use crate::rerank::RankStrategy;
use crate::plan::{Expr, MetricType, PlaceholderGroup, RetrievePlan, RetrievePlanNode, SearchInfo, SearchPlan};
use crate::schema::{FieldId, Schema, ROW_FIELD_ID, TIMESTAMP_FIELD_ID};
use crate::segment::Segment;

use super::args::{Command, SegmentArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_response, SegmentDump};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let data = run_command(cli.command)?;
    write_response(data)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Count { segment } => count(&segment),
        Command::Retrieve {
            segment,
            fields,
            filter,
            limit,
            limit_bytes,
        } => retrieve(&segment, &fields, filter.as_deref(), limit, limit_bytes),
        Command::Search {
            segment,
            field,
            vector,
            topk,
            metric,
            filter,
            output_fields,
        } => search(
            &segment,
            &field,
            vector,
            topk,
            metric,
            filter.as_deref(),
            &output_fields,
        ),
        Command::HybridSearch {
            segment,
            requests,
            topk,
            rank,
            rank_params,
        } => hybrid_search(&segment, &requests, topk, rank.as_deref(), &rank_params),
    }
}

/// Live row count at the requested timestamp
pub fn count(args: &SegmentArgs) -> CliResult<Value> {
    let segment = open_segment(args)?;
    let count = segment.get_real_count_at(args.ts.unwrap_or(MAX_TIMESTAMP))?;
    Ok(json!({ "count": count }))
}

/// Materialized output columns of the matching rows
pub fn retrieve(
    args: &SegmentArgs,
    fields: &[String],
    filter: Option<&str>,
    limit: Option<usize>,
    limit_bytes: Option<i64>,
) -> CliResult<Value> {
    let segment = open_segment(args)?;
    let field_ids = fields
        .iter()
        .map(|f| resolve_field(segment.schema(), f))
        .collect::<CliResult<Vec<_>>>()?;

    let plan = RetrievePlan::new(
        RetrievePlanNode {
            predicate: parse_filter(filter)?,
            is_count: false,
            limit,
        },
        field_ids,
    );
    let budget = limit_bytes.unwrap_or(segment.config().default_retrieve_limit_bytes);
    let results = segment.retrieve(&plan, args.ts.unwrap_or(MAX_TIMESTAMP), budget)?;
    Ok(serde_json::to_value(results)?)
}

/// Top-k hits with primary keys and requested output fields
pub fn search(
    args: &SegmentArgs,
    field: &str,
    vector: Vec<f32>,
    topk: usize,
    metric: Option<MetricType>,
    filter: Option<&str>,
    output_fields: &[String],
) -> CliResult<Value> {
    let segment = open_segment(args)?;
    let schema = segment.schema();

    let mut info = SearchInfo::new(resolve_field(schema, field)?, topk);
    info.metric_type = metric;
    let mut plan = SearchPlan::new(info).with_target_entries(
        output_fields
            .iter()
            .map(|f| resolve_field(schema, f))
            .collect::<CliResult<Vec<_>>>()?,
    );
    if let Some(predicate) = parse_filter(filter)? {
        plan = plan.with_predicate(predicate);
    }

    let placeholders = PlaceholderGroup::new(vec![vector]);
    let mut result = segment.search(&plan, &placeholders, args.ts.unwrap_or(MAX_TIMESTAMP))?;
    segment.fill_primary_keys(&plan, &mut result)?;
    segment.fill_target_entry(&plan, &mut result)?;

    let hits: Vec<Value> = result
        .seg_offsets
        .iter()
        .zip(&result.distances)
        .zip(&result.primary_keys)
        .map(|((offset, distance), pk)| json!({ "offset": offset, "distance": distance, "pk": pk }))
        .collect();
    let outputs: serde_json::Map<String, Value> = result
        .output_fields_data
        .iter()
        .map(|(id, data)| -> CliResult<(String, Value)> {
            Ok((id.to_string(), serde_json::to_value(data)?))
        })
        .collect::<CliResult<_>>()?;

    Ok(json!({
        "metric": result.metric_type.map(|m| m.as_str()),
        "topk": result.unity_topk,
        "hits": hits,
        "output_fields": outputs,
    }))
}

/// One sub-search of a hybrid search
#[derive(Debug, Deserialize)]
struct SubSearch {
    field: String,
    vector: Vec<f32>,
    #[serde(default)]
    metric: Option<MetricType>,
    #[serde(default)]
    filter: Option<Expr>,
}

/// Runs every sub-search, then fuses the hits with the rank strategy.
///
/// The strategy is validated before any search runs. L2 distances are
/// negated so every sub-search ranks larger-is-closer.
pub fn hybrid_search(
    args: &SegmentArgs,
    requests: &[String],
    topk: usize,
    rank: Option<&str>,
    rank_params: &str,
) -> CliResult<Value> {
    let params: Value = serde_json::from_str(rank_params)?;
    let strategy = RankStrategy::from_params(rank, &params, requests.len())?;
    let requests = requests
        .iter()
        .map(|r| serde_json::from_str::<SubSearch>(r).map_err(CliError::from))
        .collect::<CliResult<Vec<_>>>()?;

    let segment = open_segment(args)?;
    let ts = args.ts.unwrap_or(MAX_TIMESTAMP);
    let mut ranked = Vec::with_capacity(requests.len());
    for request in requests {
        let mut info = SearchInfo::new(resolve_field(segment.schema(), &request.field)?, topk);
        info.metric_type = request.metric;
        let mut plan = SearchPlan::new(info);
        if let Some(predicate) = request.filter {
            plan = plan.with_predicate(predicate);
        }

        let placeholders = PlaceholderGroup::new(vec![request.vector]);
        let mut result = segment.search(&plan, &placeholders, ts)?;
        segment.fill_primary_keys(&plan, &mut result)?;

        let closer_is_larger = result.metric_type.map_or(true, |m| m.positively_related());
        let scores = result
            .distances
            .iter()
            .map(|&d| if closer_is_larger { d } else { -d });
        ranked.push(result.primary_keys.iter().cloned().zip(scores).collect());
    }

    let hits: Vec<Value> = strategy
        .fuse(ranked, topk)?
        .into_iter()
        .map(|(pk, score)| json!({ "pk": pk, "score": score }))
        .collect();
    Ok(json!({
        "rank": strategy.name(),
        "topk": topk,
        "hits": hits,
    }))
}

fn open_segment(args: &SegmentArgs) -> CliResult<Segment> {
    let config = load_config(args.config.as_deref())?;
    SegmentDump::load(&args.data)?.into_segment(config)
}

fn load_config(path: Option<&Path>) -> CliResult<SegcoreConfig> {
    Ok(match path {
        Some(path) => SegcoreConfig::load(path)?,
        None => SegcoreConfig::from_env()?,
    })
}

/// Resolves a field by schema name, system name or numeric id
fn resolve_field(schema: &Schema, name: &str) -> CliResult<FieldId> {
    if let Some(meta) = schema.field_by_name(name) {
        return Ok(meta.field_id);
    }
    match name {
        "row_id" => return Ok(ROW_FIELD_ID),
        "timestamp" => return Ok(TIMESTAMP_FIELD_ID),
        _ => {}
    }
    name.parse::<i64>()
        .map(FieldId::new)
        .map_err(|_| CliError::argument(format!("unknown field '{}'", name)))
}

fn parse_filter(filter: Option<&str>) -> CliResult<Option<Expr>> {
    filter
        .map(|f| serde_json::from_str(f).map_err(CliError::from))
        .transpose()
}
