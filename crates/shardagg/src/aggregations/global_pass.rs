//! Module: aggregations::global_pass
//! Responsibility: the dedicated match-all pass feeding global aggregators.
//! Does not own: global aggregator creation or finalization.
//! Boundary: runs between the primary pass and finalization, at most once per request.

use crate::{
    aggregations::{AggregatorHandle, BucketCollector, MultiBucketCollector},
    error::{InternalError, PhaseError},
    index::Query,
    search::{Collector, PassStats, ProfileCollector, REASON_AGGREGATION_GLOBAL, SearchContext},
};

const GLOBAL_PASS_FAILED: &str = "failed to execute global aggregators";

/// Collect `globals` over every live root document of the shard.
///
/// The pass ignores the request query but keeps the shard's mandatory
/// filters. With profiling enabled the pass starts its own query profile.
pub(crate) fn run_global_pass(
    ctx: &mut SearchContext,
    globals: Vec<AggregatorHandle>,
) -> Result<PassStats, PhaseError> {
    match collect_globals(ctx, globals) {
        Ok(stats) => {
            tracing::debug!(
                shard = %ctx.shard_target(),
                docs_matched = stats.docs_matched,
                segments = stats.segments_searched,
                "global aggregation pass complete"
            );
            Ok(stats)
        }
        Err(source) => {
            tracing::warn!(shard = %ctx.shard_target(), error = %source, "{GLOBAL_PASS_FAILED}");
            Err(PhaseError::query_phase(
                ctx.shard_target().clone(),
                GLOBAL_PASS_FAILED,
                source,
            ))
        }
    }
}

fn collect_globals(
    ctx: &mut SearchContext,
    globals: Vec<AggregatorHandle>,
) -> Result<PassStats, InternalError> {
    let query = ctx.build_filtered_query(Query::MatchAll);
    let searcher = ctx.searcher();

    let mut globals = MultiBucketCollector::new(globals)?;
    let name = globals.describe();
    globals.pre_collection()?;

    let mut collector: Box<dyn Collector> = match ctx.profilers_mut() {
        Some(profilers) => {
            let profiled =
                ProfileCollector::new(Box::new(globals), name, REASON_AGGREGATION_GLOBAL);
            profilers.add_query_profiler().set_collector(profiled.result());
            Box::new(profiled)
        }
        None => Box::new(globals),
    };

    searcher.search(&query, collector.as_mut())
}
