//! Module: search::query_phase
//! Responsibility: run the primary collection pass with every registered collector.
//! Does not own: collector construction; managers registered by other phases do that.
//! Boundary: the only place that may call `CollectorManager::reduce`.

use crate::{
    aggregations::{AggregationPhase, disable_aggregations},
    error::{InternalError, PhaseError},
    index::{DocId, Query, Segment},
    search::{
        CollectStatus, Collector, CollectorManagerRegistry, MultiCollector, PassStats,
        SearchContext, SharedCollector, ShardSearcher,
    },
};
use std::{rc::Rc, sync::Arc};

const QUERY_PHASE_FAILED: &str = "failed to execute main query";
const REDUCE_FAILED: &str = "failed to reduce collectors";

///
/// QueryPhase
///
/// Drives the query-filtered pass. Without registered collectors the pass
/// still runs to count hits.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct QueryPhase;

impl QueryPhase {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    pub fn execute(&self, ctx: &mut SearchContext) -> Result<(), PhaseError> {
        let query = ctx.build_filtered_query(ctx.query().clone());
        let searcher = ctx.searcher();

        // Managers are moved out for the pass so reduction can write into the
        // shard result; they are always restored before returning.
        let managers = std::mem::take(ctx.collector_managers_mut());
        let outcome = if ctx.config().concurrent_segment_search {
            Self::search_concurrent(searcher.as_ref(), &query, &managers, ctx)
        } else {
            Self::search_sequential(searcher.as_ref(), &query, &managers)
                .map_err(|source| (QUERY_PHASE_FAILED, source))
        };
        *ctx.collector_managers_mut() = managers;

        match outcome {
            Ok(stats) => {
                tracing::debug!(
                    shard = %ctx.shard_target(),
                    docs_matched = stats.docs_matched,
                    terminated_early = stats.terminated_early,
                    "query phase pass complete"
                );
                ctx.query_result_mut()
                    .record_hits(stats.docs_matched, stats.terminated_early);
                Ok(())
            }
            Err((message, source)) => {
                tracing::warn!(shard = %ctx.shard_target(), error = %source, "{message}");
                Err(PhaseError::query_phase(
                    ctx.shard_target().clone(),
                    message,
                    source,
                ))
            }
        }
    }

    fn search_sequential(
        searcher: &dyn ShardSearcher,
        query: &Query,
        managers: &CollectorManagerRegistry,
    ) -> Result<PassStats, InternalError> {
        let collectors = new_collectors(managers)?;
        if collectors.is_empty() {
            return searcher.search(query, &mut HitCounter);
        }

        searcher.search(query, &mut MultiCollector::new(collectors))
    }

    // One collector per manager per segment, then one reduce per manager.
    fn search_concurrent(
        searcher: &dyn ShardSearcher,
        query: &Query,
        managers: &CollectorManagerRegistry,
        ctx: &mut SearchContext,
    ) -> Result<PassStats, (&'static str, InternalError)> {
        let mut stats = PassStats::default();
        let mut produced: Vec<Vec<SharedCollector>> = vec![Vec::new(); managers.len()];

        for segment in searcher.segments() {
            let collectors =
                new_collectors(managers).map_err(|source| (QUERY_PHASE_FAILED, source))?;
            for (slot, collector) in produced.iter_mut().zip(&collectors) {
                slot.push(Rc::clone(collector));
            }

            let outcome = if collectors.is_empty() {
                searcher.search_segment(query, segment, &mut HitCounter)
            } else {
                searcher.search_segment(query, segment, &mut MultiCollector::new(collectors))
            }
            .map_err(|source| (QUERY_PHASE_FAILED, source))?;
            stats.record(outcome);
        }

        for ((_, manager), collectors) in managers.iter().zip(produced) {
            manager
                .reduce(collectors, ctx.query_result_mut())
                .map_err(|source| (REDUCE_FAILED, source))?;
        }

        Ok(stats)
    }
}

fn new_collectors(managers: &CollectorManagerRegistry) -> Result<Vec<SharedCollector>, InternalError> {
    managers
        .iter()
        .map(|(_, manager)| manager.new_collector())
        .collect()
}

// Keeps the pass alive when nothing else is collecting.
struct HitCounter;

impl Collector for HitCounter {
    fn set_segment(&mut self, _: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        Ok(CollectStatus::Active)
    }

    fn collect(&mut self, _: DocId) -> Result<CollectStatus, InternalError> {
        Ok(CollectStatus::Active)
    }
}

/// Run the full shard query lifecycle: aggregation pre-process, the primary
/// pass, then aggregation execution.
pub fn execute_query_phase(ctx: &mut SearchContext) -> Result<(), PhaseError> {
    let aggregation = AggregationPhase::new();

    aggregation.pre_process(ctx)?;
    if let Err(err) = QueryPhase::new().execute(ctx) {
        // Partially collected aggregators must not be finalized later.
        disable_aggregations(ctx);
        return Err(err);
    }
    aggregation.execute(ctx)
}
