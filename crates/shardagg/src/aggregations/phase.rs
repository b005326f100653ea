//! Module: aggregations::phase
//! Responsibility: the per-shard aggregation lifecycle around the primary pass.
//! Does not own: the primary pass itself or any strategy algorithm.
//! Boundary: `pre_process` registers a collector; `execute` publishes partial results.

use crate::{
    aggregations::{
        AggregatorHandle, BucketCollector, InternalAggregation, InternalAggregations,
        MultiBucketCollector, MultiBucketConsumer, PipelineTreeSource, aggregator_handles,
        global_pass::run_global_pass,
    },
    error::{InternalError, PhaseError},
    search::{
        AGGREGATION_COLLECTOR_KEY, CollectorManager, ProfileCollector, QuerySearchResult,
        REASON_AGGREGATION, SearchContext, SharedCollector,
    },
};
use std::{cell::RefCell, rc::Rc, sync::Arc};

///
/// AggregationCollectorManager
///
/// Hands the query phase the one fan-out collector built during pre-process.
/// Segment-concurrent reduction is not supported.
///

struct AggregationCollectorManager {
    collector: SharedCollector,
}

impl CollectorManager for AggregationCollectorManager {
    fn new_collector(&self) -> Result<SharedCollector, InternalError> {
        Ok(Rc::clone(&self.collector))
    }

    fn reduce(
        &self,
        _: Vec<SharedCollector>,
        _: &mut QuerySearchResult,
    ) -> Result<(), InternalError> {
        Err(InternalError::collector_unsupported(
            "the concurrent aggregation over index segments is not supported",
        ))
    }
}

///
/// AggregationPhase
///
/// Stateless driver; all per-request state lives on the search context.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct AggregationPhase;

impl AggregationPhase {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Create the request's aggregators and register the primary-pass
    /// collector for the non-global ones. No-op without aggregations.
    pub fn pre_process(&self, ctx: &mut SearchContext) -> Result<(), PhaseError> {
        let Some(state) = ctx.aggregations() else {
            return Ok(());
        };
        let request = state.request();

        let aggregators = request
            .factories()
            .create_top_level_aggregators(ctx)
            .map_err(PhaseError::initialization)?;
        let handles = aggregator_handles(aggregators);
        let collected: Vec<AggregatorHandle> = handles
            .iter()
            .filter(|handle| !handle.borrow().is_global())
            .cloned()
            .collect();
        tracing::debug!(
            shard = %ctx.shard_target(),
            aggregators = handles.len(),
            globals = handles.len() - collected.len(),
            "aggregators created"
        );

        if let Some(state) = ctx.aggregations_mut() {
            state.set_aggregators(handles);
        }
        if collected.is_empty() {
            return Ok(());
        }

        let collector = match Self::create_collector(ctx, collected) {
            Ok(collector) => collector,
            Err(source) => {
                disable_aggregations(ctx);
                return Err(PhaseError::initialization(source));
            }
        };
        ctx.collector_managers_mut().insert(
            AGGREGATION_COLLECTOR_KEY,
            Box::new(AggregationCollectorManager { collector }),
        );

        Ok(())
    }

    fn create_collector(
        ctx: &mut SearchContext,
        aggregators: Vec<AggregatorHandle>,
    ) -> Result<SharedCollector, InternalError> {
        let mut collector = MultiBucketCollector::new(aggregators)?;
        collector.pre_collection()?;

        let shared: SharedCollector = match ctx.profilers_mut() {
            Some(profilers) => {
                let name = collector.describe();
                let profiled = ProfileCollector::new(Box::new(collector), name, REASON_AGGREGATION);
                profilers.current_query_profiler().set_collector(profiled.result());
                Rc::new(RefCell::new(profiled))
            }
            None => Rc::new(RefCell::new(collector)),
        };

        Ok(shared)
    }

    /// Run the global pass if needed, finalize every aggregator in request
    /// order, and publish the partial results on the shard result. Aggregation
    /// state is dropped afterwards, on success and on failure, so neither a
    /// later page nor a retry aggregates again.
    pub fn execute(&self, ctx: &mut SearchContext) -> Result<(), PhaseError> {
        if ctx.query_result().has_aggs() {
            tracing::debug!(shard = %ctx.shard_target(), "aggregations already built");
            return Ok(());
        }
        let Some(state) = ctx.aggregations() else {
            ctx.query_result_mut().clear_aggregations();
            return Ok(());
        };

        let request = state.request();
        let aggregators = state
            .aggregators()
            .map(<[AggregatorHandle]>::to_vec)
            .ok_or_else(|| {
                PhaseError::initialization(InternalError::phase_invariant(
                    "aggregators were not created before execute",
                ))
            })?;

        let built = match Self::collect_and_finalize(ctx, &aggregators) {
            Ok(built) => built,
            Err(err) => {
                tracing::warn!(
                    shard = %ctx.shard_target(),
                    error = %err,
                    "aggregation execution failed"
                );
                disable_aggregations(ctx);
                return Err(err);
            }
        };
        tracing::debug!(
            shard = %ctx.shard_target(),
            aggregations = built.len(),
            "aggregations built"
        );

        let source: PipelineTreeSource = Arc::new(move || request.build_pipeline_tree());
        ctx.query_result_mut()
            .set_aggregations(InternalAggregations::new(built, Some(source)));

        disable_aggregations(ctx);

        Ok(())
    }

    // Global pass, then finalization of every aggregator in request order.
    fn collect_and_finalize(
        ctx: &mut SearchContext,
        aggregators: &[AggregatorHandle],
    ) -> Result<Vec<InternalAggregation>, PhaseError> {
        let globals: Vec<AggregatorHandle> = aggregators
            .iter()
            .filter(|handle| handle.borrow().is_global())
            .cloned()
            .collect();
        if !globals.is_empty() {
            run_global_pass(ctx, globals)?;
        }

        let limit = ctx.config().max_buckets;
        let state = ctx.aggregations_mut().ok_or_else(|| {
            PhaseError::initialization(InternalError::phase_invariant(
                "aggregation state dropped during execute",
            ))
        })?;
        state.reset_bucket_consumer(limit);

        finalize(aggregators, state.bucket_consumer_mut())
    }
}

/// Drop aggregation state and the primary-pass registration. Aggregators
/// never see another pass or a second finalization once this has run.
pub(crate) fn disable_aggregations(ctx: &mut SearchContext) {
    ctx.clear_aggregations();
    ctx.collector_managers_mut().remove(AGGREGATION_COLLECTOR_KEY);
}

// Every aggregator is finalized even after a failure; the first failure wins.
fn finalize(
    aggregators: &[AggregatorHandle],
    buckets: &mut MultiBucketConsumer,
) -> Result<Vec<InternalAggregation>, PhaseError> {
    let mut built = Vec::with_capacity(aggregators.len());
    let mut first_failure = None;

    for handle in aggregators {
        let mut aggregator = handle.borrow_mut();
        let result = aggregator
            .post_collection()
            .and_then(|()| aggregator.build_top_level(buckets));

        match result {
            Ok(aggregation) => built.push(aggregation),
            Err(source) if first_failure.is_none() => {
                first_failure = Some(PhaseError::AggregationExecution {
                    name: aggregator.name().to_string(),
                    source,
                });
            }
            Err(source) => {
                tracing::debug!(
                    aggregator = aggregator.name(),
                    error = %source,
                    "additional finalization failure"
                );
            }
        }
    }

    first_failure.map_or(Ok(built), Err)
}
