//! Module: search::context
//! Responsibility: per-shard execution state threaded through every phase.
//! Does not own: collection logic; phases read and write their own fields.
//! Boundary: one `SearchContext` per shard request, owned by the caller.

use crate::{
    aggregations::{AggregationRequest, InternalAggregations, SearchContextAggregations},
    config::AggregationConfig,
    index::Query,
    search::{CollectorManagerRegistry, Profilers, ShardSearcher},
};
use derive_more::Display;
use std::sync::Arc;

///
/// ShardTarget
///

#[derive(Clone, Debug, Display, Eq, Hash, PartialEq)]
#[display("[{node_id}][{index}][{shard_id}]")]
pub struct ShardTarget {
    pub node_id: String,
    pub index: String,
    pub shard_id: u32,
}

impl ShardTarget {
    #[must_use]
    pub fn new(node_id: impl Into<String>, index: impl Into<String>, shard_id: u32) -> Self {
        Self {
            node_id: node_id.into(),
            index: index.into(),
            shard_id,
        }
    }
}

///
/// AggregationsSlot
///
/// Aggregation field of the shard result. `Cleared` records that the phase ran
/// and deliberately produced nothing, which is distinct from never running.
///

#[derive(Debug, Default)]
pub enum AggregationsSlot {
    #[default]
    Pending,
    Cleared,
    Ready(InternalAggregations),
}

///
/// QuerySearchResult
///

#[derive(Debug, Default)]
pub struct QuerySearchResult {
    aggregations: AggregationsSlot,
    total_hits: u64,
    terminated_early: bool,
}

impl QuerySearchResult {
    #[must_use]
    pub const fn has_aggs(&self) -> bool {
        matches!(self.aggregations, AggregationsSlot::Ready(_))
    }

    #[must_use]
    pub const fn aggregations(&self) -> Option<&InternalAggregations> {
        match &self.aggregations {
            AggregationsSlot::Ready(aggregations) => Some(aggregations),
            AggregationsSlot::Pending | AggregationsSlot::Cleared => None,
        }
    }

    #[must_use]
    pub const fn aggregations_slot(&self) -> &AggregationsSlot {
        &self.aggregations
    }

    pub fn set_aggregations(&mut self, aggregations: InternalAggregations) {
        self.aggregations = AggregationsSlot::Ready(aggregations);
    }

    pub fn clear_aggregations(&mut self) {
        self.aggregations = AggregationsSlot::Cleared;
    }

    /// Move the finalized aggregations out, e.g. to ship them to the coordinator.
    pub fn take_aggregations(&mut self) -> Option<InternalAggregations> {
        match std::mem::take(&mut self.aggregations) {
            AggregationsSlot::Ready(aggregations) => Some(aggregations),
            slot => {
                self.aggregations = slot;
                None
            }
        }
    }

    /// Documents matched by the primary pass. A lower bound when
    /// [`Self::terminated_early`] is set: the pass stops once every collector
    /// is exhausted, and unvisited documents are not counted.
    #[must_use]
    pub const fn total_hits(&self) -> u64 {
        self.total_hits
    }

    #[must_use]
    pub const fn terminated_early(&self) -> bool {
        self.terminated_early
    }

    pub(crate) const fn record_hits(&mut self, total_hits: u64, terminated_early: bool) {
        self.total_hits = self.total_hits.saturating_add(total_hits);
        self.terminated_early |= terminated_early;
    }
}

///
/// SearchContext
///
/// Execution context for one shard: query, mandatory filters, searcher,
/// collector registrations, optional profilers, aggregation state, and the
/// shard result. Passed explicitly to every phase.
///

pub struct SearchContext {
    shard_target: ShardTarget,
    searcher: Arc<dyn ShardSearcher>,
    query: Query,
    alias_filter: Option<Query>,
    config: AggregationConfig,
    aggregations: Option<SearchContextAggregations>,
    collector_managers: CollectorManagerRegistry,
    profilers: Option<Profilers>,
    query_result: QuerySearchResult,
}

impl SearchContext {
    #[must_use]
    pub fn new(shard_target: ShardTarget, searcher: Arc<dyn ShardSearcher>) -> Self {
        Self {
            shard_target,
            searcher,
            query: Query::MatchAll,
            alias_filter: None,
            config: AggregationConfig::default(),
            aggregations: None,
            collector_managers: CollectorManagerRegistry::new(),
            profilers: None,
            query_result: QuerySearchResult::default(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Partition/alias restriction every pass on this shard must honor.
    #[must_use]
    pub fn with_alias_filter(mut self, filter: Query) -> Self {
        self.alias_filter = Some(filter);
        self
    }

    #[must_use]
    pub const fn with_config(mut self, config: AggregationConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_aggregations(mut self, request: Arc<AggregationRequest>) -> Self {
        self.aggregations = Some(SearchContextAggregations::new(request));
        self
    }

    #[must_use]
    pub fn with_profiling(mut self) -> Self {
        self.profilers = Some(Profilers::new());
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn shard_target(&self) -> &ShardTarget {
        &self.shard_target
    }

    #[must_use]
    pub fn searcher(&self) -> Arc<dyn ShardSearcher> {
        Arc::clone(&self.searcher)
    }

    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    #[must_use]
    pub const fn config(&self) -> &AggregationConfig {
        &self.config
    }

    #[must_use]
    pub const fn aggregations(&self) -> Option<&SearchContextAggregations> {
        self.aggregations.as_ref()
    }

    pub const fn aggregations_mut(&mut self) -> Option<&mut SearchContextAggregations> {
        self.aggregations.as_mut()
    }

    /// Drop aggregation state so later pages of this context skip aggregation.
    pub fn clear_aggregations(&mut self) {
        self.aggregations = None;
    }

    #[must_use]
    pub const fn collector_managers(&self) -> &CollectorManagerRegistry {
        &self.collector_managers
    }

    pub const fn collector_managers_mut(&mut self) -> &mut CollectorManagerRegistry {
        &mut self.collector_managers
    }

    #[must_use]
    pub const fn profilers(&self) -> Option<&Profilers> {
        self.profilers.as_ref()
    }

    pub const fn profilers_mut(&mut self) -> Option<&mut Profilers> {
        self.profilers.as_mut()
    }

    #[must_use]
    pub const fn query_result(&self) -> &QuerySearchResult {
        &self.query_result
    }

    pub const fn query_result_mut(&mut self) -> &mut QuerySearchResult {
        &mut self.query_result
    }

    // ------------------------------------------------------------------
    // Query composition
    // ------------------------------------------------------------------

    /// Combine `query` with every filter this shard mandates: the alias filter
    /// and, when the partition stores nested documents, root-only matching.
    #[must_use]
    pub fn build_filtered_query(&self, query: Query) -> Query {
        let mut filters = Vec::new();
        if let Some(alias_filter) = &self.alias_filter {
            filters.push(alias_filter.clone());
        }
        if self.searcher.has_nested_docs() {
            filters.push(Query::non_nested_docs());
        }

        query.filtered(filters)
    }
}
