//! Search-side plumbing the aggregation engine plugs into: the shard
//! execution context, collector contracts, the searcher seam, profiling
//! attach points, and the query phase that drives the primary pass.

mod collector;
mod context;
mod profile;
mod query_phase;
mod searcher;

pub use collector::{
    AGGREGATION_COLLECTOR_KEY, CollectStatus, Collector, CollectorManager,
    CollectorManagerRegistry, MultiCollector, SharedCollector,
};
pub use context::{AggregationsSlot, QuerySearchResult, SearchContext, ShardTarget};
pub use profile::{
    CollectorResult, CollectorResultHandle, ProfileCollector, Profilers, QueryProfiler,
    REASON_AGGREGATION, REASON_AGGREGATION_GLOBAL,
};
pub use query_phase::{QueryPhase, execute_query_phase};
pub use searcher::{IndexSearcher, PassStats, SegmentOutcome, ShardSearcher};
