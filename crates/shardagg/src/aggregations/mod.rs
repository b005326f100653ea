//! Module: aggregations
//! Responsibility: aggregator contract, fan-out, lifecycle phase, and reference strategies.
//! Does not own: the searcher or the primary query pass.
//! Boundary: callers drive it through `AggregationPhase` on a `SearchContext`.

mod aggregator;
mod bucket;
mod bucket_consumer;
mod factories;
mod global_pass;
mod metrics;
mod multi;
mod phase;
mod pipeline;
mod result;
mod state;

#[cfg(test)]
mod tests;

pub use aggregator::{
    Aggregator, AggregatorHandle, BucketCollector, BucketOrd, aggregator_handle, aggregator_handles,
};
pub use bucket::{GlobalAggregator, TermsAggregator};
pub use bucket_consumer::MultiBucketConsumer;
pub use factories::{
    AggregationKind, AggregationRequest, AggregationSpec, AggregatorFactories, AggregatorFactory,
    AggregatorLevel,
};
pub use metrics::{MetricAggregator, MetricKind};
pub use multi::MultiBucketCollector;
pub use phase::AggregationPhase;
pub(crate) use phase::disable_aggregations;
pub use pipeline::{PipelineAggregationSpec, PipelineKind, PipelineTree};
pub use result::{
    AggregationValue, InternalAggregation, InternalAggregations, PipelineTreeSource, TermsBucket,
};
pub use state::SearchContextAggregations;
