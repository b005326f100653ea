//! Module: aggregations::aggregator
//! Responsibility: the collection/finalization contract every aggregation strategy implements.
//! Does not own: bucketing or metric algorithms.
//! Boundary: the engine only ever talks to strategies through these traits.

use crate::{
    aggregations::{InternalAggregation, MultiBucketConsumer},
    error::InternalError,
    index::{DocId, Segment},
    search::CollectStatus,
};
use std::{cell::RefCell, rc::Rc, sync::Arc};

/// Ordinal of the parent bucket a document is collected into; `0` at top level.
pub type BucketOrd = u64;

///
/// BucketCollector
///
/// Collection half of the aggregator contract. Per pass: `pre_collection`
/// once, then for each segment one `set_segment` followed by `collect` for the
/// segment's matching documents, then `post_collection` once.
///

pub trait BucketCollector {
    fn pre_collection(&mut self) -> Result<(), InternalError>;

    /// Switch to `segment`. A non-active status skips the segment's documents.
    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError>;

    fn collect(&mut self, doc: DocId, owning_bucket: BucketOrd)
    -> Result<CollectStatus, InternalError>;

    fn post_collection(&mut self) -> Result<(), InternalError>;
}

///
/// Aggregator
///
/// Stateful accumulator created per request from its factory.
/// Global aggregators are kept out of the query-filtered pass and collected in
/// a dedicated match-all pass instead.
///

pub trait Aggregator: BucketCollector {
    /// Stable name, unique among siblings.
    fn name(&self) -> &str;

    fn is_global(&self) -> bool {
        false
    }

    /// Build the result for one owning bucket.
    fn build_aggregation(
        &mut self,
        owning_bucket: BucketOrd,
        buckets: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregation, InternalError>;

    /// Build the result of a top-level aggregator.
    fn build_top_level(
        &mut self,
        buckets: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregation, InternalError> {
        self.build_aggregation(0, buckets)
    }
}

/// Aggregator shared between the request's ordered list and the fan-out
/// collectors of the passes that feed it.
pub type AggregatorHandle = Rc<RefCell<Box<dyn Aggregator>>>;

#[must_use]
pub fn aggregator_handle(aggregator: Box<dyn Aggregator>) -> AggregatorHandle {
    Rc::new(RefCell::new(aggregator))
}

/// Wrap each aggregator in a shared handle, preserving order.
#[must_use]
pub fn aggregator_handles(aggregators: Vec<Box<dyn Aggregator>>) -> Vec<AggregatorHandle> {
    aggregators.into_iter().map(aggregator_handle).collect()
}
