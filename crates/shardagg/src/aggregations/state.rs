//! Per-context aggregation state carried between pre-process and execute.

use crate::aggregations::{AggregationRequest, AggregatorHandle, MultiBucketConsumer};
use std::sync::Arc;

///
/// SearchContextAggregations
///
/// The request's factories, the aggregators created from them (once
/// pre-process has run), and the bucket consumer used during finalization.
///

pub struct SearchContextAggregations {
    request: Arc<AggregationRequest>,
    aggregators: Option<Vec<AggregatorHandle>>,
    bucket_consumer: MultiBucketConsumer,
}

impl SearchContextAggregations {
    #[must_use]
    pub fn new(request: Arc<AggregationRequest>) -> Self {
        Self {
            request,
            aggregators: None,
            bucket_consumer: MultiBucketConsumer::default(),
        }
    }

    #[must_use]
    pub fn request(&self) -> Arc<AggregationRequest> {
        Arc::clone(&self.request)
    }

    /// Top-level aggregators in request order; `None` before pre-process.
    #[must_use]
    pub fn aggregators(&self) -> Option<&[AggregatorHandle]> {
        self.aggregators.as_deref()
    }

    pub fn set_aggregators(&mut self, aggregators: Vec<AggregatorHandle>) {
        self.aggregators = Some(aggregators);
    }

    pub const fn reset_bucket_consumer(&mut self, limit: u32) {
        self.bucket_consumer.reset(limit);
    }

    pub const fn bucket_consumer_mut(&mut self) -> &mut MultiBucketConsumer {
        &mut self.bucket_consumer
    }
}
