//! Module: aggregations::multi
//! Responsibility: fan one document visit out to an ordered set of aggregators.
//! Does not own: aggregator results; nothing is merged or split here.
//! Boundary: presents a single collector to searchers and to parent aggregators.

use crate::{
    aggregations::{AggregatorHandle, BucketCollector, BucketOrd},
    error::InternalError,
    index::{DocId, Segment},
    search::{CollectStatus, Collector},
};
use std::sync::Arc;

///
/// FanOutChild
///

struct FanOutChild {
    aggregator: AggregatorHandle,
    status: CollectStatus,
}

///
/// MultiBucketCollector
///
/// Delivers each visit to every still-active child in declaration order.
/// Children that report `SegmentDone` sit out the rest of the segment; children
/// that report `Exhausted` sit out the rest of the pass. Once no child is
/// active the collector reports the combined status upstream so the searcher
/// can stop early.
///

pub struct MultiBucketCollector {
    children: Vec<FanOutChild>,
}

impl MultiBucketCollector {
    pub fn new(aggregators: Vec<AggregatorHandle>) -> Result<Self, InternalError> {
        if aggregators.is_empty() {
            return Err(InternalError::collector_invariant(
                "multi bucket collector requires at least one aggregator",
            ));
        }

        Ok(Self {
            children: aggregators
                .into_iter()
                .map(|aggregator| FanOutChild {
                    aggregator,
                    status: CollectStatus::Active,
                })
                .collect(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Current per-child demand, in declaration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<CollectStatus> {
        self.children.iter().map(|child| child.status).collect()
    }

    #[must_use]
    pub fn status(&self) -> CollectStatus {
        CollectStatus::combine(self.statuses())
    }

    /// Profile label listing the children.
    #[must_use]
    pub fn describe(&self) -> String {
        let names: Vec<String> = self
            .children
            .iter()
            .map(|child| child.aggregator.borrow().name().to_string())
            .collect();

        format!("MultiBucketCollector: [{}]", names.join(", "))
    }
}

impl BucketCollector for MultiBucketCollector {
    fn pre_collection(&mut self) -> Result<(), InternalError> {
        for child in &self.children {
            let mut aggregator = child.aggregator.borrow_mut();
            aggregator
                .pre_collection()
                .map_err(|err| err.attributed_to(aggregator.name()))?;
        }

        Ok(())
    }

    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        for child in &mut self.children {
            if child.status == CollectStatus::Exhausted {
                continue;
            }

            let mut aggregator = child.aggregator.borrow_mut();
            child.status = aggregator
                .set_segment(segment)
                .map_err(|err| err.attributed_to(aggregator.name()))?;
        }

        Ok(self.status())
    }

    fn collect(
        &mut self,
        doc: DocId,
        owning_bucket: BucketOrd,
    ) -> Result<CollectStatus, InternalError> {
        for child in &mut self.children {
            if !child.status.is_active() {
                continue;
            }

            let mut aggregator = child.aggregator.borrow_mut();
            child.status = aggregator
                .collect(doc, owning_bucket)
                .map_err(|err| err.attributed_to(aggregator.name()))?;
        }

        Ok(self.status())
    }

    fn post_collection(&mut self) -> Result<(), InternalError> {
        for child in &self.children {
            let mut aggregator = child.aggregator.borrow_mut();
            aggregator
                .post_collection()
                .map_err(|err| err.attributed_to(aggregator.name()))?;
        }

        Ok(())
    }
}

// Searchers drive top-level fan-out with owning bucket 0.
impl Collector for MultiBucketCollector {
    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        BucketCollector::set_segment(self, segment)
    }

    fn collect(&mut self, doc: DocId) -> Result<CollectStatus, InternalError> {
        BucketCollector::collect(self, doc, 0)
    }
}
