//! Module: search::collector
//! Responsibility: collector surface driven by searchers, plus manager registration.
//! Does not own: aggregation semantics or per-aggregator state.
//! Boundary: the only contract a searcher needs to drive a collection pass.

use crate::{
    error::InternalError,
    index::{DocId, Segment},
    search::QuerySearchResult,
};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc, sync::Arc};

/// Registry key under which the aggregation phase registers its collector.
pub const AGGREGATION_COLLECTOR_KEY: &str = "aggregation";

///
/// CollectStatus
///
/// Per-collector demand signal returned from every segment switch and visit.
/// Searchers stop the current segment on `SegmentDone` and the whole pass on
/// `Exhausted`; neither state is an error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollectStatus {
    Active,
    SegmentDone,
    Exhausted,
}

impl CollectStatus {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Fold child statuses into the status of a fan-out parent.
    ///
    /// Any active child keeps the parent active; otherwise the parent is done
    /// for the segment if any child will want the next segment, and exhausted
    /// only when every child is.
    #[must_use]
    pub fn combine(statuses: impl IntoIterator<Item = Self>) -> Self {
        let mut combined = Self::Exhausted;
        for status in statuses {
            match status {
                Self::Active => return Self::Active,
                Self::SegmentDone => combined = Self::SegmentDone,
                Self::Exhausted => {}
            }
        }

        combined
    }
}

///
/// Collector
///
/// Searcher-facing collector. One call to `set_segment` precedes the visits of
/// that segment's matching documents.
///

pub trait Collector {
    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError>;

    fn collect(&mut self, doc: DocId) -> Result<CollectStatus, InternalError>;
}

impl<C: Collector + ?Sized> Collector for Box<C> {
    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        (**self).set_segment(segment)
    }

    fn collect(&mut self, doc: DocId) -> Result<CollectStatus, InternalError> {
        (**self).collect(doc)
    }
}

/// Collector instance shared between a manager and the passes it serves.
pub type SharedCollector = Rc<RefCell<dyn Collector>>;

///
/// CollectorManager
///
/// Produces collectors for the query phase and folds them back into the shard
/// result. `reduce` is only reached when segments are collected concurrently.
///

pub trait CollectorManager {
    fn new_collector(&self) -> Result<SharedCollector, InternalError>;

    fn reduce(
        &self,
        collectors: Vec<SharedCollector>,
        result: &mut QuerySearchResult,
    ) -> Result<(), InternalError>;
}

///
/// CollectorManagerRegistry
///
/// Collector managers keyed by the identity of the phase that registered them.
///

#[derive(Default)]
pub struct CollectorManagerRegistry {
    managers: BTreeMap<&'static str, Box<dyn CollectorManager>>,
}

impl CollectorManagerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `manager` under `key`, returning any manager it replaced.
    pub fn insert(
        &mut self,
        key: &'static str,
        manager: Box<dyn CollectorManager>,
    ) -> Option<Box<dyn CollectorManager>> {
        self.managers.insert(key, manager)
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn CollectorManager>> {
        self.managers.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&dyn CollectorManager> {
        self.managers.get(key).map(Box::as_ref)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.managers.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &dyn CollectorManager)> {
        self.managers
            .iter()
            .map(|(key, manager)| (*key, manager.as_ref()))
    }
}

///
/// MultiCollector
///
/// Query-level fan-out over the collectors produced by every registered
/// manager for one pass.
///

pub struct MultiCollector {
    collectors: Vec<(SharedCollector, CollectStatus)>,
}

impl MultiCollector {
    #[must_use]
    pub fn new(collectors: Vec<SharedCollector>) -> Self {
        Self {
            collectors: collectors
                .into_iter()
                .map(|collector| (collector, CollectStatus::Active))
                .collect(),
        }
    }

    fn status(&self) -> CollectStatus {
        CollectStatus::combine(self.collectors.iter().map(|(_, status)| *status))
    }
}

impl Collector for MultiCollector {
    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        for (collector, status) in &mut self.collectors {
            if *status != CollectStatus::Exhausted {
                *status = collector.borrow_mut().set_segment(segment)?;
            }
        }

        Ok(self.status())
    }

    fn collect(&mut self, doc: DocId) -> Result<CollectStatus, InternalError> {
        for (collector, status) in &mut self.collectors {
            if status.is_active() {
                *status = collector.borrow_mut().collect(doc)?;
            }
        }

        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_prefers_active_then_segment_done() {
        use CollectStatus::{Active, Exhausted, SegmentDone};

        assert_eq!(CollectStatus::combine([Exhausted, Active, SegmentDone]), Active);
        assert_eq!(CollectStatus::combine([Exhausted, SegmentDone]), SegmentDone);
        assert_eq!(CollectStatus::combine([Exhausted, Exhausted]), Exhausted);
        assert_eq!(CollectStatus::combine(std::iter::empty()), Exhausted);
    }
}
