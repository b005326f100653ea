//! Collector profiling attach points.
//!
//! Profiling is optional, injected through the search context, and must not
//! affect collection semantics: a wrapped collector returns exactly what the
//! inner collector returns.

use crate::{
    error::InternalError,
    index::{DocId, Segment},
    search::{CollectStatus, Collector},
};
use serde::Serialize;
use std::{cell::RefCell, rc::Rc, sync::Arc, time::Instant};

/// Reason tag for the collector of the primary (query-filtered) pass.
pub const REASON_AGGREGATION: &str = "aggregation";

/// Reason tag for the collector of the global (match-all) pass.
pub const REASON_AGGREGATION_GLOBAL: &str = "aggregation_global";

///
/// CollectorResult
///
/// Timing and invocation counters recorded for one profiled collector.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CollectorResult {
    pub name: String,
    pub reason: &'static str,
    pub time_nanos: u64,
    pub segments: u64,
    pub collect_count: u64,
    pub children: Vec<Self>,
}

/// Shared handle to a result that a profile collector keeps updating.
pub type CollectorResultHandle = Rc<RefCell<CollectorResult>>;

///
/// ProfileCollector
///

pub struct ProfileCollector {
    inner: Box<dyn Collector>,
    result: CollectorResultHandle,
}

impl ProfileCollector {
    // TODO: report per-aggregator child timings once aggregators expose a
    // profiling breakdown; `children` stays empty until then.
    pub fn new(inner: Box<dyn Collector>, name: impl Into<String>, reason: &'static str) -> Self {
        let result = CollectorResult {
            name: name.into(),
            reason,
            ..CollectorResult::default()
        };

        Self {
            inner,
            result: Rc::new(RefCell::new(result)),
        }
    }

    #[must_use]
    pub fn result(&self) -> CollectorResultHandle {
        Rc::clone(&self.result)
    }

    fn timed<T>(&mut self, f: impl FnOnce(&mut dyn Collector) -> T) -> T {
        let start = Instant::now();
        let out = f(self.inner.as_mut());
        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let mut result = self.result.borrow_mut();
        result.time_nanos = result.time_nanos.saturating_add(elapsed);
        out
    }
}

impl Collector for ProfileCollector {
    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        self.result.borrow_mut().segments += 1;
        self.timed(|inner| inner.set_segment(segment))
    }

    fn collect(&mut self, doc: DocId) -> Result<CollectStatus, InternalError> {
        self.result.borrow_mut().collect_count += 1;
        self.timed(|inner| inner.collect(doc))
    }
}

///
/// QueryProfiler
///
/// Profile of one search pass. Collectors attached here are reported under
/// that pass.
///

#[derive(Debug, Default)]
pub struct QueryProfiler {
    collectors: Vec<CollectorResultHandle>,
}

impl QueryProfiler {
    pub fn set_collector(&mut self, result: CollectorResultHandle) {
        self.collectors.push(result);
    }

    /// Snapshot of every attached collector result.
    #[must_use]
    pub fn collectors(&self) -> Vec<CollectorResult> {
        self.collectors
            .iter()
            .map(|result| result.borrow().clone())
            .collect()
    }
}

///
/// Profilers
///
/// Per-request profiler set. Starts with one query profiler for the main query;
/// extra passes add their own.
///

#[derive(Debug)]
pub struct Profilers {
    query_profilers: Vec<QueryProfiler>,
}

impl Profilers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            query_profilers: vec![QueryProfiler::default()],
        }
    }

    /// Start a new query profile and return it.
    pub fn add_query_profiler(&mut self) -> &mut QueryProfiler {
        self.query_profilers.push(QueryProfiler::default());
        let last = self.query_profilers.len() - 1;
        &mut self.query_profilers[last]
    }

    /// Return the most recently started query profile.
    pub fn current_query_profiler(&mut self) -> &mut QueryProfiler {
        if self.query_profilers.is_empty() {
            return self.add_query_profiler();
        }
        let last = self.query_profilers.len() - 1;
        &mut self.query_profilers[last]
    }

    #[must_use]
    pub fn query_profilers(&self) -> &[QueryProfiler] {
        &self.query_profilers
    }
}

impl Default for Profilers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Document, ShardIndex};

    struct StopAfter(u64);

    impl Collector for StopAfter {
        fn set_segment(&mut self, _: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
            Ok(CollectStatus::Active)
        }

        fn collect(&mut self, _: DocId) -> Result<CollectStatus, InternalError> {
            self.0 = self.0.saturating_sub(1);
            if self.0 == 0 {
                Ok(CollectStatus::Exhausted)
            } else {
                Ok(CollectStatus::Active)
            }
        }
    }

    #[test]
    fn profile_collector_counts_and_passes_status_through() {
        let index = ShardIndex::new().with_segment(vec![Document::new(); 4]);
        let segment = &index.segments()[0];
        let mut collector = ProfileCollector::new(Box::new(StopAfter(2)), "stop", REASON_AGGREGATION);

        assert_eq!(collector.set_segment(segment).expect("set segment should succeed"), CollectStatus::Active);
        assert_eq!(collector.collect(0).expect("collect should succeed"), CollectStatus::Active);
        assert_eq!(collector.collect(1).expect("collect should succeed"), CollectStatus::Exhausted);

        let result = collector.result().borrow().clone();
        assert_eq!(result.name, "stop");
        assert_eq!(result.reason, REASON_AGGREGATION);
        assert_eq!(result.segments, 1);
        assert_eq!(result.collect_count, 2);
        assert!(result.children.is_empty());
    }

    #[test]
    fn add_query_profiler_becomes_current() {
        let mut profilers = Profilers::new();
        let first = Rc::new(RefCell::new(CollectorResult {
            name: "first".into(),
            ..CollectorResult::default()
        }));
        let second = Rc::new(RefCell::new(CollectorResult {
            name: "second".into(),
            ..CollectorResult::default()
        }));

        profilers.current_query_profiler().set_collector(first);
        profilers.add_query_profiler().set_collector(second);

        let names: Vec<Vec<String>> = profilers
            .query_profilers()
            .iter()
            .map(|profiler| profiler.collectors().into_iter().map(|c| c.name).collect())
            .collect();
        assert_eq!(names, vec![vec!["first".to_string()], vec!["second".to_string()]]);
    }
}
