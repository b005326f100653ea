//! Module: search::searcher
//! Responsibility: drive one collection pass of a query over a shard's segments.
//! Does not own: collector semantics; statuses are obeyed, never interpreted.
//! Boundary: `ShardSearcher` is the seam real index engines implement.

use crate::{
    error::InternalError,
    index::{Query, Segment, ShardIndex},
    search::{CollectStatus, Collector},
};
use std::sync::Arc;

///
/// SegmentOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SegmentOutcome {
    pub status: CollectStatus,
    pub docs_matched: u64,
    pub terminated_early: bool,
}

///
/// PassStats
///
/// Counters for one collection pass. `docs_matched` only counts documents the
/// searcher actually visited, so it is a lower bound when `terminated_early`.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PassStats {
    pub docs_matched: u64,
    pub segments_searched: u32,
    pub terminated_early: bool,
}

impl PassStats {
    pub const fn record(&mut self, outcome: SegmentOutcome) {
        self.docs_matched = self.docs_matched.saturating_add(outcome.docs_matched);
        self.segments_searched = self.segments_searched.saturating_add(1);
        self.terminated_early |= outcome.terminated_early;
    }
}

///
/// ShardSearcher
///

pub trait ShardSearcher {
    fn segments(&self) -> &[Arc<Segment>];

    /// True when the partition stores hidden nested documents.
    fn has_nested_docs(&self) -> bool;

    /// Collect every document of `segment` matching `query`, honoring the
    /// collector's demand signal.
    fn search_segment(
        &self,
        query: &Query,
        segment: &Arc<Segment>,
        collector: &mut dyn Collector,
    ) -> Result<SegmentOutcome, InternalError>;

    /// Run one full pass over all segments in order.
    fn search(&self, query: &Query, collector: &mut dyn Collector) -> Result<PassStats, InternalError> {
        let mut stats = PassStats::default();
        let segments = self.segments();

        for (position, segment) in segments.iter().enumerate() {
            let outcome = self.search_segment(query, segment, collector)?;
            stats.record(outcome);

            if outcome.status == CollectStatus::Exhausted {
                if position + 1 < segments.len() {
                    stats.terminated_early = true;
                }
                break;
            }
        }

        Ok(stats)
    }
}

///
/// IndexSearcher
///
/// Reference searcher over an in-memory [`ShardIndex`]; matches by evaluating
/// the query against every stored document in doc-id order.
///

#[derive(Clone, Debug)]
pub struct IndexSearcher {
    index: Arc<ShardIndex>,
}

impl IndexSearcher {
    #[must_use]
    pub const fn new(index: Arc<ShardIndex>) -> Self {
        Self { index }
    }

    #[must_use]
    pub fn index(&self) -> &ShardIndex {
        &self.index
    }
}

impl ShardSearcher for IndexSearcher {
    fn segments(&self) -> &[Arc<Segment>] {
        self.index.segments()
    }

    fn has_nested_docs(&self) -> bool {
        self.index.has_nested_docs()
    }

    fn search_segment(
        &self,
        query: &Query,
        segment: &Arc<Segment>,
        collector: &mut dyn Collector,
    ) -> Result<SegmentOutcome, InternalError> {
        let mut outcome = SegmentOutcome {
            status: collector.set_segment(segment)?,
            docs_matched: 0,
            terminated_early: false,
        };
        if !outcome.status.is_active() {
            outcome.terminated_early = segment.max_doc() > 0;
            return Ok(outcome);
        }

        let last = segment.max_doc().saturating_sub(1);
        for (doc, document) in segment.docs() {
            if !query.matches(document) {
                continue;
            }

            outcome.docs_matched += 1;
            outcome.status = collector.collect(doc)?;
            if !outcome.status.is_active() {
                outcome.terminated_early = doc < last;
                break;
            }
        }

        Ok(outcome)
    }
}
