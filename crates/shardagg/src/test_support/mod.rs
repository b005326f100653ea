//! Shared fixtures for engine tests: a small two-segment shard and a
//! scriptable aggregator that records every lifecycle call.

use crate::{
    aggregations::{
        AggregationRequest, AggregationValue, Aggregator, AggregatorFactories, AggregatorFactory,
        AggregatorHandle, AggregatorLevel, BucketCollector, BucketOrd, InternalAggregation,
        MultiBucketConsumer, aggregator_handle,
    },
    error::InternalError,
    index::{DocId, Document, Query, Segment, ShardIndex},
    search::{CollectStatus, IndexSearcher, SearchContext, ShardTarget},
};
use std::sync::{Arc, Mutex};

/// Number of root documents in [`fixture_index`].
pub(crate) const FIXTURE_DOCS: u64 = 8;

/// Number of [`fixture_index`] documents matching [`fixture_query`].
pub(crate) const FIXTURE_MATCHES: u64 = 5;

/// Two segments of products; five are `active`, prices sum to 150 for those
/// and 165 overall.
pub(crate) fn fixture_index() -> ShardIndex {
    ShardIndex::new()
        .with_segment(vec![
            product("active", "red", 10),
            product("active", "blue", 20),
            product("archived", "red", 5),
            product("active", "red", 30),
        ])
        .with_segment(vec![
            product("archived", "green", 7),
            product("active", "blue", 40),
            product("archived", "blue", 3),
            product("active", "green", 50),
        ])
}

pub(crate) fn product(status: &str, color: &str, price: i64) -> Document {
    Document::new()
        .with("status", status)
        .with("color", color)
        .with("price", price)
}

pub(crate) fn fixture_query() -> Query {
    Query::term("status", "active")
}

pub(crate) fn fixture_target() -> ShardTarget {
    ShardTarget::new("node-1", "products", 0)
}

/// Context over `index` running [`fixture_query`].
pub(crate) fn context_for(index: ShardIndex) -> SearchContext {
    SearchContext::new(
        fixture_target(),
        Arc::new(IndexSearcher::new(Arc::new(index))),
    )
    .with_query(fixture_query())
}

/// Fixture context carrying `request`.
pub(crate) fn fixture_context(request: AggregationRequest) -> SearchContext {
    context_for(fixture_index()).with_aggregations(Arc::new(request))
}

///
/// CallLog
///
/// Ordered record of lifecycle calls across every recording aggregator of a
/// test. Entries look like `name:collect:<segment>:<doc>`.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    fn push(&self, entry: String) {
        self.entries
            .lock()
            .expect("call log lock should not be poisoned")
            .push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("call log lock should not be poisoned")
            .clone()
    }

    /// Entries of `name` with the `name:` prefix stripped.
    pub(crate) fn calls_of(&self, name: &str) -> Vec<String> {
        let prefix = format!("{name}:");
        self.entries()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// `(segment, doc)` pairs collected by `name`, in visit order.
    pub(crate) fn collected_by(&self, name: &str) -> Vec<(u32, DocId)> {
        self.calls_of(name)
            .iter()
            .filter_map(|call| {
                let rest = call.strip_prefix("collect:")?;
                let (segment, doc) = rest.split_once(':')?;
                Some((segment.parse().ok()?, doc.parse().ok()?))
            })
            .collect()
    }
}

///
/// Script
///
/// Behavior knobs for a [`RecordingAggregator`].
///

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Script {
    pub(crate) global: bool,
    /// Fail when collecting this segment-local doc id.
    pub(crate) fail_on_doc: Option<DocId>,
    /// Report `status` once this many docs of the current segment were collected.
    pub(crate) stop_after: Option<(u32, CollectStatus)>,
    pub(crate) fail_on_build: bool,
}

///
/// RecordingAggregator
///

pub(crate) struct RecordingAggregator {
    name: String,
    script: Script,
    log: CallLog,
    segment: Option<u32>,
    segment_collected: u32,
    exhausted: bool,
    collected: u64,
}

impl RecordingAggregator {
    pub(crate) fn new(name: &str, script: Script, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            script,
            log: log.clone(),
            segment: None,
            segment_collected: 0,
            exhausted: false,
            collected: 0,
        }
    }

    fn record(&self, call: &str) {
        self.log.push(format!("{}:{call}", self.name));
    }
}

impl BucketCollector for RecordingAggregator {
    fn pre_collection(&mut self) -> Result<(), InternalError> {
        self.record("pre");
        Ok(())
    }

    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        self.record(&format!("segment:{}", segment.ord()));
        self.segment = Some(segment.ord());
        self.segment_collected = 0;

        Ok(if self.exhausted {
            CollectStatus::Exhausted
        } else {
            CollectStatus::Active
        })
    }

    fn collect(
        &mut self,
        doc: DocId,
        _: BucketOrd,
    ) -> Result<CollectStatus, InternalError> {
        let segment = self
            .segment
            .ok_or_else(|| InternalError::aggregator_internal("collect before set_segment"))?;
        if self.script.fail_on_doc == Some(doc) {
            return Err(InternalError::aggregator_io(format!("cannot read doc {doc}")));
        }

        self.record(&format!("collect:{segment}:{doc}"));
        self.segment_collected += 1;
        self.collected += 1;

        match self.script.stop_after {
            Some((limit, status)) if self.segment_collected >= limit => {
                self.exhausted |= status == CollectStatus::Exhausted;
                Ok(status)
            }
            _ => Ok(CollectStatus::Active),
        }
    }

    fn post_collection(&mut self) -> Result<(), InternalError> {
        self.record("post");
        Ok(())
    }
}

impl Aggregator for RecordingAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_global(&self) -> bool {
        self.script.global
    }

    fn build_aggregation(
        &mut self,
        _: BucketOrd,
        _: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregation, InternalError> {
        self.record("build");
        if self.script.fail_on_build {
            return Err(InternalError::aggregator_internal("accumulator corrupted"));
        }

        Ok(InternalAggregation::new(
            self.name.clone(),
            AggregationValue::ValueCount {
                value: self.collected,
            },
        ))
    }
}

/// Shared handle to a fresh recording aggregator.
pub(crate) fn recording_handle(name: &str, script: Script, log: &CallLog) -> AggregatorHandle {
    aggregator_handle(Box::new(RecordingAggregator::new(name, script, log)))
}

///
/// RecordingFactory
///

pub(crate) struct RecordingFactory {
    name: String,
    script: Script,
    log: CallLog,
}

impl RecordingFactory {
    pub(crate) fn new(name: &str, script: Script, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            script,
            log: log.clone(),
        }
    }
}

impl AggregatorFactory for RecordingFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(
        &self,
        _: &SearchContext,
        _: AggregatorLevel,
    ) -> Result<Box<dyn Aggregator>, InternalError> {
        Ok(Box::new(RecordingAggregator::new(
            &self.name,
            self.script,
            &self.log,
        )))
    }
}

/// Request of recording factories, in the given order.
pub(crate) fn recording_request(factories: &[(&str, Script)], log: &CallLog) -> AggregationRequest {
    let mut all = AggregatorFactories::new();
    for (name, script) in factories {
        all.add(Arc::new(RecordingFactory::new(name, *script, log)))
            .expect("recording factory names should be unique");
    }

    AggregationRequest::new(all)
}
