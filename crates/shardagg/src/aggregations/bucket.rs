//! Module: aggregations::bucket
//! Responsibility: bucketing strategies that fan documents into sub-aggregators.
//! Does not own: metric folding; sub-aggregators do that per bucket ordinal.
//! Boundary: sub-aggregators are driven through `MultiBucketCollector`.

use crate::{
    aggregations::{
        AggregationValue, Aggregator, AggregatorHandle, BucketCollector, BucketOrd,
        InternalAggregation, InternalAggregations, MultiBucketCollector, MultiBucketConsumer,
        TermsBucket, aggregator_handles,
    },
    error::InternalError,
    index::{DocId, FieldValue, Segment},
    search::CollectStatus,
};
use std::{collections::BTreeMap, sync::Arc};

// Shared child driver for bucket aggregators; `None` when there are no subs.
struct SubAggregators {
    handles: Vec<AggregatorHandle>,
    collector: Option<MultiBucketCollector>,
}

impl SubAggregators {
    fn new(aggregators: Vec<Box<dyn Aggregator>>) -> Result<Self, InternalError> {
        let handles = aggregator_handles(aggregators);
        let collector = if handles.is_empty() {
            None
        } else {
            Some(MultiBucketCollector::new(handles.clone())?)
        };

        Ok(Self { handles, collector })
    }

    fn pre_collection(&mut self) -> Result<(), InternalError> {
        self.collector
            .as_mut()
            .map_or(Ok(()), BucketCollector::pre_collection)
    }

    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<(), InternalError> {
        if let Some(collector) = &mut self.collector {
            BucketCollector::set_segment(collector, segment)?;
        }

        Ok(())
    }

    fn collect(&mut self, doc: DocId, bucket: BucketOrd) -> Result<(), InternalError> {
        if let Some(collector) = &mut self.collector
            && collector.status().is_active()
        {
            BucketCollector::collect(collector, doc, bucket)?;
        }

        Ok(())
    }

    fn post_collection(&mut self) -> Result<(), InternalError> {
        self.collector
            .as_mut()
            .map_or(Ok(()), BucketCollector::post_collection)
    }

    fn build(
        &self,
        bucket: BucketOrd,
        buckets: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregations, InternalError> {
        let mut built = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            let mut aggregator = handle.borrow_mut();
            let result = aggregator
                .build_aggregation(bucket, buckets)
                .map_err(|err| err.attributed_to(aggregator.name()))?;
            built.push(result);
        }

        Ok(InternalAggregations::from_list(built))
    }
}

///
/// GlobalAggregator
///
/// Single bucket holding every live root document of the shard, regardless of
/// the request query. Only valid at the top level.
///

pub struct GlobalAggregator {
    name: String,
    doc_count: u64,
    subs: SubAggregators,
}

impl GlobalAggregator {
    pub fn new(
        name: impl Into<String>,
        subs: Vec<Box<dyn Aggregator>>,
    ) -> Result<Self, InternalError> {
        Ok(Self {
            name: name.into(),
            doc_count: 0,
            subs: SubAggregators::new(subs)?,
        })
    }
}

impl BucketCollector for GlobalAggregator {
    fn pre_collection(&mut self) -> Result<(), InternalError> {
        self.subs.pre_collection()
    }

    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        self.subs.set_segment(segment)?;
        Ok(CollectStatus::Active)
    }

    fn collect(
        &mut self,
        doc: DocId,
        owning_bucket: BucketOrd,
    ) -> Result<CollectStatus, InternalError> {
        if owning_bucket != 0 {
            return Err(InternalError::aggregator_internal(format!(
                "global aggregator [{}] collected into bucket {owning_bucket}",
                self.name
            )));
        }

        self.doc_count += 1;
        self.subs.collect(doc, 0)?;

        Ok(CollectStatus::Active)
    }

    fn post_collection(&mut self) -> Result<(), InternalError> {
        self.subs.post_collection()
    }
}

impl Aggregator for GlobalAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_global(&self) -> bool {
        true
    }

    fn build_aggregation(
        &mut self,
        owning_bucket: BucketOrd,
        buckets: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregation, InternalError> {
        if owning_bucket != 0 {
            return Err(InternalError::aggregator_internal(format!(
                "global aggregator [{}] has no bucket {owning_bucket}",
                self.name
            )));
        }

        let aggregations = self.subs.build(0, buckets)?;
        Ok(InternalAggregation::new(
            self.name.clone(),
            AggregationValue::Global {
                doc_count: self.doc_count,
                aggregations,
            },
        ))
    }
}

///
/// TermKey
///
/// Typed bucket key. Values of different field types never share a bucket,
/// even when they print the same.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum TermKey {
    Long(i64),
    Double(u64),
    Keyword(String),
}

impl TermKey {
    fn render(&self) -> String {
        match self {
            Self::Long(value) => value.to_string(),
            Self::Double(bits) => format!("{:?}", f64::from_bits(*bits)),
            Self::Keyword(value) => value.clone(),
        }
    }
}

impl From<&FieldValue> for TermKey {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Long(value) => Self::Long(*value),
            // -0.0 and 0.0 are one term
            FieldValue::Double(value) => Self::Double((*value + 0.0).to_bits()),
            FieldValue::Keyword(value) => Self::Keyword(value.clone()),
        }
    }
}

///
/// TermsAggregator
///
/// One bucket per distinct typed field value within each owning bucket.
/// Buckets are ordered by doc count, then key (longs, then doubles, then
/// keywords), and cut to `size`.
///

pub struct TermsAggregator {
    name: String,
    field: String,
    size: usize,
    ords: BTreeMap<BucketOrd, BTreeMap<TermKey, BucketOrd>>,
    doc_counts: Vec<u64>,
    segment: Option<Arc<Segment>>,
    subs: SubAggregators,
}

impl TermsAggregator {
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        size: usize,
        subs: Vec<Box<dyn Aggregator>>,
    ) -> Result<Self, InternalError> {
        Ok(Self {
            name: name.into(),
            field: field.into(),
            size,
            ords: BTreeMap::new(),
            doc_counts: Vec::new(),
            segment: None,
            subs: SubAggregators::new(subs)?,
        })
    }

    fn bucket_ord(&mut self, owning_bucket: BucketOrd, key: TermKey) -> BucketOrd {
        let next = self.doc_counts.len() as BucketOrd;
        let ord = *self
            .ords
            .entry(owning_bucket)
            .or_default()
            .entry(key)
            .or_insert(next);
        if ord == next {
            self.doc_counts.push(0);
        }

        ord
    }

    fn doc_count(&self, ord: BucketOrd) -> u64 {
        usize::try_from(ord)
            .ok()
            .and_then(|slot| self.doc_counts.get(slot).copied())
            .unwrap_or(0)
    }
}

impl BucketCollector for TermsAggregator {
    fn pre_collection(&mut self) -> Result<(), InternalError> {
        self.subs.pre_collection()
    }

    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        self.segment = Some(Arc::clone(segment));
        self.subs.set_segment(segment)?;

        Ok(CollectStatus::Active)
    }

    fn collect(
        &mut self,
        doc: DocId,
        owning_bucket: BucketOrd,
    ) -> Result<CollectStatus, InternalError> {
        let segment = self.segment.clone().ok_or_else(|| {
            InternalError::aggregator_internal("collect called before set_segment")
        })?;
        let Some(value) = segment.field(doc, &self.field) else {
            return Ok(CollectStatus::Active);
        };

        let ord = self.bucket_ord(owning_bucket, TermKey::from(value));
        if let Some(count) = usize::try_from(ord)
            .ok()
            .and_then(|slot| self.doc_counts.get_mut(slot))
        {
            *count += 1;
        }
        self.subs.collect(doc, ord)?;

        Ok(CollectStatus::Active)
    }

    fn post_collection(&mut self) -> Result<(), InternalError> {
        self.segment = None;
        self.subs.post_collection()
    }
}

impl Aggregator for TermsAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_aggregation(
        &mut self,
        owning_bucket: BucketOrd,
        buckets: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregation, InternalError> {
        let mut candidates: Vec<(&TermKey, BucketOrd, u64)> = self
            .ords
            .get(&owning_bucket)
            .into_iter()
            .flatten()
            .map(|(key, ord)| (key, *ord, self.doc_count(*ord)))
            .collect();
        candidates.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));

        let total: u64 = candidates.iter().map(|(_, _, count)| count).sum();
        candidates.truncate(self.size);
        buckets.accept(candidates.len())?;

        let mut built = Vec::with_capacity(candidates.len());
        for (key, ord, doc_count) in candidates {
            built.push(TermsBucket {
                key: key.render(),
                doc_count,
                aggregations: self.subs.build(ord, buckets)?,
            });
        }
        let kept: u64 = built.iter().map(|bucket| bucket.doc_count).sum();

        Ok(InternalAggregation::new(
            self.name.clone(),
            AggregationValue::Terms {
                buckets: built,
                sum_other_doc_count: total - kept,
            },
        ))
    }
}
