//! Module: aggregations::metrics
//! Responsibility: single-value numeric metrics keyed by owning bucket.
//! Does not own: bucketing; parents decide which bucket a document lands in.
//! Boundary: reference strategies exercising the aggregator contract.

use crate::{
    aggregations::{
        AggregationValue, Aggregator, BucketCollector, BucketOrd, InternalAggregation,
        MultiBucketConsumer,
    },
    error::InternalError,
    index::{DocId, Segment},
    search::CollectStatus,
};
use std::sync::Arc;

///
/// MetricKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricKind {
    Sum,
    Min,
    Max,
    ValueCount,
}

impl MetricKind {
    const fn identity(self) -> f64 {
        match self {
            Self::Sum | Self::ValueCount => 0.0,
            Self::Min => f64::INFINITY,
            Self::Max => f64::NEG_INFINITY,
        }
    }

    fn fold(self, acc: f64, value: f64) -> f64 {
        match self {
            Self::Sum | Self::ValueCount => acc + value,
            Self::Min => acc.min(value),
            Self::Max => acc.max(value),
        }
    }
}

///
/// MetricAggregator
///
/// Folds one field per owning bucket. `ValueCount` counts any present value;
/// the other kinds skip documents whose value is not numeric.
///

pub struct MetricAggregator {
    name: String,
    field: String,
    kind: MetricKind,
    values: Vec<f64>,
    counts: Vec<u64>,
    segment: Option<Arc<Segment>>,
}

impl MetricAggregator {
    #[must_use]
    pub fn new(name: impl Into<String>, field: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            kind,
            values: Vec::new(),
            counts: Vec::new(),
            segment: None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.kind
    }

    fn slot(&mut self, bucket: BucketOrd) -> Result<usize, InternalError> {
        let slot = usize::try_from(bucket).map_err(|_| {
            InternalError::aggregator_internal(format!("bucket ordinal {bucket} out of range"))
        })?;
        if slot >= self.values.len() {
            self.values.resize(slot + 1, self.kind.identity());
            self.counts.resize(slot + 1, 0);
        }

        Ok(slot)
    }
}

impl BucketCollector for MetricAggregator {
    fn pre_collection(&mut self) -> Result<(), InternalError> {
        Ok(())
    }

    fn set_segment(&mut self, segment: &Arc<Segment>) -> Result<CollectStatus, InternalError> {
        self.segment = Some(Arc::clone(segment));
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

        let observed = match self.kind {
            MetricKind::ValueCount => Some(1.0),
            _ => value.as_f64(),
        };
        if let Some(observed) = observed {
            let slot = self.slot(owning_bucket)?;
            self.values[slot] = self.kind.fold(self.values[slot], observed);
            self.counts[slot] += 1;
        }

        Ok(CollectStatus::Active)
    }

    fn post_collection(&mut self) -> Result<(), InternalError> {
        self.segment = None;
        Ok(())
    }
}

impl Aggregator for MetricAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_aggregation(
        &mut self,
        owning_bucket: BucketOrd,
        _: &mut MultiBucketConsumer,
    ) -> Result<InternalAggregation, InternalError> {
        let (value, count) = usize::try_from(owning_bucket)
            .ok()
            .and_then(|slot| Some((*self.values.get(slot)?, *self.counts.get(slot)?)))
            .unwrap_or((self.kind.identity(), 0));
        let present = (count > 0).then_some(value);

        let value = match self.kind {
            MetricKind::Sum => AggregationValue::Sum { value },
            MetricKind::Min => AggregationValue::Min { value: present },
            MetricKind::Max => AggregationValue::Max { value: present },
            MetricKind::ValueCount => AggregationValue::ValueCount { value: count },
        };

        Ok(InternalAggregation::new(self.name.clone(), value))
    }
}
