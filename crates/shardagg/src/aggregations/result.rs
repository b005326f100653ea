//! Module: aggregations::result
//! Responsibility: per-shard partial aggregation results and their deferred pipeline tree.
//! Does not own: cross-shard reduction or pipeline evaluation.
//! Boundary: immutable once handed to the shard result.

use crate::aggregations::PipelineTree;
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Deferred builder for the request's pipeline tree.
pub type PipelineTreeSource = Arc<dyn Fn() -> PipelineTree + Send + Sync>;

///
/// InternalAggregation
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct InternalAggregation {
    pub name: String,
    #[serde(flatten)]
    pub value: AggregationValue,
}

impl InternalAggregation {
    #[must_use]
    pub fn new(name: impl Into<String>, value: AggregationValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

///
/// AggregationValue
///
/// Partial values produced by the reference strategies.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationValue {
    Sum {
        value: f64,
    },
    Min {
        value: Option<f64>,
    },
    Max {
        value: Option<f64>,
    },
    ValueCount {
        value: u64,
    },
    Global {
        doc_count: u64,
        aggregations: InternalAggregations,
    },
    Terms {
        buckets: Vec<TermsBucket>,
        sum_other_doc_count: u64,
    },
}

///
/// TermsBucket
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TermsBucket {
    pub key: String,
    pub doc_count: u64,
    pub aggregations: InternalAggregations,
}

///
/// InternalAggregations
///
/// Ordered aggregation results for one shard (or one bucket). The top-level
/// list also carries the request's pipeline tree source, evaluated only when a
/// reducer asks for it.
///

#[derive(Clone, Default, Deref, Deserialize, IntoIterator, Serialize)]
#[serde(transparent)]
pub struct InternalAggregations {
    #[deref]
    #[into_iterator(owned, ref)]
    aggregations: Vec<InternalAggregation>,

    #[serde(skip)]
    pipeline_tree_source: Option<PipelineTreeSource>,
}

impl InternalAggregations {
    #[must_use]
    pub fn new(
        aggregations: Vec<InternalAggregation>,
        pipeline_tree_source: Option<PipelineTreeSource>,
    ) -> Self {
        Self {
            aggregations,
            pipeline_tree_source,
        }
    }

    /// Results without a pipeline tree, as built for bucket sub-aggregations.
    #[must_use]
    pub fn from_list(aggregations: Vec<InternalAggregation>) -> Self {
        Self::new(aggregations, None)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InternalAggregation> {
        self.aggregations.iter().find(|agg| agg.name == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.aggregations.iter().map(|agg| agg.name.as_str()).collect()
    }

    #[must_use]
    pub fn into_list(self) -> Vec<InternalAggregation> {
        self.aggregations
    }

    #[must_use]
    pub const fn has_pipeline_tree_source(&self) -> bool {
        self.pipeline_tree_source.is_some()
    }

    /// Evaluate the deferred pipeline tree; empty when none was attached.
    #[must_use]
    pub fn pipeline_tree(&self) -> PipelineTree {
        self.pipeline_tree_source
            .as_ref()
            .map_or_else(PipelineTree::default, |source| source())
    }
}

impl fmt::Debug for InternalAggregations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalAggregations")
            .field("aggregations", &self.aggregations)
            .field("pipeline_tree_source", &self.pipeline_tree_source.is_some())
            .finish()
    }
}

// Pipeline sources are opaque; equality only covers the results.
impl PartialEq for InternalAggregations {
    fn eq(&self, other: &Self) -> bool {
        self.aggregations == other.aggregations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sum(name: &str, value: f64) -> InternalAggregation {
        InternalAggregation::new(name, AggregationValue::Sum { value })
    }

    #[test]
    fn pipeline_tree_source_runs_only_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source: PipelineTreeSource = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            PipelineTree::empty("root")
        });

        let aggs = InternalAggregations::new(vec![sum("total", 1.0)], Some(source));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(aggs.pipeline_tree().name, "root");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_source_yields_empty_tree() {
        let aggs = InternalAggregations::from_list(Vec::new());

        assert!(!aggs.has_pipeline_tree_source());
        assert!(aggs.pipeline_tree().is_empty());
    }

    #[test]
    fn serializes_as_tagged_list() {
        let aggs = InternalAggregations::from_list(vec![
            sum("total", 2.5),
            InternalAggregation::new(
                "all",
                AggregationValue::Global {
                    doc_count: 8,
                    aggregations: InternalAggregations::from_list(Vec::new()),
                },
            ),
        ]);

        let json = serde_json::to_value(&aggs).expect("aggregations should serialize");
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "total", "type": "sum", "value": 2.5},
                {"name": "all", "type": "global", "doc_count": 8, "aggregations": []},
            ])
        );

        let back: InternalAggregations =
            serde_json::from_value(json).expect("aggregations should deserialize");
        assert_eq!(back, aggs);
    }
}
