//! Pipeline aggregation request vocabulary and the tree handed to the
//! cross-shard reducer. Nothing here evaluates a pipeline.

use serde::{Deserialize, Serialize};

///
/// PipelineKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    AvgBucket,
    SumBucket,
    MinBucket,
    MaxBucket,
}

///
/// PipelineAggregationSpec
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PipelineAggregationSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PipelineKind,
    pub buckets_path: String,
}

impl PipelineAggregationSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PipelineKind, buckets_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            buckets_path: buckets_path.into(),
        }
    }
}

///
/// PipelineTree
///
/// Pipeline specs arranged like the aggregation tree they read from. Subtrees
/// only exist for aggregations with pipelines somewhere below them.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PipelineTree {
    pub name: String,
    pub aggregators: Vec<PipelineAggregationSpec>,
    pub subtrees: Vec<Self>,
}

impl PipelineTree {
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty() && self.subtrees.is_empty()
    }

    #[must_use]
    pub fn subtree(&self, name: &str) -> Option<&Self> {
        self.subtrees.iter().find(|tree| tree.name == name)
    }
}
