//! Module: aggregations::factories
//! Responsibility: turn a parsed aggregation request into per-context aggregator trees.
//! Does not own: request parsing or strategy algorithms.
//! Boundary: the engine calls `create_top_level_aggregators` once per shard request.

use crate::{
    aggregations::{
        Aggregator, GlobalAggregator, MetricAggregator, MetricKind, PipelineAggregationSpec,
        PipelineTree, TermsAggregator,
    },
    error::InternalError,
    search::SearchContext,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};

const DEFAULT_TERMS_SIZE: usize = 10;

///
/// AggregatorLevel
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregatorLevel {
    TopLevel,
    SubAggregation,
}

///
/// AggregatorFactory
///
/// Pluggable strategy constructor. Factories are immutable and shared across
/// requests; each call to `create` yields a fresh aggregator.
///

pub trait AggregatorFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        ctx: &SearchContext,
        level: AggregatorLevel,
    ) -> Result<Box<dyn Aggregator>, InternalError>;

    /// Pipeline specs declared at or below this aggregation.
    fn pipeline_tree(&self) -> PipelineTree {
        PipelineTree::empty(self.name())
    }
}

///
/// AggregatorFactories
///
/// Ordered sibling factories; output order follows insertion order.
///

#[derive(Clone, Default)]
pub struct AggregatorFactories {
    factories: Vec<Arc<dyn AggregatorFactory>>,
}

impl AggregatorFactories {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory; sibling names must be unique.
    pub fn add(&mut self, factory: Arc<dyn AggregatorFactory>) -> Result<(), InternalError> {
        if self.factories.iter().any(|f| f.name() == factory.name()) {
            return Err(InternalError::invalid_request(format!(
                "two sibling aggregations cannot have the same name: [{}]",
                factory.name()
            )));
        }

        self.factories.push(factory);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Create every top-level aggregator for `ctx`, in request order.
    pub fn create_top_level_aggregators(
        &self,
        ctx: &SearchContext,
    ) -> Result<Vec<Box<dyn Aggregator>>, InternalError> {
        self.factories
            .iter()
            .map(|factory| factory.create(ctx, AggregatorLevel::TopLevel))
            .collect()
    }

    /// Pipeline tree of this factory level; subtrees only for non-empty children.
    #[must_use]
    pub fn build_pipeline_tree(&self, name: &str, pipelines: &[PipelineAggregationSpec]) -> PipelineTree {
        PipelineTree {
            name: name.to_string(),
            aggregators: pipelines.to_vec(),
            subtrees: self
                .factories
                .iter()
                .map(|factory| factory.pipeline_tree())
                .filter(|tree| !tree.is_empty())
                .collect(),
        }
    }
}

///
/// AggregationRequest
///
/// Immutable aggregation section of one search request: top-level factories
/// plus top-level pipeline aggregations.
///

#[derive(Clone, Default)]
pub struct AggregationRequest {
    factories: AggregatorFactories,
    pipelines: Vec<PipelineAggregationSpec>,
}

impl AggregationRequest {
    #[must_use]
    pub const fn new(factories: AggregatorFactories) -> Self {
        Self {
            factories,
            pipelines: Vec::new(),
        }
    }

    /// Build a request from reference strategy specs.
    pub fn from_specs(specs: Vec<AggregationSpec>) -> Result<Self, InternalError> {
        let mut factories = AggregatorFactories::new();
        for spec in specs {
            spec.validate()?;
            factories.add(Arc::new(spec))?;
        }

        Ok(Self::new(factories))
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineAggregationSpec) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    #[must_use]
    pub const fn factories(&self) -> &AggregatorFactories {
        &self.factories
    }

    #[must_use]
    pub fn build_pipeline_tree(&self) -> PipelineTree {
        self.factories.build_pipeline_tree("", &self.pipelines)
    }
}

///
/// AggregationKind
///
/// Strategy table for the reference aggregations.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationKind {
    Sum {
        field: String,
    },
    Min {
        field: String,
    },
    Max {
        field: String,
    },
    ValueCount {
        field: String,
    },
    Terms {
        field: String,
        #[serde(default = "default_terms_size")]
        size: usize,
    },
    Global,
}

const fn default_terms_size() -> usize {
    DEFAULT_TERMS_SIZE
}

impl AggregationKind {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Sum { .. } => "sum",
            Self::Min { .. } => "min",
            Self::Max { .. } => "max",
            Self::ValueCount { .. } => "value_count",
            Self::Terms { .. } => "terms",
            Self::Global => "global",
        }
    }

    const fn accepts_sub_aggregations(&self) -> bool {
        matches!(self, Self::Terms { .. } | Self::Global)
    }
}

///
/// AggregationSpec
///
/// One node of a parsed aggregation request for the reference strategies.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AggregationSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: AggregationKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Self>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<PipelineAggregationSpec>,
}

impl AggregationSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AggregationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            aggregations: Vec::new(),
            pipelines: Vec::new(),
        }
    }

    #[must_use]
    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Sum { field: field.into() })
    }

    #[must_use]
    pub fn min(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Min { field: field.into() })
    }

    #[must_use]
    pub fn max(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Max { field: field.into() })
    }

    #[must_use]
    pub fn value_count(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::ValueCount { field: field.into() })
    }

    #[must_use]
    pub fn terms(name: impl Into<String>, field: impl Into<String>, size: usize) -> Self {
        Self::new(
            name,
            AggregationKind::Terms {
                field: field.into(),
                size,
            },
        )
    }

    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, AggregationKind::Global)
    }

    #[must_use]
    pub fn with_sub(mut self, sub: Self) -> Self {
        self.aggregations.push(sub);
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineAggregationSpec) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// Check request shape: unique sibling names and sub-aggregations only
    /// under bucket strategies.
    pub fn validate(&self) -> Result<(), InternalError> {
        if !self.aggregations.is_empty() && !self.kind.accepts_sub_aggregations() {
            return Err(InternalError::invalid_request(format!(
                "aggregator [{}] of type [{}] cannot accept sub-aggregations",
                self.name,
                self.kind.type_name()
            )));
        }
        if let AggregationKind::Terms { size: 0, .. } = self.kind {
            return Err(InternalError::invalid_request(format!(
                "[size] must be greater than 0. Found [0] in [{}]",
                self.name
            )));
        }

        let mut seen = BTreeSet::new();
        for sub in &self.aggregations {
            if !seen.insert(sub.name.as_str()) {
                return Err(InternalError::invalid_request(format!(
                    "two sibling aggregations cannot have the same name: [{}]",
                    sub.name
                )));
            }
            sub.validate()?;
        }

        Ok(())
    }

    fn create_sub_aggregators(
        &self,
        ctx: &SearchContext,
    ) -> Result<Vec<Box<dyn Aggregator>>, InternalError> {
        self.aggregations
            .iter()
            .map(|sub| sub.create(ctx, AggregatorLevel::SubAggregation))
            .collect()
    }
}

impl AggregatorFactory for AggregationSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(
        &self,
        ctx: &SearchContext,
        level: AggregatorLevel,
    ) -> Result<Box<dyn Aggregator>, InternalError> {
        let name = self.name.clone();

        match &self.kind {
            AggregationKind::Sum { field } => {
                Ok(Box::new(MetricAggregator::new(name, field, MetricKind::Sum)))
            }
            AggregationKind::Min { field } => {
                Ok(Box::new(MetricAggregator::new(name, field, MetricKind::Min)))
            }
            AggregationKind::Max { field } => {
                Ok(Box::new(MetricAggregator::new(name, field, MetricKind::Max)))
            }
            AggregationKind::ValueCount { field } => Ok(Box::new(MetricAggregator::new(
                name,
                field,
                MetricKind::ValueCount,
            ))),
            AggregationKind::Terms { field, size } => {
                let subs = self.create_sub_aggregators(ctx)?;
                Ok(Box::new(TermsAggregator::new(name, field, *size, subs)?))
            }
            AggregationKind::Global => {
                if level != AggregatorLevel::TopLevel {
                    return Err(InternalError::aggregator_unsupported(format!(
                        "global aggregation [{name}] can only be placed as a top level aggregation"
                    )));
                }
                let subs = self.create_sub_aggregators(ctx)?;
                Ok(Box::new(GlobalAggregator::new(name, subs)?))
            }
        }
    }

    fn pipeline_tree(&self) -> PipelineTree {
        PipelineTree {
            name: self.name.clone(),
            aggregators: self.pipelines.clone(),
            subtrees: self
                .aggregations
                .iter()
                .map(AggregatorFactory::pipeline_tree)
                .filter(|tree| !tree.is_empty())
                .collect(),
        }
    }
}
