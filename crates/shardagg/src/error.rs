use crate::search::ShardTarget;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Aggregators, collectors, and searchers all fail through this type; the
/// phase layer wraps it into [`PhaseError`] at the shard boundary.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct an aggregator-origin I/O failure.
    pub fn aggregator_io(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Io, ErrorOrigin::Aggregator, message)
    }

    /// Construct an aggregator-origin internal error.
    pub fn aggregator_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Aggregator, message)
    }

    /// Construct an aggregator-origin unsupported error.
    pub fn aggregator_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Aggregator, message)
    }

    /// Construct a collector-origin unsupported error.
    pub fn collector_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Collector, message)
    }

    /// Construct a collector-origin invariant violation.
    pub fn collector_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Collector,
            message,
        )
    }

    /// Construct a searcher-origin I/O failure.
    pub fn searcher_io(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Io, ErrorOrigin::Searcher, message)
    }

    /// Construct a request validation failure.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidRequest, ErrorOrigin::Query, message)
    }

    /// Construct a phase-origin invariant violation.
    pub(crate) fn phase_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Phase, message)
    }

    /// Construct a bucket budget violation.
    pub(crate) fn too_many_buckets(attempted: u64, limit: u32) -> Self {
        Self::new(
            ErrorClass::LimitExceeded,
            ErrorOrigin::Aggregator,
            format!(
                "trying to create too many buckets: attempted={attempted}, limit={limit}; \
                 raise [max_buckets] to allow more"
            ),
        )
    }

    /// Attribute this error to one aggregator.
    ///
    /// The innermost attribution wins: once an error names an aggregator,
    /// enclosing fan-out layers pass it through untouched.
    #[must_use]
    pub fn attributed_to(mut self, aggregator: &str) -> Self {
        if self.aggregator().is_some() {
            return self;
        }

        self.message = format!("aggregator [{aggregator}]: {}", self.message);
        self.detail = Some(ErrorDetail::Aggregator {
            name: aggregator.to_string(),
        });
        self
    }

    /// Return the attributed aggregator name, if any.
    #[must_use]
    pub fn aggregator(&self) -> Option<&str> {
        match &self.detail {
            Some(ErrorDetail::Aggregator { name }) => Some(name),
            None => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ErrorDetail {
    #[error("aggregator [{name}]")]
    Aggregator { name: String },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Io,
    Internal,
    Unsupported,
    InvariantViolation,
    LimitExceeded,
    InvalidRequest,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Io => "io",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
            Self::LimitExceeded => "limit_exceeded",
            Self::InvalidRequest => "invalid_request",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Aggregator,
    Collector,
    Searcher,
    Query,
    Phase,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Aggregator => "aggregator",
            Self::Collector => "collector",
            Self::Searcher => "searcher",
            Self::Query => "query",
            Self::Phase => "phase",
        };
        write!(f, "{label}")
    }
}

///
/// PhaseError
///
/// Shard-level failure surface of the aggregation lifecycle.
/// Every variant is fatal to the shard's search request; whether the whole
/// distributed request fails is decided above this crate.
///

#[derive(Debug, ThisError)]
pub enum PhaseError {
    #[error("could not initialize aggregators: {source}")]
    AggregationInitialization {
        #[source]
        source: InternalError,
    },

    #[error("{shard} {message}: {source}")]
    QueryPhaseExecution {
        shard: ShardTarget,
        message: &'static str,
        #[source]
        source: InternalError,
    },

    #[error("failed to build aggregation [{name}]: {source}")]
    AggregationExecution {
        name: String,
        #[source]
        source: InternalError,
    },
}

impl PhaseError {
    pub(crate) const fn initialization(source: InternalError) -> Self {
        Self::AggregationInitialization { source }
    }

    pub(crate) const fn query_phase(
        shard: ShardTarget,
        message: &'static str,
        source: InternalError,
    ) -> Self {
        Self::QueryPhaseExecution {
            shard,
            message,
            source,
        }
    }

    /// Return the underlying runtime error.
    #[must_use]
    pub const fn internal(&self) -> &InternalError {
        match self {
            Self::AggregationInitialization { source }
            | Self::QueryPhaseExecution { source, .. }
            | Self::AggregationExecution { source, .. } => source,
        }
    }

    /// Return the shard target for query-phase failures.
    #[must_use]
    pub const fn shard(&self) -> Option<&ShardTarget> {
        match self {
            Self::QueryPhaseExecution { shard, .. } => Some(shard),
            Self::AggregationInitialization { .. } | Self::AggregationExecution { .. } => None,
        }
    }

    /// Return the aggregator this failure is attributed to, if any.
    #[must_use]
    pub fn aggregator(&self) -> Option<&str> {
        match self {
            Self::AggregationExecution { name, .. } => Some(name),
            Self::AggregationInitialization { source } | Self::QueryPhaseExecution { source, .. } => {
                source.aggregator()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribution_keeps_innermost_aggregator() {
        let err = InternalError::aggregator_io("disk read failed")
            .attributed_to("inner")
            .attributed_to("outer");

        assert_eq!(err.aggregator(), Some("inner"));
        assert_eq!(err.message, "aggregator [inner]: disk read failed");
    }

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err = InternalError::collector_unsupported("no merge");

        assert_eq!(err.display_with_class(), "collector:unsupported: no merge");
    }

    #[test]
    fn phase_error_exposes_shard_and_attribution() {
        let shard = ShardTarget::new("node-1", "products", 3);
        let err = PhaseError::query_phase(
            shard.clone(),
            "failed to execute global aggregators",
            InternalError::aggregator_io("boom").attributed_to("all_docs"),
        );

        assert_eq!(err.shard(), Some(&shard));
        assert_eq!(err.aggregator(), Some("all_docs"));
        assert_eq!(
            err.to_string(),
            "[node-1][products][3] failed to execute global aggregators: aggregator [all_docs]: boom"
        );
    }
}
