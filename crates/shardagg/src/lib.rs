//! Per-shard aggregation execution engine: aggregator fan-out, global
//! sub-passes, optional collector profiling, and the pre-process / execute
//! lifecycle that turns an aggregation request into partial shard results.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod aggregations;
pub mod config;
pub mod error;
pub mod index;
pub mod search;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains the request/response vocabulary a caller needs to run one
/// shard-level aggregation. Executors and reference strategies stay in their
/// own modules.
///

pub mod prelude {
    pub use crate::{
        aggregations::{
            AggregationPhase, AggregationRequest, AggregationSpec, AggregationValue,
            InternalAggregation, InternalAggregations,
        },
        config::AggregationConfig,
        error::{InternalError, PhaseError},
        index::{Document, FieldValue, Query, ShardIndex},
        search::{SearchContext, ShardTarget},
    };
}
