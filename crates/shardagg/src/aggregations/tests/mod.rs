mod multi;

use crate::aggregations::{AggregationValue, InternalAggregations};

/// Value of the aggregation called `name`.
fn value_of<'a>(aggs: &'a InternalAggregations, name: &str) -> &'a AggregationValue {
    &aggs
        .get(name)
        .unwrap_or_else(|| panic!("aggregation [{name}] should be present"))
        .value
}
