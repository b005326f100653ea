use crate::{config::DEFAULT_MAX_BUCKETS, error::InternalError};

///
/// MultiBucketConsumer
///
/// Per-request bucket budget. Multi-bucket aggregations report every bucket
/// they materialize; exceeding the configured limit fails finalization.
/// The phase resets the counter before building results.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MultiBucketConsumer {
    limit: u32,
    count: u64,
}

impl MultiBucketConsumer {
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self { limit, count: 0 }
    }

    /// Account for `buckets` newly built buckets.
    pub fn accept(&mut self, buckets: usize) -> Result<(), InternalError> {
        let added = u64::try_from(buckets).unwrap_or(u64::MAX);
        let next = self.count.saturating_add(added);
        if next > u64::from(self.limit) {
            return Err(InternalError::too_many_buckets(next, self.limit));
        }

        self.count = next;
        Ok(())
    }

    /// Zero the counter and adopt `limit`.
    pub const fn reset(&mut self, limit: u32) {
        self.limit = limit;
        self.count = 0;
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for MultiBucketConsumer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUCKETS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn accept_counts_until_limit() {
        let mut consumer = MultiBucketConsumer::new(3);

        consumer.accept(2).expect("two buckets fit");
        consumer.accept(1).expect("third bucket fits");
        let err = consumer.accept(1).expect_err("fourth bucket exceeds the budget");

        assert_eq!(err.class, ErrorClass::LimitExceeded);
        assert_eq!(consumer.count(), 3);
    }

    #[test]
    fn reset_clears_count_and_applies_new_limit() {
        let mut consumer = MultiBucketConsumer::new(1);
        consumer.accept(1).expect("one bucket fits");

        consumer.reset(5);

        assert_eq!(consumer.count(), 0);
        assert_eq!(consumer.limit(), 5);
        consumer.accept(5).expect("new limit applies");
    }
}
