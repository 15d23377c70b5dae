use chrono::{DateTime, Duration, Utc};

/// Last good snapshot from one provider. The clock is always passed in, so
/// freshness is judged against the cycle's own `as_of`.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    entry: Option<(T, DateTime<Utc>)>,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, value: T, fetched_at: DateTime<Utc>) {
        self.entry = Some((value, fetched_at));
    }

    /// Cached value and its age in minutes if it is still within
    /// `ttl_minutes` of `now`. An entry exactly `ttl_minutes` old is fresh.
    pub fn fresh_at(&self, now: DateTime<Utc>, ttl_minutes: u64) -> Option<(T, i64)> {
        let (value, fetched_at) = self.entry.as_ref()?;
        let age = now.signed_duration_since(*fetched_at);
        let ttl = Duration::minutes(i64::try_from(ttl_minutes).unwrap_or(i64::MAX / 60_000));

        if age > ttl {
            None
        } else {
            Some((value.clone(), age.num_minutes().max(0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, second).unwrap()
    }

    #[test]
    fn test_empty_cache_is_never_fresh() {
        let cache: TtlCache<u32> = TtlCache::new();
        assert_eq!(cache.fresh_at(t(0, 0), 10), None);
    }

    #[test]
    fn test_fresh_within_window() {
        let mut cache = TtlCache::new();
        cache.store("payload".to_string(), t(0, 0));

        assert_eq!(cache.fresh_at(t(3, 30), 5), Some(("payload".to_string(), 3)));
    }

    #[test]
    fn test_boundary_is_fresh_past_it_is_stale() {
        let mut cache = TtlCache::new();
        cache.store(7u32, t(0, 0));

        assert_eq!(cache.fresh_at(t(5, 0), 5), Some((7, 5)));
        assert_eq!(cache.fresh_at(t(5, 1), 5), None);
    }

    #[test]
    fn test_store_replaces_entry() {
        let mut cache = TtlCache::new();
        cache.store(1u32, t(0, 0));
        cache.store(2u32, t(10, 0));

        assert_eq!(cache.fresh_at(t(12, 0), 5), Some((2, 2)));
    }
}
