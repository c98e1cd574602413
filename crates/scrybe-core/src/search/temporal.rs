//! Temporal (Timeline) Queries
//!
//! Supports `timeline(days, source?, limit)`: records captured within
//! `[now - days, now]`, newest first.

use chrono::{DateTime, Duration, Utc};

/// Thin helper for computing the timeline window. Holds no state; `Storage`
/// runs the actual SQL using the cutoff this produces.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemporalSearcher;

impl TemporalSearcher {
    pub fn new() -> Self {
        Self
    }

    /// The inclusive lower bound of the `[now - days, now]` window.
    pub fn cutoff(&self, days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(days as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_days_before_now() {
        let searcher = TemporalSearcher::new();
        let now = DateTime::parse_from_rfc3339("2026-07-28T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let cutoff = searcher.cutoff(7, now);
        assert_eq!(cutoff, now - Duration::days(7));
    }

    #[test]
    fn zero_days_means_now() {
        let searcher = TemporalSearcher::new();
        let now = Utc::now();
        assert_eq!(searcher.cutoff(0, now), now);
    }
}
