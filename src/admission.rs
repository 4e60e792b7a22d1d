use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Pool;

pub const DEFAULT_DAILY_LIMIT: i64 = 5;

pub const LIMIT_REACHED: &str = "Daily learning limit reached";
pub const NOTHING_TO_LEARN: &str = "No new items to learn";
pub const SRS_DISABLED: &str = "Spaced repetition is disabled for this set";

/// How many new items per pool may enter the review cycle each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyLimits {
    pub vocabulary: i64,
    pub grammar: i64,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            vocabulary: DEFAULT_DAILY_LIMIT,
            grammar: DEFAULT_DAILY_LIMIT,
        }
    }
}

impl DailyLimits {
    pub fn for_pool(&self, pool: Pool) -> i64 {
        match pool {
            Pool::Vocabulary => self.vocabulary,
            Pool::Grammar => self.grammar,
        }
    }
}

/// Daily budget rules: per-pool limits and where the calendar day turns over.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    limits: DailyLimits,
    offset: FixedOffset,
}

impl AdmissionPolicy {
    pub fn new(limits: DailyLimits, utc_offset_minutes: i32) -> Result<Self> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Config(format!("invalid utc offset: {} minutes", utc_offset_minutes))
            })?;
        Ok(Self { limits, offset })
    }

    pub fn limit(&self, pool: Pool) -> i64 {
        self.limits.for_pool(pool)
    }

    /// Calendar day `now` falls on; admission counters are keyed by it.
    pub fn day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    pub fn remaining(&self, pool: Pool, admitted_today: i64) -> i64 {
        (self.limit(pool) - admitted_today).max(0)
    }

    /// Instant the current day's counters stop applying.
    pub fn next_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let tomorrow = self.day(now) + Duration::days(1);
        let local_midnight = tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default();
        (local_midnight - self.offset_duration()).and_utc()
    }

    fn offset_duration(&self) -> Duration {
        Duration::seconds(self.offset.local_minus_utc() as i64)
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            limits: DailyLimits::default(),
            offset: Utc.fix(),
        }
    }
}

/// State of the "learn new" action for a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnNew {
    pub count: usize,
    pub enabled: bool,
    pub notice: Option<String>,
}

impl LearnNew {
    /// An exhausted budget wins over however many candidates exist.
    pub fn evaluate(learn_new_left: i64, candidates: usize) -> Self {
        if learn_new_left <= 0 {
            return Self {
                count: 0,
                enabled: false,
                notice: Some(LIMIT_REACHED.to_string()),
            };
        }

        let count = candidates.min(learn_new_left as usize);
        Self {
            count,
            enabled: count > 0,
            notice: (count == 0).then(|| NOTHING_TO_LEARN.to_string()),
        }
    }

    /// Like `evaluate`, but a set with SRS turned off reports that instead of
    /// an exhausted budget.
    pub fn for_set(srs_enabled: bool, learn_new_left: i64, candidates: usize) -> Self {
        if !srs_enabled {
            return Self {
                count: 0,
                enabled: false,
                notice: Some(SRS_DISABLED.to_string()),
            };
        }
        Self::evaluate(learn_new_left, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    mod learn_new_tests {
        use super::*;

        #[test]
        fn zero_left_disables_regardless_of_candidates() {
            for candidates in [0, 1, 5, 100] {
                let ln = LearnNew::evaluate(0, candidates);
                assert_eq!(ln.count, 0);
                assert!(!ln.enabled);
                assert_eq!(ln.notice.as_deref(), Some(LIMIT_REACHED));
            }
        }

        #[test]
        fn negative_left_treated_as_exhausted() {
            let ln = LearnNew::evaluate(-2, 3);
            assert_eq!(ln.count, 0);
            assert!(!ln.enabled);
        }

        #[test]
        fn count_bounded_by_budget() {
            let ln = LearnNew::evaluate(5, 12);
            assert_eq!(ln.count, 5);
            assert!(ln.enabled);
            assert!(ln.notice.is_none());
        }

        #[test]
        fn count_bounded_by_candidates() {
            let ln = LearnNew::evaluate(5, 2);
            assert_eq!(ln.count, 2);
            assert!(ln.enabled);
        }

        #[test]
        fn no_candidates_with_budget() {
            let ln = LearnNew::evaluate(3, 0);
            assert_eq!(ln.count, 0);
            assert!(!ln.enabled);
            assert_eq!(ln.notice.as_deref(), Some(NOTHING_TO_LEARN));
        }

        #[test]
        fn disabled_set_reports_srs_off_not_limit() {
            for left in [0, 5] {
                let ln = LearnNew::for_set(false, left, 3);
                assert_eq!(ln.count, 0);
                assert!(!ln.enabled);
                assert_eq!(ln.notice.as_deref(), Some(SRS_DISABLED));
            }
        }

        #[test]
        fn enabled_set_matches_evaluate() {
            assert_eq!(LearnNew::for_set(true, 0, 3), LearnNew::evaluate(0, 3));
            assert_eq!(LearnNew::for_set(true, 5, 2), LearnNew::evaluate(5, 2));
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn default_limits_are_five() {
            let policy = AdmissionPolicy::default();
            assert_eq!(policy.limit(Pool::Vocabulary), 5);
            assert_eq!(policy.limit(Pool::Grammar), 5);
        }

        #[test]
        fn pools_have_independent_limits() {
            let limits = DailyLimits {
                vocabulary: 10,
                grammar: 3,
            };
            let policy = AdmissionPolicy::new(limits, 0).unwrap();
            assert_eq!(policy.remaining(Pool::Vocabulary, 4), 6);
            assert_eq!(policy.remaining(Pool::Grammar, 4), 0);
        }

        #[test]
        fn remaining_never_negative() {
            let policy = AdmissionPolicy::default();
            assert_eq!(policy.remaining(Pool::Vocabulary, 9), 0);
        }

        #[test]
        fn day_uses_offset() {
            let utc = AdmissionPolicy::default();
            let tokyo = AdmissionPolicy::new(DailyLimits::default(), 9 * 60).unwrap();
            let now = ts("2024-01-01T16:00:00Z");

            assert_eq!(utc.day(now), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
            assert_eq!(tokyo.day(now), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        }

        #[test]
        fn next_reset_is_local_midnight() {
            let utc = AdmissionPolicy::default();
            assert_eq!(
                utc.next_reset(ts("2024-01-01T16:00:00Z")),
                ts("2024-01-02T00:00:00Z")
            );

            let tokyo = AdmissionPolicy::new(DailyLimits::default(), 9 * 60).unwrap();
            // 01:00 on Jan 2 in Tokyo; resets at Jan 3 00:00 +09:00
            assert_eq!(
                tokyo.next_reset(ts("2024-01-01T16:00:00Z")),
                ts("2024-01-02T15:00:00Z")
            );
        }

        #[test]
        fn rejects_out_of_range_offset() {
            let result = AdmissionPolicy::new(DailyLimits::default(), 48 * 60);
            assert!(matches!(result, Err(Error::Config(_))));
        }
    }
}
