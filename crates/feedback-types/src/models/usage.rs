//! Monthly usage counter model.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Per-tenant monthly response counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounter {
    pub tenant_id: String,
    pub responses_this_month: u64,
    pub reset_at: DateTime<Utc>,
}

impl UsageCounter {
    /// Count as seen at `now`: zero once the billing period has rolled over.
    pub fn effective_count(&self, now: DateTime<Utc>) -> u64 {
        if now >= self.reset_at {
            0
        } else {
            self.responses_this_month
        }
    }
}

/// First instant (UTC) of the calendar month after `now`.
pub fn next_billing_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 { (now.year() + 1, 1) } else { (now.year(), now.month() + 1) };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(|| now + chrono::Duration::days(31))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_billing_reset() {
        let mid_june = Utc.with_ymd_and_hms(2026, 6, 17, 13, 45, 0).unwrap();
        assert_eq!(next_billing_reset(mid_june), Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap());

        let december = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(next_billing_reset(december), Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_effective_count_after_rollover() {
        let reset_at = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let counter = UsageCounter { tenant_id: "t".into(), responses_this_month: 812, reset_at };

        assert_eq!(counter.effective_count(reset_at - chrono::Duration::seconds(1)), 812);
        assert_eq!(counter.effective_count(reset_at), 0);
    }
}
