//! Retention policy configuration.

use serde::{Deserialize, Serialize};

/// Maximum UTC offset, in minutes (matches the widest real-world zone).
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Retention policy for a snapshot source.
///
/// Each bucket retains the most recent snapshot of each of the last N
/// distinct periods of its unit; `keep_latest` retains the N most recent
/// snapshots regardless of time. An unset bucket contributes nothing.
///
/// Bucket boundaries use the calendar at `utc_offset_minutes` (UTC when
/// unset).
///
/// # Example
///
/// ```rust
/// use silo_snapshot::RetentionPolicy;
///
/// let policy = RetentionPolicy {
///     keep_latest: Some(10),
///     keep_daily: Some(7),
///     keep_weekly: Some(4),
///     ..RetentionPolicy::default()
/// };
/// assert!(policy.validate().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Keep the N most recent snapshots, regardless of time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_latest: Option<u32>,

    /// Keep the most recent snapshot of each of the last N distinct
    /// clock hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_hourly: Option<u32>,

    /// Keep the most recent snapshot of each of the last N distinct
    /// calendar days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_daily: Option<u32>,

    /// Keep the most recent snapshot of each of the last N distinct ISO
    /// weeks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_weekly: Option<u32>,

    /// Keep the most recent snapshot of each of the last N distinct
    /// calendar months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_monthly: Option<u32>,

    /// Keep the most recent snapshot of each of the last N distinct
    /// calendar years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_annual: Option<u32>,

    /// Calendar used for bucket boundaries, as a fixed offset from UTC.
    /// UTC when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

impl RetentionPolicy {
    /// The policy applied when a source has no policy document at all.
    ///
    /// Deliberately conservative; an unset bucket deleting everything is
    /// reserved for explicitly configured policies.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            keep_latest: Some(10),
            keep_hourly: Some(48),
            keep_daily: Some(7),
            keep_weekly: Some(4),
            keep_monthly: Some(4),
            keep_annual: Some(3),
            utc_offset_minutes: None,
        }
    }

    /// True when no bucket is configured; such a policy keeps nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keep_latest.is_none()
            && self.keep_hourly.is_none()
            && self.keep_daily.is_none()
            && self.keep_weekly.is_none()
            && self.keep_monthly.is_none()
            && self.keep_annual.is_none()
    }

    /// Validates the policy settings.
    ///
    /// Returns an error message if validation fails. A configured bucket
    /// count of zero is rejected; unset is the way to disable a bucket.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        let buckets = [
            ("keepLatest", self.keep_latest),
            ("keepHourly", self.keep_hourly),
            ("keepDaily", self.keep_daily),
            ("keepWeekly", self.keep_weekly),
            ("keepMonthly", self.keep_monthly),
            ("keepAnnual", self.keep_annual),
        ];
        for (name, count) in buckets {
            if count == Some(0) {
                return Some(format!("{name} must be at least 1 when set"));
            }
        }

        if let Some(offset) = self.utc_offset_minutes {
            if offset.abs() > MAX_UTC_OFFSET_MINUTES {
                return Some(format!(
                    "utcOffsetMinutes ({offset}) must be within ±{MAX_UTC_OFFSET_MINUTES}"
                ));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_empty() {
        let policy = RetentionPolicy::default();
        assert!(policy.is_empty());
        assert!(policy.validate().is_none());
    }

    #[test]
    fn test_standard_policy() {
        let policy = RetentionPolicy::standard();
        assert!(!policy.is_empty());
        assert_eq!(policy.keep_latest, Some(10));
        assert_eq!(policy.keep_daily, Some(7));
        assert!(policy.validate().is_none());
    }

    #[test]
    fn test_validation_rejects_zero_counts() {
        let policy = RetentionPolicy {
            keep_daily: Some(0),
            ..RetentionPolicy::default()
        };
        assert!(policy.validate().is_some());
    }

    #[test]
    fn test_validation_rejects_wild_offsets() {
        let policy = RetentionPolicy {
            utc_offset_minutes: Some(26 * 60),
            ..RetentionPolicy::default()
        };
        assert!(policy.validate().is_some());
    }

    #[test]
    fn test_serde_roundtrip_skips_unset_buckets() {
        let policy = RetentionPolicy {
            keep_latest: Some(2),
            keep_daily: Some(3),
            ..RetentionPolicy::default()
        };

        let json = serde_json::to_string(&policy).expect("serialize");
        assert_eq!(json, r#"{"keepLatest":2,"keepDaily":3}"#);

        let parsed: RetentionPolicy = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, policy);
    }
}
