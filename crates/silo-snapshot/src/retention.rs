//! Retention reason computation.
//!
//! Given all manifests of a single source and that source's effective
//! policy, annotate each manifest with zero or more human-readable
//! retention reasons. A manifest whose reasons stay empty is a deletion
//! candidate. The engine only annotates; it never destroys anything.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};

use crate::manifest::Manifest;
use crate::policy::RetentionPolicy;

/// Time-unit buckets, in the canonical reason order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Annual,
    Monthly,
    Weekly,
    Daily,
    Hourly,
}

impl TimeUnit {
    const fn label(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
        }
    }

    /// The period a timestamp falls into, as a string key.
    fn bucket_key(self, t: DateTime<FixedOffset>) -> String {
        match self {
            Self::Annual => t.format("%Y").to_string(),
            Self::Monthly => t.format("%Y-%m").to_string(),
            Self::Weekly => {
                let week = t.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
            Self::Daily => t.format("%Y-%m-%d").to_string(),
            Self::Hourly => t.format("%Y-%m-%d-%H").to_string(),
        }
    }
}

impl RetentionPolicy {
    /// Annotates `manifests` (all of one source) with retention reasons.
    ///
    /// Resets any previous reasons and recomputes, so repeated calls are
    /// idempotent. The slice order is left untouched; callers rely on
    /// insertion order when collecting deletion candidates.
    ///
    /// Reasons accumulate per manifest in the canonical order
    /// `latest, annual, monthly, weekly, daily, hourly`, each as
    /// `"{unit}-{rank}"` with 1-based ranks (most recent = 1). For the
    /// time units, only the first (newest) manifest of each distinct
    /// period is kept, and at most N distinct periods per unit. Equal
    /// start times are broken by id, ascending.
    ///
    /// Incomplete manifests participate identically to complete ones.
    pub fn compute_retention_reasons(&self, manifests: &mut [Manifest]) {
        for manifest in manifests.iter_mut() {
            manifest.retention_reasons.clear();
        }

        // Newest first; the slice itself keeps its order.
        let mut order: Vec<usize> = (0..manifests.len()).collect();
        order.sort_by(|&a, &b| {
            manifests[b]
                .start_time
                .cmp(&manifests[a].start_time)
                .then_with(|| manifests[a].id.cmp(&manifests[b].id))
        });

        if let Some(n) = self.keep_latest {
            for (rank, &idx) in order.iter().take(n as usize).enumerate() {
                manifests[idx]
                    .retention_reasons
                    .push(format!("latest-{}", rank + 1));
            }
        }

        let tz = self
            .utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes.saturating_mul(60)))
            .unwrap_or_else(|| Utc.fix());

        for unit in [
            TimeUnit::Annual,
            TimeUnit::Monthly,
            TimeUnit::Weekly,
            TimeUnit::Daily,
            TimeUnit::Hourly,
        ] {
            let Some(n) = self.bucket_count(unit) else {
                continue;
            };
            apply_time_bucket(unit, n, &order, manifests, tz);
        }
    }

    const fn bucket_count(&self, unit: TimeUnit) -> Option<u32> {
        match unit {
            TimeUnit::Annual => self.keep_annual,
            TimeUnit::Monthly => self.keep_monthly,
            TimeUnit::Weekly => self.keep_weekly,
            TimeUnit::Daily => self.keep_daily,
            TimeUnit::Hourly => self.keep_hourly,
        }
    }
}

fn apply_time_bucket(
    unit: TimeUnit,
    n: u32,
    order: &[usize],
    manifests: &mut [Manifest],
    tz: FixedOffset,
) {
    let mut seen = HashSet::new();
    let mut kept: u32 = 0;

    for &idx in order {
        let key = unit.bucket_key(manifests[idx].start_time.with_timezone(&tz));
        if !seen.insert(key) {
            // An older snapshot of a period we already saw.
            continue;
        }
        if kept >= n {
            continue;
        }
        kept += 1;
        manifests[idx]
            .retention_reasons
            .push(format!("{}-{kept}", unit.label()));
    }
}

/// Ids of the manifests left without any retention reason, in the order
/// they appear in the slice (insertion order, not sort order).
#[must_use]
pub fn deletion_candidates(manifests: &[Manifest]) -> Vec<String> {
    manifests
        .iter()
        .filter(|m| m.retention_reasons.is_empty())
        .map(|m| m.id.clone())
        .collect()
}
