//! Time-series sales evolution.
//!
//! Buckets are computed on UTC instants so the series never shifts when the
//! display zone changes.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopmirror_core::{BundleInfo, CoreError, DateRange, SaleLine};

use crate::aggregate::Totals;
use crate::{component_flags, is_eligible, matches_any};

/// Width of one evolution bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    /// ISO week, starting Monday 00:00 UTC.
    Week,
    Month,
}

impl Granularity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Start of the bucket containing `at`.
    #[must_use]
    pub fn bucket_start(self, at: DateTime<Utc>) -> DateTime<Utc> {
        let day = at.date_naive();
        let start = match self {
            Self::Hour => day.and_hms_opt(at.hour(), 0, 0),
            Self::Day => day.and_hms_opt(0, 0, 0),
            Self::Week => {
                let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
                monday.and_hms_opt(0, 0, 0)
            }
            Self::Month => day.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };
        // Every branch above builds a valid midnight or top-of-hour.
        start.map_or(at, |naive| Utc.from_utc_datetime(&naive))
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(CoreError::InvalidGranularity(other.to_owned())),
        }
    }
}

/// Which lines an evolution series follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvolutionScope {
    /// Lines sold as this exact variant.
    Variant(i64),
    /// Lines whose product id or variant id is one of these, the same
    /// matching [`crate::aggregate`] uses.
    Products(Vec<i64>),
    /// Lines of a product family: variant-bearing lines match on their
    /// variant id, variant-less lines on their product id.
    Family(Vec<i64>),
}

impl EvolutionScope {
    fn matches(&self, line: &SaleLine, ids: &HashSet<i64>) -> bool {
        match self {
            Self::Variant(id) => line.variant_id == Some(*id),
            Self::Products(_) => matches_any(line, ids),
            Self::Family(_) => match line.variant_id {
                Some(variant_id) => ids.contains(&variant_id),
                None => ids.contains(&line.product_id),
            },
        }
    }
}

/// One bucket of an evolution series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvolutionPoint {
    /// Bucket start.
    pub period: DateTime<Utc>,
    pub quantity: i64,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
}

/// Builds the evolution series for `scope`, ascending by period. Buckets
/// without sales are omitted.
#[must_use]
pub fn evolution(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    scope: &EvolutionScope,
    granularity: Granularity,
    range: DateRange,
) -> Vec<EvolutionPoint> {
    let ids: HashSet<i64> = match scope {
        EvolutionScope::Variant(_) => HashSet::new(),
        EvolutionScope::Products(ids) | EvolutionScope::Family(ids) => {
            ids.iter().copied().collect()
        }
    };

    let flags = component_flags(lines, bundles);
    let mut buckets: BTreeMap<DateTime<Utc>, Totals> = BTreeMap::new();

    for (line, is_component) in lines.iter().zip(flags) {
        if !is_eligible(line, range) || !scope.matches(line, &ids) {
            continue;
        }
        buckets
            .entry(granularity.bucket_start(line.ordered_at))
            .or_default()
            .add(line, is_component);
    }

    buckets
        .into_iter()
        .map(|(period, totals)| EvolutionPoint {
            period,
            quantity: totals.quantity,
            revenue: totals.revenue,
            cost: totals.cost,
            profit: totals.profit(),
        })
        .collect()
}
