//! Read-side breakdowns of a product set's completed sales.
//!
//! Money follows the same bundle rule as [`crate::aggregate`]: component
//! lines count units, never revenue or cost.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use shopmirror_core::{BundleInfo, DateRange, SaleLine};

use crate::aggregate::{margin_percent, Totals};
use crate::{component_flags, is_eligible, matches_any, matching_lines};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSales {
    pub variant_id: i64,
    pub quantity: i64,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoPurchase {
    pub product_id: i64,
    /// Orders containing both this product and the product set.
    pub orders: u64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoSales {
    /// Country code or city; `None` when the order had no billing value.
    pub key: Option<String>,
    pub orders: u64,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSales {
    /// `None` groups guest checkouts.
    pub customer_id: Option<i64>,
    pub orders: u64,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecencyStats {
    /// Distinct registered customers.
    pub customers: u64,
    /// Registered customers with more than one matching order.
    pub returning_customers: u64,
    pub guest_orders: u64,
    pub first_sale_at: Option<DateTime<Utc>>,
    pub last_sale_at: Option<DateTime<Utc>>,
    pub days_since_last_sale: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingBucket {
    /// Weekday (0 = Monday) or hour of day, in the display zone.
    pub bucket: u32,
    pub orders: u64,
    pub quantity: i64,
    pub revenue: Decimal,
}

/// One row per variant id, zero rows kept, ordered by id.
///
/// A line belongs to a variant when it was sold as that variant, or when it
/// carries no variant and its product id is the variant's id.
#[must_use]
pub fn variant_breakdown(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    variant_ids: &[i64],
    range: DateRange,
) -> Vec<VariantSales> {
    let mut per_variant: BTreeMap<i64, Totals> = variant_ids
        .iter()
        .map(|&id| (id, Totals::default()))
        .collect();

    let flags = component_flags(lines, bundles);
    for (line, is_component) in lines.iter().zip(flags) {
        if !is_eligible(line, range) {
            continue;
        }
        let key = line.variant_id.unwrap_or(line.product_id);
        if let Some(totals) = per_variant.get_mut(&key) {
            totals.add(line, is_component);
        }
    }

    per_variant
        .into_iter()
        .map(|(variant_id, totals)| VariantSales {
            variant_id,
            quantity: totals.quantity,
            revenue: totals.revenue,
            cost: totals.cost,
            profit: totals.profit(),
            margin_percent: margin_percent(totals.profit(), totals.revenue),
            orders: totals.order_count(),
        })
        .collect()
}

/// Other products bought in the same completed orders as `product_ids`,
/// sorted by order count descending then product id. Bundle component lines
/// are not counted as purchases of their own.
#[must_use]
pub fn co_purchases(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
    limit: usize,
) -> Vec<CoPurchase> {
    let ids: HashSet<i64> = product_ids.iter().copied().collect();
    let orders: HashSet<i64> = matching_lines(lines, bundles, product_ids, range)
        .into_iter()
        .map(|(line, _)| line.order_id)
        .collect();
    if orders.is_empty() {
        return Vec::new();
    }

    let flags = component_flags(lines, bundles);
    let mut others: HashMap<i64, (HashSet<i64>, i64)> = HashMap::new();
    for (line, is_component) in lines.iter().zip(flags) {
        if is_component || !orders.contains(&line.order_id) || matches_any(line, &ids) {
            continue;
        }
        let entry = others.entry(line.product_id).or_default();
        entry.0.insert(line.order_id);
        entry.1 += i64::from(line.quantity);
    }

    let mut out: Vec<CoPurchase> = others
        .into_iter()
        .map(|(product_id, (orders, quantity))| CoPurchase {
            product_id,
            orders: orders.len() as u64,
            quantity,
        })
        .collect();
    out.sort_by(|a, b| b.orders.cmp(&a.orders).then(a.product_id.cmp(&b.product_id)));
    out.truncate(limit);
    out
}

/// Sales by billing country, highest revenue first.
#[must_use]
pub fn by_country(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
) -> Vec<GeoSales> {
    group_geo(lines, bundles, product_ids, range, |l| l.billing_country.clone())
}

/// Sales by billing city, highest revenue first.
#[must_use]
pub fn by_city(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
) -> Vec<GeoSales> {
    group_geo(lines, bundles, product_ids, range, |l| l.billing_city.clone())
}

fn group_geo(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
    key: impl Fn(&SaleLine) -> Option<String>,
) -> Vec<GeoSales> {
    let mut groups: HashMap<Option<String>, Totals> = HashMap::new();
    for (line, is_component) in matching_lines(lines, bundles, product_ids, range) {
        groups.entry(key(line)).or_default().add(line, is_component);
    }

    let mut out: Vec<GeoSales> = groups
        .into_iter()
        .map(|(key, totals)| GeoSales {
            key,
            orders: totals.order_count(),
            quantity: totals.quantity,
            revenue: totals.revenue,
        })
        .collect();
    out.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.key.cmp(&b.key)));
    out
}

/// Top customers by revenue. Guests are grouped under `customer_id: None`.
#[must_use]
pub fn by_customer(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
    limit: usize,
) -> Vec<CustomerSales> {
    let mut groups: HashMap<Option<i64>, Totals> = HashMap::new();
    for (line, is_component) in matching_lines(lines, bundles, product_ids, range) {
        groups
            .entry(line.customer_id)
            .or_default()
            .add(line, is_component);
    }

    let mut out: Vec<CustomerSales> = groups
        .into_iter()
        .map(|(customer_id, totals)| CustomerSales {
            customer_id,
            orders: totals.order_count(),
            quantity: totals.quantity,
            revenue: totals.revenue,
        })
        .collect();
    out.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    out.truncate(limit);
    out
}

/// Repeat-purchase statistics relative to `now`.
#[must_use]
pub fn recency(
    lines: &[SaleLine],
    product_ids: &[i64],
    range: DateRange,
    now: DateTime<Utc>,
) -> RecencyStats {
    let ids: HashSet<i64> = product_ids.iter().copied().collect();
    let mut per_customer: HashMap<i64, HashSet<i64>> = HashMap::new();
    let mut guest_orders: HashSet<i64> = HashSet::new();
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;

    for line in lines {
        if !is_eligible(line, range) || !matches_any(line, &ids) {
            continue;
        }
        match line.customer_id {
            Some(customer) => {
                per_customer.entry(customer).or_default().insert(line.order_id);
            }
            None => {
                guest_orders.insert(line.order_id);
            }
        }
        first = Some(first.map_or(line.ordered_at, |f| f.min(line.ordered_at)));
        last = Some(last.map_or(line.ordered_at, |l| l.max(line.ordered_at)));
    }

    RecencyStats {
        customers: per_customer.len() as u64,
        returning_customers: per_customer.values().filter(|o| o.len() > 1).count() as u64,
        guest_orders: guest_orders.len() as u64,
        first_sale_at: first,
        last_sale_at: last,
        days_since_last_sale: last.map(|l| (now - l).num_days().max(0)),
    }
}

/// Seven buckets, Monday first, in the display zone.
#[must_use]
pub fn by_weekday(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
    zone: Tz,
) -> Vec<TimingBucket> {
    timing(lines, bundles, product_ids, range, 7, |at| {
        at.with_timezone(&zone).weekday().num_days_from_monday()
    })
}

/// Twenty-four buckets by local hour of day.
#[must_use]
pub fn by_hour(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
    zone: Tz,
) -> Vec<TimingBucket> {
    timing(lines, bundles, product_ids, range, 24, |at| {
        at.with_timezone(&zone).hour()
    })
}

fn timing(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
    buckets: u32,
    bucket_of: impl Fn(DateTime<Utc>) -> u32,
) -> Vec<TimingBucket> {
    let mut totals: Vec<Totals> = (0..buckets).map(|_| Totals::default()).collect();
    for (line, is_component) in matching_lines(lines, bundles, product_ids, range) {
        if let Some(slot) = totals.get_mut(bucket_of(line.ordered_at) as usize) {
            slot.add(line, is_component);
        }
    }

    totals
        .into_iter()
        .zip(0..)
        .map(|(t, bucket)| TimingBucket {
            bucket,
            orders: t.order_count(),
            quantity: t.quantity,
            revenue: t.revenue,
        })
        .collect()
}
