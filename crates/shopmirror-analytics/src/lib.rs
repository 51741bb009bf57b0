//! Bundle-aware sales analytics over completed-order sale lines.
//!
//! Everything here is a pure function of the lines loaded by
//! `shopmirror_db::load_sale_lines` and the bundle compositions from
//! `shopmirror_db::load_bundle_info`; no I/O happens in this crate.

use std::collections::HashSet;

use shopmirror_core::{BundleInfo, DateRange, OrderStatus, SaleLine};

pub mod aggregate;
pub mod breakdown;
pub mod components;
pub mod evolution;

pub use aggregate::{aggregate, KpiSummary};
pub use breakdown::{
    by_city, by_country, by_customer, by_hour, by_weekday, co_purchases, recency,
    variant_breakdown, CoPurchase, CustomerSales, GeoSales, RecencyStats, TimingBucket,
    VariantSales,
};
pub use components::component_flags;
pub use evolution::{evolution, EvolutionPoint, EvolutionScope, Granularity};

/// `true` if the line's product id or variant id is in `ids`.
pub(crate) fn matches_any(line: &SaleLine, ids: &HashSet<i64>) -> bool {
    ids.contains(&line.product_id) || line.variant_id.is_some_and(|v| ids.contains(&v))
}

pub(crate) fn is_eligible(line: &SaleLine, range: DateRange) -> bool {
    line.status == OrderStatus::Completed && range.contains(line.ordered_at)
}

/// Completed, in-range lines matching `ids`, each paired with its bundle
/// component flag. Component detection looks at every line of the order,
/// not only the matching ones.
pub(crate) fn matching_lines<'a>(
    lines: &'a [SaleLine],
    bundles: &BundleInfo,
    ids: &[i64],
    range: DateRange,
) -> Vec<(&'a SaleLine, bool)> {
    let ids: HashSet<i64> = ids.iter().copied().collect();
    if ids.is_empty() {
        return Vec::new();
    }
    let flags = component_flags(lines, bundles);
    lines
        .iter()
        .zip(flags)
        .filter(|(line, _)| is_eligible(line, range) && matches_any(line, &ids))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use shopmirror_core::{OrderStatus, SaleLine};

    pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    pub fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// A completed line on 2024-05-10 12:00 UTC.
    pub fn line(order_id: i64, product_id: i64, quantity: i32, total: &str) -> SaleLine {
        SaleLine {
            order_id,
            status: OrderStatus::Completed,
            ordered_at: at(2024, 5, 10, 12, 0),
            customer_id: Some(1),
            billing_country: Some("FR".to_owned()),
            billing_city: Some("Paris".to_owned()),
            product_id,
            variant_id: None,
            quantity,
            line_total: dec(total),
            unit_cost: None,
        }
    }

    pub fn with_variant(mut line: SaleLine, variant_id: i64) -> SaleLine {
        line.variant_id = Some(variant_id);
        line
    }

    pub fn with_cost(mut line: SaleLine, unit_cost: &str) -> SaleLine {
        line.unit_cost = Some(dec(unit_cost));
        line
    }
}
