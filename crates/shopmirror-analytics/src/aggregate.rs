//! Bundle-aware KPI aggregation for a product set.

use std::collections::BTreeSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use shopmirror_core::{BundleInfo, DateRange, SaleLine};

use crate::matching_lines;

/// Headline sales figures for a product set over completed orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KpiSummary {
    /// Units sold, bundle components included.
    pub quantity: i64,
    /// Sum of `line_total`; bundle components contribute zero.
    pub revenue: Decimal,
    /// Distinct orders with at least one matching line.
    pub orders: u64,
    pub cost: Decimal,
    pub profit: Decimal,
    /// `profit / revenue × 100`, two decimals; zero when revenue is not
    /// positive.
    pub margin_percent: Decimal,
}

/// Running totals shared by every aggregation in this crate.
#[derive(Debug, Clone, Default)]
pub(crate) struct Totals {
    pub quantity: i64,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub orders: BTreeSet<i64>,
}

impl Totals {
    pub fn add(&mut self, line: &SaleLine, is_component: bool) {
        self.quantity += i64::from(line.quantity);
        self.orders.insert(line.order_id);
        if !is_component {
            self.revenue += line.line_total;
            self.cost += line.line_cost();
        }
    }

    pub fn profit(&self) -> Decimal {
        self.revenue - self.cost
    }

    pub fn order_count(&self) -> u64 {
        self.orders.len() as u64
    }

    pub fn summary(&self) -> KpiSummary {
        KpiSummary {
            quantity: self.quantity,
            revenue: self.revenue,
            orders: self.order_count(),
            cost: self.cost,
            profit: self.profit(),
            margin_percent: margin_percent(self.profit(), self.revenue),
        }
    }
}

/// `profit / revenue × 100` rounded half away from zero to two decimals;
/// zero when `revenue <= 0`.
#[must_use]
pub fn margin_percent(profit: Decimal, revenue: Decimal) -> Decimal {
    if revenue <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (profit / revenue * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Aggregates the completed-order lines matching `product_ids` within
/// `range`.
///
/// A line matches when its product id or variant id is in `product_ids`.
/// Empty or non-matching ids give an all-zero summary.
#[must_use]
pub fn aggregate(
    lines: &[SaleLine],
    bundles: &BundleInfo,
    product_ids: &[i64],
    range: DateRange,
) -> KpiSummary {
    let mut totals = Totals::default();
    for (line, is_component) in matching_lines(lines, bundles, product_ids, range) {
        totals.add(line, is_component);
    }
    totals.summary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, dec, line, with_cost, with_variant};
    use shopmirror_core::OrderStatus;

    #[test]
    fn bundle_component_counts_units_but_not_money() {
        let bundles = BundleInfo::new([(50, vec![5, 6])]);
        let lines = vec![
            with_cost(line(1, 50, 1, "30.00"), "10.00"),
            with_cost(line(1, 5, 1, "0"), "4.00"),
            with_cost(line(1, 6, 2, "0"), "3.00"),
            with_cost(line(2, 5, 1, "12.00"), "4.00"),
        ];

        let summary = aggregate(&lines, &bundles, &[5], DateRange::default());

        assert_eq!(summary.quantity, 2);
        assert_eq!(summary.revenue, dec("12.00"));
        assert_eq!(summary.cost, dec("4.00"));
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.profit, dec("8.00"));
        assert_eq!(summary.margin_percent, dec("66.67"));
    }

    #[test]
    fn only_completed_orders_count() {
        let mut cancelled = line(2, 5, 3, "30.00");
        cancelled.status = OrderStatus::Cancelled;
        let lines = vec![line(1, 5, 1, "10.00"), cancelled];

        let summary = aggregate(&lines, &BundleInfo::default(), &[5], DateRange::default());
        assert_eq!(summary.quantity, 1);
        assert_eq!(summary.revenue, dec("10.00"));
    }

    #[test]
    fn variant_id_matches_product_set() {
        let lines = vec![with_variant(line(1, 100, 2, "40.00"), 101), line(2, 100, 1, "25.00")];

        let variant_only = aggregate(&lines, &BundleInfo::default(), &[101], DateRange::default());
        assert_eq!(variant_only.quantity, 2);

        let family = aggregate(
            &lines,
            &BundleInfo::default(),
            &[100, 101],
            DateRange::default(),
        );
        assert_eq!(family.quantity, 3);
        assert_eq!(family.orders, 2);
    }

    #[test]
    fn zero_revenue_gives_zero_margin() {
        let lines = vec![with_cost(line(1, 5, 1, "0"), "4.00")];
        let summary = aggregate(&lines, &BundleInfo::default(), &[5], DateRange::default());

        assert_eq!(summary.revenue, Decimal::ZERO);
        assert_eq!(summary.profit, dec("-4.00"));
        assert_eq!(summary.margin_percent, Decimal::ZERO);
    }

    #[test]
    fn negative_revenue_gives_zero_margin() {
        let lines = vec![line(1, 5, 1, "-5.00")];
        let summary = aggregate(&lines, &BundleInfo::default(), &[5], DateRange::default());
        assert_eq!(summary.margin_percent, Decimal::ZERO);
    }

    #[test]
    fn empty_or_unknown_ids_give_zero_summary() {
        let lines = vec![line(1, 5, 1, "10.00")];
        assert_eq!(
            aggregate(&lines, &BundleInfo::default(), &[], DateRange::default()),
            KpiSummary::default()
        );
        assert_eq!(
            aggregate(&lines, &BundleInfo::default(), &[999], DateRange::default()),
            KpiSummary::default()
        );
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let lines = vec![line(1, 5, 1, "10.00")];
        let exact = DateRange {
            from: Some(at(2024, 5, 10, 12, 0)),
            to: Some(at(2024, 5, 10, 12, 0)),
        };
        let later = DateRange {
            from: Some(at(2024, 5, 10, 12, 1)),
            to: None,
        };

        assert_eq!(aggregate(&lines, &BundleInfo::default(), &[5], exact).quantity, 1);
        assert_eq!(aggregate(&lines, &BundleInfo::default(), &[5], later).quantity, 0);
    }

    #[test]
    fn margin_rounds_half_away_from_zero() {
        assert_eq!(margin_percent(dec("1"), dec("8")), dec("12.50"));
        assert_eq!(margin_percent(dec("1"), dec("3")), dec("33.33"));
        assert_eq!(margin_percent(dec("0.00125"), dec("1")), dec("0.13"));
    }
}
