//! Flattened order-line view consumed by the analytics layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::OrderStatus;

/// One persisted order item joined with the order context analytics need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub order_id: i64,
    pub status: OrderStatus,
    /// Order creation instant (UTC).
    pub ordered_at: DateTime<Utc>,
    pub customer_id: Option<i64>,
    pub billing_country: Option<String>,
    pub billing_city: Option<String>,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Unit cost snapshotted when the order was written.
    pub unit_cost: Option<Decimal>,
}

impl SaleLine {
    /// `quantity × unit_cost`, treating an unknown cost as zero.
    #[must_use]
    pub fn line_cost(&self) -> Decimal {
        self.unit_cost
            .map_or(Decimal::ZERO, |c| c * Decimal::from(self.quantity))
    }
}

/// Bundle compositions for the bundle products that appear in a set of
/// orders: bundle product id → component product ids.
#[derive(Debug, Clone, Default)]
pub struct BundleInfo {
    components: HashMap<i64, Vec<i64>>,
}

impl BundleInfo {
    /// Builds the lookup, dropping bundles with an empty composition.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, Vec<i64>)>,
    {
        Self {
            components: entries
                .into_iter()
                .filter(|(_, ids)| !ids.is_empty())
                .collect(),
        }
    }

    /// Component ids of `product_id` if it is a bundle with a composition.
    #[must_use]
    pub fn components_of(&self, product_id: i64) -> Option<&[i64]> {
        self.components.get(&product_id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Inclusive instant bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}
