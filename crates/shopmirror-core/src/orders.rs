use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::customers::{Address, Attribution};
use crate::CoreError;

/// Order lifecycle status. Only [`OrderStatus::Completed`] is revenue-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    CheckoutDraft,
}

impl OrderStatus {
    /// Parses the storefront status, with or without its `wc-` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOrderStatus`] for values outside the
    /// fixed enumeration.
    pub fn from_upstream(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        trimmed
            .strip_prefix("wc-")
            .unwrap_or(trimmed)
            .parse()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::OnHold => "on-hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
            Self::CheckoutDraft => "checkout-draft",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "on-hold" => Ok(Self::OnHold),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            "failed" => Ok(Self::Failed),
            "checkout-draft" => Ok(Self::CheckoutDraft),
            other => Err(CoreError::InvalidOrderStatus(other.to_string())),
        }
    }
}

/// A purchased line of a [`CanonicalOrder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalOrderItem {
    /// Upstream line id; not globally unique across re-syncs, kept for tracing.
    pub source_item_id: Option<i64>,
    pub name: String,
    pub product_id: i64,
    /// `None` when the line is not a variation.
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub line_subtotal: Option<Decimal>,
    /// Amount actually charged for the line. Exactly zero for bundle components.
    pub line_total: Decimal,
    pub line_tax: Option<Decimal>,
    /// Unit cost at sale time when the payload carries one. When `None`, the
    /// writer snapshots the product's effective cost at write time.
    pub unit_cost: Option<Decimal>,
}

/// A coupon applied to a [`CanonicalOrder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalCoupon {
    pub code: String,
    pub discount: Option<Decimal>,
    pub discount_type: Option<String>,
}

/// Store-ready representation of a storefront order with its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalOrder {
    /// Storefront post id; the conflict key for upserts.
    pub id: i64,
    pub status: OrderStatus,
    /// ISO 4217 code; defaults to `"EUR"` when the payload omits it.
    pub currency: String,
    pub total: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub total_tax: Option<Decimal>,
    pub shipping_total: Option<Decimal>,
    pub discount_total: Option<Decimal>,
    /// `None` for guest checkouts.
    pub customer_id: Option<i64>,
    pub billing: Address,
    pub shipping: Address,
    pub payment_method: Option<String>,
    pub payment_method_title: Option<String>,
    pub transaction_id: Option<String>,
    pub attribution: Attribution,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<CanonicalOrderItem>,
    pub coupons: Vec<CanonicalCoupon>,
}
