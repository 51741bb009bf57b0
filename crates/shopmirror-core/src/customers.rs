use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A postal/contact snapshot as the storefront held it at sync time.
///
/// Stored as JSONB; every field is optional because guest checkouts and
/// legacy accounts routinely leave most of them blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    /// ISO 3166-1 alpha-2 code, e.g. `"FR"`.
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Address {
    /// Returns `true` when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Marketing attribution recorded by the storefront for a customer or order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub source_type: Option<String>,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub device_type: Option<String>,
}

/// Store-ready representation of a storefront customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalCustomer {
    /// Storefront user id; the conflict key for upserts.
    pub id: i64,
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub billing: Address,
    pub shipping: Address,
    pub attribution: Attribution,
    /// Last-known order counter as reported upstream; `None` when never sent.
    pub order_count: Option<i32>,
    pub total_spent: Option<Decimal>,
}
