//! Raw storefront payload shapes, as pushed by the store's sync plugin.
//!
//! ## Observed shape
//!
//! Every entity arrives as a pair of a core row (`user` for customers,
//! `post` for products and orders) and a flat `meta` map of post/user meta.
//! Meta values are almost always strings, including numbers and dates
//! (`"_order_total": "49.90"`), but some plugin versions send real JSON
//! numbers and a few send empty strings for "unset". All scalar fields
//! therefore go through the lenient readers in [`crate::parse_helpers`].
//!
//! Meta keys without a dedicated field (addresses, attributes, attribution,
//! bundle compositions) are kept in a flattened [`MetaMap`] and read by
//! prefix during canonicalization.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::parse_helpers::{lenient_decimal, lenient_i32, lenient_i64, lenient_string};

/// Meta keys not captured by a typed field.
pub type MetaMap = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawCustomer {
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub meta: RawCustomerMeta,
}

#[derive(Debug, Deserialize)]
pub struct RawUser {
    #[serde(default, alias = "ID", deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(default, alias = "user_email", deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_login: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub display_name: Option<String>,
    /// Civil time in the store's zone.
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_registered: Option<String>,
    /// Either a list of role names or a single role string.
    #[serde(default)]
    pub roles: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawCustomerMeta {
    #[serde(default, deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    #[serde(default, rename = "_order_count", deserialize_with = "lenient_i32")]
    pub order_count: Option<i32>,
    #[serde(default, rename = "_money_spent", deserialize_with = "lenient_decimal")]
    pub money_spent: Option<Decimal>,
    /// `billing_*`, `shipping_*`, attribution keys.
    #[serde(flatten)]
    pub extra: MetaMap,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawProduct {
    /// `simple`, `variable`, `variation`, `woosb`, ... Absent on some exports.
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_type: Option<String>,
    #[serde(default)]
    pub post: Option<RawPost>,
    #[serde(default)]
    pub meta: RawProductMeta,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_url: Option<String>,
    /// Variations delivered nested in their parent's payload.
    #[serde(default)]
    pub variations: Vec<RawVariation>,
}

#[derive(Debug, Deserialize)]
pub struct RawVariation {
    #[serde(default)]
    pub post: Option<RawPost>,
    #[serde(default)]
    pub meta: RawProductMeta,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_url: Option<String>,
}

/// Core post row shared by products, variations, and orders.
#[derive(Debug, Default, Deserialize)]
pub struct RawPost {
    #[serde(default, alias = "ID", deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    /// `0` or absent for top-level posts.
    #[serde(default, alias = "post_parent", deserialize_with = "lenient_i64")]
    pub parent_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_modified: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawProductMeta {
    #[serde(default, rename = "_sku", deserialize_with = "lenient_string")]
    pub sku: Option<String>,
    #[serde(
        default,
        rename = "_regular_price",
        deserialize_with = "lenient_decimal"
    )]
    pub regular_price: Option<Decimal>,
    #[serde(default, rename = "_sale_price", deserialize_with = "lenient_decimal")]
    pub sale_price: Option<Decimal>,
    #[serde(default, rename = "_price", deserialize_with = "lenient_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, rename = "_stock", deserialize_with = "lenient_i32")]
    pub stock: Option<i32>,
    #[serde(default, rename = "_stock_status", deserialize_with = "lenient_string")]
    pub stock_status: Option<String>,
    #[serde(
        default,
        rename = "_cost",
        alias = "_wc_cog_cost",
        deserialize_with = "lenient_decimal"
    )]
    pub cost: Option<Decimal>,
    /// `attribute_*`, bundle composition keys.
    #[serde(flatten)]
    pub extra: MetaMap,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawOrder {
    #[serde(default)]
    pub post: Option<RawPost>,
    #[serde(default)]
    pub meta: RawOrderMeta,
    #[serde(default)]
    pub items: Vec<RawOrderItem>,
    #[serde(default)]
    pub coupons: Vec<RawCoupon>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawOrderMeta {
    #[serde(default, rename = "_order_total", deserialize_with = "lenient_decimal")]
    pub order_total: Option<Decimal>,
    #[serde(default, rename = "_order_tax", deserialize_with = "lenient_decimal")]
    pub order_tax: Option<Decimal>,
    #[serde(
        default,
        rename = "_order_shipping",
        deserialize_with = "lenient_decimal"
    )]
    pub order_shipping: Option<Decimal>,
    #[serde(
        default,
        rename = "_cart_discount",
        deserialize_with = "lenient_decimal"
    )]
    pub cart_discount: Option<Decimal>,
    #[serde(
        default,
        rename = "_order_currency",
        deserialize_with = "lenient_string"
    )]
    pub currency: Option<String>,
    /// `0` for guest checkouts.
    #[serde(default, rename = "_customer_user", deserialize_with = "lenient_i64")]
    pub customer_user: Option<i64>,
    #[serde(
        default,
        rename = "_payment_method",
        deserialize_with = "lenient_string"
    )]
    pub payment_method: Option<String>,
    #[serde(
        default,
        rename = "_payment_method_title",
        deserialize_with = "lenient_string"
    )]
    pub payment_method_title: Option<String>,
    #[serde(
        default,
        rename = "_transaction_id",
        deserialize_with = "lenient_string"
    )]
    pub transaction_id: Option<String>,
    /// Epoch seconds or civil time.
    #[serde(default, rename = "_date_paid", deserialize_with = "lenient_string")]
    pub date_paid: Option<String>,
    #[serde(
        default,
        rename = "_date_completed",
        deserialize_with = "lenient_string"
    )]
    pub date_completed: Option<String>,
    /// `_billing_*`, `_shipping_*`, attribution keys.
    #[serde(flatten)]
    pub extra: MetaMap,
}

#[derive(Debug, Deserialize)]
pub struct RawOrderItem {
    #[serde(default)]
    pub item: RawItemRow,
    #[serde(default)]
    pub meta: RawItemMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawItemRow {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub order_item_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_item_name: Option<String>,
    /// `line_item`, `shipping`, `fee`, `coupon`, `tax`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_item_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawItemMeta {
    #[serde(default, rename = "_product_id", deserialize_with = "lenient_i64")]
    pub product_id: Option<i64>,
    /// `0` when the line is not a variation.
    #[serde(default, rename = "_variation_id", deserialize_with = "lenient_i64")]
    pub variation_id: Option<i64>,
    #[serde(default, rename = "_qty", deserialize_with = "lenient_i32")]
    pub qty: Option<i32>,
    #[serde(
        default,
        rename = "_line_subtotal",
        deserialize_with = "lenient_decimal"
    )]
    pub line_subtotal: Option<Decimal>,
    #[serde(default, rename = "_line_total", deserialize_with = "lenient_decimal")]
    pub line_total: Option<Decimal>,
    #[serde(default, rename = "_line_tax", deserialize_with = "lenient_decimal")]
    pub line_tax: Option<Decimal>,
    #[serde(default, rename = "_unit_price", deserialize_with = "lenient_decimal")]
    pub unit_price: Option<Decimal>,
    #[serde(
        default,
        rename = "_cost",
        alias = "_wc_cog_item_cost",
        deserialize_with = "lenient_decimal"
    )]
    pub cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RawCoupon {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, alias = "amount", deserialize_with = "lenient_decimal")]
    pub discount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub discount_type: Option<String>,
}
