//! Canonicalization of raw storefront payloads into store-ready records.
//!
//! Composition decoding is delegated to [`crate::bundle`] and timestamp
//! conversion to [`shopmirror_core::to_utc`]; this module focuses on
//! structural mapping and business defaults.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde_json::Value;
use shopmirror_core::{
    to_utc, Address, Attribution, CanonicalCoupon, CanonicalCustomer, CanonicalOrder,
    CanonicalOrderItem, CanonicalProduct, OrderStatus, ProductKind,
};

use crate::bundle::decode_components;
use crate::error::IngestError;
use crate::parse_helpers::string_from_value;
use crate::types::{
    MetaMap, RawCustomer, RawOrder, RawOrderItem, RawPost, RawProduct, RawProductMeta, RawVariation,
};

pub const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_STOCK_STATUS: &str = "instock";
const DEFAULT_PRODUCT_STATUS: &str = "publish";

/// Meta keys that may hold a bundle composition, in lookup order.
const BUNDLE_META_KEYS: &[&str] = &[
    "woosb_ids",
    "_woosb_ids",
    "_bundle_components",
    "_bundle_data",
];

const ATTRIBUTION_PREFIXES: &[&str] = &["_wc_order_attribution_", "wc_order_attribution_"];

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

/// Canonicalizes a raw customer.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] if the `user` object or its id is
/// missing.
pub fn transform_customer(raw: RawCustomer, zone: Tz) -> Result<CanonicalCustomer, IngestError> {
    let user = raw
        .user
        .ok_or_else(|| IngestError::validation("customer", "?", "missing user object"))?;
    let id = user
        .id
        .filter(|id| *id > 0)
        .ok_or_else(|| IngestError::validation("customer", "?", "user has no id"))?;

    let meta = raw.meta;
    let billing = address_from_meta(&meta.extra, "billing_");
    let email = user.email.or_else(|| billing.email.clone());

    Ok(CanonicalCustomer {
        id,
        email,
        username: user.user_login,
        display_name: user.display_name,
        first_name: meta.first_name,
        last_name: meta.last_name,
        role: user.roles.as_ref().and_then(first_role),
        registered_at: to_utc(user.user_registered.as_deref(), zone),
        billing,
        shipping: address_from_meta(&meta.extra, "shipping_"),
        attribution: attribution_from_meta(&meta.extra),
        order_count: meta.order_count,
        total_spent: meta.money_spent,
    })
}

fn first_role(roles: &Value) -> Option<String> {
    match roles {
        Value::Array(list) => list.iter().find_map(string_from_value),
        Value::Object(map) => map
            .iter()
            .find(|(_, enabled)| enabled.as_bool().unwrap_or(true))
            .map(|(name, _)| name.clone()),
        other => string_from_value(other),
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Canonicalizes a raw product together with any nested variations.
///
/// Nested variations always become [`ProductKind::Variant`] children of
/// this product, whatever their own payload says.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] if the `post` object or its id is
/// missing, if a variant has no parent id, or if any nested variation is
/// invalid.
pub fn transform_product(raw: RawProduct, zone: Tz) -> Result<CanonicalProduct, IngestError> {
    let post = raw
        .post
        .ok_or_else(|| IngestError::validation("product", "?", "missing post object"))?;
    let id = post_id(&post, "product")?;
    let kind = ProductKind::from_upstream(raw.product_type.as_deref());

    let parent_id =
        match kind {
            ProductKind::Variant => Some(parent_of(&post).ok_or_else(|| {
                IngestError::validation("product", id, "variation has no parent id")
            })?),
            _ => None,
        };

    let variations = raw
        .variations
        .into_iter()
        .map(|v| transform_variation(v, id, zone))
        .collect::<Result<Vec<_>, _>>()?;

    let mut product = build_product(id, kind, parent_id, &post, raw.meta, raw.image_url, zone);
    product.variations = variations;
    Ok(product)
}

fn transform_variation(
    raw: RawVariation,
    parent_id: i64,
    zone: Tz,
) -> Result<CanonicalProduct, IngestError> {
    let post = raw.post.ok_or_else(|| {
        IngestError::validation("product", parent_id, "variation without post object")
    })?;
    let id = post_id(&post, "product")?;

    Ok(build_product(
        id,
        ProductKind::Variant,
        Some(parent_id),
        &post,
        raw.meta,
        raw.image_url,
        zone,
    ))
}

fn build_product(
    id: i64,
    kind: ProductKind,
    parent_id: Option<i64>,
    post: &RawPost,
    meta: RawProductMeta,
    image_url: Option<String>,
    zone: Tz,
) -> CanonicalProduct {
    let components = if kind == ProductKind::Bundle {
        BUNDLE_META_KEYS
            .iter()
            .filter_map(|key| meta.extra.get(*key))
            .find_map(decode_components)
    } else {
        None
    };

    if kind == ProductKind::Bundle && components.is_none() {
        tracing::debug!(product_id = id, "bundle has no readable composition");
    }

    CanonicalProduct {
        id,
        kind,
        parent_id,
        title: post.post_title.clone().unwrap_or_default(),
        slug: post.post_name.clone(),
        status: post
            .post_status
            .clone()
            .unwrap_or_else(|| DEFAULT_PRODUCT_STATUS.to_owned()),
        sku: meta.sku,
        regular_price: meta.regular_price,
        sale_price: meta.sale_price,
        price: meta.price.or(meta.sale_price).or(meta.regular_price),
        cost: meta.cost,
        stock_quantity: meta.stock,
        stock_status: meta
            .stock_status
            .unwrap_or_else(|| DEFAULT_STOCK_STATUS.to_owned()),
        attributes: attributes_from_meta(&meta.extra),
        components,
        image_url,
        created_at: to_utc(post.post_date.as_deref(), zone),
        modified_at: to_utc(post.post_modified.as_deref(), zone),
        variations: Vec::new(),
    }
}

/// Keeps `attribute_*` meta, stripping the prefix and the taxonomy `pa_`
/// marker: `attribute_pa_color` becomes `color`.
fn attributes_from_meta(extra: &MetaMap) -> BTreeMap<String, String> {
    extra
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix("attribute_")?;
            let name = name.strip_prefix("pa_").unwrap_or(name);
            if name.is_empty() {
                return None;
            }
            Some((name.to_owned(), string_from_value(value)?))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Canonicalizes a raw order with its line items and coupons.
///
/// # Errors
///
/// Returns [`IngestError::Validation`] if the `post` object or its id is
/// missing, if the status is outside the known set, or if a line item has
/// no product id.
pub fn transform_order(raw: RawOrder, zone: Tz) -> Result<CanonicalOrder, IngestError> {
    let post = raw
        .post
        .ok_or_else(|| IngestError::validation("order", "?", "missing post object"))?;
    let id = post_id(&post, "order")?;

    let status = match post.post_status.as_deref() {
        None => OrderStatus::Pending,
        Some(raw_status) => OrderStatus::from_upstream(raw_status)
            .map_err(|e| IngestError::validation("order", id, e.to_string()))?,
    };

    let items = raw
        .items
        .into_iter()
        .filter(|item| {
            item.item
                .order_item_type
                .as_deref()
                .is_none_or(|t| t == "line_item")
        })
        .enumerate()
        .map(|(n, item)| transform_item(item, id, n))
        .collect::<Result<Vec<_>, _>>()?;

    let coupons = raw
        .coupons
        .into_iter()
        .filter_map(|c| {
            Some(CanonicalCoupon {
                code: c.code?,
                discount: c.discount,
                discount_type: c.discount_type,
            })
        })
        .collect();

    let subtotal = items
        .iter()
        .filter_map(|i| i.line_subtotal)
        .reduce(|acc, s| acc + s);

    let meta = raw.meta;

    Ok(CanonicalOrder {
        id,
        status,
        currency: meta.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
        total: meta.order_total,
        subtotal,
        total_tax: meta.order_tax,
        shipping_total: meta.order_shipping,
        discount_total: meta.cart_discount,
        customer_id: meta.customer_user.filter(|c| *c > 0),
        billing: address_from_meta(&meta.extra, "_billing_"),
        shipping: address_from_meta(&meta.extra, "_shipping_"),
        payment_method: meta.payment_method,
        payment_method_title: meta.payment_method_title,
        transaction_id: meta.transaction_id,
        attribution: attribution_from_meta(&meta.extra),
        created_at: to_utc(post.post_date.as_deref(), zone),
        modified_at: to_utc(post.post_modified.as_deref(), zone),
        paid_at: to_utc(meta.date_paid.as_deref(), zone),
        completed_at: to_utc(meta.date_completed.as_deref(), zone),
        items,
        coupons,
    })
}

fn transform_item(
    raw: RawOrderItem,
    order_id: i64,
    position: usize,
) -> Result<CanonicalOrderItem, IngestError> {
    let meta = raw.meta;
    let product_id = meta.product_id.ok_or_else(|| {
        IngestError::validation(
            "order",
            order_id,
            format!("line item {position} has no product id"),
        )
    })?;
    let quantity = meta.qty.unwrap_or(1);
    let line_total = meta.line_total.ok_or_else(|| {
        IngestError::validation(
            "order",
            order_id,
            format!("line item {position} has no line total"),
        )
    })?;
    let unit_price = meta.unit_price.or_else(|| {
        meta.line_subtotal
            .filter(|_| quantity > 0)
            .map(|s| (s / Decimal::from(quantity)).round_dp(4))
    });

    Ok(CanonicalOrderItem {
        source_item_id: raw.item.order_item_id,
        name: raw.item.order_item_name.unwrap_or_default(),
        product_id,
        variant_id: meta.variation_id.filter(|v| *v > 0),
        quantity,
        unit_price,
        line_subtotal: meta.line_subtotal,
        line_total,
        line_tax: meta.line_tax,
        unit_cost: meta.cost,
    })
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn post_id(post: &RawPost, entity: &'static str) -> Result<i64, IngestError> {
    post.id
        .filter(|id| *id > 0)
        .ok_or_else(|| IngestError::validation(entity, "?", "post has no id"))
}

fn parent_of(post: &RawPost) -> Option<i64> {
    post.parent_id.filter(|p| *p > 0)
}

fn address_from_meta(extra: &MetaMap, prefix: &str) -> Address {
    let field = |name: &str| {
        extra
            .get(&format!("{prefix}{name}"))
            .and_then(string_from_value)
    };

    Address {
        first_name: field("first_name"),
        last_name: field("last_name"),
        company: field("company"),
        address_1: field("address_1"),
        address_2: field("address_2"),
        city: field("city"),
        state: field("state"),
        postcode: field("postcode"),
        country: field("country").map(|c| c.to_ascii_uppercase()),
        email: field("email"),
        phone: field("phone"),
    }
}

fn attribution_from_meta(extra: &MetaMap) -> Attribution {
    let field = |name: &str| {
        ATTRIBUTION_PREFIXES
            .iter()
            .find_map(|prefix| extra.get(&format!("{prefix}{name}")))
            .and_then(string_from_value)
    };

    Attribution {
        source_type: field("source_type"),
        referrer: field("referrer"),
        utm_source: field("utm_source"),
        utm_medium: field("utm_medium"),
        utm_campaign: field("utm_campaign"),
        device_type: field("device_type"),
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
