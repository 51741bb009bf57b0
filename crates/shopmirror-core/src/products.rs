use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Position of a product in the catalog hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Simple,
    /// A product whose purchasable units are its variants.
    VariableParent,
    /// A purchasable child of a `VariableParent`; always has a `parent_id`.
    Variant,
    /// A composite product sold as one line, made of other products.
    Bundle,
}

impl ProductKind {
    /// Maps the storefront's `product_type` string.
    ///
    /// Absent and unrecognised types fall back to [`ProductKind::Simple`],
    /// which covers `grouped` and `external` products too.
    #[must_use]
    pub fn from_upstream(product_type: Option<&str>) -> Self {
        match product_type.map(str::trim) {
            Some("variable") => Self::VariableParent,
            Some("variation") => Self::Variant,
            Some("woosb" | "bundle" | "composite") => Self::Bundle,
            _ => Self::Simple,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::VariableParent => "variable_parent",
            Self::Variant => "variant",
            Self::Bundle => "bundle",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "variable_parent" => Ok(Self::VariableParent),
            "variant" => Ok(Self::Variant),
            "bundle" => Ok(Self::Bundle),
            other => Err(CoreError::InvalidProductKind(other.to_string())),
        }
    }
}

/// One entry of a bundle's composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleComponent {
    pub component_id: i64,
    pub quantity: i32,
}

/// Store-ready representation of a catalog product or variation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalProduct {
    /// Storefront post id; the conflict key for upserts.
    pub id: i64,
    pub kind: ProductKind,
    /// Set iff `kind` is [`ProductKind::Variant`].
    pub parent_id: Option<i64>,
    pub title: String,
    pub slug: Option<String>,
    pub status: String,
    pub sku: Option<String>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    /// Active selling price.
    pub price: Option<Decimal>,
    /// Unit cost as synced from the storefront.
    pub cost: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub stock_status: String,
    /// Attribute name → value, e.g. `{"color": "red"}`.
    pub attributes: BTreeMap<String, String>,
    /// `None` for non-bundles and for bundles whose composition was unreadable.
    pub components: Option<Vec<BundleComponent>>,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Canonical variations delivered nested inside the parent payload.
    pub variations: Vec<CanonicalProduct>,
}

impl CanonicalProduct {
    /// Returns the component ids when this is a bundle with a non-empty
    /// composition.
    #[must_use]
    pub fn bundle_component_ids(&self) -> Option<Vec<i64>> {
        if self.kind != ProductKind::Bundle {
            return None;
        }
        self.components
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| c.iter().map(|bc| bc.component_id).collect())
    }
}
