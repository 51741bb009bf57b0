//! Read-only statistics commands.

use rust_decimal::Decimal;
use shopmirror_core::DateRange;

/// Format an optional decimal for display, returning `"—"` when `None`.
pub(crate) fn fmt_decimal(value: Option<Decimal>) -> String {
    value.map_or_else(|| "\u{2014}".to_string(), |d| d.normalize().to_string())
}

async fn resolve_family(
    pool: &sqlx::PgPool,
    product_id: i64,
) -> anyhow::Result<shopmirror_db::ProductFamily> {
    shopmirror_db::resolve_family(pool, product_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} not found"))
}

/// Print the KPI summary of a product, or of its whole family with
/// `include_variants`.
///
/// # Errors
///
/// Returns an error if the product does not exist or a query fails.
pub(crate) async fn run_summary(
    pool: &sqlx::PgPool,
    product_id: i64,
    include_variants: bool,
    range: DateRange,
) -> anyhow::Result<()> {
    let family = resolve_family(pool, product_id).await?;
    let ids = if include_variants {
        family.all_ids()
    } else {
        vec![product_id]
    };

    let (lines, bundles) = shopmirror_db::load_sales_with_bundles(pool, &ids, range).await?;
    let kpis = shopmirror_analytics::aggregate(&lines, &bundles, &ids, range);

    println!("Product: {} \u{2014} {}", family.parent.id, family.parent.title);
    println!("Scope: {ids:?}");
    println!();
    println!("{:<12}{}", "Quantity", kpis.quantity);
    println!("{:<12}{}", "Orders", kpis.orders);
    println!("{:<12}{}", "Revenue", fmt_decimal(Some(kpis.revenue)));
    println!("{:<12}{}", "Cost", fmt_decimal(Some(kpis.cost)));
    println!("{:<12}{}", "Profit", fmt_decimal(Some(kpis.profit)));
    println!("{:<12}{}%", "Margin", kpis.margin_percent);

    Ok(())
}

/// Print a product's family: the parent and each variant.
///
/// # Errors
///
/// Returns an error if the product does not exist or the query fails.
pub(crate) async fn run_family(pool: &sqlx::PgPool, product_id: i64) -> anyhow::Result<()> {
    let family = resolve_family(pool, product_id).await?;

    let header = format!("{:<10}{:<18}{:<14}{:<10}{}", "ID", "KIND", "SKU", "COST", "TITLE");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for product in family.all() {
        println!(
            "{:<10}{:<18}{:<14}{:<10}{}",
            product.id,
            product.kind,
            product.sku.as_deref().unwrap_or("\u{2014}"),
            fmt_decimal(product.effective_cost()),
            product.title
        );
    }

    Ok(())
}
