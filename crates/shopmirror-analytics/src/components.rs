//! Detection of bundle component lines.
//!
//! When a bundle is sold, the storefront writes one priced line for the
//! bundle and one zero-priced line per component. Component lines count
//! toward quantity but never toward revenue or cost.

use std::collections::HashMap;

use rust_decimal::Decimal;
use shopmirror_core::{BundleInfo, SaleLine};

/// Returns one flag per line: `true` when the line is a bundle component.
///
/// A line is a component iff its `line_total` is exactly zero and another
/// line of the same order is a bundle whose composition contains the line's
/// product id or variant id.
#[must_use]
pub fn component_flags(lines: &[SaleLine], bundles: &BundleInfo) -> Vec<bool> {
    let mut flags = vec![false; lines.len()];
    if bundles.is_empty() {
        return flags;
    }

    let mut by_order: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        by_order.entry(line.order_id).or_default().push(i);
    }

    for positions in by_order.values() {
        for &i in positions {
            let candidate = &lines[i];
            if candidate.line_total != Decimal::ZERO {
                continue;
            }
            flags[i] = positions.iter().any(|&j| {
                j != i
                    && bundles
                        .components_of(lines[j].product_id)
                        .is_some_and(|ids| {
                            ids.contains(&candidate.product_id)
                                || candidate.variant_id.is_some_and(|v| ids.contains(&v))
                        })
            });
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line, with_variant};

    fn gift_box() -> BundleInfo {
        BundleInfo::new([(50, vec![5, 6])])
    }

    #[test]
    fn zero_priced_sibling_of_bundle_is_component() {
        let lines = vec![line(1, 50, 1, "30.00"), line(1, 5, 1, "0"), line(1, 6, 1, "0.00")];
        assert_eq!(component_flags(&lines, &gift_box()), vec![false, true, true]);
    }

    #[test]
    fn priced_line_is_never_component() {
        let lines = vec![line(1, 50, 1, "30.00"), line(1, 5, 1, "12.00")];
        assert_eq!(component_flags(&lines, &gift_box()), vec![false, false]);
    }

    #[test]
    fn zero_priced_line_without_bundle_sibling_is_not_component() {
        // Same product, but the bundle was bought in a different order.
        let lines = vec![line(1, 50, 1, "30.00"), line(2, 5, 1, "0")];
        assert_eq!(component_flags(&lines, &gift_box()), vec![false, false]);
    }

    #[test]
    fn product_outside_composition_is_not_component() {
        let lines = vec![line(1, 50, 1, "30.00"), line(1, 9, 1, "0")];
        assert_eq!(component_flags(&lines, &gift_box()), vec![false, false]);
    }

    #[test]
    fn variant_id_can_satisfy_composition() {
        let bundles = BundleInfo::new([(50, vec![101])]);
        let lines = vec![line(1, 50, 1, "30.00"), with_variant(line(1, 100, 1, "0"), 101)];
        assert_eq!(component_flags(&lines, &bundles), vec![false, true]);
    }

    #[test]
    fn bundle_does_not_mark_itself() {
        // A zero-priced bundle that lists itself as a component.
        let bundles = BundleInfo::new([(50, vec![50])]);
        let lines = vec![line(1, 50, 1, "0")];
        assert_eq!(component_flags(&lines, &bundles), vec![false]);
    }
}
