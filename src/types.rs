//! Shared primitive IDs and stock-count enums.

use serde::{Deserialize, Serialize};

/// Server-assigned revision (count session) number.
pub type RevisionId = u64;
/// Stock location identifier.
pub type LocationId = u64;
/// Stable identity of one counted line.
pub type ItemId = u64;
/// Catalog product identifier.
pub type ProductId = u64;
/// Counted quantity. Unsigned, so a negative count cannot be represented.
pub type Quantity = u64;
/// Ledger-side quantity. The ledger may run negative when oversold.
pub type SystemQuantity = i64;
/// Signed discrepancy `counted - system`.
pub type Delta = i64;
/// Monotonic sequence of journaled unsynced edits.
pub type EditSeq = u64;

/// Which part of the catalog a count covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountType {
    /// Operator picks the products to count.
    Selective,
    /// Every product stocked at the location.
    AllProducts,
    /// Products of one brand.
    ByBrand,
    /// Products of one category.
    ByCategory,
    /// Products of one supplier.
    BySupplier,
}

/// Which partition of a comparison is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewFilter {
    /// Both partitions.
    #[default]
    All,
    /// Only items whose delta is zero.
    Matched,
    /// Only items whose delta is non-zero.
    Mismatched,
}

/// Computes `counted - system`, saturating at the `i64` range.
pub fn delta_of(counted: Quantity, system: SystemQuantity) -> Delta {
    let wide = i128::from(counted) - i128::from(system);
    Delta::try_from(wide).unwrap_or(if wide.is_negative() {
        Delta::MIN
    } else {
        Delta::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_counted_minus_system() {
        assert_eq!(delta_of(5, 5), 0);
        assert_eq!(delta_of(0, 3), -3);
        assert_eq!(delta_of(7, -2), 9);
    }

    #[test]
    fn delta_saturates() {
        assert_eq!(delta_of(u64::MAX, -1), i64::MAX);
        assert_eq!(delta_of(0, i64::MIN), i64::MAX);
    }
}
