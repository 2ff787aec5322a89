//! Counted line, variant attribute, and stock candidate records.

use serde::{Deserialize, Serialize};

use crate::types::{delta_of, Delta, ItemId, ProductId, Quantity, SystemQuantity};

/// One variant attribute (size, colour, ...) of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// One counted line of a revision.
///
/// The counted quantity is private: it changes only through the store's
/// quantity path or through acquisition merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionItem {
    /// Stable identity.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Scannable code (barcode or SKU).
    pub code: String,
    #[serde(rename = "counted")]
    counted: Quantity,
    /// Ledger quantity recorded when the line was counted.
    pub system: SystemQuantity,
    /// Free-text annotation.
    #[serde(default)]
    pub comment: Option<String>,
    /// Catalog product this line counts, when known.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Variant attributes, populated only for variant-tracking revisions.
    #[serde(default)]
    pub attributes: Vec<VariantAttribute>,
}

impl RevisionItem {
    /// Builds a line with no comment, product link, or attributes.
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        code: impl Into<String>,
        counted: Quantity,
        system: SystemQuantity,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            code: code.into(),
            counted,
            system,
            comment: None,
            product_id: None,
            attributes: Vec::new(),
        }
    }

    /// Links the line to a catalog product.
    pub fn with_product(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Sets the annotation.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets variant attributes.
    pub fn with_attributes(mut self, attributes: Vec<VariantAttribute>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Counted quantity.
    pub fn counted(&self) -> Quantity {
        self.counted
    }

    /// `counted - system`.
    pub fn delta(&self) -> Delta {
        delta_of(self.counted, self.system)
    }

    pub(crate) fn set_counted(&mut self, counted: Quantity) {
        self.counted = counted;
    }
}

/// Read-only stock record used to prefill a manually entered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCandidate {
    /// Stock identity. Becomes the identity of the committed line.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Scannable code.
    pub code: String,
    /// Unit of measure label.
    #[serde(default)]
    pub unit: String,
    /// Current ledger quantity.
    pub system: SystemQuantity,
    /// Catalog product, when the stock record is linked to one.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Variant attributes of the stock record.
    #[serde(default)]
    pub attributes: Vec<VariantAttribute>,
}

/// Key used to look up one stock candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StockKey {
    /// Scanned or typed code.
    Code(String),
    /// Stock identity.
    Id(ItemId),
}
