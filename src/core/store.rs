use hashbrown::HashMap;

use crate::{
    item::RevisionItem,
    types::{ItemId, ProductId, Quantity},
};

/// Secondary index from a key to the lines carrying it, in insertion order.
type LineIndex<K> = HashMap<K, Vec<ItemId>>;

/// Lookup and insertion failures of [`RevisionItemStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("item {0} is not in the revision")]
    MissingItem(ItemId),
    #[error("item {0} is already in the revision")]
    AlreadyExists(ItemId),
}

/// What [`RevisionItemStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    /// The line existed; `previous` is its counted quantity before the update.
    Updated { previous: Quantity },
}

/// Counted lines keyed by identity, with display order and lookups by code
/// and product.
#[derive(Debug, Default, Clone)]
pub struct RevisionItemStore {
    records: HashMap<ItemId, RevisionItem>,
    order: Vec<ItemId>,
    by_code: LineIndex<String>,
    by_product: LineIndex<ProductId>,
}

impl RevisionItemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `items`, deduplicated as in [`Self::replace_all`].
    pub fn from_items(items: Vec<RevisionItem>) -> Self {
        let mut store = Self::new();
        store.replace_all(items);
        store
    }

    /// Lines in display order.
    pub fn list(&self) -> Vec<&RevisionItem> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Owned copy of [`Self::list`].
    pub fn list_cloned(&self) -> Vec<RevisionItem> {
        self.list().into_iter().cloned().collect()
    }

    /// Appends `item`, or updates the counted quantity of the line that
    /// already has its identity.
    pub fn upsert(&mut self, item: RevisionItem) -> Upserted {
        if let Some(existing) = self.records.get_mut(&item.id) {
            let previous = existing.counted();
            existing.set_counted(item.counted());
            return Upserted::Updated { previous };
        }

        self.insert_indices(&item);
        self.order.push(item.id);
        self.records.insert(item.id, item);
        Upserted::Inserted
    }

    /// Inserts `item` at the head of the display order.
    pub fn prepend(&mut self, item: RevisionItem) -> Result<(), StoreError> {
        if self.records.contains_key(&item.id) {
            return Err(StoreError::AlreadyExists(item.id));
        }

        self.insert_indices(&item);
        self.order.insert(0, item.id);
        self.records.insert(item.id, item);
        Ok(())
    }

    /// Sets the counted quantity of `id`; returns the previous one.
    pub fn set_quantity(&mut self, id: ItemId, quantity: Quantity) -> Result<Quantity, StoreError> {
        let rec = self.records.get_mut(&id).ok_or(StoreError::MissingItem(id))?;
        let previous = rec.counted();
        rec.set_counted(quantity);
        Ok(previous)
    }

    /// Removes one line.
    pub fn remove(&mut self, id: ItemId) -> Result<RevisionItem, StoreError> {
        let rec = self.records.remove(&id).ok_or(StoreError::MissingItem(id))?;
        self.order.retain(|x| *x != id);
        unlink(&mut self.by_code, &rec.code, id);
        if let Some(pid) = rec.product_id {
            unlink(&mut self.by_product, &pid, id);
        }
        Ok(rec)
    }

    /// Removes every line linked to `product_id`, returning them in display order.
    pub fn remove_product(&mut self, product_id: ProductId) -> Vec<RevisionItem> {
        let ids: Vec<ItemId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.by_product.get(&product_id).is_some_and(|v| v.contains(id)))
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id).ok()).collect()
    }

    /// Replaces the whole set. Later duplicates of an identity are dropped.
    pub fn replace_all(&mut self, items: Vec<RevisionItem>) {
        self.records.clear();
        self.order.clear();
        self.by_code.clear();
        self.by_product.clear();

        for item in items {
            if self.records.contains_key(&item.id) {
                tracing::warn!(item_id = item.id, "duplicate item identity in bulk load dropped");
                continue;
            }
            self.insert_indices(&item);
            self.order.push(item.id);
            self.records.insert(item.id, item);
        }
    }

    /// Drops every line.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    /// The line with identity `id`.
    pub fn get(&self, id: ItemId) -> Option<&RevisionItem> {
        self.records.get(&id)
    }

    /// Whether a line with identity `id` is present.
    pub fn contains(&self, id: ItemId) -> bool {
        self.records.contains_key(&id)
    }

    /// Lines whose code equals `code`, in insertion order.
    pub fn by_code(&self, code: &str) -> Vec<&RevisionItem> {
        self.by_code
            .get(code)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Lines linked to `product_id`, in insertion order.
    pub fn by_product(&self, product_id: ProductId) -> Vec<&RevisionItem> {
        self.by_product
            .get(&product_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// Identities in display order.
    pub fn ordered_ids(&self) -> &[ItemId] {
        &self.order
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert_indices(&mut self, rec: &RevisionItem) {
        self.by_code.entry(rec.code.clone()).or_default().push(rec.id);
        if let Some(pid) = rec.product_id {
            self.by_product.entry(pid).or_default().push(rec.id);
        }
    }
}

fn unlink<K, Q>(index: &mut LineIndex<K>, key: &Q, id: ItemId)
where
    K: std::hash::Hash + Eq + std::borrow::Borrow<Q>,
    Q: std::hash::Hash + Eq + ?Sized,
{
    let Some(ids) = index.get_mut(key) else {
        return;
    };
    ids.retain(|x| *x != id);
    if ids.is_empty() {
        index.remove(key);
    }
}
