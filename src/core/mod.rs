//! In-memory revision store and the quantity editor.

/// Quantity stepper and entry buffer.
pub mod quantity;
/// Authoritative in-memory item store.
pub mod store;
