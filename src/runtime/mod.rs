//! Single-owner async runtime, read snapshots, and event stream.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and command loop implementation.
pub mod handle;
/// Read-only session snapshots.
pub mod view;
