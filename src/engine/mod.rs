//! Revision session engine: state machine, acquisition, reconciliation.

/// Search merge and manual line construction.
pub mod acquisition;
/// Comment targets and validation.
pub mod annotation;
/// Sans-IO session state machine.
pub mod machine;
/// Forward merge of server comparisons with local lines.
pub mod reconcile;
