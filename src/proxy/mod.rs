//! TCP proxy core
//!
//! This module implements target pools, target selection and the per-connection
//! relay that forwards bytes between a client and a backend.

pub mod backend;
pub mod relay;
pub mod selector;

pub use backend::TargetPool;
pub use relay::{ConnectionRelay, RelayOutcome};
pub use selector::{RetrySequence, TargetSelector};
