//! portrelay - multi-port TCP proxy
//!
//! Core library: configuration, target selection, connection relaying and
//! the listener runtime.

pub mod config;
pub mod error;
pub mod proxy;
pub mod server;
