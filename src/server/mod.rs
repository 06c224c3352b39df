//! Listening side of the proxy

pub mod listener;
pub mod runtime;

pub use listener::{ListenerHandle, ListenerService, ListenerState};
pub use runtime::ProxyRuntime;
