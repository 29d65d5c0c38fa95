//! Plugin host runtime
//!
//! Lifecycle management plus middleware chain execution.

mod manager;
pub(crate) mod middleware;

pub use manager::{HostConfig, PluginHost, SlotRenderer};
