//! Plugin runtime for the Drydock workbench.
//!
//! Plugins ship as zip bundles: a `plugin.json` manifest at the root plus
//! the module files it references. This crate installs bundles into a
//! SQLite-backed store, loads stored modules as native dynamic libraries,
//! and activates the resulting instances: UI plugins mount into named
//! slots the embedding application registers, middleware plugins join
//! ordered chains the application dispatches data through.
//!
//! [`PluginHost`] is the entry point; the application constructs one at
//! bootstrap, calls [`PluginHost::initialize`] to reload installed
//! plugins, and wires slot renderers and dispatch points to its UI.
//!
//! The contract plugins compile against lives in `drydock-abi`,
//! re-exported here as [`abi`].

pub mod archive;
pub mod error;
pub mod host;
pub mod loader;
pub mod manifest;
pub mod paths;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use drydock_abi as abi;

pub use error::{PluginError, PluginResult};
pub use host::{HostConfig, PluginHost, SlotRenderer};
pub use loader::{LoadedModule, ModuleHost, NativeModuleHost};
pub use store::{PluginStore, StoreLocation, StoredPluginInfo};
