//! Plugin contract for the Drydock workbench.
//!
//! Everything a plugin compiles against lives here: the manifest schema
//! shipped as `plugin.json`, the capability traits a plugin implements
//! ([`UiPlugin`], [`MiddlewarePlugin`]), the tagged [`PluginInstance`] the
//! host activates, the invocation contexts, and the [`register_plugin!`]
//! macro that exports the module entry point the loader resolves.
//!
//! The host side of the contract (installation, persistence, loading, and
//! activation) lives in `drydock-core`.

mod api;
mod manifest;
mod plugin;

pub use api::{CoreApi, Sandbox, SandboxEvent, Workbench};
pub use manifest::{PluginKind, PluginManifest};
pub use plugin::{
    HybridPlugin, MiddlewareContext, MiddlewarePlugin, Next, PluginContext, PluginInstance,
    SlotContext, SlotElement, UiPlugin,
};

/// Name of the factory symbol a plugin module must export.
///
/// Emitted by [`register_plugin!`]; resolved by the host's module loader.
pub const PLUGIN_ENTRY_SYMBOL: &str = "drydock_plugin_entry";
