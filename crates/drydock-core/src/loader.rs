//! Dynamic module loading
//!
//! Stored module bytes never live at a stable filesystem path. To execute
//! one, the loader writes the bytes to a unique temporary file, loads it as
//! a dynamic library, resolves the exported factory symbol, and releases
//! the temporary file once the instance exists. Only the in-memory library
//! handle survives.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use libloading::{Library, Symbol};
use tracing::debug;

use drydock_abi::{PluginContext, PluginInstance};

use crate::error::PluginError;

/// Signature of the factory exported by `drydock_plugin_entry`.
pub type PluginEntryFn =
    unsafe extern "C" fn(context: *const PluginContext) -> *mut PluginInstance;

const ENTRY_SYMBOL: &[u8] = b"drydock_plugin_entry\0";

/// An instantiated plugin module.
///
/// Field order matters: the instance must drop before the library that
/// contains its code.
pub struct LoadedModule {
    pub instance: PluginInstance,
    _library: Option<Library>,
}

impl LoadedModule {
    /// Wrap an instance that does not come from a dynamic library.
    pub fn from_instance(instance: PluginInstance) -> Self {
        Self {
            instance,
            _library: None,
        }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("kind", &self.instance.kind())
            .finish_non_exhaustive()
    }
}

/// Abstraction over how stored module bytes become a live instance.
///
/// Production uses [`NativeModuleHost`]; tests substitute a host that maps
/// bytes straight to in-process instances.
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Execute `module` and return the instance its factory produces.
    async fn instantiate(&self, module: &[u8], context: PluginContext) -> Result<LoadedModule>;
}

/// Loads modules as native dynamic libraries via a transient temp file.
pub struct NativeModuleHost;

#[async_trait]
impl ModuleHost for NativeModuleHost {
    async fn instantiate(&self, module: &[u8], context: PluginContext) -> Result<LoadedModule> {
        let bytes = module.to_vec();
        let plugin_id = context.manifest.id.clone();

        // Library::new and the factory call both block, keep them off the
        // async workers.
        tokio::task::spawn_blocking(move || load_native(&bytes, context))
            .await
            .with_context(|| format!("module load task for '{plugin_id}' did not complete"))?
    }
}

fn load_native(bytes: &[u8], context: PluginContext) -> Result<LoadedModule> {
    let mut file = tempfile::Builder::new()
        .prefix("drydock-module-")
        .suffix(std::env::consts::DLL_SUFFIX)
        .tempfile()
        .context("failed to create temporary module file")?;
    file.write_all(bytes)
        .context("failed to write module bytes")?;
    file.flush()?;

    let library = load_library(file.path())?;
    let instance = {
        let entry: Symbol<PluginEntryFn> = unsafe { library.get(ENTRY_SYMBOL) }
            .map_err(|_| PluginError::MissingEntrySymbol(context.manifest.id.clone()))?;

        let raw = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
            entry(&context as *const PluginContext)
        }))
        .map_err(|_| anyhow!("module factory panicked"))?;

        if raw.is_null() {
            bail!("module factory returned no instance");
        }
        *unsafe { Box::from_raw(raw) }
    };

    debug!(plugin_id = %context.manifest.id, "module instantiated, releasing temp file");
    // `file` drops here, deleting the temp path. The code stays mapped
    // through `library`.
    Ok(LoadedModule {
        instance,
        _library: Some(library),
    })
}

fn load_library(path: &Path) -> Result<Library> {
    unsafe { Library::new(path) }
        .with_context(|| format!("failed to load module from {}", path.display()))
}
