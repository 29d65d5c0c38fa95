//! Plugin lifecycle management
//!
//! The [`PluginHost`] is the single runtime object the embedding
//! application constructs at bootstrap. It owns the store, the loaded
//! plugin registry, the slot renderer table, and the middleware chains;
//! everything else in the crate is plumbing it drives.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use drydock_abi::{CoreApi, PluginContext, PluginManifest, SlotContext, SlotElement};

use crate::archive::{extract_files, extract_manifest};
use crate::error::{PluginError, PluginResult};
use crate::host::middleware::{invoke_link, ChainLink};
use crate::loader::{LoadedModule, ModuleHost, NativeModuleHost};
use crate::paths;
use crate::store::{PluginStore, StoreLocation, StoredPluginInfo};

/// Callback the embedding UI registers per slot. Invoked with the manifest
/// of the mounting plugin and the element it produced.
pub type SlotRenderer = Arc<dyn Fn(&PluginManifest, SlotElement) + Send + Sync>;

/// Host construction options.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub store: StoreLocation,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            store: StoreLocation::Disk(paths::plugins_db_path()),
        }
    }
}

struct LoadedPlugin {
    manifest: PluginManifest,
    module: Arc<LoadedModule>,
}

/// Process-wide plugin runtime.
pub struct PluginHost {
    store: PluginStore,
    api: CoreApi,
    module_host: Arc<dyn ModuleHost>,
    plugins: Mutex<HashMap<String, LoadedPlugin>>,
    slots: Mutex<HashMap<String, SlotRenderer>>,
    chains: Mutex<HashMap<String, Vec<ChainLink>>>,
}

impl PluginHost {
    /// Construct a host that loads modules as native dynamic libraries.
    pub fn new(api: CoreApi, config: HostConfig) -> Self {
        Self::with_module_host(api, config, Arc::new(NativeModuleHost))
    }

    /// Construct a host with a custom module provider.
    pub fn with_module_host(
        api: CoreApi,
        config: HostConfig,
        module_host: Arc<dyn ModuleHost>,
    ) -> Self {
        Self {
            store: PluginStore::new(config.store),
            api,
            module_host,
            plugins: Mutex::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
            chains: Mutex::new(HashMap::new()),
        }
    }

    /// Open the store and load every enabled installed plugin.
    ///
    /// A plugin that fails to load is logged and disabled so it cannot
    /// break the next startup; the failure never aborts initialization.
    pub async fn initialize(&self) -> PluginResult<()> {
        self.store.initialize()?;

        for record in self.store.installed_plugins()? {
            if !record.enabled {
                debug!(plugin_id = %record.id, "skipping disabled plugin");
                continue;
            }
            if let Err(e) = self.load_plugin(&record.id).await {
                warn!(plugin_id = %record.id, error = %e, "plugin failed to load, disabling");
                if let Err(e) = self.store.update_plugin_status(&record.id, false) {
                    warn!(plugin_id = %record.id, error = %e, "failed to disable plugin");
                }
            }
        }
        Ok(())
    }

    /// Install a plugin bundle: validate, persist, and activate it.
    ///
    /// Reinstalling an id replaces the stored record and files and swaps
    /// the running instance. Writes that succeeded before a later stage
    /// fails are not rolled back; reinstalling is the remedy.
    pub async fn install_plugin(&self, bundle: &[u8]) -> PluginResult<PluginManifest> {
        let manifest = extract_manifest(bundle)?;
        let files = extract_files(bundle)?;
        info!(plugin_id = %manifest.id, version = %manifest.version, files = files.len(), "installing plugin");

        self.store.save_plugin(&manifest, true)?;
        for (path, contents) in &files {
            self.store.save_plugin_file(&manifest.id, path, contents)?;
        }

        self.unload(&manifest.id);
        self.load_plugin(&manifest.id).await?;
        Ok(manifest)
    }

    /// Load an installed plugin into the registry. Idempotent.
    pub async fn load_plugin(&self, id: &str) -> PluginResult<()> {
        if self.plugins.lock().contains_key(id) {
            debug!(plugin_id = %id, "plugin already loaded");
            return Ok(());
        }

        let record = self
            .store
            .get_plugin(id)?
            .ok_or_else(|| PluginError::PluginNotFound(id.to_string()))?;
        let manifest = record.manifest;

        let module_bytes = self
            .store
            .get_plugin_file(id, &manifest.entry_point)?
            .ok_or_else(|| PluginError::ModuleNotFound {
                plugin: id.to_string(),
                path: manifest.entry_point.clone(),
            })?;

        let context = PluginContext {
            manifest: manifest.clone(),
            api: self.api.clone(),
        };
        let loaded = match self.module_host.instantiate(&module_bytes, context).await {
            Ok(loaded) => loaded,
            Err(cause) => {
                return Err(match cause.downcast::<PluginError>() {
                    Ok(e) => e,
                    Err(cause) => PluginError::Load {
                        plugin: id.to_string(),
                        cause,
                    },
                })
            }
        };

        if !loaded.instance.satisfies(manifest.kind) {
            return Err(PluginError::InterfaceMismatch {
                plugin: id.to_string(),
                reason: format!(
                    "manifest declares {:?} but module produced {:?}",
                    manifest.kind,
                    loaded.instance.kind()
                ),
            });
        }

        let module = Arc::new(loaded);

        if module.instance.can_process() {
            let mut chains = self.chains.lock();
            for point in manifest.declared_middleware_points() {
                chains.entry(point.clone()).or_default().push(ChainLink {
                    plugin_id: id.to_string(),
                    module: Arc::clone(&module),
                });
            }
        }

        self.plugins.lock().insert(
            id.to_string(),
            LoadedPlugin {
                manifest: manifest.clone(),
                module: Arc::clone(&module),
            },
        );

        if module.instance.can_mount() {
            for slot in manifest.declared_slots() {
                if let Err(e) = self.mount_into_slot(&manifest, &module, slot).await {
                    self.unload(id);
                    return Err(PluginError::Load {
                        plugin: id.to_string(),
                        cause: e,
                    });
                }
            }
        }

        info!(plugin_id = %id, kind = ?manifest.kind, "plugin loaded");
        Ok(())
    }

    /// Register the renderer for a slot and mount any already-loaded
    /// plugins that declare it.
    pub async fn register_slot(&self, slot: &str, renderer: SlotRenderer) {
        self.slots.lock().insert(slot.to_string(), renderer);

        let pending: Vec<(PluginManifest, Arc<LoadedModule>)> = self
            .plugins
            .lock()
            .values()
            .filter(|p| {
                p.module.instance.can_mount()
                    && p.manifest.declared_slots().iter().any(|s| s == slot)
            })
            .map(|p| (p.manifest.clone(), Arc::clone(&p.module)))
            .collect();

        for (manifest, module) in pending {
            if let Err(e) = self.mount_into_slot(&manifest, &module, slot).await {
                warn!(plugin_id = %manifest.id, slot = %slot, error = %e, "retroactive mount failed");
            }
        }
    }

    /// Run the middleware chain registered at `point` over `data`.
    ///
    /// Points with no registered middleware return the data unchanged.
    pub async fn dispatch(&self, point: &str, data: Value) -> PluginResult<Value> {
        let links = self.chains.lock().get(point).cloned().unwrap_or_default();
        debug!(point = %point, links = links.len(), "dispatching middleware chain");

        invoke_link(
            Arc::new(links),
            0,
            point.to_string(),
            self.api.clone(),
            data,
        )
        .await
        .map_err(|cause| PluginError::Dispatch {
            point: point.to_string(),
            cause,
        })
    }

    /// Mark a plugin enabled and load it if it is not already running.
    pub async fn enable_plugin(&self, id: &str) -> PluginResult<()> {
        self.store.update_plugin_status(id, true)?;
        self.load_plugin(id).await
    }

    /// Mark a plugin disabled.
    ///
    /// An already-loaded plugin stays active for the rest of the session;
    /// the flag takes effect on the next startup.
    pub fn disable_plugin(&self, id: &str) -> PluginResult<()> {
        self.store.update_plugin_status(id, false)
    }

    /// Uninstall a plugin: deactivate it and delete its stored record and
    /// files.
    pub async fn remove_plugin(&self, id: &str) -> PluginResult<()> {
        if let Some(removed) = self.unload(id) {
            if removed.module.instance.can_mount() {
                for slot in removed.manifest.declared_slots() {
                    if let Err(e) = removed.module.instance.unmount(slot).await {
                        warn!(plugin_id = %id, slot = %slot, error = %e, "unmount during removal failed");
                    }
                }
            }
        }

        self.store.delete_plugin_files(id)?;
        self.store.delete_plugin(id)?;
        info!(plugin_id = %id, "plugin removed");
        Ok(())
    }

    /// Whether a plugin is currently active in this process.
    pub fn is_loaded(&self, id: &str) -> bool {
        self.plugins.lock().contains_key(id)
    }

    /// Manifests of every currently loaded plugin.
    pub fn loaded_plugins(&self) -> Vec<PluginManifest> {
        self.plugins
            .lock()
            .values()
            .map(|p| p.manifest.clone())
            .collect()
    }

    /// Stored records of every installed plugin.
    pub fn installed_plugins(&self) -> PluginResult<Vec<StoredPluginInfo>> {
        self.store.installed_plugins()
    }

    /// The underlying persistence manager.
    pub fn store(&self) -> &PluginStore {
        &self.store
    }

    /// Drop a plugin from the registry and its middleware chains.
    fn unload(&self, id: &str) -> Option<LoadedPlugin> {
        let removed = self.plugins.lock().remove(id);
        if removed.is_some() {
            let mut chains = self.chains.lock();
            for links in chains.values_mut() {
                links.retain(|link| link.plugin_id != id);
            }
        }
        removed
    }

    async fn mount_into_slot(
        &self,
        manifest: &PluginManifest,
        module: &Arc<LoadedModule>,
        slot: &str,
    ) -> anyhow::Result<()> {
        let Some(renderer) = self.slots.lock().get(slot).cloned() else {
            debug!(plugin_id = %manifest.id, slot = %slot, "slot not registered, mount deferred");
            return Ok(());
        };

        // Clear any previous mount before rendering the new one.
        module.instance.unmount(slot).await?;
        let element = module
            .instance
            .mount(SlotContext {
                slot: slot.to_string(),
                api: self.api.clone(),
            })
            .await?;
        renderer(manifest, element);
        debug!(plugin_id = %manifest.id, slot = %slot, "plugin mounted");
        Ok(())
    }
}
