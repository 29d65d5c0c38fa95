//! Plugin capability traits and the activated instance shape.

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::{CoreApi, PluginKind, PluginManifest};

/// Renderable returned from [`UiPlugin::mount`].
///
/// The host's slot callback decides how to draw it; the plugin runtime only
/// carries it.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotElement {
    Text(String),
    Html(String),
    /// A host-defined component reference with its properties.
    Component { name: String, props: Value },
}

/// Context passed to [`UiPlugin::mount`].
#[derive(Clone)]
pub struct SlotContext {
    /// Slot the plugin is being mounted into.
    pub slot: String,
    pub api: CoreApi,
}

/// Context passed to [`MiddlewarePlugin::process`].
pub struct MiddlewareContext {
    /// Interception point being dispatched.
    pub point: String,
    pub data: Value,
    pub api: CoreApi,
    /// Continuation to the rest of the chain.
    pub next: Next,
}

/// Continuation handed to a middleware plugin.
///
/// Each continuation is constructed knowing its successor's position in the
/// chain, so the same plugin may appear twice at one point without confusing
/// the lookup. Invoked from the chain tail it returns the data unchanged.
pub struct Next(Box<dyn FnOnce(Value) -> BoxFuture<'static, Result<Value>> + Send>);

impl Next {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce(Value) -> BoxFuture<'static, Result<Value>> + Send + 'static,
    {
        Self(Box::new(run))
    }

    /// Hand `data` to the next handler in the chain.
    pub async fn run(self, data: Value) -> Result<Value> {
        (self.0)(data).await
    }
}

/// UI mounting capability.
#[async_trait]
pub trait UiPlugin: Send + Sync {
    /// Produce a renderable for the slot named in `cx`.
    async fn mount(&self, cx: SlotContext) -> Result<SlotElement>;

    /// Tear down a previous mount.
    ///
    /// Called before every mount; must be a no-op when nothing is currently
    /// mounted at `slot_id`.
    async fn unmount(&self, slot_id: &str) -> Result<()>;
}

/// Data interception capability.
#[async_trait]
pub trait MiddlewarePlugin: Send + Sync {
    /// Observe or transform `cx.data`.
    ///
    /// Call `cx.next.run(data)` to continue the chain, or return without
    /// doing so to terminate it.
    async fn process(&self, cx: MiddlewareContext) -> Result<Value>;
}

/// Both capabilities; implemented automatically for any type carrying both.
pub trait HybridPlugin: UiPlugin + MiddlewarePlugin {}

impl<T: UiPlugin + MiddlewarePlugin> HybridPlugin for T {}

/// Everything the host hands a module factory at instantiation time.
#[derive(Clone)]
pub struct PluginContext {
    pub manifest: PluginManifest,
    pub api: CoreApi,
}

/// An executed plugin object, tagged by the capability set it carries.
///
/// The discriminant is checked against the manifest's declared kind at load
/// time; the runtime then dispatches exhaustively instead of probing for
/// methods.
pub enum PluginInstance {
    Ui(Box<dyn UiPlugin>),
    Middleware(Box<dyn MiddlewarePlugin>),
    Hybrid(Box<dyn HybridPlugin>),
}

impl PluginInstance {
    /// Capability shape of the executed object.
    pub fn kind(&self) -> PluginKind {
        match self {
            PluginInstance::Ui(_) => PluginKind::Ui,
            PluginInstance::Middleware(_) => PluginKind::Middleware,
            PluginInstance::Hybrid(_) => PluginKind::Hybrid,
        }
    }

    pub fn can_mount(&self) -> bool {
        matches!(self, PluginInstance::Ui(_) | PluginInstance::Hybrid(_))
    }

    pub fn can_process(&self) -> bool {
        matches!(self, PluginInstance::Middleware(_) | PluginInstance::Hybrid(_))
    }

    /// Whether this instance carries every capability `declared` requires.
    pub fn satisfies(&self, declared: PluginKind) -> bool {
        match declared {
            PluginKind::Ui => self.can_mount(),
            PluginKind::Middleware => self.can_process(),
            PluginKind::Hybrid => self.can_mount() && self.can_process(),
        }
    }

    /// Mount into a slot. Fails for instances without UI capability.
    pub async fn mount(&self, cx: SlotContext) -> Result<SlotElement> {
        match self {
            PluginInstance::Ui(plugin) => plugin.mount(cx).await,
            PluginInstance::Hybrid(plugin) => plugin.mount(cx).await,
            PluginInstance::Middleware(_) => bail!("plugin does not implement UI mounting"),
        }
    }

    /// Tear down a slot mount. Fails for instances without UI capability.
    pub async fn unmount(&self, slot_id: &str) -> Result<()> {
        match self {
            PluginInstance::Ui(plugin) => plugin.unmount(slot_id).await,
            PluginInstance::Hybrid(plugin) => plugin.unmount(slot_id).await,
            PluginInstance::Middleware(_) => bail!("plugin does not implement UI mounting"),
        }
    }

    /// Process middleware data. Fails for instances without the capability.
    pub async fn process(&self, cx: MiddlewareContext) -> Result<Value> {
        match self {
            PluginInstance::Middleware(plugin) => plugin.process(cx).await,
            PluginInstance::Hybrid(plugin) => plugin.process(cx).await,
            PluginInstance::Ui(_) => bail!("plugin does not implement middleware processing"),
        }
    }
}

/// Exports the factory symbol the Drydock module loader resolves.
///
/// The factory receives the [`PluginContext`] (manifest plus capability
/// object) and returns the [`PluginInstance`] to activate.
///
/// ```ignore
/// use drydock_abi::{register_plugin, PluginContext, PluginInstance};
///
/// register_plugin!(|context: PluginContext| {
///     PluginInstance::Ui(Box::new(SidebarPanel::new(context)))
/// });
/// ```
#[macro_export]
macro_rules! register_plugin {
    ($factory:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn drydock_plugin_entry(
            context: *const $crate::PluginContext,
        ) -> *mut $crate::PluginInstance {
            let context = unsafe { &*context };
            let instance: $crate::PluginInstance = ($factory)(context.clone());
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(instance))
        }
    };
}
