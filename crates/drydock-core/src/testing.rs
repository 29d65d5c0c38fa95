//! Shared fixtures for unit tests

use std::collections::HashMap;
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use drydock_abi::{
    CoreApi, MiddlewareContext, MiddlewarePlugin, PluginContext, PluginInstance, Sandbox,
    SandboxEvent, SlotContext, SlotElement, UiPlugin, Workbench,
};

use crate::loader::{LoadedModule, ModuleHost};

/// Sandbox that accepts every call and emits no events.
pub struct NullSandbox {
    events: broadcast::Sender<SandboxEvent>,
}

impl Default for NullSandbox {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { events }
    }
}

#[async_trait]
impl Sandbox for NullSandbox {
    async fn spawn(&self, _command: &str, _args: &[String]) -> Result<i32> {
        Ok(0)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        bail!("no file '{path}' in test sandbox")
    }

    async fn write_file(&self, _path: &str, _contents: &[u8]) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SandboxEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct NullWorkbench {
    selected: Mutex<Option<String>>,
}

impl Workbench for NullWorkbench {
    fn selected_file(&self) -> Option<String> {
        self.selected.lock().clone()
    }

    fn set_selected_file(&self, path: Option<String>) {
        *self.selected.lock() = path;
    }

    fn toggle_terminal(&self, _visible: bool) {}

    fn set_show_workbench(&self, _visible: bool) {}

    fn save_all(&self) -> Result<()> {
        Ok(())
    }
}

pub fn test_api() -> CoreApi {
    CoreApi {
        sandbox: Arc::new(NullSandbox::default()),
        workbench: Arc::new(NullWorkbench::default()),
    }
}

type Factory = Arc<dyn Fn(PluginContext) -> PluginInstance + Send + Sync>;

/// Module provider that maps stored bytes (interpreted as a UTF-8 token)
/// to registered in-process factories.
#[derive(Default)]
pub struct FixtureModuleHost {
    factories: Mutex<HashMap<String, Factory>>,
}

impl FixtureModuleHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, token: &str, factory: F)
    where
        F: Fn(PluginContext) -> PluginInstance + Send + Sync + 'static,
    {
        self.factories
            .lock()
            .insert(token.to_string(), Arc::new(factory));
    }
}

#[async_trait]
impl ModuleHost for FixtureModuleHost {
    async fn instantiate(&self, module: &[u8], context: PluginContext) -> Result<LoadedModule> {
        let token = std::str::from_utf8(module)
            .context("fixture module token is not UTF-8")?
            .trim()
            .to_string();
        let factory = self
            .factories
            .lock()
            .get(&token)
            .cloned()
            .with_context(|| format!("no fixture module registered for token '{token}'"))?;
        Ok(LoadedModule::from_instance(factory(context)))
    }
}

#[derive(Default)]
pub struct MountCounters {
    pub mounts: AtomicUsize,
    pub unmounts: AtomicUsize,
}

/// UI plugin that counts mounts and unmounts.
pub struct RecordingUiPlugin {
    label: String,
    counters: Arc<MountCounters>,
}

impl RecordingUiPlugin {
    pub fn instance(label: &str, counters: Arc<MountCounters>) -> PluginInstance {
        PluginInstance::Ui(Box::new(Self {
            label: label.to_string(),
            counters,
        }))
    }
}

#[async_trait]
impl UiPlugin for RecordingUiPlugin {
    async fn mount(&self, cx: SlotContext) -> Result<SlotElement> {
        self.counters.mounts.fetch_add(1, Ordering::SeqCst);
        Ok(SlotElement::Text(format!("{} in {}", self.label, cx.slot)))
    }

    async fn unmount(&self, _slot_id: &str) -> Result<()> {
        self.counters.unmounts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Middleware that appends its tag to a `trail` array and continues.
pub struct TaggingMiddleware {
    tag: String,
}

impl TaggingMiddleware {
    pub fn instance(tag: &str) -> PluginInstance {
        PluginInstance::Middleware(Box::new(Self {
            tag: tag.to_string(),
        }))
    }
}

#[async_trait]
impl MiddlewarePlugin for TaggingMiddleware {
    async fn process(&self, cx: MiddlewareContext) -> Result<Value> {
        let mut data = cx.data;
        match data.get_mut("trail").and_then(Value::as_array_mut) {
            Some(trail) => trail.push(json!(self.tag)),
            None => {
                data["trail"] = json!([self.tag]);
            }
        }
        cx.next.run(data).await
    }
}

enum HaltBehavior {
    Return(Value),
    Fail(String),
}

/// Middleware that never invokes its continuation.
pub struct HaltingMiddleware {
    behavior: HaltBehavior,
}

impl HaltingMiddleware {
    /// Terminate the chain with a fixed result.
    pub fn instance(result: Value) -> PluginInstance {
        PluginInstance::Middleware(Box::new(Self {
            behavior: HaltBehavior::Return(result),
        }))
    }

    /// Fail the chain with `message`.
    pub fn failing_instance(message: &str) -> PluginInstance {
        PluginInstance::Middleware(Box::new(Self {
            behavior: HaltBehavior::Fail(message.to_string()),
        }))
    }
}

#[async_trait]
impl MiddlewarePlugin for HaltingMiddleware {
    async fn process(&self, _cx: MiddlewareContext) -> Result<Value> {
        match &self.behavior {
            HaltBehavior::Return(result) => Ok(result.clone()),
            HaltBehavior::Fail(message) => bail!("{message}"),
        }
    }
}

/// Build a zip bundle with the manifest at the root plus `files`.
pub fn bundle(manifest: &Value, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();
        writer
            .start_file("plugin.json", options)
            .expect("start manifest entry");
        writer
            .write_all(serde_json::to_string(manifest).expect("encode manifest").as_bytes())
            .expect("write manifest entry");
        for (path, contents) in files {
            writer.start_file(*path, options).expect("start file entry");
            writer.write_all(contents).expect("write file entry");
        }
        writer.finish().expect("finish bundle");
    }
    buffer.into_inner()
}

/// Minimal valid manifest document with `index.bin` as the entry point.
pub fn manifest_json(id: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "version": "1.0.0",
        "type": kind,
        "entryPoint": "index.bin",
        "permissions": []
    })
}
