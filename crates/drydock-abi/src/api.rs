//! Host capabilities handed to every plugin invocation.
//!
//! The plugin runtime passes these through unmodified; both handles are
//! supplied by the embedding host at bootstrap.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// Events surfaced by the execution sandbox.
///
/// Plugins subscribe to these directly; the plugin runtime does not mediate
/// them.
#[derive(Debug, Clone)]
pub enum SandboxEvent {
    /// A port opened or closed inside the sandbox.
    Port { port: u16, open: bool, url: String },
    /// A dev server inside the sandbox is accepting connections.
    ServerReady { port: u16, url: String },
    /// Message posted from a preview frame.
    Preview(Value),
    Error(String),
}

/// Command-execution and file-access sandbox.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Spawn a command inside the sandbox and wait for its exit code.
    async fn spawn(&self, command: &str, args: &[String]) -> Result<i32>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Subscribe to sandbox lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<SandboxEvent>;
}

/// Synchronous view of workbench state.
pub trait Workbench: Send + Sync {
    fn selected_file(&self) -> Option<String>;

    fn set_selected_file(&self, path: Option<String>);

    fn toggle_terminal(&self, visible: bool);

    fn set_show_workbench(&self, visible: bool);

    /// Persist every open document to disk.
    fn save_all(&self) -> Result<()>;
}

/// Fixed set of host capabilities available to plugins.
#[derive(Clone)]
pub struct CoreApi {
    pub sandbox: Arc<dyn Sandbox>,
    pub workbench: Arc<dyn Workbench>,
}
