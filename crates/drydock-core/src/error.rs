//! Error types for the plugin runtime

use thiserror::Error;

pub type PluginResult<T> = Result<T, PluginError>;

/// Errors surfaced by plugin installation, storage, loading, and dispatch.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The bundle has no `plugin.json` at its root.
    #[error("bundle does not contain a plugin.json manifest")]
    ManifestMissing,

    /// The manifest parsed as JSON but fails the structural contract.
    #[error("invalid plugin manifest: {0}")]
    ManifestInvalid(String),

    /// A bundle entry could not be read out of the archive.
    #[error("failed to extract bundle entry '{entry}': {cause}")]
    ArchiveEntry { entry: String, cause: anyhow::Error },

    /// No installed plugin record under this id.
    #[error("plugin '{0}' is not installed")]
    PluginNotFound(String),

    /// The stored bundle has no file at the manifest's entry point.
    #[error("plugin '{plugin}' has no stored module at entry point '{path}'")]
    ModuleNotFound { plugin: String, path: String },

    /// The loaded module does not expose a plugin entry point.
    #[error("module for plugin '{0}' does not expose a plugin entry point")]
    MissingEntrySymbol(String),

    /// The instantiated module does not carry the capabilities its
    /// manifest declares.
    #[error("plugin '{plugin}' does not satisfy its declared interface: {reason}")]
    InterfaceMismatch { plugin: String, reason: String },

    /// Store methods were called before `initialize`.
    #[error("plugin store has not been initialized")]
    StoreUninitialized,

    /// The store database could not be opened.
    #[error("failed to open plugin store: {0}")]
    StoreOpen(anyhow::Error),

    /// Module instantiation failed.
    #[error("failed to load plugin '{plugin}': {cause}")]
    Load { plugin: String, cause: anyhow::Error },

    /// A middleware chain returned an error.
    #[error("middleware dispatch at '{point}' failed: {cause}")]
    Dispatch { point: String, cause: anyhow::Error },

    /// A stored record no longer decodes.
    #[error("stored record for plugin '{plugin}' is corrupt: {cause}")]
    CorruptRecord { plugin: String, cause: anyhow::Error },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
