//! Persistence layer
//!
//! SQLite-based storage for:
//! - Installed plugin records (manifest, version, enabled flag)
//! - Extracted bundle files, keyed by plugin id and bundle path
//! - Host metadata key/value pairs

mod database;

pub use database::Database;

use std::path::PathBuf;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use drydock_abi::PluginManifest;

use crate::error::{PluginError, PluginResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS plugins (
    id           TEXT PRIMARY KEY,
    version      TEXT NOT NULL,
    manifest     TEXT NOT NULL,
    installed_at TEXT NOT NULL,
    enabled      INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS plugin_files (
    plugin_id TEXT NOT NULL,
    path      TEXT NOT NULL,
    contents  BLOB NOT NULL,
    PRIMARY KEY (plugin_id, path)
);

CREATE TABLE IF NOT EXISTS host_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Where the store keeps its database.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    Disk(PathBuf),
    /// Volatile storage, used by tests and ephemeral hosts.
    Memory,
}

/// Installed plugin record as persisted.
#[derive(Debug, Clone)]
pub struct StoredPluginInfo {
    pub id: String,
    pub version: String,
    pub manifest: PluginManifest,
    pub installed_at: DateTime<Utc>,
    pub enabled: bool,
}

/// Plugin persistence manager.
///
/// Methods other than [`initialize`](Self::initialize) fail with
/// [`PluginError::StoreUninitialized`] until the database has been opened.
pub struct PluginStore {
    location: StoreLocation,
    db: RwLock<Option<Database>>,
}

impl PluginStore {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            db: RwLock::new(None),
        }
    }

    /// Open the database and apply the schema. Idempotent.
    pub fn initialize(&self) -> PluginResult<()> {
        if self.db.read().is_some() {
            return Ok(());
        }
        let db = match &self.location {
            StoreLocation::Disk(path) => Database::open(path),
            StoreLocation::Memory => Database::open_in_memory(),
        }
        .map_err(PluginError::StoreOpen)?;
        db.conn().execute_batch(SCHEMA)?;
        *self.db.write() = Some(db);
        Ok(())
    }

    fn db(&self) -> PluginResult<Database> {
        self.db
            .read()
            .clone()
            .ok_or(PluginError::StoreUninitialized)
    }

    /// Insert or replace the record for a plugin.
    pub fn save_plugin(&self, manifest: &PluginManifest, enabled: bool) -> PluginResult<()> {
        let db = self.db()?;
        let encoded = serde_json::to_string(manifest)?;
        let now = Utc::now().to_rfc3339();
        db.conn().execute(
            "INSERT INTO plugins (id, version, manifest, installed_at, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 version = excluded.version,
                 manifest = excluded.manifest,
                 installed_at = excluded.installed_at,
                 enabled = excluded.enabled",
            params![manifest.id, manifest.version, encoded, now, enabled],
        )?;
        Ok(())
    }

    /// Fetch one plugin record, or `None` when not installed.
    pub fn get_plugin(&self, id: &str) -> PluginResult<Option<StoredPluginInfo>> {
        let db = self.db()?;
        let conn = db.conn();
        let row = conn
            .query_row(
                "SELECT id, version, manifest, installed_at, enabled
                 FROM plugins WHERE id = ?1",
                [id],
                Self::map_plugin_row,
            )
            .optional()?;
        row.map(Self::decode_plugin_row).transpose()
    }

    /// All installed plugin records, oldest install first.
    pub fn installed_plugins(&self) -> PluginResult<Vec<StoredPluginInfo>> {
        let db = self.db()?;
        let conn = db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, version, manifest, installed_at, enabled
             FROM plugins ORDER BY installed_at ASC",
        )?;
        let rows = stmt
            .query_map([], Self::map_plugin_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::decode_plugin_row).collect()
    }

    /// Flip the enabled flag on an installed plugin.
    pub fn update_plugin_status(&self, id: &str, enabled: bool) -> PluginResult<()> {
        let db = self.db()?;
        let changed = db.conn().execute(
            "UPDATE plugins SET enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        if changed == 0 {
            return Err(PluginError::PluginNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete a plugin record. Stored files are removed separately via
    /// [`delete_plugin_files`](Self::delete_plugin_files).
    pub fn delete_plugin(&self, id: &str) -> PluginResult<()> {
        let db = self.db()?;
        db.conn()
            .execute("DELETE FROM plugins WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Persist one extracted bundle file under the plugin's namespace.
    pub fn save_plugin_file(&self, plugin_id: &str, path: &str, contents: &[u8]) -> PluginResult<()> {
        let db = self.db()?;
        db.conn().execute(
            "INSERT INTO plugin_files (plugin_id, path, contents)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(plugin_id, path) DO UPDATE SET contents = excluded.contents",
            params![plugin_id, path, contents],
        )?;
        Ok(())
    }

    /// Fetch one stored file, or `None` when absent.
    pub fn get_plugin_file(&self, plugin_id: &str, path: &str) -> PluginResult<Option<Vec<u8>>> {
        let db = self.db()?;
        let conn = db.conn();
        let contents = conn
            .query_row(
                "SELECT contents FROM plugin_files WHERE plugin_id = ?1 AND path = ?2",
                params![plugin_id, path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(contents)
    }

    /// Paths of every stored file belonging to a plugin.
    pub fn plugin_file_paths(&self, plugin_id: &str) -> PluginResult<Vec<String>> {
        let db = self.db()?;
        let conn = db.conn();
        let mut stmt =
            conn.prepare("SELECT path FROM plugin_files WHERE plugin_id = ?1 ORDER BY path")?;
        let paths = stmt
            .query_map([plugin_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    /// Remove every stored file belonging to a plugin.
    ///
    /// Enumerates the plugin's files first and deletes them individually,
    /// so a failure part-way leaves the remainder enumerable.
    pub fn delete_plugin_files(&self, plugin_id: &str) -> PluginResult<()> {
        let paths = self.plugin_file_paths(plugin_id)?;
        let db = self.db()?;
        let conn = db.conn();
        for path in paths {
            conn.execute(
                "DELETE FROM plugin_files WHERE plugin_id = ?1 AND path = ?2",
                params![plugin_id, path],
            )?;
        }
        Ok(())
    }

    /// Store a host metadata value under `key`.
    pub fn save_metadata(&self, key: &str, value: &Value) -> PluginResult<()> {
        let db = self.db()?;
        let encoded = serde_json::to_string(value)?;
        db.conn().execute(
            "INSERT INTO host_metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, encoded],
        )?;
        Ok(())
    }

    /// Fetch a host metadata value, or `None` when unset.
    pub fn get_metadata(&self, key: &str) -> PluginResult<Option<Value>> {
        let db = self.db()?;
        let conn = db.conn();
        let encoded: Option<String> = conn
            .query_row("SELECT value FROM host_metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        encoded
            .map(|s| serde_json::from_str(&s).map_err(Into::into))
            .transpose()
    }

    fn map_plugin_row(
        row: &rusqlite::Row,
    ) -> rusqlite::Result<(String, String, String, String, bool)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn decode_plugin_row(
        (id, version, manifest, installed_at, enabled): (String, String, String, String, bool),
    ) -> PluginResult<StoredPluginInfo> {
        let manifest: PluginManifest =
            serde_json::from_str(&manifest).map_err(|e| PluginError::CorruptRecord {
                plugin: id.clone(),
                cause: anyhow!("invalid manifest column: {e}"),
            })?;
        let installed_at = DateTime::parse_from_rfc3339(&installed_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| PluginError::CorruptRecord {
                plugin: id.clone(),
                cause: anyhow!("invalid installed_at timestamp: {e}"),
            })?;
        Ok(StoredPluginInfo {
            id,
            version,
            manifest,
            installed_at,
            enabled,
        })
    }
}
