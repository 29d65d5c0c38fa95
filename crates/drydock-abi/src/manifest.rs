//! Manifest schema.
//!
//! The wire form is the JSON document at the root of every plugin bundle
//! (`plugin.json`), with camelCase keys.

use serde::{Deserialize, Serialize};

/// Functional category a plugin declares in its manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Ui,
    Middleware,
    Hybrid,
}

impl PluginKind {
    /// Whether plugins of this kind mount UI into slots.
    pub fn mounts_ui(self) -> bool {
        matches!(self, PluginKind::Ui | PluginKind::Hybrid)
    }

    /// Whether plugins of this kind participate in middleware chains.
    pub fn processes_middleware(self) -> bool {
        matches!(self, PluginKind::Middleware | PluginKind::Hybrid)
    }
}

/// Declarative descriptor of a plugin's identity, type, and extension points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Stable unique identity; also the namespace for stored files.
    pub id: String,
    /// Informational version string.
    pub version: String,
    #[serde(rename = "type")]
    pub kind: PluginKind,
    /// Path of the module to load, relative to the bundle root.
    pub entry_point: String,
    /// Requested capabilities. Declared, not enforced, by the host core.
    pub permissions: Vec<String>,
    /// Slot identifiers this plugin renders into (ui/hybrid plugins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<String>>,
    /// Interception points this plugin processes (middleware/hybrid plugins).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware_points: Option<Vec<String>>,
}

impl PluginManifest {
    /// Declared slots, empty when none were declared.
    pub fn declared_slots(&self) -> &[String] {
        self.slots.as_deref().unwrap_or_default()
    }

    /// Declared middleware points, empty when none were declared.
    pub fn declared_middleware_points(&self) -> &[String] {
        self.middleware_points.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_camel_case_wire_form() {
        let raw = r#"{
            "id": "demo",
            "version": "1.0.0",
            "type": "hybrid",
            "entryPoint": "index.bin",
            "permissions": ["fs:read"],
            "slots": ["sidebar"],
            "middlewarePoints": ["pre-save"]
        }"#;

        let manifest: PluginManifest = serde_json::from_str(raw).expect("parse manifest");
        assert_eq!(manifest.id, "demo");
        assert_eq!(manifest.kind, PluginKind::Hybrid);
        assert_eq!(manifest.entry_point, "index.bin");
        assert_eq!(manifest.declared_slots(), ["sidebar".to_string()]);
        assert_eq!(
            manifest.declared_middleware_points(),
            ["pre-save".to_string()]
        );

        let encoded = serde_json::to_value(&manifest).expect("encode manifest");
        assert_eq!(encoded["entryPoint"], "index.bin");
        assert_eq!(encoded["type"], "hybrid");
        assert_eq!(encoded["middlewarePoints"][0], "pre-save");
    }

    #[test]
    fn optional_extension_points_default_to_empty() {
        let raw = r#"{
            "id": "mw",
            "version": "0.1.0",
            "type": "middleware",
            "entryPoint": "mw.bin",
            "permissions": []
        }"#;

        let manifest: PluginManifest = serde_json::from_str(raw).expect("parse manifest");
        assert!(manifest.declared_slots().is_empty());
        assert!(manifest.declared_middleware_points().is_empty());

        let encoded = serde_json::to_string(&manifest).expect("encode manifest");
        assert!(!encoded.contains("slots"));
    }

    #[test]
    fn kind_capability_helpers() {
        assert!(PluginKind::Ui.mounts_ui());
        assert!(!PluginKind::Ui.processes_middleware());
        assert!(PluginKind::Middleware.processes_middleware());
        assert!(!PluginKind::Middleware.mounts_ui());
        assert!(PluginKind::Hybrid.mounts_ui());
        assert!(PluginKind::Hybrid.processes_middleware());
    }
}
