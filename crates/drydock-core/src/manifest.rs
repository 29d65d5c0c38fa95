//! Manifest validation
//!
//! Structural checks applied to the raw `plugin.json` document before it is
//! deserialized. Validation rejects bundles at install time so the store
//! never holds a record the loader cannot act on.

use serde_json::Value;

use drydock_abi::PluginManifest;

use crate::error::{PluginError, PluginResult};

const KNOWN_KINDS: [&str; 3] = ["ui", "middleware", "hybrid"];

/// Check that `raw` carries every field the plugin contract requires.
///
/// `slots` and `middlewarePoints` are optional; when present (and not
/// `null`) they must be arrays of strings. Returns the first violation
/// found.
pub fn validate_manifest(raw: &Value) -> PluginResult<()> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("manifest is not a JSON object"))?;

    for field in ["id", "version", "entryPoint"] {
        let value = obj
            .get(field)
            .ok_or_else(|| invalid(&format!("missing required field '{field}'")))?;
        match value.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(invalid(&format!("field '{field}' must be a non-empty string"))),
        }
    }

    match obj.get("type").and_then(Value::as_str) {
        Some(kind) if KNOWN_KINDS.contains(&kind) => {}
        Some(kind) => {
            return Err(invalid(&format!(
                "unknown plugin type '{kind}' (expected ui, middleware, or hybrid)"
            )))
        }
        None => return Err(invalid("field 'type' must be a string")),
    }

    match obj.get("permissions") {
        Some(Value::Array(entries)) => {
            if entries.iter().any(|e| !e.is_string()) {
                return Err(invalid("field 'permissions' must contain only strings"));
            }
        }
        _ => return Err(invalid("field 'permissions' must be an array")),
    }

    for field in ["slots", "middlewarePoints"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                if entries.iter().any(|e| !e.is_string()) {
                    return Err(invalid(&format!("field '{field}' must contain only strings")));
                }
            }
            Some(_) => {
                return Err(invalid(&format!("field '{field}' must be an array of strings")))
            }
        }
    }

    Ok(())
}

/// Parse and validate manifest bytes into the typed schema.
pub fn parse_manifest(bytes: &[u8]) -> PluginResult<PluginManifest> {
    let raw: Value = serde_json::from_slice(bytes)
        .map_err(|e| invalid(&format!("manifest is not valid JSON: {e}")))?;
    validate_manifest(&raw)?;
    let manifest = serde_json::from_value(raw)?;
    Ok(manifest)
}

fn invalid(reason: &str) -> PluginError {
    PluginError::ManifestInvalid(reason.to_string())
}
