//! Snapshot envelope encode/decode for window-registry persistence.
//!
//! Snapshots are schema-versioned so older payloads can be migrated; an
//! unknown version is a recoverable error, never a partial load.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{RegistrySnapshot, REGISTRY_SNAPSHOT_SCHEMA_VERSION};

#[derive(Debug, Error)]
/// Errors surfaced while encoding or decoding a registry snapshot.
pub enum SnapshotError {
    /// The blob is not valid JSON for the envelope or payload shape.
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    /// The envelope declares a schema no migration covers.
    #[error("unsupported snapshot schema version {0}")]
    UnsupportedSchema(u32),
    /// The payload decoded but violates a registry invariant.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    schema_version: u32,
    payload: Value,
}

/// Serializes a registry snapshot into an opaque blob.
pub fn encode_snapshot(snapshot: &RegistrySnapshot) -> Result<String, SnapshotError> {
    let envelope = SnapshotEnvelope {
        schema_version: REGISTRY_SNAPSHOT_SCHEMA_VERSION,
        payload: serde_json::to_value(snapshot)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decodes and validates a snapshot blob.
pub fn decode_snapshot(raw: &str) -> Result<RegistrySnapshot, SnapshotError> {
    let envelope: SnapshotEnvelope = serde_json::from_str(raw)?;
    let snapshot = match migrate_snapshot(envelope.schema_version, &envelope.payload)? {
        Some(snapshot) => snapshot,
        None => return Err(SnapshotError::UnsupportedSchema(envelope.schema_version)),
    };
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

fn migrate_snapshot(
    schema_version: u32,
    payload: &Value,
) -> Result<Option<RegistrySnapshot>, SnapshotError> {
    match schema_version {
        REGISTRY_SNAPSHOT_SCHEMA_VERSION => Ok(Some(serde_json::from_value(payload.clone())?)),
        _ => Ok(None),
    }
}

fn validate_snapshot(snapshot: &RegistrySnapshot) -> Result<(), SnapshotError> {
    let mut ids = HashSet::new();
    for window in &snapshot.windows {
        if !ids.insert(window.id) {
            return Err(SnapshotError::Corrupt(format!(
                "duplicate window record {}",
                window.id
            )));
        }
    }

    if snapshot.order.len() != snapshot.windows.len() {
        return Err(SnapshotError::Corrupt(
            "stacking order does not cover the window set".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for id in &snapshot.order {
        if !ids.contains(id) {
            return Err(SnapshotError::Corrupt(format!(
                "stacking order references unknown {id}"
            )));
        }
        if !seen.insert(*id) {
            return Err(SnapshotError::Corrupt(format!(
                "stacking order repeats {id}"
            )));
        }
    }

    if let Some(focused) = snapshot.focused {
        let Some(record) = snapshot.windows.iter().find(|w| w.id == focused) else {
            return Err(SnapshotError::Corrupt(format!(
                "focused {focused} is not a live window"
            )));
        };
        if record.minimized || !record.visible {
            return Err(SnapshotError::Corrupt(format!(
                "focused {focused} is not eligible for focus"
            )));
        }
    }

    Ok(())
}
