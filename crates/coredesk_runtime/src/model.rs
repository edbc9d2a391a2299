use coredesk_app_contract::{ApplicationId, Rect, WindowConstraints};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version written into serialized window-registry snapshots.
pub const REGISTRY_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One managed window: geometry, visibility, focus, and stacking position.
pub struct WindowRecord {
    pub id: WindowId,
    pub app_id: ApplicationId,
    pub rect: Rect,
    /// Derived from stacking position; never independently settable.
    pub z_index: u32,
    pub focused: bool,
    pub minimized: bool,
    pub maximized: bool,
    pub visible: bool,
    pub constraints: WindowConstraints,
    /// Free-form metadata attached at creation.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Caller-supplied options for window creation.
pub struct WindowOptions {
    /// Bounds; the shared fallback cascade applies when absent.
    pub rect: Option<Rect>,
    /// Constraint set; permissive defaults apply when absent.
    pub constraints: Option<WindowConstraints>,
    /// Initial metadata entries.
    pub metadata: Map<String, Value>,
}

impl WindowOptions {
    /// Options with explicit bounds.
    pub fn with_rect(rect: Rect) -> Self {
        Self {
            rect: Some(rect),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Full registry payload captured by `WindowRegistry::serialized_state`.
pub struct RegistrySnapshot {
    pub windows: Vec<WindowRecord>,
    /// Stacking order, back to front.
    pub order: Vec<WindowId>,
    pub focused: Option<WindowId>,
    /// Z-index allocation counter.
    pub next_z: u32,
    #[serde(default)]
    pub viewport: Option<Rect>,
}
