//! Shared contract types between the desktop runtime and managed applications.
//!
//! Applications describe themselves through an immutable [`AppManifest`] and
//! provide their runtime behavior as an [`AppComponent`]: a render function
//! plus optional async lifecycle hooks. The runtime never requires any hook
//! to be present.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Stable identifier for one running application session.
///
/// Distinct from [`ApplicationId`]: a manifest may own any number of
/// instances over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance:{}", self.0)
    }
}

/// Stable identifier for an installable application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Returns an app identifier when `raw` conforms to the
    /// `segment.segment...` policy.
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        if is_valid_application_id(&raw) {
            Ok(Self(raw))
        } else {
            Err(format!(
                "invalid application id `{raw}`; expected namespaced dotted segments"
            ))
        }
    }

    /// Returns the string form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creates an id without validation for compile-time/runtime trusted constants.
    pub fn trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_valid_application_id(raw: &str) -> bool {
    if raw.is_empty() || raw.len() > 120 {
        return false;
    }

    let mut count = 0usize;
    for part in raw.split('.') {
        count += 1;
        if part.is_empty() || part.len() > 32 {
            return false;
        }
        let bytes = part.as_bytes();
        if !bytes[0].is_ascii_lowercase() {
            return false;
        }
        if !bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        {
            return false;
        }
        if part.ends_with('-') {
            return false;
        }
    }

    count >= 2
}

/// Rectangle in desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

/// Default managed window width.
pub const DEFAULT_WINDOW_WIDTH: i32 = 420;
/// Default managed window height.
pub const DEFAULT_WINDOW_HEIGHT: i32 = 300;

impl Rect {
    /// Returns the rect translated by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Returns the rect with width/height raised to at least `min`.
    pub fn clamped_min(self, min: Size) -> Self {
        Self {
            w: self.w.max(min.w),
            h: self.h.max(min.h),
            ..self
        }
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            x: 48,
            y: 48,
            w: DEFAULT_WINDOW_WIDTH,
            h: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

/// Width/height pair used for size constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

/// Minimum size floor applied to every managed window.
pub const MIN_WINDOW_SIZE: Size = Size { w: 220, h: 140 };

/// Per-window permission and size constraint set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConstraints {
    /// Whether the window may be moved.
    pub movable: bool,
    /// Whether the window may be resized.
    pub resizable: bool,
    /// Whether the window may be minimized.
    pub minimizable: bool,
    /// Whether the window may be maximized.
    pub maximizable: bool,
    /// Whether the window may be closed through shell chrome.
    pub closable: bool,
    /// Smallest size a resize may commit.
    pub min_size: Size,
    /// Largest size a resize may commit, unbounded when absent.
    pub max_size: Option<Size>,
}

impl Default for WindowConstraints {
    fn default() -> Self {
        Self {
            movable: true,
            resizable: true,
            minimizable: true,
            maximizable: true,
            closable: true,
            min_size: MIN_WINDOW_SIZE,
            max_size: None,
        }
    }
}

/// Declared behavior capabilities for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AppCapabilities {
    /// Whether multiple concurrent instances are meaningful.
    pub multi_instance: bool,
    /// Whether the app participates in suspend/resume.
    pub supports_suspend: bool,
    /// Whether the app may keep running with no open windows.
    pub supports_background_mode: bool,
}

/// Launch-time options for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchOptions {
    /// Launching while an instance is live reuses that instance.
    pub singleton: bool,
    /// Launch automatically at desktop boot.
    pub autostart: bool,
}

/// Default window geometry and constraints applied by the bridge when an
/// app opens a window without caller-supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WindowDefaults {
    /// Default bounds; the shared fallback geometry applies when absent.
    pub rect: Option<Rect>,
    /// Default constraint set.
    pub constraints: WindowConstraints,
}

/// Immutable catalog entry describing an installable application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    /// Namespaced application identifier.
    pub id: ApplicationId,
    /// Human-facing name shown by launchers.
    pub display_name: String,
    /// Semantic-ish version string.
    pub version: String,
    /// Longer description used by search.
    #[serde(default)]
    pub description: String,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Optional catalog category.
    #[serde(default)]
    pub category: Option<String>,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: AppCapabilities,
    /// Default window geometry/constraints.
    #[serde(default)]
    pub window_defaults: WindowDefaults,
    /// Launch options.
    #[serde(default)]
    pub launch: LaunchOptions,
}

impl AppManifest {
    /// Creates a minimal manifest with defaults for everything optional.
    pub fn new(id: ApplicationId, display_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            version: version.into(),
            description: String::new(),
            keywords: Vec::new(),
            category: None,
            capabilities: AppCapabilities::default(),
            window_defaults: WindowDefaults::default(),
            launch: LaunchOptions::default(),
        }
    }
}

/// One missing-required-field violation reported by [`validate_manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestViolation {
    /// The identifier is empty or fails the dotted-segment policy.
    MissingId,
    /// The display name is empty.
    MissingDisplayName,
    /// The version is empty.
    MissingVersion,
}

impl ManifestViolation {
    /// Stable string token for logs and diagnostics.
    pub const fn token(self) -> &'static str {
        match self {
            Self::MissingId => "missing-id",
            Self::MissingDisplayName => "missing-display-name",
            Self::MissingVersion => "missing-version",
        }
    }
}

/// Returns the required-field violations for `manifest` without failing.
///
/// Registration never calls this implicitly; callers validate before
/// registering when they want the report.
pub fn validate_manifest(manifest: &AppManifest) -> Vec<ManifestViolation> {
    let mut violations = Vec::new();
    if !is_valid_application_id(manifest.id.as_str()) {
        violations.push(ManifestViolation::MissingId);
    }
    if manifest.display_name.trim().is_empty() {
        violations.push(ManifestViolation::MissingDisplayName);
    }
    if manifest.version.trim().is_empty() {
        violations.push(ManifestViolation::MissingVersion);
    }
    violations
}

/// Error surfaced by a lifecycle hook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Creates a hook error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Data handed to lifecycle hooks and the render behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    /// The instance the hook fires for.
    pub instance_id: InstanceId,
    /// The owning application.
    pub app_id: ApplicationId,
    /// Launch context blob (arguments, environment, user data).
    pub context: Value,
}

/// Async lifecycle hook invoked by the lifecycle engine.
pub type AppHook = Rc<dyn Fn(HookContext) -> LocalBoxFuture<'static, Result<(), HookError>>>;

/// Render behavior producing an opaque surface description for the
/// presentation layer. Rendering itself is an external collaborator.
pub type RenderFn = Rc<dyn Fn(&HookContext) -> Value>;

/// Runtime behavior bundle an application registers alongside its manifest.
///
/// Hooks are optional; the lifecycle engine checks presence before invoking.
#[derive(Clone)]
pub struct AppComponent {
    /// Render behavior.
    pub render: RenderFn,
    /// Awaited after an instance enters `Running`.
    pub on_mount: Option<AppHook>,
    /// Awaited while an instance is `Stopping`.
    pub on_unmount: Option<AppHook>,
    /// Awaited on `Running` → `Suspended`.
    pub on_suspend: Option<AppHook>,
    /// Awaited on `Suspended` → `Running`.
    pub on_resume: Option<AppHook>,
}

impl AppComponent {
    /// Creates a component with the given render behavior and no hooks.
    pub fn new(render: RenderFn) -> Self {
        Self {
            render,
            on_mount: None,
            on_unmount: None,
            on_suspend: None,
            on_resume: None,
        }
    }

    /// Attaches a mount hook.
    pub fn with_mount(mut self, hook: AppHook) -> Self {
        self.on_mount = Some(hook);
        self
    }

    /// Attaches an unmount hook.
    pub fn with_unmount(mut self, hook: AppHook) -> Self {
        self.on_unmount = Some(hook);
        self
    }

    /// Attaches a suspend hook.
    pub fn with_suspend(mut self, hook: AppHook) -> Self {
        self.on_suspend = Some(hook);
        self
    }

    /// Attaches a resume hook.
    pub fn with_resume(mut self, hook: AppHook) -> Self {
        self.on_resume = Some(hook);
        self
    }
}

impl std::fmt::Debug for AppComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppComponent")
            .field("on_mount", &self.on_mount.is_some())
            .field("on_unmount", &self.on_unmount.is_some())
            .field("on_suspend", &self.on_suspend.is_some())
            .field("on_resume", &self.on_resume.is_some())
            .finish()
    }
}

/// Delivery target of an [`AppMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MessageAddress {
    /// Deliver to a single named instance.
    Instance {
        /// Target instance.
        id: InstanceId,
    },
    /// Deliver to every registered instance handler except the sender.
    Broadcast,
}

/// Typed envelope delivered between application instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMessage {
    /// Sending instance when known.
    pub from: Option<InstanceId>,
    /// Delivery target.
    pub to: MessageAddress,
    /// Topic identifier.
    pub topic: String,
    /// JSON payload.
    pub payload: Value,
    /// Timestamp in unix milliseconds.
    pub timestamp_ms: u64,
}

impl AppMessage {
    /// Creates a broadcast message.
    pub fn broadcast(from: InstanceId, topic: impl Into<String>, payload: Value, timestamp_ms: u64) -> Self {
        Self {
            from: Some(from),
            to: MessageAddress::Broadcast,
            topic: topic.into(),
            payload,
            timestamp_ms,
        }
    }

    /// Creates a direct message to `to`.
    pub fn direct(
        from: InstanceId,
        to: InstanceId,
        topic: impl Into<String>,
        payload: Value,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            from: Some(from),
            to: MessageAddress::Instance { id: to },
            topic: topic.into(),
            payload,
            timestamp_ms,
        }
    }
}
