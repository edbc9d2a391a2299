//! Input event interpretation: normalization, keyboard shortcuts, gesture
//! recognition, and priority-ordered interaction routing.

pub mod gestures;
pub mod router;

use std::collections::BTreeSet;

use coredesk_app_contract::ApplicationId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::WindowId;

pub use gestures::{
    GestureEvent, GestureKind, GesturePhase, GestureRecognizer, SwipeDirection,
};
pub use router::{
    GestureRegistration, InputRouter, InteractionHandler, InteractionOutcome, RouterEvent,
    Shortcut,
};

/// Position in desktop coordinates; distance thresholds are measured in the
/// same units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Modifier keys tracked on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

/// Modifier flags captured by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModifierState {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl ModifierState {
    /// The set of active modifiers.
    pub fn active(self) -> BTreeSet<Modifier> {
        let mut set = BTreeSet::new();
        if self.ctrl {
            set.insert(Modifier::Ctrl);
        }
        if self.alt {
            set.insert(Modifier::Alt);
        }
        if self.shift {
            set.insert(Modifier::Shift);
        }
        if self.meta {
            set.insert(Modifier::Meta);
        }
        set
    }
}

/// Raw device events, already distinguished by the event source.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    PointerPress { position: Point },
    PointerRelease { position: Point },
    PointerMove { position: Point },
    PointerClick { position: Point },
    PointerDoubleClick { position: Point },
    Wheel { position: Point, delta_x: f64, delta_y: f64 },
    KeyDown { key: String, repeat: bool },
    KeyUp { key: String },
    TouchStart { position: Point },
    TouchMove { position: Point },
    TouchEnd { position: Point },
}

/// One raw event handed to the router by the device event source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInputEvent {
    pub event: DeviceEvent,
    pub timestamp_ms: u64,
    /// Identity of the element the event targets, when known.
    pub target: Option<String>,
    pub modifiers: ModifierState,
}

impl RawInputEvent {
    pub fn new(event: DeviceEvent, timestamp_ms: u64) -> Self {
        Self {
            event,
            timestamp_ms,
            target: None,
            modifiers: ModifierState::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: ModifierState) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Canonical event type after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    PointerPress,
    PointerRelease,
    PointerMove,
    PointerClick,
    PointerDoubleClick,
    Wheel,
    KeyDown,
    KeyUp,
    TouchStart,
    TouchMove,
    TouchEnd,
}

/// Canonical normalized event shape appended to the recent-event window.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub kind: InputKind,
    pub timestamp_ms: u64,
    pub position: Option<Point>,
    pub target: Option<String>,
    /// Router-wide active context at normalization time.
    pub context: Option<EventContext>,
    pub modifiers: ModifierState,
    pub key: Option<String>,
    pub repeat: bool,
    pub wheel_delta: Option<(f64, f64)>,
}

impl InputEvent {
    /// Press-like events (pointer press or touch start).
    pub fn is_press(&self) -> bool {
        matches!(self.kind, InputKind::PointerPress | InputKind::TouchStart)
    }

    /// Release-like events (pointer release or touch end).
    pub fn is_release(&self) -> bool {
        matches!(self.kind, InputKind::PointerRelease | InputKind::TouchEnd)
    }

    /// Motion events (pointer move or touch move).
    pub fn is_motion(&self) -> bool {
        matches!(self.kind, InputKind::PointerMove | InputKind::TouchMove)
    }
}

/// Context a normalized event carries: which window, app, and interaction
/// mode it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub window: Option<WindowId>,
    pub app: Option<ApplicationId>,
    pub mode: Option<String>,
}

/// Partial-match filter scoping shortcuts, gestures, and interaction
/// handlers. A set field must equal the event's context field; an unset
/// field matches anything. An event with no context matches only
/// fully-unset filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextFilter {
    pub window: Option<WindowId>,
    pub app: Option<ApplicationId>,
    pub mode: Option<String>,
    /// Tie-break priority among shortcut matches; larger wins.
    pub priority: i32,
}

impl ContextFilter {
    fn is_unset(&self) -> bool {
        self.window.is_none() && self.app.is_none() && self.mode.is_none()
    }

    /// Applies the uniform context-matching rule.
    pub fn matches(&self, context: Option<&EventContext>) -> bool {
        let Some(context) = context else {
            return self.is_unset();
        };
        if let Some(window) = self.window {
            if context.window != Some(window) {
                return false;
            }
        }
        if let Some(app) = &self.app {
            if context.app.as_ref() != Some(app) {
                return false;
            }
        }
        if let Some(mode) = &self.mode {
            if context.mode.as_deref() != Some(mode.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Unordered modifier+key combination, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombination {
    modifiers: BTreeSet<Modifier>,
    key: String,
}

impl KeyCombination {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, key: impl Into<String>) -> Self {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key: key.into().to_lowercase(),
        }
    }

    /// Whether a key-down event's active modifier+key set equals this
    /// combination.
    pub fn matches_event(&self, event: &InputEvent) -> bool {
        let Some(key) = event.key.as_deref() else {
            return false;
        };
        key.to_lowercase() == self.key && event.modifiers.active() == self.modifiers
    }
}

/// Failure surfaced by a shortcut, gesture, or interaction handler. Handler
/// failures are logged and treated as non-consuming.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
