//! Gesture recognizers over the recent-event window.
//!
//! Each recognizer is fed the recent-event window once per incoming event and
//! returns at most one gesture transition per call. Tracking state is private
//! and persists across calls; it is only cleared through `reset` (there is no
//! automatic reset on context change).

use super::{EventContext, InputEvent, Point};

/// Maximum press-to-release time for a tap.
pub const TAP_MAX_DURATION_MS: u64 = 300;
/// Maximum movement for a tap.
pub const TAP_MAX_MOVEMENT: f64 = 10.0;
/// Movement at which a drag starts.
pub const DRAG_START_THRESHOLD: f64 = 10.0;
/// Maximum press-to-release time for a swipe.
pub const SWIPE_MAX_DURATION_MS: u64 = 500;
/// Minimum travel distance for a swipe.
pub const SWIPE_MIN_DISTANCE: f64 = 50.0;
/// Minimum average velocity (distance per time unit) for a swipe.
pub const SWIPE_MIN_VELOCITY: f64 = 0.1;
/// Hold time that arms a long-press.
pub const LONG_PRESS_DURATION_MS: u64 = 500;
/// Movement that cancels a long-press before its deadline.
pub const LONG_PRESS_MAX_MOVEMENT: f64 = 10.0;

/// Gesture classification carried on [`GestureEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureKind {
    Tap,
    Drag,
    Swipe,
    LongPress,
    Custom(String),
}

/// Transition phase of a recognized gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    /// Multi-phase gesture began (drag crossing its start threshold).
    Started,
    /// Multi-phase gesture progressed.
    Updated,
    /// Multi-phase gesture completed.
    Ended,
    /// Single-shot gesture completed (tap, swipe, long-press).
    Recognized,
}

/// Swipe direction bucketed into ±45° quadrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Right,
    Down,
    Left,
    Up,
}

/// One recognized gesture transition.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub phase: GesturePhase,
    /// Position of the initiating press.
    pub start: Point,
    /// Position of the event that produced this transition.
    pub position: Point,
    /// Displacement from `start` to `position`.
    pub delta: (f64, f64),
    /// Travel direction; swipe only.
    pub direction: Option<SwipeDirection>,
    /// Elapsed time since the initiating press.
    pub duration_ms: u64,
    pub timestamp_ms: u64,
    pub context: Option<EventContext>,
}

/// Pure function of the recent-event window plus private tracking state.
pub trait GestureRecognizer {
    /// Consumes the recent-event window (newest event last) and returns at
    /// most one gesture transition.
    fn feed(&mut self, recent: &[InputEvent]) -> Option<GestureEvent>;

    /// Drops any in-flight tracking state.
    fn reset(&mut self);
}

fn gesture_event(
    kind: GestureKind,
    phase: GesturePhase,
    start: Point,
    event: &InputEvent,
    position: Point,
    started_at: u64,
) -> GestureEvent {
    GestureEvent {
        kind,
        phase,
        start,
        position,
        delta: (position.x - start.x, position.y - start.y),
        direction: None,
        duration_ms: event.timestamp_ms.saturating_sub(started_at),
        timestamp_ms: event.timestamp_ms,
        context: event.context.clone(),
    }
}

struct PressTracking {
    start: Point,
    started_at: u64,
    peak_movement: f64,
}

/// Press-release within a short time and small movement.
#[derive(Default)]
pub struct TapRecognizer {
    tracking: Option<PressTracking>,
}

impl GestureRecognizer for TapRecognizer {
    fn feed(&mut self, recent: &[InputEvent]) -> Option<GestureEvent> {
        let event = recent.last()?;
        let position = event.position;

        if event.is_press() {
            self.tracking = position.map(|start| PressTracking {
                start,
                started_at: event.timestamp_ms,
                peak_movement: 0.0,
            });
            return None;
        }

        if event.is_motion() {
            if let (Some(tracking), Some(position)) = (self.tracking.as_mut(), position) {
                tracking.peak_movement = tracking.peak_movement.max(tracking.start.distance_to(position));
            }
            return None;
        }

        if event.is_release() {
            let tracking = self.tracking.take()?;
            let position = position?;
            let movement = tracking.peak_movement.max(tracking.start.distance_to(position));
            let duration = event.timestamp_ms.saturating_sub(tracking.started_at);
            if duration <= TAP_MAX_DURATION_MS && movement <= TAP_MAX_MOVEMENT {
                return Some(gesture_event(
                    GestureKind::Tap,
                    GesturePhase::Recognized,
                    tracking.start,
                    event,
                    position,
                    tracking.started_at,
                ));
            }
        }
        None
    }

    fn reset(&mut self) {
        self.tracking = None;
    }
}

struct DragTracking {
    start: Point,
    started_at: u64,
    started: bool,
}

/// Press, movement past a threshold, then release.
///
/// Sub-threshold attempts produce no events at all; `Ended` only follows an
/// emitted `Started`.
#[derive(Default)]
pub struct DragRecognizer {
    tracking: Option<DragTracking>,
}

impl GestureRecognizer for DragRecognizer {
    fn feed(&mut self, recent: &[InputEvent]) -> Option<GestureEvent> {
        let event = recent.last()?;
        let position = event.position;

        if event.is_press() {
            self.tracking = position.map(|start| DragTracking {
                start,
                started_at: event.timestamp_ms,
                started: false,
            });
            return None;
        }

        if event.is_motion() {
            let tracking = self.tracking.as_mut()?;
            let position = position?;
            if tracking.started {
                return Some(gesture_event(
                    GestureKind::Drag,
                    GesturePhase::Updated,
                    tracking.start,
                    event,
                    position,
                    tracking.started_at,
                ));
            }
            if tracking.start.distance_to(position) >= DRAG_START_THRESHOLD {
                tracking.started = true;
                return Some(gesture_event(
                    GestureKind::Drag,
                    GesturePhase::Started,
                    tracking.start,
                    event,
                    position,
                    tracking.started_at,
                ));
            }
            return None;
        }

        if event.is_release() {
            let tracking = self.tracking.take()?;
            let position = position?;
            if tracking.started {
                return Some(gesture_event(
                    GestureKind::Drag,
                    GesturePhase::Ended,
                    tracking.start,
                    event,
                    position,
                    tracking.started_at,
                ));
            }
        }
        None
    }

    fn reset(&mut self) {
        self.tracking = None;
    }
}

/// Fast directional press-release.
#[derive(Default)]
pub struct SwipeRecognizer {
    press: Option<(Point, u64)>,
}

fn swipe_direction(dx: f64, dy: f64) -> SwipeDirection {
    let angle = dy.atan2(dx).to_degrees();
    if (-45.0..=45.0).contains(&angle) {
        SwipeDirection::Right
    } else if (45.0..135.0).contains(&angle) {
        SwipeDirection::Down
    } else if (-135.0..-45.0).contains(&angle) {
        SwipeDirection::Up
    } else {
        SwipeDirection::Left
    }
}

impl GestureRecognizer for SwipeRecognizer {
    fn feed(&mut self, recent: &[InputEvent]) -> Option<GestureEvent> {
        let event = recent.last()?;
        let position = event.position;

        if event.is_press() {
            self.press = position.map(|start| (start, event.timestamp_ms));
            return None;
        }

        if event.is_release() {
            let (start, started_at) = self.press.take()?;
            let position = position?;
            let duration = event.timestamp_ms.saturating_sub(started_at);
            let distance = start.distance_to(position);
            let velocity = distance / duration.max(1) as f64;
            if duration <= SWIPE_MAX_DURATION_MS
                && distance >= SWIPE_MIN_DISTANCE
                && velocity >= SWIPE_MIN_VELOCITY
            {
                let mut gesture = gesture_event(
                    GestureKind::Swipe,
                    GesturePhase::Recognized,
                    start,
                    event,
                    position,
                    started_at,
                );
                gesture.direction =
                    Some(swipe_direction(position.x - start.x, position.y - start.y));
                return Some(gesture);
            }
        }
        None
    }

    fn reset(&mut self) {
        self.press = None;
    }
}

struct LongPressTracking {
    start: Point,
    started_at: u64,
    triggered: bool,
}

/// Press held past a deadline with little movement; the release emits.
#[derive(Default)]
pub struct LongPressRecognizer {
    tracking: Option<LongPressTracking>,
}

impl GestureRecognizer for LongPressRecognizer {
    fn feed(&mut self, recent: &[InputEvent]) -> Option<GestureEvent> {
        let event = recent.last()?;
        let position = event.position;

        if event.is_press() {
            self.tracking = position.map(|start| LongPressTracking {
                start,
                started_at: event.timestamp_ms,
                triggered: false,
            });
            return None;
        }

        if event.is_motion() {
            let Some(tracking) = self.tracking.as_mut() else {
                return None;
            };
            let Some(position) = position else {
                return None;
            };
            let deadline = tracking.started_at + LONG_PRESS_DURATION_MS;
            if event.timestamp_ms >= deadline {
                tracking.triggered = true;
            } else if tracking.start.distance_to(position) > LONG_PRESS_MAX_MOVEMENT {
                // Excess movement before the deadline cancels the attempt.
                self.tracking = None;
            }
            return None;
        }

        if event.is_release() {
            let tracking = self.tracking.take()?;
            let position = position?;
            let deadline = tracking.started_at + LONG_PRESS_DURATION_MS;
            if tracking.triggered || event.timestamp_ms >= deadline {
                return Some(gesture_event(
                    GestureKind::LongPress,
                    GesturePhase::Recognized,
                    tracking.start,
                    event,
                    position,
                    tracking.started_at,
                ));
            }
        }
        None
    }

    fn reset(&mut self) {
        self.tracking = None;
    }
}
