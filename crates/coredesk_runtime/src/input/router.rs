//! Input event router: normalization, shortcut matching, gesture
//! recognition, and the priority-ordered interaction handler chain.
//!
//! Processing is single-threaded and strictly ordered per incoming raw
//! event. A handler that fails is logged and treated as non-consuming so one
//! faulty handler cannot stall delivery to the rest of the chain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::events::{Listeners, SubscriptionId};

use super::gestures::{
    DragRecognizer, GestureEvent, GestureKind, GestureRecognizer, LongPressRecognizer,
    SwipeRecognizer, TapRecognizer,
};
use super::{
    ContextFilter, DeviceEvent, EventContext, HandlerError, InputEvent, InputKind,
    KeyCombination, RawInputEvent,
};

/// Size of the recent-event window fed to gesture recognizers.
pub const RECENT_EVENT_CAPACITY: usize = 10;
/// Size of the full event history; the oldest entry is evicted first.
pub const HISTORY_CAPACITY: usize = 100;

/// Notifications emitted by [`InputRouter`].
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    Received(InputEvent),
    GestureRecognized(GestureEvent),
}

/// Handler invoked for a matched shortcut.
pub type ShortcutHandler = Rc<dyn Fn(&InputEvent) -> Result<(), HandlerError>>;
/// Handler invoked inline for a recognized custom gesture.
pub type GestureHandler = Rc<dyn Fn(&GestureEvent) -> Result<(), HandlerError>>;
/// Predicate deciding whether an interaction handler can process an event.
pub type InteractionPredicate = Rc<dyn Fn(&InputEvent) -> bool>;
/// Interaction handler body; reports whether the event was consumed.
pub type InteractionFn = Rc<dyn Fn(&InputEvent) -> Result<InteractionOutcome, HandlerError>>;

/// Outcome of one interaction handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    Consumed,
    Pass,
}

/// Keyboard shortcut registration. Uniqueness is by id, never by key
/// combination; two shortcuts may share keys.
#[derive(Clone)]
pub struct Shortcut {
    pub id: String,
    pub combination: KeyCombination,
    pub filter: ContextFilter,
    pub handler: ShortcutHandler,
    pub enabled: bool,
}

struct RegisteredShortcut {
    shortcut: Shortcut,
    order: u64,
}

/// Gesture definition: a recognizer, a scope filter, and an optional inline
/// handler.
pub struct GestureRegistration {
    pub id: String,
    pub kind: GestureKind,
    pub recognizer: Box<dyn GestureRecognizer>,
    pub filter: ContextFilter,
    pub handler: Option<GestureHandler>,
    pub enabled: bool,
}

/// Priority-ordered interaction handler registration.
#[derive(Clone)]
pub struct InteractionHandler {
    pub id: String,
    /// Higher priority handlers are tried first.
    pub priority: i32,
    pub filter: ContextFilter,
    pub accepts: InteractionPredicate,
    pub handler: InteractionFn,
}

struct RegisteredInteraction {
    handler: InteractionHandler,
    order: u64,
}

/// Input event router.
pub struct InputRouter {
    shortcuts: RefCell<Vec<RegisteredShortcut>>,
    gestures: RefCell<Vec<GestureRegistration>>,
    interactions: RefCell<Vec<RegisteredInteraction>>,
    recent: RefCell<VecDeque<InputEvent>>,
    history: RefCell<VecDeque<InputEvent>>,
    active_context: RefCell<Option<EventContext>>,
    listeners: Listeners<RouterEvent>,
    next_order: Cell<u64>,
}

impl InputRouter {
    /// Creates a router with the built-in tap, drag, swipe, and long-press
    /// recognizers registered and enabled.
    pub fn new() -> Self {
        let builtin = |id: &str, kind: GestureKind, recognizer: Box<dyn GestureRecognizer>| {
            GestureRegistration {
                id: id.to_string(),
                kind,
                recognizer,
                filter: ContextFilter::default(),
                handler: None,
                enabled: true,
            }
        };

        Self {
            shortcuts: RefCell::new(Vec::new()),
            gestures: RefCell::new(vec![
                builtin("tap", GestureKind::Tap, Box::<TapRecognizer>::default()),
                builtin("drag", GestureKind::Drag, Box::<DragRecognizer>::default()),
                builtin("swipe", GestureKind::Swipe, Box::<SwipeRecognizer>::default()),
                builtin(
                    "long-press",
                    GestureKind::LongPress,
                    Box::<LongPressRecognizer>::default(),
                ),
            ]),
            interactions: RefCell::new(Vec::new()),
            recent: RefCell::new(VecDeque::new()),
            history: RefCell::new(VecDeque::new()),
            active_context: RefCell::new(None),
            listeners: Listeners::new(),
            next_order: Cell::new(1),
        }
    }

    pub fn subscribe(&self, listener: Rc<dyn Fn(&RouterEvent)>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Sets the context stamped onto subsequently normalized events.
    ///
    /// Gesture recognizers deliberately keep their tracking state across
    /// context changes; call [`InputRouter::reset_gestures`] to drop it.
    pub fn set_active_context(&self, context: Option<EventContext>) {
        *self.active_context.borrow_mut() = context;
    }

    pub fn active_context(&self) -> Option<EventContext> {
        self.active_context.borrow().clone()
    }

    /// Processes one raw device event and returns whether it was consumed by
    /// a shortcut or an interaction handler. The caller uses this to decide
    /// whether to suppress the platform's own default handling.
    pub fn process(&self, raw: RawInputEvent) -> bool {
        let event = self.normalize(raw);

        {
            let mut recent = self.recent.borrow_mut();
            recent.push_back(event.clone());
            while recent.len() > RECENT_EVENT_CAPACITY {
                recent.pop_front();
            }
        }
        {
            let mut history = self.history.borrow_mut();
            history.push_back(event.clone());
            while history.len() > HISTORY_CAPACITY {
                history.pop_front();
            }
        }

        self.listeners.emit(&RouterEvent::Received(event.clone()));

        // Key-up and key-repeat never trigger shortcuts.
        let mut consumed = false;
        if event.kind == InputKind::KeyDown && !event.repeat {
            consumed = self.dispatch_shortcut(&event);
        }

        self.recognize_gestures(&event);

        if !consumed {
            consumed = self.dispatch_interactions(&event);
        }
        consumed
    }

    /// Registers (or replaces, by id) a keyboard shortcut.
    pub fn register_shortcut(&self, shortcut: Shortcut) {
        let mut shortcuts = self.shortcuts.borrow_mut();
        shortcuts.retain(|entry| entry.shortcut.id != shortcut.id);
        let order = self.next_order.get();
        self.next_order.set(order + 1);
        shortcuts.push(RegisteredShortcut { shortcut, order });
    }

    pub fn unregister_shortcut(&self, id: &str) -> bool {
        let mut shortcuts = self.shortcuts.borrow_mut();
        let before = shortcuts.len();
        shortcuts.retain(|entry| entry.shortcut.id != id);
        shortcuts.len() != before
    }

    pub fn set_shortcut_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut shortcuts = self.shortcuts.borrow_mut();
        match shortcuts.iter_mut().find(|entry| entry.shortcut.id == id) {
            Some(entry) => {
                entry.shortcut.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Registers (or replaces, by id) a custom gesture definition.
    pub fn register_gesture(&self, registration: GestureRegistration) {
        let mut gestures = self.gestures.borrow_mut();
        gestures.retain(|entry| entry.id != registration.id);
        gestures.push(registration);
    }

    pub fn unregister_gesture(&self, id: &str) -> bool {
        let mut gestures = self.gestures.borrow_mut();
        let before = gestures.len();
        gestures.retain(|entry| entry.id != id);
        gestures.len() != before
    }

    pub fn set_gesture_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut gestures = self.gestures.borrow_mut();
        match gestures.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Drops every recognizer's in-flight tracking state.
    pub fn reset_gestures(&self) {
        for registration in self.gestures.borrow_mut().iter_mut() {
            registration.recognizer.reset();
        }
    }

    /// Registers (or replaces, by id) an interaction handler.
    pub fn register_interaction_handler(&self, handler: InteractionHandler) {
        let mut interactions = self.interactions.borrow_mut();
        interactions.retain(|entry| entry.handler.id != handler.id);
        let order = self.next_order.get();
        self.next_order.set(order + 1);
        interactions.push(RegisteredInteraction { handler, order });
    }

    pub fn unregister_interaction_handler(&self, id: &str) -> bool {
        let mut interactions = self.interactions.borrow_mut();
        let before = interactions.len();
        interactions.retain(|entry| entry.handler.id != id);
        interactions.len() != before
    }

    /// The bounded recent-event window, oldest first.
    pub fn recent_events(&self) -> Vec<InputEvent> {
        self.recent.borrow().iter().cloned().collect()
    }

    /// The capped full history, oldest first.
    pub fn history(&self) -> Vec<InputEvent> {
        self.history.borrow().iter().cloned().collect()
    }

    fn normalize(&self, raw: RawInputEvent) -> InputEvent {
        let RawInputEvent {
            event,
            timestamp_ms,
            target,
            modifiers,
        } = raw;

        let (kind, position, key, repeat, wheel_delta) = match event {
            DeviceEvent::PointerPress { position } => {
                (InputKind::PointerPress, Some(position), None, false, None)
            }
            DeviceEvent::PointerRelease { position } => {
                (InputKind::PointerRelease, Some(position), None, false, None)
            }
            DeviceEvent::PointerMove { position } => {
                (InputKind::PointerMove, Some(position), None, false, None)
            }
            DeviceEvent::PointerClick { position } => {
                (InputKind::PointerClick, Some(position), None, false, None)
            }
            DeviceEvent::PointerDoubleClick { position } => (
                InputKind::PointerDoubleClick,
                Some(position),
                None,
                false,
                None,
            ),
            DeviceEvent::Wheel {
                position,
                delta_x,
                delta_y,
            } => (
                InputKind::Wheel,
                Some(position),
                None,
                false,
                Some((delta_x, delta_y)),
            ),
            DeviceEvent::KeyDown { key, repeat } => {
                (InputKind::KeyDown, None, Some(key), repeat, None)
            }
            DeviceEvent::KeyUp { key } => (InputKind::KeyUp, None, Some(key), false, None),
            DeviceEvent::TouchStart { position } => {
                (InputKind::TouchStart, Some(position), None, false, None)
            }
            DeviceEvent::TouchMove { position } => {
                (InputKind::TouchMove, Some(position), None, false, None)
            }
            DeviceEvent::TouchEnd { position } => {
                (InputKind::TouchEnd, Some(position), None, false, None)
            }
        };

        InputEvent {
            kind,
            timestamp_ms,
            position,
            target,
            context: self.active_context.borrow().clone(),
            modifiers,
            key,
            repeat,
            wheel_delta,
        }
    }

    fn dispatch_shortcut(&self, event: &InputEvent) -> bool {
        let best = {
            let shortcuts = self.shortcuts.borrow();
            let mut candidates: Vec<(i32, u64, String, ShortcutHandler)> = shortcuts
                .iter()
                .filter(|entry| {
                    entry.shortcut.enabled
                        && entry.shortcut.filter.matches(event.context.as_ref())
                        && entry.shortcut.combination.matches_event(event)
                })
                .map(|entry| {
                    (
                        entry.shortcut.filter.priority,
                        entry.order,
                        entry.shortcut.id.clone(),
                        entry.shortcut.handler.clone(),
                    )
                })
                .collect();
            candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
            candidates.into_iter().next()
        };

        let Some((_, _, id, handler)) = best else {
            return false;
        };
        match handler(event) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("shortcut `{id}` handler failed: {err}");
                false
            }
        }
    }

    fn recognize_gestures(&self, event: &InputEvent) {
        let recent: Vec<InputEvent> = self.recent.borrow().iter().cloned().collect();
        let count = self.gestures.borrow().len();

        for index in 0..count {
            let recognized = {
                let mut gestures = self.gestures.borrow_mut();
                let Some(registration) = gestures.get_mut(index) else {
                    break;
                };
                if !registration.enabled
                    || !registration.filter.matches(event.context.as_ref())
                {
                    continue;
                }
                let kind = registration.kind.clone();
                registration.recognizer.feed(&recent).map(|mut gesture| {
                    gesture.kind = kind;
                    gesture
                })
            };

            let Some(gesture) = recognized else {
                continue;
            };
            self.listeners
                .emit(&RouterEvent::GestureRecognized(gesture.clone()));

            let handler = self
                .gestures
                .borrow()
                .get(index)
                .and_then(|registration| registration.handler.clone());
            if let Some(handler) = handler {
                if let Err(err) = handler(&gesture) {
                    log::warn!("gesture `{:?}` handler failed: {err}", gesture.kind);
                }
            }
        }
    }

    fn dispatch_interactions(&self, event: &InputEvent) -> bool {
        let mut candidates: Vec<(i32, u64, InteractionHandler)> = self
            .interactions
            .borrow()
            .iter()
            .map(|entry| (entry.handler.priority, entry.order, entry.handler.clone()))
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        for (_, _, handler) in candidates {
            if !handler.filter.matches(event.context.as_ref()) || !(handler.accepts)(event) {
                continue;
            }
            match (handler.handler)(event) {
                Ok(InteractionOutcome::Consumed) => return true,
                Ok(InteractionOutcome::Pass) => {}
                Err(err) => {
                    log::warn!("interaction handler `{}` failed: {err}", handler.id);
                }
            }
        }
        false
    }
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::input::{GesturePhase, Modifier, ModifierState, Point};

    fn raw_key_down(key: &str, modifiers: ModifierState, t: u64) -> RawInputEvent {
        RawInputEvent::new(
            DeviceEvent::KeyDown {
                key: key.to_string(),
                repeat: false,
            },
            t,
        )
        .with_modifiers(modifiers)
    }

    fn raw_press(x: f64, y: f64, t: u64) -> RawInputEvent {
        RawInputEvent::new(
            DeviceEvent::PointerPress {
                position: Point::new(x, y),
            },
            t,
        )
    }

    fn raw_move(x: f64, y: f64, t: u64) -> RawInputEvent {
        RawInputEvent::new(
            DeviceEvent::PointerMove {
                position: Point::new(x, y),
            },
            t,
        )
    }

    fn raw_release(x: f64, y: f64, t: u64) -> RawInputEvent {
        RawInputEvent::new(
            DeviceEvent::PointerRelease {
                position: Point::new(x, y),
            },
            t,
        )
    }

    fn ctrl() -> ModifierState {
        ModifierState {
            ctrl: true,
            ..Default::default()
        }
    }

    fn shortcut(id: &str, priority: i32, log: &Rc<RefCell<Vec<String>>>) -> Shortcut {
        let sink = log.clone();
        let name = id.to_string();
        Shortcut {
            id: id.to_string(),
            combination: KeyCombination::new([Modifier::Ctrl], "n"),
            filter: ContextFilter {
                priority,
                ..Default::default()
            },
            handler: Rc::new(move |_| {
                sink.borrow_mut().push(name.clone());
                Ok(())
            }),
            enabled: true,
        }
    }

    fn recognized_gestures(router: &InputRouter) -> Rc<RefCell<Vec<GestureEvent>>> {
        let gestures = Rc::new(RefCell::new(Vec::new()));
        let sink = gestures.clone();
        router.subscribe(Rc::new(move |event| {
            if let RouterEvent::GestureRecognized(gesture) = event {
                sink.borrow_mut().push(gesture.clone());
            }
        }));
        gestures
    }

    #[test]
    fn highest_priority_matching_shortcut_wins() {
        let router = InputRouter::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        router.register_shortcut(shortcut("new-window", 0, &fired));
        let mut scoped = shortcut("new-note", 5, &fired);
        scoped.filter.mode = Some("notes".to_string());
        router.register_shortcut(scoped);

        router.set_active_context(Some(EventContext {
            window: None,
            app: None,
            mode: Some("notes".to_string()),
        }));
        let consumed = router.process(raw_key_down("N", ctrl(), 10));

        assert!(consumed);
        assert_eq!(*fired.borrow(), vec!["new-note".to_string()]);
    }

    #[test]
    fn registration_order_breaks_priority_ties() {
        let router = InputRouter::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        router.register_shortcut(shortcut("first", 2, &fired));
        router.register_shortcut(shortcut("second", 2, &fired));

        router.process(raw_key_down("n", ctrl(), 10));
        assert_eq!(*fired.borrow(), vec!["first".to_string()]);
    }

    #[test]
    fn key_up_repeat_and_disabled_shortcuts_never_fire() {
        let router = InputRouter::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        router.register_shortcut(shortcut("new-window", 0, &fired));

        let key_up = RawInputEvent::new(
            DeviceEvent::KeyUp {
                key: "n".to_string(),
            },
            10,
        )
        .with_modifiers(ctrl());
        assert!(!router.process(key_up));

        let repeat = RawInputEvent::new(
            DeviceEvent::KeyDown {
                key: "n".to_string(),
                repeat: true,
            },
            20,
        )
        .with_modifiers(ctrl());
        assert!(!router.process(repeat));

        assert!(router.set_shortcut_enabled("new-window", false));
        assert!(!router.process(raw_key_down("n", ctrl(), 30)));
        assert_eq!(*fired.borrow(), Vec::<String>::new());
    }

    #[test]
    fn shortcut_context_filters_scope_matches() {
        let router = InputRouter::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let mut scoped = shortcut("scoped", 0, &fired);
        scoped.filter.mode = Some("editing".to_string());
        router.register_shortcut(scoped);

        // No active context: only fully-unset filters can match.
        assert!(!router.process(raw_key_down("n", ctrl(), 10)));

        router.set_active_context(Some(EventContext {
            window: None,
            app: None,
            mode: Some("editing".to_string()),
        }));
        assert!(router.process(raw_key_down("n", ctrl(), 20)));
        assert_eq!(*fired.borrow(), vec!["scoped".to_string()]);
    }

    #[test]
    fn failing_shortcut_handler_is_non_consuming() {
        let router = InputRouter::new();
        router.register_shortcut(Shortcut {
            id: "broken".to_string(),
            combination: KeyCombination::new([Modifier::Ctrl], "n"),
            filter: ContextFilter::default(),
            handler: Rc::new(|_| Err(HandlerError::new("handler exploded"))),
            enabled: true,
        });

        assert!(!router.process(raw_key_down("n", ctrl(), 10)));
    }

    #[test]
    fn tap_scenario_produces_a_tap_and_no_drag() {
        let router = InputRouter::new();
        let gestures = recognized_gestures(&router);

        router.process(raw_press(0.0, 0.0, 0));
        router.process(raw_release(3.0, 3.0, 120));

        let kinds: Vec<_> = gestures.borrow().iter().map(|g| g.kind.clone()).collect();
        assert_eq!(kinds, vec![GestureKind::Tap]);
    }

    #[test]
    fn drag_scenario_produces_start_and_end_and_no_tap() {
        let router = InputRouter::new();
        let gestures = recognized_gestures(&router);

        router.process(raw_press(0.0, 0.0, 0));
        router.process(raw_move(20.0, 0.0, 100));
        router.process(raw_release(20.0, 0.0, 200));

        let transitions: Vec<_> = gestures
            .borrow()
            .iter()
            .map(|g| (g.kind.clone(), g.phase))
            .collect();
        assert_eq!(
            transitions,
            vec![
                (GestureKind::Drag, GesturePhase::Started),
                (GestureKind::Drag, GesturePhase::Ended),
            ]
        );
    }

    #[test]
    fn slow_swipe_is_rejected_despite_clearing_the_distance() {
        let router = InputRouter::new();
        let gestures = recognized_gestures(&router);

        router.process(raw_press(0.0, 0.0, 0));
        router.process(raw_release(60.0, 0.0, 800));

        assert!(gestures
            .borrow()
            .iter()
            .all(|gesture| gesture.kind != GestureKind::Swipe));
    }

    #[test]
    fn custom_gesture_handlers_run_inline() {
        struct DoubleClickRecognizer;
        impl GestureRecognizer for DoubleClickRecognizer {
            fn feed(&mut self, recent: &[InputEvent]) -> Option<GestureEvent> {
                let event = recent.last()?;
                if event.kind != InputKind::PointerDoubleClick {
                    return None;
                }
                let position = event.position?;
                Some(GestureEvent {
                    kind: GestureKind::Custom("double-click".to_string()),
                    phase: GesturePhase::Recognized,
                    start: position,
                    position,
                    delta: (0.0, 0.0),
                    direction: None,
                    duration_ms: 0,
                    timestamp_ms: event.timestamp_ms,
                    context: event.context.clone(),
                })
            }
            fn reset(&mut self) {}
        }

        let router = InputRouter::new();
        let fired = Rc::new(RefCell::new(0u32));
        let sink = fired.clone();
        router.register_gesture(GestureRegistration {
            id: "double-click".to_string(),
            kind: GestureKind::Custom("double-click".to_string()),
            recognizer: Box::new(DoubleClickRecognizer),
            filter: ContextFilter::default(),
            handler: Some(Rc::new(move |_| {
                *sink.borrow_mut() += 1;
                Ok(())
            })),
            enabled: true,
        });

        router.process(RawInputEvent::new(
            DeviceEvent::PointerDoubleClick {
                position: Point::new(5.0, 5.0),
            },
            50,
        ));

        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn interaction_handlers_run_in_priority_order_until_consumed() {
        let router = InputRouter::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let handler = |id: &str, priority: i32, outcome: Result<InteractionOutcome, HandlerError>| {
            let sink = calls.clone();
            let name = id.to_string();
            InteractionHandler {
                id: id.to_string(),
                priority,
                filter: ContextFilter::default(),
                accepts: Rc::new(|event: &InputEvent| event.is_press()),
                handler: Rc::new(move |_| {
                    sink.borrow_mut().push(name.clone());
                    outcome.clone()
                }),
            }
        };

        router.register_interaction_handler(handler(
            "low",
            1,
            Ok(InteractionOutcome::Consumed),
        ));
        router.register_interaction_handler(handler(
            "broken",
            10,
            Err(HandlerError::new("boom")),
        ));
        router.register_interaction_handler(handler("middle", 5, Ok(InteractionOutcome::Pass)));

        let consumed = router.process(raw_press(0.0, 0.0, 0));

        assert!(consumed);
        assert_eq!(
            *calls.borrow(),
            vec!["broken".to_string(), "middle".to_string(), "low".to_string()]
        );

        // Non-press events are filtered out by the predicate.
        calls.borrow_mut().clear();
        assert!(!router.process(raw_move(1.0, 1.0, 10)));
        assert_eq!(*calls.borrow(), Vec::<String>::new());
    }

    #[test]
    fn recent_window_and_history_are_bounded() {
        let router = InputRouter::new();
        for index in 0..120 {
            router.process(raw_move(index as f64, 0.0, index));
        }

        let recent = router.recent_events();
        assert_eq!(recent.len(), RECENT_EVENT_CAPACITY);
        assert_eq!(recent.first().map(|e| e.timestamp_ms), Some(110));
        assert_eq!(recent.last().map(|e| e.timestamp_ms), Some(119));

        let history = router.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.first().map(|e| e.timestamp_ms), Some(20));
    }

    #[test]
    fn gestures_spanning_a_context_switch_finish_under_the_new_context() {
        // Recognizers are never reset automatically on context change, so a
        // gesture begun under one context completes attributed to the next.
        let router = InputRouter::new();
        let gestures = recognized_gestures(&router);

        router.set_active_context(Some(EventContext {
            window: None,
            app: None,
            mode: Some("first".to_string()),
        }));
        router.process(raw_press(0.0, 0.0, 0));
        router.process(raw_move(20.0, 0.0, 50));

        router.set_active_context(Some(EventContext {
            window: None,
            app: None,
            mode: Some("second".to_string()),
        }));
        router.process(raw_release(20.0, 0.0, 100));

        let end = gestures
            .borrow()
            .iter()
            .find(|g| g.phase == GesturePhase::Ended)
            .cloned()
            .expect("drag end");
        assert_eq!(
            end.context.and_then(|c| c.mode),
            Some("second".to_string())
        );
    }
}
