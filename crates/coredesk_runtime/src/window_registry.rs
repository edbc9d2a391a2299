//! Window registry: single source of truth for window geometry, visibility,
//! focus, and stacking order.
//!
//! Focus transfers triggered by creation and destruction run through a
//! deferred-task queue drained when the outermost mutation returns, so no
//! focus side effect fires while a caller is still mid-mutation. Minimize
//! transfers focus immediately.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use coredesk_app_contract::{ApplicationId, Rect, Size};
use thiserror::Error;

use crate::events::{Listeners, SubscriptionId};
use crate::model::{RegistrySnapshot, WindowId, WindowOptions, WindowRecord};
use crate::persistence::{self, SnapshotError};

/// Change notifications emitted by [`WindowRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Created(WindowRecord),
    Destroyed { id: WindowId },
    Focused { id: WindowId },
    Blurred { id: WindowId },
    Minimized { id: WindowId },
    Maximized { id: WindowId },
    Restored { id: WindowId },
    Moved { id: WindowId, rect: Rect },
    Resized { id: WindowId, rect: Rect },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Creation was attempted with an identity that is already live.
    #[error("window {0} already exists")]
    DuplicateId(WindowId),
}

enum Deferred {
    AutoFocus(WindowId),
    RefocusTop,
}

struct State {
    windows: HashMap<WindowId, WindowRecord>,
    order: Vec<WindowId>,
    focused: Option<WindowId>,
    next_z: u32,
}

impl State {
    fn new() -> Self {
        Self {
            windows: HashMap::new(),
            order: Vec::new(),
            focused: None,
            next_z: 1,
        }
    }

    /// Rewrites every z-index as stacking position + 1 and syncs focus flags.
    fn normalize(&mut self) {
        for (idx, id) in self.order.iter().enumerate() {
            if let Some(record) = self.windows.get_mut(id) {
                record.z_index = (idx + 1) as u32;
                record.focused = self.focused == Some(*id);
            }
        }
    }

    fn topmost_eligible(&self) -> Option<WindowId> {
        self.order
            .iter()
            .rev()
            .find(|id| {
                self.windows
                    .get(id)
                    .map(|w| w.visible && !w.minimized)
                    .unwrap_or(false)
            })
            .copied()
    }
}

/// Window registry and z-order engine.
pub struct WindowRegistry {
    state: RefCell<State>,
    viewport: Cell<Rect>,
    listeners: Listeners<WindowEvent>,
    deferred: RefCell<VecDeque<Deferred>>,
    turn_depth: Cell<u32>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::new()),
            viewport: Cell::new(Rect {
                x: 0,
                y: 0,
                w: 1280,
                h: 800,
            }),
            listeners: Listeners::new(),
            deferred: RefCell::new(VecDeque::new()),
            turn_depth: Cell::new(0),
        }
    }

    /// Registers a change listener; returns the unsubscribe handle.
    pub fn subscribe(&self, listener: Rc<dyn Fn(&WindowEvent)>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Creates a window with a caller-chosen identity.
    ///
    /// The new window lands on top of the stacking order and is auto-focused
    /// once the current mutation turn completes.
    pub fn create_window(
        &self,
        id: WindowId,
        app_id: ApplicationId,
        options: WindowOptions,
    ) -> Result<(), WindowError> {
        self.with_turn(|| {
            let record = {
                let mut state = self.state.borrow_mut();
                if state.windows.contains_key(&id) {
                    return Err(WindowError::DuplicateId(id));
                }

                let constraints = options.constraints.unwrap_or_default();
                let cascade = ((state.next_z.saturating_sub(1)) % 8) as i32 * 20;
                let rect = options
                    .rect
                    .unwrap_or(Rect {
                        x: 40 + cascade,
                        y: 48 + cascade,
                        ..Rect::default()
                    })
                    .clamped_min(constraints.min_size);

                state.next_z += 1;
                state.order.push(id);
                let record = WindowRecord {
                    id,
                    app_id,
                    rect,
                    z_index: state.order.len() as u32,
                    focused: false,
                    minimized: false,
                    maximized: false,
                    visible: true,
                    constraints,
                    metadata: options.metadata,
                };
                state.windows.insert(id, record.clone());
                record
            };

            self.listeners.emit(&WindowEvent::Created(record));
            self.deferred.borrow_mut().push_back(Deferred::AutoFocus(id));
            Ok(())
        })
    }

    /// Destroys a window; a no-op when the identity is not live.
    pub fn destroy_window(&self, id: WindowId) {
        self.with_turn(|| {
            let was_focused = {
                let mut state = self.state.borrow_mut();
                if state.windows.remove(&id).is_none() {
                    return;
                }
                state.order.retain(|entry| *entry != id);
                let was_focused = state.focused == Some(id);
                if was_focused {
                    state.focused = None;
                }
                state.normalize();
                was_focused
            };

            self.listeners.emit(&WindowEvent::Destroyed { id });
            if was_focused {
                self.deferred.borrow_mut().push_back(Deferred::RefocusTop);
            }
        });
    }

    /// Focuses a window and raises it to the top of the stacking order.
    ///
    /// A no-op when the identity is not live or the window is minimized.
    pub fn focus_window(&self, id: WindowId) {
        self.with_turn(|| {
            let blurred = {
                let mut state = self.state.borrow_mut();
                let Some(record) = state.windows.get(&id) else {
                    return;
                };
                if record.minimized {
                    return;
                }
                let already_top =
                    state.focused == Some(id) && state.order.last() == Some(&id);
                if already_top {
                    return;
                }

                let blurred = state.focused.filter(|prev| *prev != id);
                state.order.retain(|entry| *entry != id);
                state.order.push(id);
                state.focused = Some(id);
                if let Some(record) = state.windows.get_mut(&id) {
                    record.visible = true;
                }
                state.normalize();
                blurred
            };

            if let Some(prev) = blurred {
                self.listeners.emit(&WindowEvent::Blurred { id: prev });
            }
            self.listeners.emit(&WindowEvent::Focused { id });
        });
    }

    /// Minimizes a window; focus transfers immediately to the next eligible
    /// topmost window when the minimized window held it.
    pub fn minimize_window(&self, id: WindowId) {
        self.with_turn(|| {
            let was_focused = {
                let mut state = self.state.borrow_mut();
                let Some(record) = state.windows.get_mut(&id) else {
                    return;
                };
                if record.minimized || !record.constraints.minimizable {
                    return;
                }
                record.minimized = true;
                record.visible = false;
                record.focused = false;
                let was_focused = state.focused == Some(id);
                if was_focused {
                    state.focused = None;
                }
                state.normalize();
                was_focused
            };

            self.listeners.emit(&WindowEvent::Minimized { id });
            if was_focused {
                self.focus_topmost_eligible();
            }
        });
    }

    pub fn maximize_window(&self, id: WindowId) {
        self.with_turn(|| {
            {
                let mut state = self.state.borrow_mut();
                let Some(record) = state.windows.get_mut(&id) else {
                    return;
                };
                if record.maximized || !record.constraints.maximizable {
                    return;
                }
                record.maximized = true;
            }
            self.listeners.emit(&WindowEvent::Maximized { id });
        });
    }

    /// Restores a minimized or maximized window. Restoring from minimized
    /// re-marks the window visible and focuses it.
    pub fn restore_window(&self, id: WindowId) {
        self.with_turn(|| {
            let refocus = {
                let mut state = self.state.borrow_mut();
                let Some(record) = state.windows.get_mut(&id) else {
                    return;
                };
                if record.minimized {
                    record.minimized = false;
                    record.visible = true;
                    true
                } else if record.maximized {
                    record.maximized = false;
                    false
                } else {
                    return;
                }
            };

            self.listeners.emit(&WindowEvent::Restored { id });
            if refocus {
                self.focus_window(id);
            }
        });
    }

    /// Taskbar semantics: restore when minimized, minimize when focused,
    /// focus otherwise.
    pub fn toggle_window(&self, id: WindowId) {
        let Some(record) = self.window(id) else {
            return;
        };
        if record.minimized {
            self.restore_window(id);
        } else if record.focused {
            self.minimize_window(id);
        } else {
            self.focus_window(id);
        }
    }

    /// Moves a window; silently ignored when its constraints forbid moving.
    pub fn move_window(&self, id: WindowId, x: i32, y: i32) {
        self.with_turn(|| {
            let rect = {
                let mut state = self.state.borrow_mut();
                let Some(record) = state.windows.get_mut(&id) else {
                    return;
                };
                if !record.constraints.movable {
                    return;
                }
                record.rect.x = x;
                record.rect.y = y;
                record.rect
            };
            self.listeners.emit(&WindowEvent::Moved { id, rect });
        });
    }

    /// Resizes a window, clamping to its declared min/max bounds; silently
    /// ignored when its constraints forbid resizing.
    pub fn resize_window(&self, id: WindowId, size: Size) {
        self.with_turn(|| {
            let rect = {
                let mut state = self.state.borrow_mut();
                let Some(record) = state.windows.get_mut(&id) else {
                    return;
                };
                if !record.constraints.resizable {
                    return;
                }
                let min = record.constraints.min_size;
                let max = record.constraints.max_size;
                let mut w = size.w.max(min.w);
                let mut h = size.h.max(min.h);
                if let Some(max) = max {
                    w = w.min(max.w);
                    h = h.min(max.h);
                }
                record.rect.w = w;
                record.rect.h = h;
                record.rect
            };
            self.listeners.emit(&WindowEvent::Resized { id, rect });
        });
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.state.borrow().windows.contains_key(&id)
    }

    pub fn window(&self, id: WindowId) -> Option<WindowRecord> {
        self.state.borrow().windows.get(&id).cloned()
    }

    /// All live windows in stacking order, back to front.
    pub fn windows(&self) -> Vec<WindowRecord> {
        let state = self.state.borrow();
        state
            .order
            .iter()
            .filter_map(|id| state.windows.get(id).cloned())
            .collect()
    }

    pub fn focused_window(&self) -> Option<WindowRecord> {
        let state = self.state.borrow();
        state.focused.and_then(|id| state.windows.get(&id).cloned())
    }

    pub fn stacking_order(&self) -> Vec<WindowId> {
        self.state.borrow().order.clone()
    }

    /// Desktop viewport; shared last-writer-wins state.
    pub fn viewport(&self) -> Rect {
        self.viewport.get()
    }

    pub fn set_viewport(&self, rect: Rect) {
        self.viewport.set(rect);
    }

    /// Produces an opaque snapshot of the full registry.
    pub fn serialized_state(&self) -> Result<String, SnapshotError> {
        let state = self.state.borrow();
        let snapshot = RegistrySnapshot {
            windows: state
                .order
                .iter()
                .filter_map(|id| state.windows.get(id).cloned())
                .collect(),
            order: state.order.clone(),
            focused: state.focused,
            next_z: state.next_z,
            viewport: Some(self.viewport.get()),
        };
        persistence::encode_snapshot(&snapshot)
    }

    /// Replaces the entire registry state from a snapshot blob.
    ///
    /// Validation happens before any mutation: a malformed blob leaves the
    /// live registry untouched and returns the error.
    pub fn load_serialized_state(&self, raw: &str) -> Result<(), SnapshotError> {
        let snapshot = persistence::decode_snapshot(raw)?;

        let mut state = State::new();
        state.next_z = snapshot.next_z;
        state.focused = snapshot.focused;
        state.order = snapshot.order;
        state.windows = snapshot
            .windows
            .into_iter()
            .map(|record| (record.id, record))
            .collect();
        state.normalize();

        *self.state.borrow_mut() = state;
        if let Some(viewport) = snapshot.viewport {
            self.viewport.set(viewport);
        }
        Ok(())
    }

    /// Grants focus to the topmost eligible window without reordering the
    /// stack. Used for focus transfer after destroy/minimize; the revealed
    /// window is already in place, so no raise happens.
    fn focus_topmost_eligible(&self) {
        let focused = {
            let mut state = self.state.borrow_mut();
            if state.focused.is_some() {
                return;
            }
            let Some(id) = state.topmost_eligible() else {
                return;
            };
            state.focused = Some(id);
            state.normalize();
            id
        };
        self.listeners.emit(&WindowEvent::Focused { id: focused });
    }

    /// Runs `f` inside a mutation turn; deferred tasks queued during the turn
    /// (and any they enqueue in turn) are drained when the outermost turn
    /// returns.
    fn with_turn<T>(&self, f: impl FnOnce() -> T) -> T {
        self.turn_depth.set(self.turn_depth.get() + 1);
        let out = f();
        if self.turn_depth.get() == 1 {
            self.drain_deferred();
        }
        self.turn_depth.set(self.turn_depth.get() - 1);
        out
    }

    fn drain_deferred(&self) {
        loop {
            let task = self.deferred.borrow_mut().pop_front();
            match task {
                Some(Deferred::AutoFocus(id)) => self.focus_window(id),
                Some(Deferred::RefocusTop) => self.focus_topmost_eligible(),
                None => break,
            }
        }
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;

    fn app() -> ApplicationId {
        ApplicationId::trusted("coredesk.test")
    }

    fn create(registry: &WindowRegistry, id: u64) -> WindowId {
        let window = WindowId(id);
        registry
            .create_window(window, app(), WindowOptions::default())
            .expect("create window");
        window
    }

    fn recorded_events(registry: &WindowRegistry) -> Rc<RefCell<Vec<WindowEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        registry.subscribe(Rc::new(move |event| sink.borrow_mut().push(event.clone())));
        events
    }

    fn assert_invariants(registry: &WindowRegistry) {
        let windows = registry.windows();
        let order = registry.stacking_order();
        assert_eq!(order.len(), windows.len());
        let focused: Vec<_> = windows.iter().filter(|w| w.focused).collect();
        assert!(focused.len() <= 1, "more than one focused window");
        if let Some(focused) = focused.first() {
            assert!(focused.visible && !focused.minimized);
        }
        for (idx, window) in windows.iter().enumerate() {
            assert_eq!(window.z_index, (idx + 1) as u32);
            assert_eq!(window.id, order[idx]);
        }
    }

    #[test]
    fn create_appends_on_top_and_auto_focuses_after_the_turn() {
        let registry = WindowRegistry::new();
        let events = recorded_events(&registry);

        let first = create(&registry, 1);
        let second = create(&registry, 2);

        assert_eq!(registry.stacking_order(), vec![first, second]);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(second));
        assert_invariants(&registry);

        let kinds: Vec<_> = events
            .borrow()
            .iter()
            .map(|event| match event {
                WindowEvent::Created(record) => format!("created:{}", record.id.0),
                WindowEvent::Focused { id } => format!("focused:{}", id.0),
                WindowEvent::Blurred { id } => format!("blurred:{}", id.0),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "created:1".to_string(),
                "focused:1".to_string(),
                "created:2".to_string(),
                "blurred:1".to_string(),
                "focused:2".to_string(),
            ]
        );
    }

    #[test]
    fn duplicate_create_fails_without_mutation() {
        let registry = WindowRegistry::new();
        let id = create(&registry, 1);
        let before = registry.windows();

        let result = registry.create_window(id, app(), WindowOptions::default());
        assert_eq!(result, Err(WindowError::DuplicateId(id)));
        assert_eq!(registry.windows(), before);
    }

    #[test]
    fn focus_raises_to_top_and_recomputes_z_indices() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);
        let third = create(&registry, 3);

        registry.focus_window(first);

        assert_eq!(registry.stacking_order(), vec![second, third, first]);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(first));
        assert_invariants(&registry);
    }

    #[test]
    fn focusing_a_minimized_window_is_a_no_op() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);

        registry.minimize_window(first);
        registry.focus_window(first);

        assert_eq!(registry.focused_window().map(|w| w.id), Some(second));
        assert!(registry.window(first).expect("window").minimized);
    }

    #[test]
    fn minimize_transfers_focus_immediately_to_next_eligible() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);

        registry.minimize_window(second);

        assert_eq!(registry.focused_window().map(|w| w.id), Some(first));
        assert_invariants(&registry);

        registry.minimize_window(first);
        assert_eq!(registry.focused_window(), None);
    }

    #[test]
    fn destroying_the_focused_window_refocuses_the_topmost_eligible() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);
        let third = create(&registry, 3);

        registry.minimize_window(second);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(third));

        registry.destroy_window(third);

        assert_eq!(registry.focused_window().map(|w| w.id), Some(first));
        assert_eq!(registry.stacking_order(), vec![first, second]);
        assert_invariants(&registry);
    }

    #[test]
    fn destroying_an_unknown_window_is_a_no_op() {
        let registry = WindowRegistry::new();
        let id = create(&registry, 1);
        registry.destroy_window(WindowId(99));
        assert_eq!(registry.stacking_order(), vec![id]);
    }

    #[test]
    fn restore_from_minimized_marks_visible_and_focuses() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);

        registry.minimize_window(second);
        registry.restore_window(second);

        let record = registry.window(second).expect("window");
        assert!(!record.minimized);
        assert!(record.visible);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(second));
        assert_eq!(registry.stacking_order(), vec![first, second]);
    }

    #[test]
    fn maximize_and_restore_toggle_the_flag_only() {
        let registry = WindowRegistry::new();
        let id = create(&registry, 1);
        let rect_before = registry.window(id).expect("window").rect;

        registry.maximize_window(id);
        assert!(registry.window(id).expect("window").maximized);
        assert_eq!(registry.window(id).expect("window").rect, rect_before);

        registry.restore_window(id);
        assert!(!registry.window(id).expect("window").maximized);
    }

    #[test]
    fn move_is_silently_rejected_by_constraints() {
        let registry = WindowRegistry::new();
        let id = WindowId(1);
        let mut options = WindowOptions::default();
        options.constraints = Some(coredesk_app_contract::WindowConstraints {
            movable: false,
            ..Default::default()
        });
        registry.create_window(id, app(), options).expect("create");
        let before = registry.window(id).expect("window").rect;

        registry.move_window(id, 500, 500);
        assert_eq!(registry.window(id).expect("window").rect, before);
    }

    #[test]
    fn resize_clamps_to_declared_bounds() {
        let registry = WindowRegistry::new();
        let id = WindowId(1);
        let mut options = WindowOptions::default();
        options.constraints = Some(coredesk_app_contract::WindowConstraints {
            min_size: Size { w: 200, h: 100 },
            max_size: Some(Size { w: 400, h: 300 }),
            ..Default::default()
        });
        registry.create_window(id, app(), options).expect("create");

        registry.resize_window(id, Size { w: 1000, h: 50 });
        let rect = registry.window(id).expect("window").rect;
        assert_eq!((rect.w, rect.h), (400, 100));
    }

    #[test]
    fn toggle_window_cycles_restore_minimize_focus() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);

        registry.toggle_window(second);
        assert!(registry.window(second).expect("window").minimized);

        registry.toggle_window(second);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(second));

        registry.toggle_window(first);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(first));
    }

    #[test]
    fn snapshot_round_trip_reproduces_the_registry() {
        let registry = WindowRegistry::new();
        let first = create(&registry, 1);
        let second = create(&registry, 2);
        let _third = create(&registry, 3);
        registry.minimize_window(second);
        registry.focus_window(first);

        let raw = registry.serialized_state().expect("serialize");
        let restored = WindowRegistry::new();
        restored.load_serialized_state(&raw).expect("load");

        assert_eq!(restored.windows(), registry.windows());
        assert_eq!(restored.stacking_order(), registry.stacking_order());
        assert_eq!(
            restored.focused_window().map(|w| w.id),
            registry.focused_window().map(|w| w.id)
        );
        assert_invariants(&restored);
    }

    #[test]
    fn malformed_snapshot_leaves_prior_state_untouched() {
        let registry = WindowRegistry::new();
        let id = create(&registry, 1);
        let before = registry.windows();

        assert!(registry.load_serialized_state("not json").is_err());
        assert!(registry
            .load_serialized_state(r#"{"schema_version":99,"payload":{}}"#)
            .is_err());

        assert_eq!(registry.windows(), before);
        assert_eq!(registry.focused_window().map(|w| w.id), Some(id));
    }

    #[test]
    fn operations_on_destroyed_identities_stay_silent() {
        let registry = WindowRegistry::new();
        let id = create(&registry, 1);
        registry.destroy_window(id);

        registry.focus_window(id);
        registry.minimize_window(id);
        registry.maximize_window(id);
        registry.restore_window(id);
        registry.move_window(id, 1, 1);
        registry.resize_window(id, Size { w: 300, h: 300 });

        assert_eq!(registry.windows(), Vec::new());
        assert_eq!(registry.focused_window(), None);
    }
}
