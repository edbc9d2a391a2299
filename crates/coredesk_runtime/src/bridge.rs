//! Window–application bridge: keeps the window↔instance association table
//! consistent with window lifecycle events and applies the background-mode
//! window-loss policy through the lifecycle engine.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use coredesk_app_contract::InstanceId;
use serde_json::Value;
use thiserror::Error;

use crate::lifecycle::{LifecycleEngine, LifecycleEvent};
use crate::model::{WindowId, WindowOptions};
use crate::window_registry::{WindowEvent, WindowRegistry};

/// Metadata key carrying the owning instance on managed windows.
pub const INSTANCE_METADATA_KEY: &str = "instanceId";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{0} is not live")]
    UnknownInstance(InstanceId),
}

/// Bidirectional window↔instance association maintained from window events.
pub struct WindowAppBridge {
    windows: Rc<WindowRegistry>,
    lifecycle: Rc<LifecycleEngine>,
    associations: RefCell<HashMap<WindowId, InstanceId>>,
    next_window_id: Cell<u64>,
}

impl WindowAppBridge {
    /// Builds the bridge and subscribes it to window and lifecycle events.
    pub fn attach(windows: Rc<WindowRegistry>, lifecycle: Rc<LifecycleEngine>) -> Rc<Self> {
        let bridge = Rc::new(Self {
            windows: windows.clone(),
            lifecycle: lifecycle.clone(),
            associations: RefCell::new(HashMap::new()),
            next_window_id: Cell::new(1),
        });

        let listener = Rc::downgrade(&bridge);
        windows.subscribe(Rc::new(move |event: &WindowEvent| {
            if let Some(bridge) = listener.upgrade() {
                bridge.on_window_event(event);
            }
        }));

        let listener = Rc::downgrade(&bridge);
        lifecycle.subscribe(Rc::new(move |event: &LifecycleEvent| {
            if let Some(bridge) = listener.upgrade() {
                if let LifecycleEvent::Terminated { instance, .. } = event {
                    bridge.on_instance_terminated(*instance);
                }
            }
        }));

        bridge
    }

    /// Opens a window for `instance_id`, merging caller-supplied geometry and
    /// constraints over the application's declared window defaults (caller
    /// values win). The association is recorded before the registry emits its
    /// create event, so the event listener path is redundant by construction.
    pub fn create_window_for_app(
        &self,
        instance_id: InstanceId,
        options: WindowOptions,
    ) -> Result<WindowId, BridgeError> {
        let instance = self
            .lifecycle
            .instance(instance_id)
            .ok_or(BridgeError::UnknownInstance(instance_id))?;

        let defaults = self
            .lifecycle
            .registry()
            .manifest(&instance.app_id)
            .map(|manifest| manifest.window_defaults)
            .unwrap_or_default();

        let mut merged = WindowOptions {
            rect: options.rect.or(defaults.rect),
            constraints: Some(options.constraints.unwrap_or(defaults.constraints)),
            metadata: options.metadata,
        };
        merged
            .metadata
            .insert(INSTANCE_METADATA_KEY.to_string(), Value::from(instance_id.0));

        loop {
            let window_id = WindowId(self.next_window_id.get());
            self.next_window_id.set(self.next_window_id.get() + 1);
            if self.windows.contains(window_id) {
                continue;
            }

            self.associations.borrow_mut().insert(window_id, instance_id);
            match self
                .windows
                .create_window(window_id, instance.app_id.clone(), merged.clone())
            {
                Ok(()) => return Ok(window_id),
                Err(err) => {
                    // Lost a duplicate-id race with a direct registry caller.
                    log::warn!("bridge window create retry for {instance_id}: {err}");
                    self.associations.borrow_mut().remove(&window_id);
                }
            }
        }
    }

    pub fn instance_for_window(&self, window: WindowId) -> Option<InstanceId> {
        self.associations.borrow().get(&window).copied()
    }

    /// Windows currently associated with `instance`, in id order.
    pub fn windows_for_instance(&self, instance: InstanceId) -> Vec<WindowId> {
        let mut windows: Vec<WindowId> = self
            .associations
            .borrow()
            .iter()
            .filter(|(_, owner)| **owner == instance)
            .map(|(window, _)| *window)
            .collect();
        windows.sort();
        windows
    }

    fn on_window_event(&self, event: &WindowEvent) {
        match event {
            WindowEvent::Created(record) => {
                let Some(instance) = record
                    .metadata
                    .get(INSTANCE_METADATA_KEY)
                    .and_then(Value::as_u64)
                    .map(InstanceId)
                else {
                    return;
                };
                self.associations.borrow_mut().insert(record.id, instance);
                self.lifecycle.add_window_to_instance(instance, record.id);
            }
            WindowEvent::Destroyed { id } => {
                let association = self.associations.borrow_mut().remove(id);
                if let Some(instance) = association {
                    self.lifecycle.remove_window_from_instance(instance, *id);
                }
            }
            _ => {}
        }
    }

    /// Closes every window still associated with a terminated instance.
    fn on_instance_terminated(&self, instance: InstanceId) {
        let windows = self.windows_for_instance(instance);
        for window in windows {
            self.windows.destroy_window(window);
        }
        self.associations
            .borrow_mut()
            .retain(|_, owner| *owner != instance);
    }
}
