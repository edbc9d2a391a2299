//! Application lifecycle engine: running instances, their state machine, and
//! inter-instance messaging.
//!
//! Transitions only happen through the named operations; an operation
//! attempted from any other state is a silent no-op so concurrent callers
//! can race without errors. Hooks are awaited sequentially; a mount failure
//! becomes a `Crashed` transition, every other hook failure is absorbed.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use coredesk_app_contract::{AppMessage, ApplicationId, HookContext, InstanceId, MessageAddress};
use serde_json::Value;
use thiserror::Error;

use crate::app_registry::AppRegistry;
use crate::events::{Listeners, SubscriptionId};
use crate::model::WindowId;
use crate::time;

/// Termination reason used when an instance loses its last window.
pub const NO_WINDOWS_REASON: &str = "no windows remaining";

/// Lifecycle states of one application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Loading,
    Running,
    Suspended,
    Stopping,
    /// Absorbing state entered when the mount hook fails; the instance stays
    /// queryable for diagnostics until explicitly terminated.
    Crashed,
}

/// One running application session.
#[derive(Debug, Clone, PartialEq)]
pub struct AppInstance {
    pub id: InstanceId,
    pub app_id: ApplicationId,
    pub state: InstanceState,
    /// Windows the bridge has associated with this instance.
    pub window_ids: Vec<WindowId>,
    pub created_at_ms: u64,
    pub last_active_ms: u64,
    /// Launch context blob (arguments, environment, user data).
    pub context: Value,
}

/// Change notifications emitted by [`LifecycleEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Launched { instance: InstanceId, app: ApplicationId },
    Crashed { instance: InstanceId, error: String },
    Suspended { instance: InstanceId },
    Resumed { instance: InstanceId },
    Terminated { instance: InstanceId, reason: String },
    WindowAttached { instance: InstanceId, window: WindowId },
    WindowDetached { instance: InstanceId, window: WindowId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("application `{0}` is not registered")]
    UnknownApplication(ApplicationId),
}

/// Per-instance message handler; delivery is fire-and-forget.
pub type MessageHandler = Rc<dyn Fn(&AppMessage)>;

/// Application lifecycle engine.
pub struct LifecycleEngine {
    apps: Rc<AppRegistry>,
    instances: RefCell<BTreeMap<InstanceId, AppInstance>>,
    handlers: RefCell<BTreeMap<InstanceId, MessageHandler>>,
    next_instance_id: Cell<u64>,
    listeners: Listeners<LifecycleEvent>,
}

impl LifecycleEngine {
    pub fn new(apps: Rc<AppRegistry>) -> Self {
        Self {
            apps,
            instances: RefCell::new(BTreeMap::new()),
            handlers: RefCell::new(BTreeMap::new()),
            next_instance_id: Cell::new(1),
            listeners: Listeners::new(),
        }
    }

    /// The application registry this engine resolves manifests through.
    pub fn registry(&self) -> Rc<AppRegistry> {
        self.apps.clone()
    }

    pub fn subscribe(&self, listener: Rc<dyn Fn(&LifecycleEvent)>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Launches an instance of `app_id`.
    ///
    /// Singleton applications reuse their live instance: the existing id is
    /// returned, marked recently active, and no `Launched` event fires.
    /// Otherwise a fresh instance enters `Running` and the mount hook is
    /// awaited; a mount failure transitions the instance to `Crashed`
    /// without removing it.
    pub async fn launch(
        &self,
        app_id: &ApplicationId,
        context: Value,
    ) -> Result<InstanceId, LaunchError> {
        let manifest = self
            .apps
            .manifest(app_id)
            .ok_or_else(|| LaunchError::UnknownApplication(app_id.clone()))?;

        if manifest.launch.singleton {
            let existing = self
                .instances
                .borrow()
                .values()
                .find(|instance| {
                    instance.app_id == *app_id
                        && matches!(
                            instance.state,
                            InstanceState::Running | InstanceState::Suspended
                        )
                })
                .map(|instance| instance.id);
            if let Some(id) = existing {
                if let Some(instance) = self.instances.borrow_mut().get_mut(&id) {
                    instance.last_active_ms = time::next_monotonic_timestamp_ms();
                }
                return Ok(id);
            }
        }

        let id = InstanceId(self.next_instance_id.get());
        self.next_instance_id.set(self.next_instance_id.get() + 1);
        let instance = AppInstance {
            id,
            app_id: app_id.clone(),
            state: InstanceState::Loading,
            window_ids: Vec::new(),
            created_at_ms: time::unix_time_ms_now(),
            last_active_ms: time::next_monotonic_timestamp_ms(),
            context: context.clone(),
        };
        self.instances.borrow_mut().insert(id, instance);

        if let Some(instance) = self.instances.borrow_mut().get_mut(&id) {
            instance.state = InstanceState::Running;
        }
        self.listeners.emit(&LifecycleEvent::Launched {
            instance: id,
            app: app_id.clone(),
        });

        if let Some(hook) = self.apps.component(app_id).and_then(|c| c.on_mount) {
            let hook_context = HookContext {
                instance_id: id,
                app_id: app_id.clone(),
                context,
            };
            if let Err(err) = hook(hook_context).await {
                log::warn!("mount hook for {id} failed: {err}");
                let crashed = {
                    let mut instances = self.instances.borrow_mut();
                    match instances.get_mut(&id) {
                        Some(instance) if instance.state == InstanceState::Running => {
                            instance.state = InstanceState::Crashed;
                            true
                        }
                        _ => false,
                    }
                };
                if crashed {
                    self.listeners.emit(&LifecycleEvent::Crashed {
                        instance: id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(id)
    }

    /// Terminates an instance; returns false when the identity is absent or
    /// already stopping.
    ///
    /// The unmount hook is awaited but its failure never blocks removal.
    pub async fn terminate(&self, id: InstanceId, reason: impl Into<String>) -> bool {
        let (app_id, context) = {
            let mut instances = self.instances.borrow_mut();
            let Some(instance) = instances.get_mut(&id) else {
                return false;
            };
            if instance.state == InstanceState::Stopping {
                return false;
            }
            instance.state = InstanceState::Stopping;
            (instance.app_id.clone(), instance.context.clone())
        };

        if let Some(hook) = self.apps.component(&app_id).and_then(|c| c.on_unmount) {
            let hook_context = HookContext {
                instance_id: id,
                app_id,
                context,
            };
            if let Err(err) = hook(hook_context).await {
                log::warn!("unmount hook for {id} failed: {err}");
            }
        }

        self.instances.borrow_mut().remove(&id);
        self.handlers.borrow_mut().remove(&id);
        self.listeners.emit(&LifecycleEvent::Terminated {
            instance: id,
            reason: reason.into(),
        });
        true
    }

    /// Suspends a running instance of a suspend-capable application.
    pub async fn suspend(&self, id: InstanceId) {
        let (app_id, context) = {
            let instances = self.instances.borrow();
            let Some(instance) = instances.get(&id) else {
                return;
            };
            if instance.state != InstanceState::Running {
                return;
            }
            (instance.app_id.clone(), instance.context.clone())
        };

        let supports_suspend = self
            .apps
            .manifest(&app_id)
            .map(|m| m.capabilities.supports_suspend)
            .unwrap_or(false);
        if !supports_suspend {
            return;
        }

        if let Some(instance) = self.instances.borrow_mut().get_mut(&id) {
            instance.state = InstanceState::Suspended;
        }
        self.listeners.emit(&LifecycleEvent::Suspended { instance: id });

        if let Some(hook) = self.apps.component(&app_id).and_then(|c| c.on_suspend) {
            let hook_context = HookContext {
                instance_id: id,
                app_id,
                context,
            };
            if let Err(err) = hook(hook_context).await {
                log::warn!("suspend hook for {id} failed: {err}");
            }
        }
    }

    /// Resumes a suspended instance and marks it recently active.
    pub async fn resume(&self, id: InstanceId) {
        let (app_id, context) = {
            let mut instances = self.instances.borrow_mut();
            let Some(instance) = instances.get_mut(&id) else {
                return;
            };
            if instance.state != InstanceState::Suspended {
                return;
            }
            instance.state = InstanceState::Running;
            instance.last_active_ms = time::next_monotonic_timestamp_ms();
            (instance.app_id.clone(), instance.context.clone())
        };

        self.listeners.emit(&LifecycleEvent::Resumed { instance: id });

        if let Some(hook) = self.apps.component(&app_id).and_then(|c| c.on_resume) {
            let hook_context = HookContext {
                instance_id: id,
                app_id,
                context,
            };
            if let Err(err) = hook(hook_context).await {
                log::warn!("resume hook for {id} failed: {err}");
            }
        }
    }

    /// Associates a window with an instance; duplicates are ignored.
    pub fn add_window_to_instance(&self, id: InstanceId, window: WindowId) {
        let attached = {
            let mut instances = self.instances.borrow_mut();
            let Some(instance) = instances.get_mut(&id) else {
                return;
            };
            if instance.window_ids.contains(&window) {
                false
            } else {
                instance.window_ids.push(window);
                true
            }
        };
        if attached {
            self.listeners.emit(&LifecycleEvent::WindowAttached {
                instance: id,
                window,
            });
        }
    }

    /// Removes a window association.
    ///
    /// Losing the last window of an instance whose application does not
    /// support background mode terminates the instance.
    pub fn remove_window_from_instance(&self, id: InstanceId, window: WindowId) {
        let (removed, now_empty, app_id) = {
            let mut instances = self.instances.borrow_mut();
            let Some(instance) = instances.get_mut(&id) else {
                return;
            };
            let before = instance.window_ids.len();
            instance.window_ids.retain(|entry| *entry != window);
            (
                instance.window_ids.len() != before,
                instance.window_ids.is_empty(),
                instance.app_id.clone(),
            )
        };
        if !removed {
            return;
        }

        self.listeners.emit(&LifecycleEvent::WindowDetached {
            instance: id,
            window,
        });

        let background = self
            .apps
            .manifest(&app_id)
            .map(|m| m.capabilities.supports_background_mode)
            .unwrap_or(false);
        if now_empty && !background {
            futures::executor::block_on(self.terminate(id, NO_WINDOWS_REASON));
        }
    }

    /// Registers the message handler for a live instance.
    pub fn set_message_handler(&self, id: InstanceId, handler: MessageHandler) {
        if !self.instances.borrow().contains_key(&id) {
            return;
        }
        self.handlers.borrow_mut().insert(id, handler);
    }

    pub fn clear_message_handler(&self, id: InstanceId) -> bool {
        self.handlers.borrow_mut().remove(&id).is_some()
    }

    /// Delivers a message best-effort; instances without a registered handler
    /// are skipped silently.
    pub fn send_message(&self, message: &AppMessage) {
        match message.to {
            MessageAddress::Broadcast => {
                let targets: Vec<(InstanceId, MessageHandler)> = self
                    .handlers
                    .borrow()
                    .iter()
                    .map(|(id, handler)| (*id, handler.clone()))
                    .collect();
                for (id, handler) in targets {
                    if message.from == Some(id) {
                        continue;
                    }
                    handler(message);
                }
            }
            MessageAddress::Instance { id } => {
                let handler = self.handlers.borrow().get(&id).cloned();
                match handler {
                    Some(handler) => handler(message),
                    None => log::debug!("dropping message to {id}: no handler registered"),
                }
            }
        }
    }

    pub fn instance(&self, id: InstanceId) -> Option<AppInstance> {
        self.instances.borrow().get(&id).cloned()
    }

    /// All live instances in id order.
    pub fn instances(&self) -> Vec<AppInstance> {
        self.instances.borrow().values().cloned().collect()
    }

    pub fn instances_of(&self, app_id: &ApplicationId) -> Vec<AppInstance> {
        self.instances
            .borrow()
            .values()
            .filter(|instance| instance.app_id == *app_id)
            .cloned()
            .collect()
    }
}
