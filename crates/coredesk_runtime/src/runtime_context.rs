//! Runtime wiring for the desktop core.
//!
//! [`DesktopRuntime`] owns the process-lifetime component instances and the
//! bridge subscriptions between them. Tests construct isolated runtimes;
//! nothing here is a module-level global.

use std::rc::Rc;

use serde_json::Value;

use crate::app_registry::AppRegistry;
use crate::bridge::WindowAppBridge;
use crate::input::InputRouter;
use crate::lifecycle::LifecycleEngine;
use crate::window_registry::WindowRegistry;

/// The wired set of desktop core components.
pub struct DesktopRuntime {
    pub apps: Rc<AppRegistry>,
    pub lifecycle: Rc<LifecycleEngine>,
    pub windows: Rc<WindowRegistry>,
    pub bridge: Rc<WindowAppBridge>,
    pub input: Rc<InputRouter>,
}

impl DesktopRuntime {
    /// Builds a fresh component set and attaches the bridge subscriptions.
    pub fn new() -> Self {
        let apps = Rc::new(AppRegistry::new());
        let lifecycle = Rc::new(LifecycleEngine::new(apps.clone()));
        let windows = Rc::new(WindowRegistry::new());
        let bridge = WindowAppBridge::attach(windows.clone(), lifecycle.clone());
        let input = Rc::new(InputRouter::new());

        Self {
            apps,
            lifecycle,
            windows,
            bridge,
            input,
        }
    }

    /// Launches every registered autostart application.
    ///
    /// Launch failures are logged and skipped so one bad manifest cannot
    /// block the rest of boot. Returns the number of instances launched.
    pub async fn boot_autostart(&self) -> usize {
        let mut launched = 0;
        for manifest in self.apps.autostart_manifests() {
            match self.lifecycle.launch(&manifest.id, Value::Null).await {
                Ok(_) => launched += 1,
                Err(err) => log::warn!("autostart of `{}` failed: {err}", manifest.id),
            }
        }
        launched
    }
}

impl Default for DesktopRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use coredesk_app_contract::{AppComponent, AppManifest, ApplicationId, RenderFn};
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::input::{
        ContextFilter, InteractionHandler, InteractionOutcome, KeyCombination, Modifier,
        ModifierState, RawInputEvent, Shortcut,
    };
    use crate::input::DeviceEvent;
    use crate::model::WindowOptions;

    fn render() -> RenderFn {
        Rc::new(|_| json!({}))
    }

    fn register(runtime: &DesktopRuntime, id: &str, mutate: impl FnOnce(&mut AppManifest)) {
        let mut manifest = AppManifest::new(ApplicationId::trusted(id), id, "1.0.0");
        mutate(&mut manifest);
        runtime
            .apps
            .register(manifest, AppComponent::new(render()))
            .expect("register");
    }

    #[test]
    fn boot_autostart_launches_flagged_manifests_only() {
        let runtime = DesktopRuntime::new();
        register(&runtime, "coredesk.dock", |manifest| {
            manifest.launch.autostart = true;
            manifest.capabilities.supports_background_mode = true;
        });
        register(&runtime, "coredesk.notes", |_| {});

        let launched = block_on(runtime.boot_autostart());

        assert_eq!(launched, 1);
        assert_eq!(runtime.lifecycle.instances().len(), 1);
        assert_eq!(
            runtime.lifecycle.instances()[0].app_id,
            ApplicationId::trusted("coredesk.dock")
        );
    }

    #[test]
    fn shortcut_driven_window_mutation_flows_through_the_components() {
        let runtime = DesktopRuntime::new();
        register(&runtime, "coredesk.notes", |_| {});

        let app_id = ApplicationId::trusted("coredesk.notes");
        let instance = block_on(runtime.lifecycle.launch(&app_id, json!(null))).expect("launch");
        let window = runtime
            .bridge
            .create_window_for_app(instance, WindowOptions::default())
            .expect("window");
        assert_eq!(runtime.windows.focused_window().map(|w| w.id), Some(window));

        let windows = runtime.windows.clone();
        runtime.input.register_shortcut(Shortcut {
            id: "minimize-focused".to_string(),
            combination: KeyCombination::new([Modifier::Ctrl], "m"),
            filter: ContextFilter::default(),
            handler: Rc::new(move |_| {
                if let Some(focused) = windows.focused_window() {
                    windows.minimize_window(focused.id);
                }
                Ok(())
            }),
            enabled: true,
        });

        let consumed = runtime.input.process(
            RawInputEvent::new(
                DeviceEvent::KeyDown {
                    key: "m".to_string(),
                    repeat: false,
                },
                10,
            )
            .with_modifiers(ModifierState {
                ctrl: true,
                ..Default::default()
            }),
        );

        assert!(consumed);
        assert!(runtime.windows.window(window).expect("window").minimized);
        assert_eq!(runtime.windows.focused_window(), None);
    }

    #[test]
    fn unconsumed_events_fall_through_to_interaction_handlers() {
        let runtime = DesktopRuntime::new();
        let windows = runtime.windows.clone();
        runtime
            .windows
            .create_window(
                crate::model::WindowId(1),
                ApplicationId::trusted("coredesk.notes"),
                WindowOptions::default(),
            )
            .expect("create");

        runtime.input.register_interaction_handler(InteractionHandler {
            id: "desktop-click".to_string(),
            priority: 0,
            filter: ContextFilter::default(),
            accepts: Rc::new(|event| event.is_press()),
            handler: Rc::new(move |_| {
                windows.toggle_window(crate::model::WindowId(1));
                Ok(InteractionOutcome::Consumed)
            }),
        });

        let consumed = runtime.input.process(RawInputEvent::new(
            DeviceEvent::PointerPress {
                position: crate::input::Point::new(5.0, 5.0),
            },
            1,
        ));

        assert!(consumed);
        assert!(runtime
            .windows
            .window(crate::model::WindowId(1))
            .expect("window")
            .minimized);
    }
}
