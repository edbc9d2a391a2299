//! Headless desktop core: window registry and z-order engine, application
//! registry and lifecycle engine, the window–application bridge, and the
//! input event router.
//!
//! All state mutation runs on a single cooperative control flow; components
//! are explicit values shared behind `Rc` and wired together by
//! [`runtime_context::DesktopRuntime`].

pub mod app_registry;
pub mod bridge;
pub mod events;
pub mod input;
pub mod lifecycle;
pub mod model;
pub mod persistence;
pub mod runtime_context;
pub mod time;
pub mod window_registry;

pub use app_registry::{AppRegistry, RegistryError, RegistryEvent};
pub use bridge::{WindowAppBridge, BridgeError, INSTANCE_METADATA_KEY};
pub use events::{Listeners, SubscriptionId};
pub use lifecycle::{AppInstance, InstanceState, LifecycleEngine, LifecycleEvent, LaunchError};
pub use model::{WindowId, WindowOptions, WindowRecord};
pub use persistence::SnapshotError;
pub use runtime_context::DesktopRuntime;
pub use window_registry::{WindowError, WindowEvent, WindowRegistry};
