//! Catalog of installable application manifests and their runtime components.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use coredesk_app_contract::{AppComponent, AppManifest, ApplicationId};
use thiserror::Error;

use crate::events::{Listeners, SubscriptionId};

/// Change notifications emitted by [`AppRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Registered { id: ApplicationId },
    Unregistered { id: ApplicationId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registration was attempted for an identity that is already present.
    #[error("application `{0}` is already registered")]
    DuplicateId(ApplicationId),
}

struct Entry {
    manifest: AppManifest,
    component: AppComponent,
}

/// Application registry; manifests are immutable once registered.
pub struct AppRegistry {
    entries: RefCell<HashMap<ApplicationId, Entry>>,
    /// Registration order for deterministic query results.
    order: RefCell<Vec<ApplicationId>>,
    listeners: Listeners<RegistryEvent>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            order: RefCell::new(Vec::new()),
            listeners: Listeners::new(),
        }
    }

    pub fn subscribe(&self, listener: Rc<dyn Fn(&RegistryEvent)>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Registers a manifest and its component.
    ///
    /// Callers validate manifests beforehand when they want the report;
    /// registration itself only rejects duplicate identities.
    pub fn register(
        &self,
        manifest: AppManifest,
        component: AppComponent,
    ) -> Result<(), RegistryError> {
        let id = manifest.id.clone();
        {
            let mut entries = self.entries.borrow_mut();
            if entries.contains_key(&id) {
                return Err(RegistryError::DuplicateId(id));
            }
            entries.insert(id.clone(), Entry { manifest, component });
            self.order.borrow_mut().push(id.clone());
        }
        self.listeners.emit(&RegistryEvent::Registered { id });
        Ok(())
    }

    /// Removes a registration; returns false when the identity is absent.
    pub fn unregister(&self, id: &ApplicationId) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let removed = entries.remove(id).is_some();
            if removed {
                self.order.borrow_mut().retain(|entry| entry != id);
            }
            removed
        };
        if removed {
            self.listeners
                .emit(&RegistryEvent::Unregistered { id: id.clone() });
        }
        removed
    }

    pub fn manifest(&self, id: &ApplicationId) -> Option<AppManifest> {
        self.entries
            .borrow()
            .get(id)
            .map(|entry| entry.manifest.clone())
    }

    pub fn component(&self, id: &ApplicationId) -> Option<AppComponent> {
        self.entries
            .borrow()
            .get(id)
            .map(|entry| entry.component.clone())
    }

    /// All manifests in registration order.
    pub fn manifests(&self) -> Vec<AppManifest> {
        let entries = self.entries.borrow();
        self.order
            .borrow()
            .iter()
            .filter_map(|id| entries.get(id).map(|entry| entry.manifest.clone()))
            .collect()
    }

    /// Manifests whose category exactly matches `category`.
    pub fn manifests_in_category(&self, category: &str) -> Vec<AppManifest> {
        self.manifests()
            .into_iter()
            .filter(|manifest| manifest.category.as_deref() == Some(category))
            .collect()
    }

    /// Case-insensitive substring search over display name, description, and
    /// keywords; a match in any field qualifies.
    pub fn search(&self, query: &str) -> Vec<AppManifest> {
        let needle = query.to_lowercase();
        self.manifests()
            .into_iter()
            .filter(|manifest| {
                manifest.display_name.to_lowercase().contains(&needle)
                    || manifest.description.to_lowercase().contains(&needle)
                    || manifest
                        .keywords
                        .iter()
                        .any(|keyword| keyword.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Manifests that request launch at desktop boot.
    pub fn autostart_manifests(&self) -> Vec<AppManifest> {
        self.manifests()
            .into_iter()
            .filter(|manifest| manifest.launch.autostart)
            .collect()
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}
