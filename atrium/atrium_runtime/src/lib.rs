//! Atrium Runtime - in-process UI extension runtime
//!
//! This crate provides the runtime components of the Atrium system: the
//! plugin registry, the event bus, per-plugin state persistence, the lazy
//! loader, and the per-zone lifecycle manager, composed behind a `Runtime`
//! facade.
//!
//! Instances are explicit. A host constructs a `Runtime` from a
//! configuration, a storage backend, and a module resolver; nothing is
//! process-global, so multiple isolated runtimes (one per test, one per
//! embedded host) coexist freely.

pub mod config;
pub mod events;
pub mod loader;
pub mod registry;
pub mod state;
pub mod zone;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::json;
use tracing::info;

use atrium_core::{ModuleResolver, PluginDescriptor, PluginId, Result, Section};

use config::RuntimeConfig;
use events::{EventBus, UNREGISTERED_EVENT};
use loader::LazyLoader;
use registry::PluginRegistry;
use state::{FileStorage, StateStore, StorageBackend};
use zone::{ZoneManager, ZoneSlot};

/// Runtime facade composing the registry, event bus, state store, lazy
/// loader, and per-section zone managers.
pub struct Runtime {
    /// Authoritative plugin store.
    pub registry: Arc<PluginRegistry>,

    /// Shared pub/sub channel.
    pub events: EventBus,

    /// Per-plugin state persistence.
    pub state: Arc<StateStore>,

    /// On-demand plugin resolution.
    pub loader: Arc<LazyLoader>,

    config: RuntimeConfig,
    zones: RwLock<HashMap<Section, Arc<ZoneManager>>>,
}

impl Runtime {
    /// Create a runtime over the given storage backend and module resolver.
    pub fn new(
        config: RuntimeConfig,
        backend: Arc<dyn StorageBackend>,
        resolver: Arc<dyn ModuleResolver>,
    ) -> Self {
        info!("Initializing Atrium runtime");

        Self {
            registry: Arc::new(PluginRegistry::new()),
            events: EventBus::new(),
            state: Arc::new(StateStore::new(backend)),
            loader: Arc::new(LazyLoader::new(resolver)),
            config,
            zones: RwLock::new(HashMap::new()),
        }
    }

    /// Create a runtime whose state persists under the configured state
    /// directory.
    pub fn with_file_storage(config: RuntimeConfig, resolver: Arc<dyn ModuleResolver>) -> Self {
        let backend = Arc::new(FileStorage::new(config.state_dir.clone()));
        Self::new(config, backend, resolver)
    }

    /// Register a plugin, applying any configuration override declared for
    /// its id in the runtime configuration.
    pub fn register_plugin(&self, mut descriptor: PluginDescriptor) -> Result<()> {
        if let Some(override_config) = self.config.plugins.get(descriptor.id.as_str()) {
            descriptor.config = override_config.clone();
        }
        self.registry.register(descriptor)
    }

    /// Unregister a plugin and publish the internal cleanup event so any
    /// zone managing it unmounts the slot. Unknown ids are a no-op.
    pub fn unregister_plugin(&self, id: &PluginId) {
        if self.registry.unregister(id).is_some() {
            self.events
                .publish(UNREGISTERED_EVENT, &json!({ "pluginId": id }));
        }
    }

    /// Resolve a plugin on demand and register it.
    ///
    /// An already-registered descriptor wins over a freshly resolved one.
    pub async fn load_plugin(&self, id: &PluginId) -> Result<PluginDescriptor> {
        if let Ok(existing) = self.registry.get_by_id(id) {
            return Ok(existing);
        }

        let mut descriptor = self.loader.resolve(id).await?;
        if let Some(override_config) = self.config.plugins.get(descriptor.id.as_str()) {
            descriptor.config = override_config.clone();
        }

        match self.registry.register(descriptor.clone()) {
            Ok(()) => Ok(descriptor),
            // Raced with a concurrent registration; the registered one wins.
            Err(_) => self.registry.get_by_id(id),
        }
    }

    /// Render a zone: tear down any previous activation of this section,
    /// then mount every registered plugin for it in display order.
    ///
    /// Returns the ordered slots; failed plugins appear as placeholders.
    pub async fn render_zone(&self, section: Section) -> Result<Vec<ZoneSlot>> {
        if let Some(previous) = self.zones.write().remove(&section) {
            previous.teardown();
        }

        let manager = Arc::new(ZoneManager::new(
            section,
            Arc::clone(&self.registry),
            self.events.clone(),
            Arc::clone(&self.state),
            self.config.channel_capacity,
        ));
        self.zones.write().insert(section, Arc::clone(&manager));

        manager.activate().await
    }

    /// Deactivate a zone, unmounting its plugins and releasing its
    /// subscriptions. Unknown or already-deactivated zones are a no-op.
    pub fn teardown_zone(&self, section: Section) {
        if let Some(manager) = self.zones.write().remove(&section) {
            manager.teardown();
        }
    }

    /// The manager for a section, while that zone is active.
    pub fn zone(&self, section: Section) -> Option<Arc<ZoneManager>> {
        self.zones.read().get(&section).cloned()
    }

    /// Tear down every zone and drop all event subscriptions.
    pub fn shutdown(&self) {
        info!("Shutting down Atrium runtime");

        for (_, manager) in self.zones.write().drain() {
            manager.teardown();
        }
        self.events.clear_all();
    }
}
