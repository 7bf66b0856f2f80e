//! Plugin Registry
//!
//! Authoritative store mapping plugin identifier to descriptor, with
//! section-filtered queries. Registration order is recorded so that
//! descriptors without an explicit ordering weight keep a stable position.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use atrium_core::{PluginConfig, PluginDescriptor, PluginId, RegistryError, Result, Section};

struct RegisteredPlugin {
    descriptor: PluginDescriptor,
    /// Monotonic registration sequence; tie-break for section ordering.
    seq: u64,
}

/// The plugin registry holds exactly one descriptor per plugin id.
///
/// All operations are synchronous; the sharded map guarantees that a
/// concurrent `register` never corrupts an in-progress `get_by_section`
/// iteration: readers observe either the pre- or post-mutation snapshot.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<PluginId, RegisteredPlugin>,
    next_seq: AtomicU64,
}

impl PluginRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin.
    ///
    /// Fails with [`RegistryError::DuplicateId`] if the id is already
    /// present; the existing descriptor is left untouched. No side effects
    /// beyond the store.
    pub fn register(&self, descriptor: PluginDescriptor) -> Result<()> {
        match self.plugins.entry(descriptor.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateId(descriptor.id).into()),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Registered plugin: {} (section: {})",
                    descriptor.id, descriptor.section
                );
                slot.insert(RegisteredPlugin { descriptor, seq });
                Ok(())
            }
        }
    }

    /// Remove a plugin, returning its descriptor.
    ///
    /// Removal of an absent id is a benign end state: a no-op, not an error.
    pub fn unregister(&self, id: &PluginId) -> Option<PluginDescriptor> {
        let removed = self.plugins.remove(id).map(|(_, entry)| entry.descriptor);
        if removed.is_some() {
            info!("Unregistered plugin: {}", id);
        }
        removed
    }

    /// The descriptor registered under `id`.
    pub fn get_by_id(&self, id: &PluginId) -> Result<PluginDescriptor> {
        self.plugins
            .get(id)
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| RegistryError::NotFound(id.clone()).into())
    }

    /// Every descriptor placed in `section`, in display order: `order`
    /// ascending with absent values last, then registration sequence.
    ///
    /// An unused section yields an empty sequence, never an error.
    pub fn get_by_section(&self, section: Section) -> Vec<PluginDescriptor> {
        let mut matching: Vec<(i64, u64, PluginDescriptor)> = self
            .plugins
            .iter()
            .filter(|entry| entry.descriptor.section == section)
            .map(|entry| {
                let weight = entry.descriptor.order.map_or(i64::MAX, i64::from);
                (weight, entry.seq, entry.descriptor.clone())
            })
            .collect();

        matching.sort_by_key(|(weight, seq, _)| (*weight, *seq));
        matching.into_iter().map(|(_, _, d)| d).collect()
    }

    /// Atomically replace a plugin's configuration.
    pub fn set_config(&self, id: &PluginId, config: PluginConfig) -> Result<()> {
        let mut entry = self
            .plugins
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        entry.descriptor.config = config;
        Ok(())
    }

    /// Atomically move a plugin to a different section.
    pub fn set_section(&self, id: &PluginId, section: Section) -> Result<()> {
        let mut entry = self
            .plugins
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        entry.descriptor.section = section;
        Ok(())
    }

    /// Whether a plugin is registered under `id`.
    pub fn contains(&self, id: &PluginId) -> bool {
        self.plugins.contains_key(id)
    }

    /// Every registered descriptor, in no particular order.
    pub fn all(&self) -> Vec<PluginDescriptor> {
        self.plugins
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
