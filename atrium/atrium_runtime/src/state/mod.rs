//! State Store
//!
//! Durable per-plugin state persistence. The store only namespaces keys and
//! round-trips serialized blobs; a plugin's state is owned by that plugin
//! and never interpreted here.

mod storage;

pub use storage::{FileStorage, MemoryStorage, StorageBackend};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use atrium_core::{PluginId, Result, StateError};

/// Key/value persistence keyed by plugin identifier.
pub struct StateStore {
    backend: Arc<dyn StorageBackend>,
}

impl StateStore {
    /// Create a state store over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// The persistence key for a plugin. Namespacing by id rules out
    /// cross-plugin collisions by construction.
    fn key_for(id: &PluginId) -> String {
        format!("plugin_{}_state", id)
    }

    /// Persist `state` under the plugin's key, overwriting any prior value.
    ///
    /// Serialization and backend failures surface to the caller.
    pub async fn save(&self, id: &PluginId, state: &Value) -> Result<()> {
        let data = serde_json::to_vec(state).map_err(|e| StateError::Serialization {
            id: id.clone(),
            cause: e.to_string(),
        })?;

        self.backend.store(&Self::key_for(id), &data).await?;
        debug!("Saved state for plugin: {}", id);
        Ok(())
    }

    /// The last saved state, or `None` when nothing was saved.
    ///
    /// Corrupt stored data is logged and treated as absent, never raised.
    pub async fn load(&self, id: &PluginId) -> Result<Option<Value>> {
        let Some(data) = self.backend.load(&Self::key_for(id)).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let err = StateError::Corrupt {
                    id: id.clone(),
                    cause: e.to_string(),
                };
                warn!("Discarding stored state: {}", err);
                Ok(None)
            }
        }
    }

    /// Remove the stored value. Clearing an absent key succeeds.
    pub async fn clear(&self, id: &PluginId) -> Result<()> {
        self.backend.delete(&Self::key_for(id)).await?;
        Ok(())
    }
}
