//! Lazy Loader
//!
//! Resolves plugin identifiers to descriptors on demand through an external
//! [`ModuleResolver`]. Concurrent resolutions of one identifier share a
//! single underlying fetch, and the completed outcome is kept so later
//! callers observe the same result without a second fetch.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error};

use atrium_core::{LoadError, ModuleResolver, PluginDescriptor, PluginId, Result};

type LoadOutcome = std::result::Result<PluginDescriptor, String>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

/// On-demand plugin resolution with per-id in-flight de-duplication.
pub struct LazyLoader {
    resolver: Arc<dyn ModuleResolver>,
    loads: Mutex<HashMap<PluginId, SharedLoad>>,
}

impl LazyLoader {
    /// Create a loader over the given resolver.
    pub fn new(resolver: Arc<dyn ModuleResolver>) -> Self {
        Self {
            resolver,
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `id` to its descriptor.
    ///
    /// The first caller triggers the underlying fetch; callers arriving
    /// while it is in flight await the same fetch and receive the same
    /// outcome, success or failure. The fetch runs on a detached task, so a
    /// caller abandoning its await does not cancel it and the outcome is
    /// still cached. Failures surface as [`LoadError::ResolutionFailed`],
    /// logged and re-raised.
    pub async fn resolve(&self, id: &PluginId) -> Result<PluginDescriptor> {
        let load = {
            let mut loads = self.loads.lock();
            loads
                .entry(id.clone())
                .or_insert_with(|| self.spawn_load(id))
                .clone()
        };

        match load.await {
            Ok(descriptor) => Ok(descriptor),
            Err(cause) => {
                let err = LoadError::ResolutionFailed {
                    id: id.clone(),
                    cause,
                };
                error!("Plugin load failed: {}", err);
                Err(err.into())
            }
        }
    }

    fn spawn_load(&self, id: &PluginId) -> SharedLoad {
        let resolver = Arc::clone(&self.resolver);
        let id = id.clone();

        let task = tokio::spawn(async move {
            debug!("Resolving plugin module: {}", id);
            resolver.resolve(&id).await.map_err(|e| e.to_string())
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(format!("resolution task failed: {}", e)))
        }
        .boxed()
        .shared()
    }
}
