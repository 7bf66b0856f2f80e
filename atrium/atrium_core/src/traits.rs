//! Boundary traits consumed by the runtime.

use async_trait::async_trait;

use crate::descriptor::PluginDescriptor;
use crate::id::PluginId;

/// External module-resolution mechanism the lazy loader delegates to.
///
/// Given a plugin identifier, produce that plugin's descriptor. The backing
/// mechanism (plugin-directory scan, dynamic library, remote fetch) is the
/// implementer's concern; the loader only requires that resolution is
/// asynchronous and that failure reports a cause.
#[async_trait]
pub trait ModuleResolver: Send + Sync + 'static {
    /// Resolve `id` to its descriptor.
    async fn resolve(&self, id: &PluginId) -> anyhow::Result<PluginDescriptor>;
}
