//! Plugin descriptor types.
//!
//! A descriptor is the unit of registration: metadata, placement, a widget
//! factory, configuration, and optional lifecycle hooks. The runtime treats
//! the factory and the hooks as opaque; it only constructs widgets and fires
//! the hooks at the documented lifecycle edges.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::PluginId;
use crate::section::Section;

/// A renderable widget instance produced by a plugin's factory.
///
/// The runtime never looks past this trait: construction and the lifecycle
/// hooks are its only interaction points. Rendering belongs to the host.
pub trait Widget: Send {
    /// Name reported in diagnostics and host-side slot labeling.
    fn name(&self) -> &str;
}

/// Opaque constructor producing a widget from a configuration value.
pub type WidgetFactory =
    Arc<dyn Fn(&PluginConfig) -> anyhow::Result<Box<dyn Widget>> + Send + Sync>;

/// Callback fired at a mount or unmount edge.
pub type LifecycleHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Callback fired after a persisted state change, with the previous
/// configuration snapshot.
pub type UpdateHook = Arc<dyn Fn(&PluginConfig) -> anyhow::Result<()> + Send + Sync>;

/// Optional lifecycle callbacks supplied by a plugin.
///
/// Each hook is independently optional. Hook failures are contained by the
/// zone manager: a failing `on_mount` isolates that plugin's slot, a failing
/// `on_unmount` or `on_update` is logged and swallowed.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub on_mount: Option<LifecycleHook>,
    pub on_unmount: Option<LifecycleHook>,
    pub on_update: Option<UpdateHook>,
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_mount", &self.on_mount.is_some())
            .field("on_unmount", &self.on_unmount.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

/// Per-plugin configuration.
///
/// Mutable after registration, but only through an atomic replace; readers
/// never observe a partially-updated value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Whether the plugin participates in zone activation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional position hint for the host layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    /// Free-form plugin settings.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position: None,
            settings: Map::new(),
        }
    }
}

impl PluginConfig {
    /// Create a new configuration with default values (enabled, no
    /// position, empty settings).
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a setting, deserialized into the requested type.
    ///
    /// Returns `None` if the setting is absent or has an incompatible shape.
    pub fn get_setting<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.settings
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Set a setting, serializing the given value.
    ///
    /// Returns `false` if the value could not be serialized.
    pub fn set_setting<T: Serialize>(&mut self, key: &str, value: T) -> bool {
        match serde_json::to_value(value) {
            Ok(json_value) => {
                self.settings.insert(key.to_string(), json_value);
                true
            }
            Err(_) => false,
        }
    }
}

/// The unit of registration: metadata plus factory for one plugin.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Globally unique identifier; primary key, immutable once registered.
    pub id: PluginId,

    /// Human-readable name.
    pub name: String,

    /// Description of the plugin.
    pub description: String,

    /// Placement zone this plugin occupies.
    pub section: Section,

    /// Opaque widget constructor.
    pub factory: WidgetFactory,

    /// Current configuration.
    pub config: PluginConfig,

    /// Optional lifecycle callbacks.
    pub lifecycle: LifecycleHooks,

    /// Relative position among descriptors of the same section, ascending.
    /// Absent sorts after every present value; registration sequence breaks
    /// ties.
    pub order: Option<i32>,

    /// Declared dependency ids. Recorded metadata only; the runtime does not
    /// resolve or order by them.
    pub dependencies: Vec<PluginId>,
}

impl PluginDescriptor {
    /// Create a descriptor with the required fields and defaults everywhere
    /// else.
    pub fn new(id: impl Into<PluginId>, section: Section, factory: WidgetFactory) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            section,
            factory,
            config: PluginConfig::default(),
            lifecycle: LifecycleHooks::default(),
            order: None,
            dependencies: Vec::new(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the ordering weight.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Record declared dependencies.
    pub fn with_dependencies(mut self, dependencies: Vec<PluginId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Attach an `on_mount` hook.
    pub fn on_mount(mut self, hook: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        self.lifecycle.on_mount = Some(Arc::new(hook));
        self
    }

    /// Attach an `on_unmount` hook.
    pub fn on_unmount(
        mut self,
        hook: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.lifecycle.on_unmount = Some(Arc::new(hook));
        self
    }

    /// Attach an `on_update` hook.
    pub fn on_update(
        mut self,
        hook: impl Fn(&PluginConfig) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.lifecycle.on_update = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The factory is opaque and elided.
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("section", &self.section)
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .field("order", &self.order)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
