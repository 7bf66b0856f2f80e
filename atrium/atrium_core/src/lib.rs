//! # Atrium Core
//!
//! `atrium_core` provides the fundamental building blocks for the Atrium
//! in-process UI extension runtime: error types, identifier definitions, the
//! closed set of placement sections, plugin descriptor types, and the
//! boundary traits the runtime consumes from its collaborators.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Atrium components
//! - **id**: Strongly-typed identifier types
//! - **section**: The fixed set of placement zones
//! - **descriptor**: Plugin descriptor, configuration, and lifecycle hooks
//! - **traits**: Boundary interfaces consumed by the runtime

pub mod descriptor;
pub mod error;
pub mod id;
pub mod section;
pub mod traits;

// Re-export key types for convenience
pub use descriptor::{
    LifecycleHook, LifecycleHooks, PluginConfig, PluginDescriptor, UpdateHook, Widget,
    WidgetFactory,
};
pub use error::{
    ConfigError, Error, EventError, LoadError, PluginError, RegistryError, Result, StateError,
};
pub use id::{PluginId, SubscriptionId};
pub use section::Section;
pub use traits::ModuleResolver;
