//! Error types for the Atrium runtime.
//!
//! Each component has its own error type; the root `Error` wraps all of
//! them for uniform handling at the top level. Structural errors (duplicate
//! id, invalid section, not found) surface synchronously to the caller of
//! the offending operation. Faults raised inside a plugin's own code are
//! contained at that plugin's slot and never cross to its neighbors.

use crate::id::PluginId;
use thiserror::Error;

/// Convenience alias used throughout the Atrium crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the Atrium runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry errors
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Event bus errors
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// State persistence errors
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Lazy loading errors
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Plugin runtime faults
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// General runtime errors
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Re-registering an existing id is an error, never a silent overwrite.
    #[error("plugin {0} is already registered")]
    DuplicateId(PluginId),

    /// The given section name is not one of the fixed placement set.
    #[error("invalid section: {0:?}")]
    InvalidSection(String),

    /// No descriptor is registered under the given id.
    #[error("plugin {0} not found")]
    NotFound(PluginId),
}

/// Errors raised by the event bus.
#[derive(Debug, Error)]
pub enum EventError {
    /// A subscriber failed while handling a publication. Always caught and
    /// logged by the bus; never propagated to the publisher.
    #[error("handler for event {event:?} failed: {cause}")]
    Handler { event: String, cause: String },
}

/// Errors raised by state persistence.
#[derive(Debug, Error)]
pub enum StateError {
    /// The plugin's state value could not be serialized. Reported to the
    /// caller of `save`.
    #[error("failed to serialize state for plugin {id}: {cause}")]
    Serialization { id: PluginId, cause: String },

    /// Stored data could not be deserialized. The store downgrades this to
    /// "absent" after logging it; it never reaches callers of `load`.
    #[error("stored state for plugin {id} is corrupt: {cause}")]
    Corrupt { id: PluginId, cause: String },

    /// The backing key/value medium failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the lazy loader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The module resolver could not produce a descriptor for the id.
    /// A missing plugin is a caller-visible condition: logged and re-raised.
    #[error("failed to resolve plugin {id}: {cause}")]
    ResolutionFailed { id: PluginId, cause: String },
}

/// Faults raised inside a plugin's own code.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin failed while restoring, constructing its widget, or
    /// running a lifecycle hook. Isolated to that plugin's slot.
    #[error("plugin {id} failed: {cause}")]
    Runtime { id: PluginId, cause: String },
}

/// Errors raised while loading runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::DuplicateId(PluginId::new("clock"));
        assert_eq!(err.to_string(), "plugin clock is already registered");

        let err = RegistryError::InvalidSection("banner".to_string());
        assert_eq!(err.to_string(), "invalid section: \"banner\"");

        let err = PluginError::Runtime {
            id: PluginId::new("clock"),
            cause: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "plugin clock failed: boom");
    }

    #[test]
    fn test_root_error_wraps_subsystems() {
        let err: Error = RegistryError::NotFound(PluginId::new("clock")).into();
        assert!(matches!(err, Error::Registry(_)));

        let err: Error = LoadError::ResolutionFailed {
            id: PluginId::new("clock"),
            cause: "module missing".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Load(_)));
        assert!(err.to_string().contains("module missing"));
    }
}
