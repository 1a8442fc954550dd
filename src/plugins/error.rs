use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the plugin system
pub type Result<T> = std::result::Result<T, PluginError>;

/// Failures reported by the manifest parser, loader, registry and facade
#[derive(Debug, Error)]
pub enum PluginError {
    /// The manifest file could not be read
    #[error("plugin manifest {} could not be read", .path.display())]
    ManifestNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest was read but does not follow the manifest schema
    #[error("plugin manifest {} is malformed: {reason}", .path.display())]
    ManifestMalformed { path: PathBuf, reason: String },

    /// The path does not name a file, or the OS refused to load it
    #[error("failed to open plugin library {}: {reason}", .path.display())]
    OpenFailed { path: PathBuf, reason: String },

    /// The library does not export the entry point symbol
    #[error("plugin library {} does not export `{symbol}`: {reason}", .path.display())]
    EntryPointMissing {
        path: PathBuf,
        symbol: String,
        reason: String,
    },

    /// The entry point ran and reported failure
    #[error("plugin {} failed to initialize: {reason}", .path.display())]
    InitializationFailed { path: PathBuf, reason: String },

    #[error("plugin {} is already registered", .path.display())]
    AlreadyRegistered { path: PathBuf },

    #[error("plugin {} is not loaded", .path.display())]
    NotLoaded { path: PathBuf },

    /// The OS reported an error while closing the library
    #[error("failed to unload plugin library {}: {reason}", .path.display())]
    UnloadFailed { path: PathBuf, reason: String },
}

impl PluginError {
    /// Path of the manifest or library the error refers to
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::ManifestNotFound { path, .. }
            | Self::ManifestMalformed { path, .. }
            | Self::OpenFailed { path, .. }
            | Self::EntryPointMissing { path, .. }
            | Self::InitializationFailed { path, .. }
            | Self::AlreadyRegistered { path }
            | Self::NotLoaded { path }
            | Self::UnloadFailed { path, .. } => path,
        }
    }

    /// Whether the error happened before any library was touched
    #[must_use]
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self,
            Self::ManifestNotFound { .. } | Self::ManifestMalformed { .. }
        )
    }
}
