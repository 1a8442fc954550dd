// Native plugin system:
// - Manifest-driven load order (XML, YAML or JSON)
// - Dynamic loading with libloading behind a swappable backend
// - Exclusive ownership of every open library, released exactly once
// - Partial-failure tolerant batch loading

pub mod backend;
pub mod error;
pub mod facade;
pub mod handle;
pub mod loader;
pub mod manifest;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{DylibBackend, LibraryBackend, PluginMain, DEFAULT_ENTRY_SYMBOL};
pub use error::{PluginError, Result};
pub use facade::{EntryOutcome, LoadReport, PluginFacade};
pub use handle::LibraryHandle;
pub use loader::{LoaderConfig, PluginLoader};
pub use manifest::{ManifestEntry, ManifestFormat, ManifestParser};
pub use registry::PluginRegistry;
