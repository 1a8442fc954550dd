use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::backend::{DylibBackend, LibraryBackend};
use super::error::{PluginError, Result};
use super::handle::LibraryHandle;
use super::loader::{LoaderConfig, PluginLoader};
use super::manifest::{ManifestEntry, ManifestParser};
use super::registry::PluginRegistry;

/// Outcome of one manifest entry
#[derive(Debug)]
pub struct EntryOutcome {
    pub entry: ManifestEntry,
    /// Canonical path of the loaded library, or why it failed
    pub result: Result<PathBuf>,
}

/// Per-entry results of a manifest-driven load, in manifest order
#[derive(Debug, Default)]
pub struct LoadReport {
    pub manifest: PathBuf,
    pub outcomes: Vec<EntryOutcome>,
}

impl LoadReport {
    /// Entries that ended up loaded, with their canonical paths
    pub fn loaded(&self) -> impl Iterator<Item = (&ManifestEntry, &Path)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(path) => Some((&outcome.entry, path.as_path())),
            Err(_) => None,
        })
    }

    /// Entries that failed, with their errors
    pub fn failed(&self) -> impl Iterator<Item = (&ManifestEntry, &PluginError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(err) => Some((&outcome.entry, err)),
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }
}

/// Public entry to the plugin system
///
/// Owns the registry of loaded plugins and borrows the host that every
/// plugin receives at initialization. Dropping the facade unloads all
/// plugins, newest first.
pub struct PluginFacade<'h, H, B: LibraryBackend = DylibBackend> {
    owner: &'h H,
    loader: PluginLoader<B>,
    registry: PluginRegistry<B>,
    configuration_file: Option<PathBuf>,
}

impl<'h, H> PluginFacade<'h, H, DylibBackend> {
    /// Facade loading real shared libraries through `libloading`
    pub fn native(owner: &'h H, config: LoaderConfig) -> Self {
        Self::new(owner, DylibBackend, config)
    }
}

impl<'h, H, B: LibraryBackend> PluginFacade<'h, H, B> {
    pub fn new(owner: &'h H, backend: B, config: LoaderConfig) -> Self {
        Self {
            owner,
            loader: PluginLoader::new(backend, config),
            registry: PluginRegistry::new(),
            configuration_file: None,
        }
    }

    /// Load and initialize a single plugin
    ///
    /// # Errors
    /// Returns the loader's error; nothing is retried.
    pub fn load_plugin(&mut self, path: &str) -> Result<&LibraryHandle<B>> {
        self.loader.load(&mut self.registry, self.owner, path, None)
    }

    /// Load every plugin listed in `manifest_path`, in manifest order
    ///
    /// A failing entry does not stop the entries after it, and plugins loaded
    /// before a failure stay loaded. `manifest_path` is recorded as the
    /// configuration file even when the manifest itself is rejected.
    ///
    /// # Errors
    /// Returns `ManifestNotFound` or `ManifestMalformed`, in which case no
    /// plugin is loaded. Per-entry failures are reported in the `LoadReport`.
    pub fn load_plugins_from_manifest<P: AsRef<Path>>(&mut self, manifest_path: P) -> Result<LoadReport> {
        let manifest_path = manifest_path.as_ref();
        self.configuration_file = Some(manifest_path.to_path_buf());

        let entries = ManifestParser::parse(manifest_path)?;
        info!(
            "Loading {} plugin(s) from {}",
            entries.len(),
            manifest_path.display()
        );

        let mut report = LoadReport {
            manifest: manifest_path.to_path_buf(),
            outcomes: Vec::with_capacity(entries.len()),
        };

        for entry in entries {
            let result = self
                .loader
                .load(&mut self.registry, self.owner, &entry.path, entry.args.as_deref())
                .map(|handle| handle.path().to_path_buf());
            if let Err(err) = &result {
                warn!("Skipping plugin {}: {}", entry.path, err);
            }
            report.outcomes.push(EntryOutcome { entry, result });
        }

        let failures = report.failed().count();
        if failures > 0 {
            warn!(
                "{} of {} plugin(s) from {} failed to load",
                failures,
                report.outcomes.len(),
                manifest_path.display()
            );
        }

        Ok(report)
    }

    /// Manifest used by the most recent manifest-driven load
    #[must_use]
    pub fn configuration_file(&self) -> Option<&Path> {
        self.configuration_file.as_deref()
    }

    /// Unregister and close one plugin
    ///
    /// # Errors
    /// Returns `NotLoaded` if no loaded plugin matches `path` and
    /// `UnloadFailed` if the OS refuses to close the library; in the latter
    /// case the plugin is no longer registered.
    pub fn unload_plugin(&mut self, path: &str) -> Result<()> {
        let canonical = self
            .find(path)
            .map(|handle| handle.path().to_path_buf())
            .ok_or_else(|| PluginError::NotLoaded {
                path: PathBuf::from(path),
            })?;
        let handle = self
            .registry
            .unregister(&canonical)
            .ok_or(PluginError::NotLoaded { path: canonical })?;

        info!("Unloading plugin {}", handle.name());
        handle.unload()
    }

    /// Close every plugin, newest first; returns how many were unloaded
    pub fn unload_all(&mut self) -> usize {
        self.registry.clear()
    }

    /// Loaded plugins in load order
    pub fn plugins(&self) -> impl Iterator<Item = &LibraryHandle<B>> {
        self.registry.all()
    }

    /// Loaded plugin for `path`, which may be given in any spelling the
    /// loader resolves or in the spelling it was loaded under
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&LibraryHandle<B>> {
        self.loader
            .resolve_path(path)
            .ok()
            .and_then(|canonical| self.registry.find(&canonical))
            .or_else(|| self.registry.find_by_spelling(path))
    }

    #[must_use]
    pub fn is_loaded(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    #[must_use]
    pub fn owner(&self) -> &'h H {
        self.owner
    }
}
