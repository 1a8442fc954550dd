use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info};

use super::backend::{LibraryBackend, DEFAULT_ENTRY_SYMBOL};
use super::error::{PluginError, Result};
use super::handle::LibraryHandle;
use super::registry::PluginRegistry;
use crate::config::PluginsConfig;

/// Settings that shape how plugin paths are resolved and entered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory searched for relative paths and bare plugin names
    pub plugin_dir: Option<PathBuf>,
    /// Name of the exported entry point
    pub entry_symbol: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            entry_symbol: DEFAULT_ENTRY_SYMBOL.to_string(),
        }
    }
}

impl From<&PluginsConfig> for LoaderConfig {
    fn from(config: &PluginsConfig) -> Self {
        Self {
            plugin_dir: config.directory.clone(),
            entry_symbol: config.entry_symbol.clone(),
        }
    }
}

/// Opens plugin libraries, runs their entry point and registers them
pub struct PluginLoader<B: LibraryBackend> {
    backend: Rc<B>,
    config: LoaderConfig,
}

impl<B: LibraryBackend> PluginLoader<B> {
    #[must_use]
    pub fn new(backend: B, config: LoaderConfig) -> Self {
        Self {
            backend: Rc::new(backend),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the plugin at `requested` into `registry`, initializing it with `host`
    ///
    /// Loading a path that is already registered returns the existing handle
    /// without running its entry point again, also when `requested` no longer
    /// resolves but a plugin was loaded under that spelling. On failure nothing is left open
    /// and the registry is unchanged.
    ///
    /// # Errors
    /// `OpenFailed`, `EntryPointMissing` or `InitializationFailed`, following
    /// the step that failed.
    pub fn load<'r, H>(
        &self,
        registry: &'r mut PluginRegistry<B>,
        host: &H,
        requested: &str,
        args: Option<&str>,
    ) -> Result<&'r LibraryHandle<B>> {
        let path = match self.resolve_path(requested) {
            Ok(path) => path,
            // The file may be gone while the library it held is still loaded
            Err(err) => return registry.find_by_spelling(requested).ok_or(err),
        };

        if registry.contains(&path) {
            debug!("Plugin {} is already loaded", path.display());
            return registry
                .find(&path)
                .ok_or(PluginError::NotLoaded { path });
        }

        info!("Loading plugin {}", path.display());

        // Each step below drops `handle` on failure, closing the library
        let mut handle =
            LibraryHandle::open(Rc::clone(&self.backend), path)?.with_requested(requested.trim());
        handle.resolve_entry_point(&self.config.entry_symbol)?;
        let host_ptr = host as *const H as *mut c_void;
        handle.initialize(host_ptr, args)?;

        let handle = registry.register(handle)?;
        info!("Loaded plugin {}", handle.name());
        Ok(handle)
    }

    /// Turn a manifest path or bare plugin name into a canonical file path
    ///
    /// Candidates, first existing file wins: the path as given, the path
    /// under the plugin directory, then both again with the platform library
    /// file name when `path` has no extension (`audio` -> `libaudio.so`).
    ///
    /// # Errors
    /// Returns `OpenFailed` for an empty path or when no candidate exists.
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PluginError::OpenFailed {
                path: PathBuf::new(),
                reason: "empty plugin path".to_string(),
            });
        }

        let requested = Path::new(trimmed);
        let candidates = self.candidates(requested);
        for candidate in &candidates {
            if candidate.is_file() {
                return std::fs::canonicalize(candidate).map_err(|e| PluginError::OpenFailed {
                    path: candidate.clone(),
                    reason: e.to_string(),
                });
            }
        }

        debug!(
            "Plugin {} not found (tried {} location(s))",
            trimmed,
            candidates.len()
        );
        Err(PluginError::OpenFailed {
            path: requested.to_path_buf(),
            reason: "no such file".to_string(),
        })
    }

    fn candidates(&self, requested: &Path) -> Vec<PathBuf> {
        let mut names = vec![requested.to_path_buf()];
        if requested.extension().is_none() {
            if let Some(file_name) = requested.file_name() {
                names.push(requested.with_file_name(libloading::library_filename(file_name)));
            }
        }

        let mut candidates = Vec::with_capacity(names.len() * 2);
        for name in names {
            if name.is_relative() {
                if let Some(dir) = &self.config.plugin_dir {
                    let under_dir = dir.join(&name);
                    candidates.push(name);
                    candidates.push(under_dir);
                    continue;
                }
            }
            candidates.push(name);
        }
        candidates
    }
}
