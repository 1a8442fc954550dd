use std::ffi::{c_void, CString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::backend::{LibraryBackend, PluginMain};
use super::error::{PluginError, Result};

/// A loaded plugin library
///
/// Owns the open library exclusively. The library is closed exactly once,
/// either by [`LibraryHandle::unload`] or when the handle is dropped.
pub struct LibraryHandle<B: LibraryBackend> {
    path: PathBuf,
    requested: Option<String>,
    library: Option<B::Library>,
    entry_point: Option<PluginMain>,
    args: Option<String>,
    loaded_at: DateTime<Utc>,
    backend: Rc<B>,
}

impl<B: LibraryBackend> LibraryHandle<B> {
    /// Open the library at `path`, which must already be canonical
    ///
    /// # Errors
    /// Returns `OpenFailed` carrying the OS-reported reason.
    pub fn open(backend: Rc<B>, path: PathBuf) -> Result<Self> {
        let library = backend
            .open(&path)
            .map_err(|reason| PluginError::OpenFailed {
                path: path.clone(),
                reason,
            })?;
        debug!("Opened plugin library {}", path.display());

        Ok(Self {
            path,
            requested: None,
            library: Some(library),
            entry_point: None,
            args: None,
            loaded_at: Utc::now(),
            backend,
        })
    }

    /// Remember the spelling the caller asked for, e.g. a bare `audio`
    #[must_use]
    pub fn with_requested(mut self, spelling: impl Into<String>) -> Self {
        self.requested = Some(spelling.into());
        self
    }

    /// Look up the entry point exported as `symbol`
    ///
    /// # Errors
    /// Returns `EntryPointMissing` if the library does not export it.
    pub fn resolve_entry_point(&mut self, symbol: &str) -> Result<()> {
        let library = self.library.as_ref().ok_or_else(|| PluginError::NotLoaded {
            path: self.path.clone(),
        })?;

        let entry = self
            .backend
            .resolve(library, symbol)
            .map_err(|reason| PluginError::EntryPointMissing {
                path: self.path.clone(),
                symbol: symbol.to_string(),
                reason,
            })?;
        self.entry_point = Some(entry);
        Ok(())
    }

    /// Run the entry point once, handing it `host` and `args`
    ///
    /// # Errors
    /// Returns `InitializationFailed` if the entry point reports a non-zero
    /// status or `args` cannot be passed as a C string.
    pub fn initialize(&mut self, host: *mut c_void, args: Option<&str>) -> Result<()> {
        let entry = self.entry_point.ok_or_else(|| PluginError::InitializationFailed {
            path: self.path.clone(),
            reason: "entry point has not been resolved".to_string(),
        })?;

        let c_args = args
            .map(CString::new)
            .transpose()
            .map_err(|_| PluginError::InitializationFailed {
                path: self.path.clone(),
                reason: "argument string contains a NUL byte".to_string(),
            })?;
        let args_ptr = c_args.as_ref().map_or(std::ptr::null(), |args| args.as_ptr());

        // Safety: `entry` was resolved from `self.library`, which is still
        // open, and `c_args` outlives the call.
        let status = unsafe { entry(host, args_ptr) };
        if status != 0 {
            return Err(PluginError::InitializationFailed {
                path: self.path.clone(),
                reason: format!("entry point returned status {status}"),
            });
        }

        self.args = args.map(str::to_string);
        Ok(())
    }

    /// Close the library now, reporting any OS error
    ///
    /// # Errors
    /// Returns `UnloadFailed` if the backend cannot close the library.
    pub fn unload(mut self) -> Result<()> {
        self.release().map_err(|reason| PluginError::UnloadFailed {
            path: self.path.clone(),
            reason,
        })
    }

    fn release(&mut self) -> std::result::Result<(), String> {
        // The entry point dies with the code it points into
        self.entry_point = None;
        match self.library.take() {
            Some(library) => {
                debug!("Closing plugin library {}", self.path.display());
                self.backend.close(library)
            }
            None => Ok(()),
        }
    }

    /// Canonical path the library was loaded from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spelling the plugin was loaded under, before resolution
    #[must_use]
    pub fn requested(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    /// Whether `spelling` is the loaded-under spelling or the canonical path
    ///
    /// Needs no filesystem access, so it still matches after the library
    /// file has been removed or replaced.
    #[must_use]
    pub fn answers_to(&self, spelling: &str) -> bool {
        let spelling = spelling.trim();
        self.requested.as_deref() == Some(spelling) || self.path == Path::new(spelling)
    }

    /// Whether the entry point has been resolved
    #[must_use]
    pub fn has_entry_point(&self) -> bool {
        self.entry_point.is_some()
    }

    #[must_use]
    pub fn args(&self) -> Option<&str> {
        self.args.as_deref()
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// File stem without the platform prefix, e.g. `audio` for `libaudio.so`
    #[must_use]
    pub fn name(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        match stem.strip_prefix(std::env::consts::DLL_PREFIX) {
            Some(name) if !std::env::consts::DLL_PREFIX.is_empty() && !name.is_empty() => {
                name.to_string()
            }
            _ => stem,
        }
    }
}

impl<B: LibraryBackend> Drop for LibraryHandle<B> {
    fn drop(&mut self) {
        if let Err(reason) = self.release() {
            warn!(
                "Failed to close plugin library {}: {}",
                self.path.display(),
                reason
            );
        }
    }
}

impl<B: LibraryBackend> fmt::Debug for LibraryHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("path", &self.path)
            .field("requested", &self.requested)
            .field("open", &self.library.is_some())
            .field("entry_point", &self.entry_point.is_some())
            .field("args", &self.args)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}
