use std::path::Path;

use tracing::{debug, info};

use super::backend::LibraryBackend;
use super::error::{PluginError, Result};
use super::handle::LibraryHandle;

/// Owns every loaded plugin library, keyed by canonical path
///
/// Entries keep registration order. A handle leaves the registry before its
/// library is closed, so `find` and `all` never expose a closed library.
/// Dropping the registry closes the remaining libraries newest first.
pub struct PluginRegistry<B: LibraryBackend> {
    entries: Vec<LibraryHandle<B>>,
}

impl<B: LibraryBackend> PluginRegistry<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Take ownership of a fully initialized handle
    ///
    /// A rejected handle is dropped, which closes its library.
    ///
    /// # Errors
    /// Returns `AlreadyRegistered` if the path already has an entry and
    /// `EntryPointMissing` if the handle's entry point was never resolved.
    pub fn register(&mut self, handle: LibraryHandle<B>) -> Result<&LibraryHandle<B>> {
        if self.contains(handle.path()) {
            return Err(PluginError::AlreadyRegistered {
                path: handle.path().to_path_buf(),
            });
        }
        if !handle.has_entry_point() {
            return Err(PluginError::EntryPointMissing {
                path: handle.path().to_path_buf(),
                symbol: String::new(),
                reason: "handle was registered before its entry point was resolved".to_string(),
            });
        }

        debug!("Registered plugin {}", handle.path().display());
        self.entries.push(handle);
        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Remove the entry for `path` and hand its handle to the caller
    ///
    /// The caller closes the library by dropping the handle or calling
    /// [`LibraryHandle::unload`].
    pub fn unregister(&mut self, path: &Path) -> Option<LibraryHandle<B>> {
        let index = self.position(path)?;
        debug!("Unregistered plugin {}", path.display());
        Some(self.entries.remove(index))
    }

    #[must_use]
    pub fn find(&self, path: &Path) -> Option<&LibraryHandle<B>> {
        self.entries.iter().find(|handle| handle.path() == path)
    }

    /// Entry loaded under `spelling`, or whose canonical path it is
    #[must_use]
    pub fn find_by_spelling(&self, spelling: &str) -> Option<&LibraryHandle<B>> {
        self.entries.iter().find(|handle| handle.answers_to(spelling))
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.position(path).is_some()
    }

    /// Loaded handles in registration order
    pub fn all(&self) -> impl Iterator<Item = &LibraryHandle<B>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close every library, newest first; returns how many were released
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        while let Some(handle) = self.entries.pop() {
            debug!("Releasing plugin {}", handle.path().display());
            drop(handle);
        }
        if count > 0 {
            info!("Released {} plugin(s)", count);
        }
        count
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|handle| handle.path() == path)
    }
}

impl<B: LibraryBackend> Default for PluginRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: LibraryBackend> Drop for PluginRegistry<B> {
    fn drop(&mut self) {
        self.clear();
    }
}
