//! Native library primitives
//!
//! The loader only talks to the platform through [`LibraryBackend`], so the
//! load algorithm stays platform neutral and can run against a fake in tests.

use std::ffi::c_void;
use std::os::raw::c_char;
use std::path::Path;

use libloading::Library;

/// Signature every plugin must export under the configured entry symbol.
///
/// `host` points at the owning host object for the duration of the call and
/// for as long as the plugin stays loaded. `args` is the manifest argument
/// string, or null when the entry has none. Returning `0` reports success;
/// any other value aborts the load.
///
/// A plugin built with Rust exports it like this:
///
/// ```ignore
/// #[no_mangle]
/// pub unsafe extern "C" fn hearth_plugin_main(host: *mut c_void, args: *const c_char) -> i32 {
///     let host = hearth::Host::from_raw(host);
///     host.register_capability("audio");
///     0
/// }
/// ```
pub type PluginMain = unsafe extern "C" fn(host: *mut c_void, args: *const c_char) -> i32;

/// Default name of the exported entry point
pub const DEFAULT_ENTRY_SYMBOL: &str = "hearth_plugin_main";

/// Open, resolve and close primitives for one kind of native library
pub trait LibraryBackend {
    /// An open library; owning it keeps the code mapped
    type Library;

    /// Map the library at `path` into the process
    ///
    /// # Errors
    /// Returns the OS-reported reason when the library cannot be opened.
    fn open(&self, path: &Path) -> Result<Self::Library, String>;

    /// Look up the entry point exported as `symbol`
    ///
    /// The returned function pointer is only valid while `library` is open.
    ///
    /// # Errors
    /// Returns the OS-reported reason when the symbol is absent.
    fn resolve(&self, library: &Self::Library, symbol: &str) -> Result<PluginMain, String>;

    /// Unmap the library
    ///
    /// # Errors
    /// Returns the OS-reported reason when the library cannot be closed.
    fn close(&self, library: Self::Library) -> Result<(), String>;
}

/// Backend built on `libloading` (`dlopen` / `LoadLibraryW`)
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibBackend;

impl LibraryBackend for DylibBackend {
    type Library = Library;

    fn open(&self, path: &Path) -> Result<Library, String> {
        // Safety: running a library's initializers is inherent to loading a
        // plugin; the host only loads paths its operator listed.
        unsafe { Library::new(path) }.map_err(|e| e.to_string())
    }

    fn resolve(&self, library: &Library, symbol: &str) -> Result<PluginMain, String> {
        // Safety: the entry point contract fixes the signature; the copied
        // function pointer is kept next to its `Library` in the handle.
        let entry = unsafe { library.get::<PluginMain>(symbol.as_bytes()) }
            .map_err(|e| e.to_string())?;
        Ok(*entry)
    }

    fn close(&self, library: Library) -> Result<(), String> {
        library.close().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dylib_backend_rejects_non_library_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(libloading::library_filename("notalib"));
        std::fs::write(&path, b"definitely not an object file").unwrap();

        let reason = DylibBackend.open(&path).unwrap_err();
        assert!(!reason.is_empty());
    }

    #[test]
    fn test_dylib_backend_missing_file() {
        let dir = tempdir().unwrap();
        assert!(DylibBackend.open(&dir.path().join("absent.so")).is_err());
    }
}
