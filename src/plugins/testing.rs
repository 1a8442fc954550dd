//! In-memory library backend for unit tests
//!
//! Plugin "libraries" are empty files in a temp dir; their behaviour is
//! looked up by canonical path and every open/close is recorded.

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Mutex;

use tempfile::TempDir;

use super::backend::{LibraryBackend, PluginMain, DEFAULT_ENTRY_SYMBOL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    Succeeds,
    /// Entry point returns a non-zero status
    Refuses,
    /// Succeeds only if a plugin initialized earlier got `args` equal to ours
    RequiresEarlier,
    NoEntryPoint,
    OpenFails,
    CloseFails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open(PathBuf),
    Close(PathBuf),
}

#[derive(Default)]
struct FakeState {
    behaviours: HashMap<PathBuf, Behaviour>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    state: Rc<RefCell<FakeState>>,
}

pub(crate) struct FakeLibrary {
    path: PathBuf,
    behaviour: Behaviour,
}

impl LibraryBackend for FakeBackend {
    type Library = FakeLibrary;

    fn open(&self, path: &Path) -> Result<FakeLibrary, String> {
        let mut state = self.state.borrow_mut();
        let behaviour = state
            .behaviours
            .get(path)
            .copied()
            .ok_or_else(|| "file is not a shared library".to_string())?;
        if behaviour == Behaviour::OpenFails {
            return Err("invalid ELF header".to_string());
        }
        state.calls.push(Call::Open(path.to_path_buf()));
        Ok(FakeLibrary {
            path: path.to_path_buf(),
            behaviour,
        })
    }

    fn resolve(&self, library: &FakeLibrary, symbol: &str) -> Result<PluginMain, String> {
        if symbol != DEFAULT_ENTRY_SYMBOL {
            return Err(format!("undefined symbol: {symbol}"));
        }
        match library.behaviour {
            Behaviour::Succeeds | Behaviour::CloseFails => Ok(record_init),
            Behaviour::Refuses => Ok(refuse_init),
            Behaviour::RequiresEarlier => Ok(require_earlier),
            Behaviour::NoEntryPoint | Behaviour::OpenFails => {
                Err(format!("undefined symbol: {symbol}"))
            }
        }
    }

    fn close(&self, library: FakeLibrary) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Close(library.path));
        if library.behaviour == Behaviour::CloseFails {
            return Err("library is still in use".to_string());
        }
        Ok(())
    }
}

/// Host used with the fake entry points; records every initialization
#[derive(Default)]
pub(crate) struct TestHost {
    inits: Mutex<Vec<String>>,
}

impl TestHost {
    pub(crate) fn as_raw(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    pub(crate) fn inits(&self) -> Vec<String> {
        self.inits.lock().unwrap().clone()
    }
}

unsafe fn host_and_args<'a>(host: *mut c_void, args: *const c_char) -> (&'a TestHost, String) {
    let host = &*(host as *const TestHost);
    let args = if args.is_null() {
        String::new()
    } else {
        CStr::from_ptr(args).to_string_lossy().into_owned()
    };
    (host, args)
}

unsafe extern "C" fn record_init(host: *mut c_void, args: *const c_char) -> i32 {
    let (host, args) = host_and_args(host, args);
    host.inits.lock().unwrap().push(args);
    0
}

unsafe extern "C" fn refuse_init(host: *mut c_void, args: *const c_char) -> i32 {
    let (host, args) = host_and_args(host, args);
    host.inits.lock().unwrap().push(args);
    3
}

unsafe extern "C" fn require_earlier(host: *mut c_void, args: *const c_char) -> i32 {
    let (host, args) = host_and_args(host, args);
    let mut inits = host.inits.lock().unwrap();
    let satisfied = inits.contains(&args);
    inits.push(args);
    if satisfied {
        0
    } else {
        1
    }
}

/// Temp dir of fake plugin files wired to a [`FakeBackend`]
pub(crate) struct Fixture {
    dir: TempDir,
    backend: FakeBackend,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            backend: FakeBackend::default(),
        }
    }

    pub(crate) fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Create `file` and return its canonical path
    pub(crate) fn plugin(&mut self, file: &str, behaviour: Behaviour) -> PathBuf {
        let path = self.dir.path().join(file);
        std::fs::write(&path, b"").unwrap();
        let canonical = std::fs::canonicalize(&path).unwrap();
        self.backend
            .state
            .borrow_mut()
            .behaviours
            .insert(canonical.clone(), behaviour);
        canonical
    }

    /// Write a manifest into the fixture dir
    pub(crate) fn manifest(&self, file: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(file);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub(crate) fn backend(&self) -> Rc<FakeBackend> {
        Rc::new(self.backend.clone())
    }

    pub(crate) fn fake(&self) -> FakeBackend {
        self.backend.clone()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.backend.state.borrow().calls.clone()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Open(_)))
            .count()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Close(_)))
            .count()
    }
}
