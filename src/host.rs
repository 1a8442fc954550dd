//! The owning host handed to every plugin
//!
//! Plugins only ever see a shared reference (through a raw pointer), so all
//! state that plugins may touch lives behind interior mutability.

use std::ffi::c_void;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Capability registry shared with plugins
#[derive(Debug)]
pub struct Host {
    name: String,
    capabilities: Mutex<Vec<String>>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Announce a capability; returns `false` if it was already registered
    pub fn register_capability(&self, capability: impl Into<String>) -> bool {
        let capability = capability.into();
        let mut capabilities = self
            .capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if capabilities.contains(&capability) {
            return false;
        }
        debug!("Host {} gained capability {}", self.name, capability);
        capabilities.push(capability);
        true
    }

    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|known| known == capability)
    }

    /// Registered capabilities in registration order
    #[must_use]
    pub fn capabilities(&self) -> Vec<String> {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pointer form passed across the plugin entry point
    #[must_use]
    pub fn as_raw(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// Recover the host inside a plugin's entry point
    ///
    /// # Safety
    /// `raw` must be the pointer a `PluginFacade<'_, Host>` passed to the
    /// entry point, and the returned reference must not outlive the plugin's
    /// load.
    #[must_use]
    pub unsafe fn from_raw<'a>(raw: *mut c_void) -> &'a Self {
        &*(raw as *const Self)
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}
