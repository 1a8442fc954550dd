//! Hearth - a native plugin host
//!
//! Loads shared-library plugins listed in a manifest, hands each one a
//! reference to the owning host, and keeps the libraries open until they are
//! unloaded or the host shuts down.
//!
//! # Modules
//!
//! - [`plugins`]: manifest parsing, library loading, registry and the
//!   [`PluginFacade`](plugins::PluginFacade) entry point
//! - [`host`]: the capability context plugins receive
//! - [`config`]: host configuration and serialization

pub mod config;
pub mod host;
pub mod plugins;

pub use host::Host;
