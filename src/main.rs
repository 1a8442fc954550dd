use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hearth::config::Config;
use hearth::plugins::{LoaderConfig, PluginFacade};
use hearth::Host;

/// Hearth - load native plugins from a manifest and manage their lifetime
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: $HEARTH_CONFIG or ~/.hearth/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plugin manifest to load (overrides the configured one)
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Skip the manifest and only load plugins given on the command line
    #[arg(long, conflicts_with = "manifest")]
    no_manifest: bool,

    /// Load a single plugin; may be repeated
    #[arg(short, long = "plugin", value_name = "PATH")]
    plugins: Vec<String>,

    /// Directory searched for relative plugin paths
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    /// Print the loaded plugins before shutting down
    #[arg(short, long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::load_from_file(config_path)?
    } else {
        Config::load_default()?
    };

    // Logs go to stderr so --list output stays clean on stdout
    let level = if args.debug || config.logging.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    if let Some(dir) = args.plugin_dir {
        config.plugins.directory = Some(dir);
    }

    let host = Host::new(config.host.name.clone());
    let mut facade = PluginFacade::native(&host, LoaderConfig::from(&config.plugins));
    let mut failures = 0usize;

    if !args.no_manifest {
        let manifest = match &args.manifest {
            Some(manifest) => Some(manifest.clone()),
            None => {
                let configured = config.plugins.manifest_path();
                if configured.exists() {
                    Some(configured)
                } else {
                    info!("No plugin manifest at {}", configured.display());
                    None
                }
            }
        };

        if let Some(manifest) = manifest {
            let report = facade
                .load_plugins_from_manifest(&manifest)
                .with_context(|| format!("Failed to load plugins from {}", manifest.display()))?;
            failures += report.failed().count();
        }
    }

    for plugin in config.plugins.preload.iter().chain(&args.plugins) {
        if let Err(e) = facade.load_plugin(plugin) {
            warn!("{}", e);
            failures += 1;
        }
    }

    info!(
        "Host {} running with {} plugin(s)",
        host.name(),
        facade.len()
    );

    if args.list {
        if let Some(manifest) = facade.configuration_file() {
            println!("manifest: {}", manifest.display());
        }
        for plugin in facade.plugins() {
            println!(
                "{}\t{}\t{}",
                plugin.name(),
                plugin.loaded_at().format("%Y-%m-%d %H:%M:%S"),
                plugin.path().display()
            );
        }
        let capabilities = host.capabilities();
        if !capabilities.is_empty() {
            println!("capabilities: {}", capabilities.join(", "));
        }
    }

    // Unload newest first before reporting
    let unloaded = facade.unload_all();
    info!("Shut down after unloading {} plugin(s)", unloaded);

    if failures > 0 {
        anyhow::bail!("{} plugin(s) failed to load", failures);
    }

    Ok(())
}
