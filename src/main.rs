mod cli;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use tvg_core::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tvgate=trace,tvg_relay=trace,tvg_player=debug,tvg_core=debug,tower_http=debug"
                .to_string()
        } else {
            "tvgate=info,tvg_relay=info,tvg_player=info,tvg_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(cli.config.as_deref(), host, port))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Channels => list_channels(cli.config.as_deref()),
        Commands::Version => {
            println!("tvgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(config_path);

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting tvgate");
    tracing::info!(
        "Relay will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    tvg_relay::serve(config).await?;
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match resolve_config_path(path) {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let raw = std::fs::read_to_string(&p)?;
            let config = Config::from_toml(&raw)?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("✓ Configuration is valid");
            } else {
                println!("Configuration loaded with {} warning(s):", warnings.len());
                for warning in &warnings {
                    println!("  - {warning}");
                }
            }
            println!("  Relay: {}:{}", config.server.host, config.server.port);
            println!("  Allowed hosts: {}", config.upstream.allowed_hosts.len());
            println!("  Channels: {}", config.channels.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Relay: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}

fn list_channels(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);

    if config.channels.is_empty() {
        println!("No channels configured");
        return Ok(());
    }

    println!("{} channel(s):", config.channels.len());
    for channel in &config.channels {
        let kind = tvg_player::classify(&channel.source_url);
        println!("  {} - {} [{}]", channel.id, channel.name, kind.as_str());
        println!("      {}", channel.source_url);
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Config {
    let resolved = resolve_config_path(explicit);
    if let Some(path) = &resolved {
        tracing::info!("Loading config from {}", path.display());
    }
    Config::load_or_default(resolved.as_deref())
}

/// An explicit path wins; otherwise the first existing well-known location.
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    for candidate in ["tvgate.toml", "~/.config/tvgate/tvgate.toml"] {
        let expanded = shellexpand::tilde(candidate);
        let path = PathBuf::from(expanded.as_ref());
        if path.exists() {
            return Some(path);
        }
    }
    None
}
