//! `portal`: command-line client for the franchise intranet.
//!
//! Reads `portal.toml` (or the path given with `--config`), overlaid with
//! `PORTAL_*` environment variables, and talks either to a local SQLite
//! database or to the hosted backend over HTTP.
//!
//! ```text
//! portal bootstrap --name Ana --email ana@example.com
//! portal sign-in --email ana@example.com
//! portal companies list
//! portal shell
//! ```

mod commands;
mod shell;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use commands::Command;
use portal_client::{LogToaster, Portal, PortalConfig};
use portal_core::gateway::Gateway;
use portal_gateway_http::{HttpGateway, HttpSettings};
use portal_store_sqlite::{GatewaySettings, SqliteGateway};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portal", author, version, about = "Franchise intranet client")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "portal.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: TopCommand,
}

#[derive(Subcommand)]
enum TopCommand {
  /// Read commands from stdin, keeping one session and cache.
  Shell,
  #[command(flatten)]
  Run(Command),
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Backend {
  #[default]
  Sqlite,
  Http,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CliConfig {
  backend:  Backend,
  /// SQLite database file, used when `backend = "sqlite"`.
  database: PathBuf,
  sqlite:   GatewaySettings,
  http:     HttpSettings,
  portal:   PortalConfig,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      backend:  Backend::default(),
      database: PathBuf::from("portal.db"),
      sqlite:   GatewaySettings::default(),
      http:     HttpSettings::default(),
      portal:   PortalConfig::default(),
    }
  }
}

fn load_config(path: PathBuf) -> anyhow::Result<CliConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("PORTAL")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;
  settings
    .try_deserialize()
    .context("failed to deserialise config")
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so command output stays machine-readable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let mut config = load_config(cli.config)?;

  match config.backend {
    Backend::Sqlite => {
      let path = expand_tilde(&config.database);
      let gateway = SqliteGateway::open(&path, config.sqlite.clone())
        .await
        .with_context(|| format!("failed to open database at {path:?}"))?;
      serve(gateway, &config.portal, cli.command).await
    }
    Backend::Http => {
      config.http.session_file = config.http.session_file.as_deref().map(expand_tilde);
      let gateway =
        HttpGateway::new(config.http.clone()).context("failed to build HTTP gateway")?;
      serve(gateway, &config.portal, cli.command).await
    }
  }
}

async fn serve<G: Gateway + 'static>(
  gateway: G,
  config: &PortalConfig,
  command: TopCommand,
) -> anyhow::Result<()> {
  let portal = Portal::new(gateway, config, Arc::new(LogToaster));
  portal.start().await;

  let result = match command {
    TopCommand::Shell => shell::run(&portal).await,
    TopCommand::Run(command) => commands::run(&portal, command).await,
  };
  portal.dispose();
  result
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
