//! `proofcart`: verify products and follow orders from the terminal.
//!
//! # Usage
//!
//! ```
//! proofcart --token $TOKEN verify 8645REDMI14PRO
//! proofcart watch-orders --role buyer
//! echo SN-001 | proofcart scan
//! ```
//!
//! Settings come from `proofcart.toml` (or `--config`), then `PROOFCART_*`
//! environment variables, then flags.

mod app;
mod console;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, Subcommand, ValueEnum};
use console::Console;
use proofcart_core::fact::Role;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "proofcart", version, about = "ProofCart marketplace client")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE", default_value = "proofcart.toml")]
  config: PathBuf,

  /// Base URL of the marketplace API, including the `/api` prefix.
  #[arg(long, env = "PROOFCART_API_URL")]
  api_url: Option<String>,

  /// Base URL of the NFT ledger gateway.
  #[arg(long, env = "PROOFCART_LEDGER_URL")]
  ledger_url: Option<String>,

  /// Bearer token of the signed-in user.
  #[arg(long, env = "PROOFCART_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Print notifications as JSON lines.
  #[arg(long)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Verify one product serial or QR link.
  Verify { serial: String },
  /// Verify serials read from stdin, one per line.
  Scan,
  /// Fetch a seller's trust score.
  Trust { seller_id: String },
  /// Follow one order's escrow until interrupted.
  WatchOrder {
    order_id: String,
    /// Poll period in seconds.
    #[arg(long)]
    every:    Option<u64>,
  },
  /// Follow your purchases or sales until interrupted.
  WatchOrders {
    #[arg(long, value_enum)]
    role:  RoleArg,
    /// Poll period in seconds.
    #[arg(long)]
    every: Option<u64>,
  },
  /// Confirm delivery of an order, releasing its escrow.
  ConfirmDelivery {
    order_id: String,
    /// Serial verified on receipt.
    #[arg(long)]
    serial:   Option<String>,
  },
  /// Open a dispute on an order.
  Dispute { order_id: String, reason: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
  Buyer,
  Seller,
}

impl From<RoleArg> for Role {
  fn from(role: RoleArg) -> Self {
    match role {
      RoleArg::Buyer => Role::Buyer,
      RoleArg::Seller => Role::Seller,
    }
  }
}

// ─── Settings ─────────────────────────────────────────────────────────────────

/// Effective runtime settings after layering defaults, file, env and flags.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
  pub api_url:          String,
  pub ledger_url:       String,
  #[serde(default)]
  pub token:            Option<String>,
  pub detail_poll_secs: u64,
  pub list_poll_secs:   u64,
}

impl Settings {
  fn load(args: &Args) -> Result<Self> {
    let (detail_every, list_every) = match &args.command {
      Command::WatchOrder { every, .. } => (*every, None),
      Command::WatchOrders { every, .. } => (None, *every),
      _ => (None, None),
    };

    let settings = config::Config::builder()
      .set_default("api_url", "http://localhost:8000/api")?
      .set_default("ledger_url", "http://127.0.0.1:4943")?
      .set_default("detail_poll_secs", 5)?
      .set_default("list_poll_secs", 30)?
      .add_source(config::File::from(args.config.clone()).required(false))
      .add_source(config::Environment::with_prefix("PROOFCART"))
      .set_override_option("api_url", args.api_url.clone())?
      .set_override_option("ledger_url", args.ledger_url.clone())?
      .set_override_option("token", args.token.clone())?
      .set_override_option("detail_poll_secs", detail_every)?
      .set_override_option("list_poll_secs", list_every)?
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize::<Settings>()
      .context("failed to deserialise settings")?
      .validated()
  }

  fn validated(self) -> Result<Self> {
    anyhow::ensure!(self.detail_poll_secs > 0, "detail_poll_secs must be positive");
    anyhow::ensure!(self.list_poll_secs > 0, "list_poll_secs must be positive");
    Ok(self)
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let settings = Settings::load(&args)?;
  tracing::debug!(
    api_url = %settings.api_url,
    ledger_url = %settings.ledger_url,
    "settings loaded"
  );

  let app = App::new(settings, Arc::new(Console::new(args.json)))?;

  match args.command {
    Command::Verify { serial } => app.verify(&serial).await,
    Command::Scan => app.scan().await,
    Command::Trust { seller_id } => app.trust(&seller_id).await,
    Command::WatchOrder { order_id, .. } => app.watch_order(&order_id).await,
    Command::WatchOrders { role, .. } => app.watch_orders(role.into()).await,
    Command::ConfirmDelivery { order_id, serial } => {
      app.confirm_delivery(&order_id, serial.as_deref()).await
    }
    Command::Dispute { order_id, reason } => app.dispute(&order_id, &reason).await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(argv: &[&str]) -> Args {
    let mut full = vec!["proofcart", "--config", "/nonexistent/proofcart.toml"];
    full.extend_from_slice(argv);
    Args::try_parse_from(full).unwrap()
  }

  #[test]
  fn defaults_apply_without_file_or_flags() {
    let settings = Settings::load(&args(&["scan"])).unwrap();
    assert_eq!(settings.detail_poll_secs, 5);
    assert_eq!(settings.list_poll_secs, 30);
  }

  #[test]
  fn flags_override_defaults() {
    let settings = Settings::load(&args(&[
      "--api-url",
      "https://market.example/api",
      "watch-orders",
      "--role",
      "seller",
      "--every",
      "10",
    ]))
    .unwrap();
    assert_eq!(settings.api_url, "https://market.example/api");
    assert_eq!(settings.list_poll_secs, 10);
    assert_eq!(settings.detail_poll_secs, 5);
  }

  #[test]
  fn zero_period_is_rejected() {
    let err = Settings::load(&args(&["watch-order", "7", "--every", "0"])).unwrap_err();
    assert!(err.to_string().contains("detail_poll_secs"));
  }

  #[test]
  fn role_flag_is_required_for_list_watch() {
    let parsed = Args::try_parse_from(["proofcart", "watch-orders"]);
    assert!(parsed.is_err());
  }
}
