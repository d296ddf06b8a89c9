//! HTTP implementations of the ProofCart collaborators.
//!
//! [`HttpBackend`] talks to the marketplace REST API, [`HttpLedger`] to the
//! NFT ledger gateway. Both are cheap to clone: the inner
//! [`reqwest::Client`] is `Arc`-based.

mod backend;
mod ledger;

use std::time::Duration;

use proofcart_core::{Error, Result};
use reqwest::Client;

pub use self::{backend::HttpBackend, ledger::HttpLedger};

const TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the marketplace API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  /// Base URL including the API prefix, e.g. `http://localhost:8000/api`.
  pub base_url: String,
  /// Bearer token of the signed-in user.
  pub token:    Option<String>,
}

fn build_client() -> Result<Client> {
  Client::builder()
    .timeout(TIMEOUT)
    .build()
    .map_err(|e| Error::Transport(Box::new(e)))
}

/// Join `path` onto `base`, tolerating a trailing slash on either side.
fn join(base: &str, path: &str) -> String {
  format!(
    "{}/{}",
    base.trim_end_matches('/'),
    path.trim_start_matches('/')
  )
}

fn transport(err: reqwest::Error) -> Error {
  if err.is_decode() {
    Error::Decode(err.to_string())
  } else {
    Error::Transport(Box::new(err))
  }
}
