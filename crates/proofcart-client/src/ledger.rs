//! Read-only HTTP gateway to the NFT ledger.

use proofcart_core::{
  Result,
  remote::{Ledger, LedgerAsset},
};
use reqwest::Client;

use crate::{build_client, join, transport};

/// Queries `GET {base}/assets/:address`, which answers
/// `{ "exists": bool, "descriptor": ... }`.
#[derive(Clone)]
pub struct HttpLedger {
  client:   Client,
  base_url: String,
}

impl HttpLedger {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    Ok(Self {
      client:   build_client()?,
      base_url: base_url.into(),
    })
  }

  fn url(&self, address: &str) -> String {
    join(&self.base_url, &format!("/assets/{address}"))
  }

  async fn fetch(&self, address: &str) -> Result<LedgerAsset> {
    let resp = self
      .client
      .get(self.url(address))
      .send()
      .await
      .map_err(transport)?;
    if !resp.status().is_success() {
      tracing::debug!(address, status = %resp.status(), "ledger has no such asset");
      return Ok(LedgerAsset::missing());
    }
    resp.json().await.map_err(transport)
  }
}

impl Ledger for HttpLedger {
  async fn query_asset(&self, address: &str) -> LedgerAsset {
    match self.fetch(address).await {
      Ok(asset) => asset,
      Err(err) => {
        tracing::warn!(
          address,
          error = %err,
          "ledger query failed, treating asset as absent"
        );
        LedgerAsset::missing()
      }
    }
  }
}
