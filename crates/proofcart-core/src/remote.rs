//! Contracts of the external collaborators: the REST backend and the NFT
//! ledger.
//!
//! The traits are implemented by `proofcart-client` over HTTP and by fakes in
//! tests. Higher layers (`proofcart-sync`, `proofcart-cli`) depend on these
//! abstractions, not on any concrete transport.
//!
//! The wire structs accept every field spelling the backend is known to emit
//! (`escrow_status` / `escrowStatus`, numeric or string ids, decimal strings
//! for scores) and expose one normalised accessor per concept.

use std::future::Future;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{
  Result,
  fact::{EscrowStatus, OrderStatus, ProductMetadata, Role},
};

// ─── Verification ────────────────────────────────────────────────────────────

/// Body of `POST /products/verify/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
  #[serde(default)]
  exists:       Option<bool>,
  #[serde(default)]
  verified:     Option<bool>,
  #[serde(default)]
  pub product:  Option<ProductRecord>,
  #[serde(default)]
  pub nft_data: Option<NftData>,
}

impl VerifyResponse {
  pub fn new(exists: bool, nft_data: Option<NftData>) -> Self {
    Self {
      exists: Some(exists),
      verified: None,
      product: None,
      nft_data,
    }
  }

  /// Whether the backend holds a record for the serial.
  pub fn exists(&self) -> bool { self.exists.or(self.verified).unwrap_or(false) }

  /// Ledger address to cross-check, if the backend reported one.
  pub fn contract_address(&self) -> Option<&str> {
    self.nft_data.as_ref().and_then(NftData::contract_address)
  }

  /// Metadata for the fact; `on_chain` is filled in by the caller.
  pub fn metadata(&self) -> ProductMetadata {
    let product = self.product.as_ref();
    ProductMetadata {
      name:     product.and_then(|p| p.name.clone()),
      image:    product.and_then(|p| p.image.clone().or_else(|| p.image_url.clone())),
      seller:   product.and_then(ProductRecord::seller_label),
      on_chain: None,
      contract: self.contract_address().map(str::to_owned),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductRecord {
  #[serde(default)]
  pub name:        Option<String>,
  #[serde(default)]
  pub image:       Option<String>,
  #[serde(default)]
  pub image_url:   Option<String>,
  #[serde(default)]
  pub seller_name: Option<String>,
  /// Seller id, username, or a nested object depending on the serializer.
  #[serde(default)]
  pub seller:      Option<Value>,
}

impl ProductRecord {
  fn seller_label(&self) -> Option<String> {
    if let Some(name) = &self.seller_name {
      return Some(name.clone());
    }
    match self.seller.as_ref()? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      Value::Object(o) => o
        .get("username")
        .or_else(|| o.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned),
      _ => None,
    }
  }
}

/// The `nft_data` object of a verify response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NftData {
  #[serde(default)]
  pub nft_contract_address: Option<String>,
  #[serde(default)]
  pub contract_address:     Option<String>,
  #[serde(default)]
  pub canister_id:          Option<String>,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub token_id:             Option<String>,
}

impl NftData {
  pub fn with_contract(address: impl Into<String>) -> Self {
    Self {
      nft_contract_address: Some(address.into()),
      ..Default::default()
    }
  }

  pub fn contract_address(&self) -> Option<&str> {
    [
      &self.nft_contract_address,
      &self.contract_address,
      &self.canister_id,
    ]
    .into_iter()
    .flatten()
    .map(String::as_str)
    .find(|s| !s.trim().is_empty())
  }
}

/// Answer of a direct ledger query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LedgerAsset {
  pub exists:     bool,
  /// Opaque canister descriptor; carried, never interpreted.
  #[serde(default)]
  pub descriptor: Option<Value>,
}

impl LedgerAsset {
  pub fn missing() -> Self { Self::default() }
}

// ─── Orders ──────────────────────────────────────────────────────────────────

/// One order as returned by the order endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRecord {
  #[serde(default, deserialize_with = "opt_string_or_number")]
  id:                       Option<String>,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  order_id:                 Option<String>,
  #[serde(default)]
  pub status:               OrderStatus,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub escrow_id:            Option<String>,
  #[serde(default)]
  escrow_status:            Option<EscrowStatus>,
  #[serde(default, rename = "escrowStatus")]
  escrow_status_camel:      Option<EscrowStatus>,
  #[serde(default, rename = "transactionHash")]
  transaction_hash:         Option<String>,
  #[serde(default)]
  release_transaction_hash: Option<String>,
  #[serde(default)]
  escrow_transaction_hash:  Option<String>,
}

impl OrderRecord {
  pub fn new(id: impl Into<String>, status: OrderStatus) -> Self {
    Self {
      id: Some(id.into()),
      status,
      ..Default::default()
    }
  }

  pub fn with_escrow(
    mut self,
    escrow_id: impl Into<String>,
    status: EscrowStatus,
    tx_hash: Option<&str>,
  ) -> Self {
    self.escrow_id = Some(escrow_id.into());
    self.escrow_status = Some(status);
    self.transaction_hash = tx_hash.map(str::to_owned);
    self
  }

  /// The identifier the order endpoints are addressed by.
  pub fn key(&self) -> Option<&str> {
    self.id.as_deref().or(self.order_id.as_deref())
  }

  pub fn escrow_status(&self) -> Option<EscrowStatus> {
    self.escrow_status.or(self.escrow_status_camel)
  }

  /// The most recent status-changing chain transaction.
  pub fn tx_hash(&self) -> Option<&str> {
    self
      .release_transaction_hash
      .as_deref()
      .or(self.transaction_hash.as_deref())
      .or(self.escrow_transaction_hash.as_deref())
  }
}

/// Body of `GET /sellers/:id/trust/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustResponse {
  #[serde(default, deserialize_with = "opt_lenient_f64")]
  pub trust_score: Option<f64>,
}

/// Body returned by user-initiated order actions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionReceipt {
  #[serde(default)]
  pub message:          Option<String>,
  #[serde(default, deserialize_with = "opt_string_or_number")]
  pub escrow_id:        Option<String>,
  #[serde(default)]
  pub escrow_status:    Option<EscrowStatus>,
  #[serde(default, alias = "transactionHash")]
  pub transaction_hash: Option<String>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// The marketplace REST backend.
///
/// Lookups that can miss return `Ok(None)` on a 404: a missing record is a
/// valid answer. `Err` is reserved for transport-level failures.
pub trait Backend: Send + Sync {
  /// `POST /products/verify/` with `{ serial_number }`.
  fn verify_serial<'a>(
    &'a self,
    serial: &'a str,
  ) -> impl Future<Output = Result<Option<VerifyResponse>>> + Send + 'a;

  /// `GET /payments/orders/:id/`.
  fn order<'a>(
    &'a self,
    order_id: &'a str,
  ) -> impl Future<Output = Result<Option<OrderRecord>>> + Send + 'a;

  /// `GET /payments/orders/my_purchases/` or `.../my_sales/`.
  fn orders(
    &self,
    role: Role,
  ) -> impl Future<Output = Result<Vec<OrderRecord>>> + Send + '_;

  /// `GET /sellers/:id/trust/`.
  fn seller_trust<'a>(
    &'a self,
    seller_id: &'a str,
  ) -> impl Future<Output = Result<Option<TrustResponse>>> + Send + 'a;

  /// `POST /payments/orders/:id/confirm_delivery/`.
  fn confirm_delivery<'a>(
    &'a self,
    order_id: &'a str,
    verification_serial: Option<&'a str>,
  ) -> impl Future<Output = Result<ActionReceipt>> + Send + 'a;

  /// `POST /orders/disputes/`.
  fn file_dispute<'a>(
    &'a self,
    order_id: &'a str,
    reason: &'a str,
  ) -> impl Future<Output = Result<ActionReceipt>> + Send + 'a;
}

/// Direct, read-only access to the NFT ledger canister.
///
/// Infallible at this boundary: any failure reads as "asset does not exist".
pub trait Ledger: Send + Sync {
  fn query_asset<'a>(
    &'a self,
    address: &'a str,
  ) -> impl Future<Output = LedgerAsset> + Send + 'a;
}

// ─── Lenient field decoding ──────────────────────────────────────────────────

fn opt_string_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::String(s)) if !s.is_empty() => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

/// DRF renders decimals as strings; accept both.
fn opt_lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::Number(n)) => n.as_f64(),
    Some(Value::String(s)) => s.trim().parse().ok(),
    _ => None,
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn verify_response_accepts_both_verdict_spellings() {
    let a: VerifyResponse = serde_json::from_value(json!({ "exists": true })).unwrap();
    let b: VerifyResponse = serde_json::from_value(json!({ "verified": true })).unwrap();
    let c: VerifyResponse = serde_json::from_value(json!({})).unwrap();
    assert!(a.exists());
    assert!(b.exists());
    assert!(!c.exists());
  }

  #[test]
  fn verify_response_extracts_contract_and_metadata() {
    let resp: VerifyResponse = serde_json::from_value(json!({
      "verified": true,
      "product": {
        "name": "Redmi 14 Pro",
        "image_url": "https://img/redmi.png",
        "seller": { "id": 7, "username": "mi-store" }
      },
      "nft_data": { "canister_id": "", "nft_contract_address": "addr1", "token_id": 12 }
    }))
    .unwrap();

    assert_eq!(resp.contract_address(), Some("addr1"));
    let meta = resp.metadata();
    assert_eq!(meta.name.as_deref(), Some("Redmi 14 Pro"));
    assert_eq!(meta.image.as_deref(), Some("https://img/redmi.png"));
    assert_eq!(meta.seller.as_deref(), Some("mi-store"));
    assert_eq!(meta.contract.as_deref(), Some("addr1"));
    assert_eq!(resp.nft_data.unwrap().token_id.as_deref(), Some("12"));
  }

  #[test]
  fn blank_contract_fields_are_ignored() {
    let nft: NftData =
      serde_json::from_value(json!({ "contract_address": "  " })).unwrap();
    assert_eq!(nft.contract_address(), None);
  }

  #[test]
  fn order_record_normalises_field_spellings() {
    let order: OrderRecord = serde_json::from_value(json!({
      "id": 42,
      "status": "IN_TRANSIT",
      "escrow_id": "esc-9",
      "escrowStatus": "HELD",
      "transactionHash": "tx-lock"
    }))
    .unwrap();

    assert_eq!(order.key(), Some("42"));
    assert_eq!(order.status, OrderStatus::Shipped);
    assert_eq!(order.escrow_status(), Some(EscrowStatus::Locked));
    assert_eq!(order.tx_hash(), Some("tx-lock"));
  }

  #[test]
  fn order_record_prefers_release_hash() {
    let order: OrderRecord = serde_json::from_value(json!({
      "order_id": "b3c1",
      "status": "completed",
      "escrow_status": null,
      "escrow_transaction_hash": "tx-create",
      "release_transaction_hash": "tx-release"
    }))
    .unwrap();

    assert_eq!(order.key(), Some("b3c1"));
    assert_eq!(order.escrow_status(), None);
    assert_eq!(order.tx_hash(), Some("tx-release"));
  }

  #[test]
  fn trust_score_accepts_decimal_strings() {
    let t: TrustResponse =
      serde_json::from_value(json!({ "trust_score": "87.50" })).unwrap();
    assert_eq!(t.trust_score, Some(87.5));
    let t: TrustResponse =
      serde_json::from_value(json!({ "trust_score": null })).unwrap();
    assert_eq!(t.trust_score, None);
  }
}
