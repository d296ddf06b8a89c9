//! Async HTTP client for the marketplace REST API.

use proofcart_core::{
  Error, Result,
  fact::Role,
  remote::{ActionReceipt, Backend, OrderRecord, TrustResponse, VerifyResponse},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{ApiConfig, build_client, join, transport};

#[derive(Clone)]
pub struct HttpBackend {
  client: Client,
  config: ApiConfig,
}

impl HttpBackend {
  pub fn new(config: ApiConfig) -> Result<Self> {
    Ok(Self {
      client: build_client()?,
      config,
    })
  }

  fn url(&self, path: &str) -> String { join(&self.config.base_url, path) }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
    tracing::debug!(what, "backend request");
    self.auth(req).send().await.map_err(transport)
  }
}

// ── Response handling ───────────────────────────────────────────────────────

/// Decode a success body; a 404 is a valid miss.
async fn read<T: DeserializeOwned>(resp: Response, what: &str) -> Result<Option<T>> {
  let status = resp.status();
  if status == StatusCode::NOT_FOUND {
    return Ok(None);
  }
  if !status.is_success() {
    return Err(rejected(resp).await);
  }
  let body = resp.bytes().await.map_err(transport)?;
  serde_json::from_slice(&body)
    .map(Some)
    .map_err(|e| Error::Decode(format!("{what}: {e}")))
}

/// Like [`read`], but a 404 means the action targeted an unknown record.
async fn read_action<T: DeserializeOwned>(
  resp: Response,
  what: &str,
  order_id: &str,
) -> Result<T> {
  read(resp, what)
    .await?
    .ok_or_else(|| Error::NotFound(format!("order {order_id}")))
}

async fn rejected(resp: Response) -> Error {
  let status = resp.status().as_u16();
  let text = resp.text().await.unwrap_or_default();
  Error::Rejected {
    status,
    message: rejection_message(&text),
  }
}

/// The human-readable part of an error body: `{"error": ..}` or
/// `{"detail": ..}` when present, the raw text otherwise.
fn rejection_message(text: &str) -> String {
  let parsed = serde_json::from_str::<Value>(text).ok();
  let field = parsed.as_ref().and_then(|v| {
    ["error", "detail", "message"]
      .iter()
      .find_map(|k| v.get(k).and_then(Value::as_str))
  });
  match field {
    Some(msg) => msg.to_string(),
    None if text.trim().is_empty() => "no response body".to_string(),
    None => text.trim().chars().take(200).collect(),
  }
}

/// List endpoints answer with a bare array or a paginated envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum OrderList {
  Bare(Vec<OrderRecord>),
  Page { results: Vec<OrderRecord> },
}

impl From<OrderList> for Vec<OrderRecord> {
  fn from(list: OrderList) -> Self {
    match list {
      OrderList::Bare(orders) => orders,
      OrderList::Page { results } => results,
    }
  }
}

/// Confirmation answers with the updated order nested next to the message.
#[derive(Deserialize)]
struct ConfirmBody {
  #[serde(default)]
  order:   Option<OrderRecord>,
  #[serde(flatten)]
  receipt: ActionReceipt,
}

impl From<ConfirmBody> for ActionReceipt {
  fn from(body: ConfirmBody) -> Self {
    let mut receipt = body.receipt;
    if let Some(order) = body.order {
      receipt.escrow_status = receipt.escrow_status.or(order.escrow_status());
      receipt.transaction_hash = receipt
        .transaction_hash
        .or_else(|| order.tx_hash().map(str::to_owned));
      receipt.escrow_id = receipt.escrow_id.or(order.escrow_id);
    }
    receipt
  }
}

fn role_path(role: Role) -> &'static str {
  match role {
    Role::Buyer => "/payments/orders/my_purchases/",
    Role::Seller => "/payments/orders/my_sales/",
  }
}

// ── Backend ─────────────────────────────────────────────────────────────────

impl Backend for HttpBackend {
  async fn verify_serial(&self, serial: &str) -> Result<Option<VerifyResponse>> {
    let req = self
      .client
      .post(self.url("/products/verify/"))
      .json(&json!({ "serial_number": serial }));
    let resp = self.send(req, "POST /products/verify/").await?;
    read(resp, "verify response").await
  }

  async fn order(&self, order_id: &str) -> Result<Option<OrderRecord>> {
    let req = self
      .client
      .get(self.url(&format!("/payments/orders/{order_id}/")));
    let resp = self.send(req, "GET /payments/orders/:id/").await?;
    read(resp, "order").await
  }

  async fn orders(&self, role: Role) -> Result<Vec<OrderRecord>> {
    let path = role_path(role);
    let resp = self.send(self.client.get(self.url(path)), path).await?;
    let list: Option<OrderList> = read(resp, "order list").await?;
    Ok(list.map(Vec::from).unwrap_or_default())
  }

  async fn seller_trust(&self, seller_id: &str) -> Result<Option<TrustResponse>> {
    let req = self
      .client
      .get(self.url(&format!("/sellers/{seller_id}/trust/")));
    let resp = self.send(req, "GET /sellers/:id/trust/").await?;
    read(resp, "trust score").await
  }

  async fn confirm_delivery(
    &self,
    order_id: &str,
    verification_serial: Option<&str>,
  ) -> Result<ActionReceipt> {
    let req = self
      .client
      .post(self.url(&format!("/payments/orders/{order_id}/confirm_delivery/")))
      .json(&json!({
        "verification_serial": verification_serial,
        "confirmed": true,
      }));
    let resp = self
      .send(req, "POST /payments/orders/:id/confirm_delivery/")
      .await?;
    let body: ConfirmBody = read_action(resp, "delivery confirmation", order_id).await?;
    Ok(body.into())
  }

  async fn file_dispute(&self, order_id: &str, reason: &str) -> Result<ActionReceipt> {
    let req = self
      .client
      .post(self.url("/orders/disputes/"))
      .json(&json!({ "order": order_id, "reason": reason }));
    let resp = self.send(req, "POST /orders/disputes/").await?;
    read_action(resp, "dispute", order_id).await
  }
}
