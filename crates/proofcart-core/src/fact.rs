//! Fact types: the locally cached representation of a remote truth.
//!
//! Each fact is keyed by an externally assigned identifier (a product serial,
//! an escrow id, a seller id) and is replaced wholesale on every write. Only
//! one field per fact type is significant for change detection; see
//! [`crate::detect`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

// ─── Verification ────────────────────────────────────────────────────────────

/// Descriptive payload attached to a successful verification lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
  pub name:      Option<String>,
  pub image:     Option<String>,
  pub seller:    Option<String>,
  /// Result of the direct ledger cross-check, when one was performed.
  pub on_chain:  Option<bool>,
  /// Ledger contract/canister address the backend reported for the NFT.
  pub contract:  Option<String>,
}

/// Whether a product serial resolved to an authentic, ledger-registered
/// product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationFact {
  pub verified: bool,
  /// Present only when the lookup found a record.
  pub metadata: Option<ProductMetadata>,
}

impl VerificationFact {
  /// The negative result recorded for a serial the backend does not know.
  pub fn not_found() -> Self {
    Self {
      verified: false,
      metadata: None,
    }
  }
}

// ─── Escrow ──────────────────────────────────────────────────────────────────

/// The lifecycle state of a held-funds record on the escrow rail.
///
/// Parsing is lenient: the backend's own vocabulary (`created`, `HELD`, ...)
/// is folded onto these variants and anything unrecognised is `Unknown`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum EscrowStatus {
  Pending,
  Locked,
  Released,
  Refunded,
  #[default]
  Unknown,
}

impl From<&str> for EscrowStatus {
  fn from(raw: &str) -> Self {
    match raw.trim().to_ascii_lowercase().as_str() {
      "pending" | "created" => Self::Pending,
      "locked" | "held" => Self::Locked,
      "released" => Self::Released,
      "refunded" => Self::Refunded,
      _ => Self::Unknown,
    }
  }
}

impl From<String> for EscrowStatus {
  fn from(raw: String) -> Self { Self::from(raw.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowFact {
  pub status:  EscrowStatus,
  /// Chain transaction of the most recent status-changing action.
  pub tx_hash: Option<String>,
}

// ─── Trust ───────────────────────────────────────────────────────────────────

/// A seller's 0–100 reputation. `None` when the backend has no score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustFact {
  pub score: Option<f64>,
}

impl TrustFact {
  /// Build a fact from a raw backend score, clamping into `0..=100` and
  /// dropping non-finite values.
  pub fn new(score: Option<f64>) -> Self {
    Self {
      score: score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 100.0)),
    }
  }

  /// Display form: the score without trailing zeros, or `N/A`.
  pub fn display_score(&self) -> String {
    match self.score {
      Some(s) if s.fract() == 0.0 => format!("{s:.0}"),
      Some(s) => format!("{s:.1}"),
      None => "N/A".to_string(),
    }
  }
}

// ─── Orders ──────────────────────────────────────────────────────────────────

/// Order status as seen by the purchase/sale pollers.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Paid,
  Shipped,
  Delivered,
  Disputed,
  Completed,
  Cancelled,
  #[default]
  Unknown,
}

impl From<&str> for OrderStatus {
  fn from(raw: &str) -> Self {
    match raw.trim().to_ascii_lowercase().as_str() {
      "pending" | "payment_pending" => Self::Pending,
      "paid" | "payment_received" | "funds_in_escrow" => Self::Paid,
      "shipped" | "in_transit" => Self::Shipped,
      "delivered" | "pending_release" => Self::Delivered,
      "disputed" => Self::Disputed,
      "completed" => Self::Completed,
      "cancelled" | "canceled" | "payment_failed" | "refunded" => {
        Self::Cancelled
      }
      _ => Self::Unknown,
    }
  }
}

impl From<String> for OrderStatus {
  fn from(raw: String) -> Self { Self::from(raw.as_str()) }
}

/// Transient per-poller view of one order. Never stored in the fact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSnapshot {
  pub status: OrderStatus,
}

/// Which side of an order the current user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Buyer,
  Seller,
}

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Discriminates the fact families for logging and notification routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FactKind {
  Verification,
  Escrow,
  Trust,
  Order,
}
