//! Notification emitter.
//!
//! Transitions are turned into user-facing messages by a lookup in [`RULES`]:
//! the first rule whose fact kind, transition and target state match the
//! observation wins. `Unchanged` transitions never reach the table.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::{
  detect::Transition,
  fact::{
    EscrowFact, EscrowStatus, FactKind, OrderSnapshot, OrderStatus, Role,
    TrustFact, VerificationFact,
  },
};

// ─── Notification ────────────────────────────────────────────────────────────

/// Tone of a notification; drives the toast colour in a UI.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  Success,
  Neutral,
  Warning,
  Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
  pub id:         Uuid,
  pub kind:       FactKind,
  /// The serial, escrow id, seller id or order id the message is about.
  pub key:        String,
  pub severity:   Severity,
  pub message:    String,
  pub emitted_at: DateTime<Utc>,
}

impl Notification {
  pub fn new(
    kind: FactKind,
    key: impl Into<String>,
    severity: Severity,
    message: impl Into<String>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      kind,
      key: key.into(),
      severity,
      message: message.into(),
      emitted_at: Utc::now(),
    }
  }

  pub fn error(
    kind: FactKind,
    key: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self::new(kind, key, Severity::Error, message)
  }
}

/// Sink for notifications (a toast layer, a terminal, a test recorder).
pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}

/// Keeps every notification in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
  inner: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
  pub fn new() -> Self { Self::default() }

  pub fn all(&self) -> Vec<Notification> { self.inner.lock().clone() }

  pub fn len(&self) -> usize { self.inner.lock().len() }

  pub fn is_empty(&self) -> bool { self.inner.lock().is_empty() }

  pub fn severities(&self) -> Vec<Severity> {
    self.inner.lock().iter().map(|n| n.severity).collect()
  }

  /// Remove and return everything recorded so far.
  pub fn drain(&self) -> Vec<Notification> {
    std::mem::take(&mut *self.inner.lock())
  }
}

impl Notifier for MemoryNotifier {
  fn notify(&self, notification: Notification) {
    self.inner.lock().push(notification);
  }
}

// ─── Observations ────────────────────────────────────────────────────────────

/// A fact (or order snapshot) together with the key it was written under.
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
  Verification {
    serial: &'a str,
    fact:   &'a VerificationFact,
  },
  Escrow {
    escrow_id: &'a str,
    fact:      &'a EscrowFact,
  },
  Trust {
    seller_id: &'a str,
    fact:      &'a TrustFact,
  },
  Order {
    order_id: &'a str,
    snapshot: &'a OrderSnapshot,
    role:     Role,
  },
}

impl Observation<'_> {
  pub fn kind(&self) -> FactKind {
    match self {
      Self::Verification { .. } => FactKind::Verification,
      Self::Escrow { .. } => FactKind::Escrow,
      Self::Trust { .. } => FactKind::Trust,
      Self::Order { .. } => FactKind::Order,
    }
  }

  pub fn key(&self) -> &str {
    match self {
      Self::Verification { serial, .. } => serial,
      Self::Escrow { escrow_id, .. } => escrow_id,
      Self::Trust { seller_id, .. } => seller_id,
      Self::Order { order_id, .. } => order_id,
    }
  }

  /// The text substituted for `{status}` in a template.
  fn status_text(&self) -> String {
    match self {
      Self::Verification { fact, .. } => {
        let verdict = if fact.verified { "verified" } else { "unverified" };
        verdict.to_string()
      }
      Self::Escrow { fact, .. } => fact.status.to_string(),
      Self::Trust { fact, .. } => fact.display_score(),
      Self::Order { snapshot, .. } => snapshot.status.to_string(),
    }
  }
}

// ─── Rule table ──────────────────────────────────────────────────────────────

/// The state an observation must be in for a rule to apply.
#[derive(Debug, Clone, Copy)]
enum Target {
  Any,
  Verified(bool),
  Escrow(EscrowStatus),
  Order(OrderStatus),
  OrderAs(OrderStatus, Role),
}

impl Target {
  fn matches(self, obs: &Observation<'_>) -> bool {
    match (self, obs) {
      (Self::Any, _) => true,
      (Self::Verified(v), Observation::Verification { fact, .. }) => {
        fact.verified == v
      }
      (Self::Escrow(s), Observation::Escrow { fact, .. }) => fact.status == s,
      (Self::Order(s), Observation::Order { snapshot, .. }) => {
        snapshot.status == s
      }
      (Self::OrderAs(s, r), Observation::Order { snapshot, role, .. }) => {
        snapshot.status == s && *role == r
      }
      _ => false,
    }
  }
}

struct Rule {
  kind:       FactKind,
  transition: Transition,
  target:     Target,
  severity:   Severity,
  /// `{key}` and `{status}` are substituted.
  template:   &'static str,
}

const fn rule(
  kind: FactKind,
  transition: Transition,
  target: Target,
  severity: Severity,
  template: &'static str,
) -> Rule {
  Rule {
    kind,
    transition,
    target,
    severity,
    template,
  }
}

use FactKind as K;
use Severity as S;
use Transition as T;

/// Ordered: specific targets precede the `Any` fallback for the same kind and
/// transition.
const RULES: &[Rule] = &[
  // Verification
  rule(
    K::Verification,
    T::New,
    Target::Verified(true),
    S::Success,
    "Product {key} is authentic: verified on the ledger",
  ),
  rule(
    K::Verification,
    T::New,
    Target::Verified(false),
    S::Neutral,
    "Scanned {key}: product could not be verified",
  ),
  rule(
    K::Verification,
    T::Changed,
    Target::Any,
    S::Neutral,
    "Verification for {key} updated: now {status}",
  ),
  // Escrow
  rule(
    K::Escrow,
    T::New,
    Target::Any,
    S::Neutral,
    "Escrow {key} created ({status})",
  ),
  rule(
    K::Escrow,
    T::Changed,
    Target::Escrow(EscrowStatus::Released),
    S::Success,
    "Escrow {key} released: funds sent to the seller",
  ),
  rule(
    K::Escrow,
    T::Changed,
    Target::Escrow(EscrowStatus::Locked),
    S::Warning,
    "Escrow {key} locked: funds held until delivery is confirmed",
  ),
  rule(
    K::Escrow,
    T::Changed,
    Target::Escrow(EscrowStatus::Refunded),
    S::Error,
    "Escrow {key} refunded to the buyer",
  ),
  rule(
    K::Escrow,
    T::Changed,
    Target::Any,
    S::Neutral,
    "Escrow {key} is now {status}",
  ),
  // Trust
  rule(
    K::Trust,
    T::New,
    Target::Any,
    S::Success,
    "Seller {key} trust score: {status}",
  ),
  rule(
    K::Trust,
    T::Changed,
    Target::Any,
    S::Neutral,
    "Seller {key} trust score updated to {status}",
  ),
  // Orders
  rule(
    K::Order,
    T::New,
    Target::Any,
    S::Neutral,
    "Order {key} is {status}",
  ),
  rule(
    K::Order,
    T::Changed,
    Target::OrderAs(OrderStatus::Shipped, Role::Buyer),
    S::Success,
    "Your order {key} has shipped",
  ),
  rule(
    K::Order,
    T::Changed,
    Target::OrderAs(OrderStatus::Shipped, Role::Seller),
    S::Success,
    "Order {key} marked as shipped to the buyer",
  ),
  rule(
    K::Order,
    T::Changed,
    Target::Order(OrderStatus::Delivered),
    S::Success,
    "Order {key} has been delivered",
  ),
  rule(
    K::Order,
    T::Changed,
    Target::Any,
    S::Neutral,
    "Order {key} status changed to {status}",
  ),
];

/// Map a classified transition to at most one notification.
pub fn emit(obs: Observation<'_>, transition: Transition) -> Option<Notification> {
  if !transition.is_notifiable() {
    return None;
  }
  let kind = obs.kind();
  let rule = RULES.iter().find(|r| {
    r.kind == kind && r.transition == transition && r.target.matches(&obs)
  })?;
  let message = render(rule.template, obs.key(), &obs.status_text());
  Some(Notification::new(kind, obs.key(), rule.severity, message))
}

/// Fill `{key}` and `{status}` in one left-to-right pass, so placeholder
/// text inside the substituted values is kept literally.
fn render(template: &str, key: &str, status: &str) -> String {
  let mut out = String::with_capacity(template.len() + key.len() + status.len());
  let mut rest = template;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let tail = &rest[open..];
    if let Some(after) = tail.strip_prefix("{key}") {
      out.push_str(key);
      rest = after;
    } else if let Some(after) = tail.strip_prefix("{status}") {
      out.push_str(status);
      rest = after;
    } else {
      out.push('{');
      rest = &tail[1..];
    }
  }
  out.push_str(rest);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn escrow(status: EscrowStatus) -> EscrowFact {
    EscrowFact {
      status,
      tx_hash: None,
    }
  }

  fn escrow_severity(status: EscrowStatus, t: Transition) -> Option<Severity> {
    let fact = escrow(status);
    emit(
      Observation::Escrow {
        escrow_id: "esc-1",
        fact:      &fact,
      },
      t,
    )
    .map(|n| n.severity)
  }

  fn order(
    status: OrderStatus,
    role: Role,
    t: Transition,
  ) -> Option<Notification> {
    let snapshot = OrderSnapshot { status };
    emit(
      Observation::Order {
        order_id: "42",
        snapshot: &snapshot,
        role,
      },
      t,
    )
  }

  #[test]
  fn unchanged_never_emits() {
    let fact = VerificationFact::not_found();
    let obs = Observation::Verification {
      serial: "SN-1",
      fact:   &fact,
    };
    assert!(emit(obs, Transition::Unchanged).is_none());
  }

  #[test]
  fn verification_tone_follows_verdict() {
    let yes = VerificationFact {
      verified: true,
      metadata: None,
    };
    let no = VerificationFact::not_found();
    let new_yes = emit(
      Observation::Verification {
        serial: "SN-1",
        fact:   &yes,
      },
      Transition::New,
    )
    .unwrap();
    let new_no = emit(
      Observation::Verification {
        serial: "SN-2",
        fact:   &no,
      },
      Transition::New,
    )
    .unwrap();
    let changed = emit(
      Observation::Verification {
        serial: "SN-2",
        fact:   &yes,
      },
      Transition::Changed,
    )
    .unwrap();

    assert_eq!(new_yes.severity, Severity::Success);
    assert_eq!(new_no.severity, Severity::Neutral);
    assert_eq!(changed.severity, Severity::Neutral);
    assert_eq!(changed.message, "Verification for SN-2 updated: now verified");
  }

  #[test]
  fn escrow_severities() {
    use EscrowStatus::*;
    assert_eq!(escrow_severity(Released, Transition::New), Some(Severity::Neutral));
    assert_eq!(escrow_severity(Released, Transition::Changed), Some(Severity::Success));
    assert_eq!(escrow_severity(Locked, Transition::Changed), Some(Severity::Warning));
    assert_eq!(escrow_severity(Refunded, Transition::Changed), Some(Severity::Error));
    assert_eq!(escrow_severity(Pending, Transition::Changed), Some(Severity::Neutral));
    assert_eq!(escrow_severity(Unknown, Transition::Changed), Some(Severity::Neutral));
  }

  #[test]
  fn trust_message_renders_missing_score() {
    let fact = TrustFact::new(None);
    let n = emit(
      Observation::Trust {
        seller_id: "S1",
        fact:      &fact,
      },
      Transition::Changed,
    )
    .unwrap();
    assert_eq!(n.severity, Severity::Neutral);
    assert_eq!(n.message, "Seller S1 trust score updated to N/A");

    let fact = TrustFact::new(Some(88.0));
    let n = emit(
      Observation::Trust {
        seller_id: "S1",
        fact:      &fact,
      },
      Transition::New,
    )
    .unwrap();
    assert_eq!(n.severity, Severity::Success);
    assert!(n.message.contains("88"));
  }

  #[test]
  fn shipped_wording_depends_on_role() {
    let buyer = order(OrderStatus::Shipped, Role::Buyer, Transition::Changed).unwrap();
    let seller = order(OrderStatus::Shipped, Role::Seller, Transition::Changed).unwrap();
    assert_eq!(buyer.severity, Severity::Success);
    assert_eq!(seller.severity, Severity::Success);
    assert_ne!(buyer.message, seller.message);
  }

  #[test]
  fn order_fallbacks() {
    let new = order(OrderStatus::Shipped, Role::Buyer, Transition::New).unwrap();
    assert_eq!(new.severity, Severity::Neutral);
    assert_eq!(new.message, "Order 42 is shipped");

    let delivered =
      order(OrderStatus::Delivered, Role::Seller, Transition::Changed).unwrap();
    assert_eq!(delivered.severity, Severity::Success);

    let disputed =
      order(OrderStatus::Disputed, Role::Buyer, Transition::Changed).unwrap();
    assert_eq!(disputed.severity, Severity::Neutral);
    assert_eq!(disputed.message, "Order 42 status changed to disputed");
  }

  #[test]
  fn placeholders_in_keys_are_kept_verbatim() {
    let fact = VerificationFact::not_found();
    let obs = Observation::Verification {
      serial: "LOT{status}-7",
      fact:   &fact,
    };
    let n = emit(obs, Transition::New).unwrap();
    assert_eq!(n.message, "Scanned LOT{status}-7: product could not be verified");

    let rendered = render("{key} is {status}", "{key}", "{status}");
    assert_eq!(rendered, "{key} is {status}");
    assert_eq!(render("{key} {x}{", "A", "b"), "A {x}{");
  }

  #[test]
  fn every_kind_and_transition_has_a_fallback() {
    for kind in [K::Verification, K::Escrow, K::Trust, K::Order] {
      for t in [T::New, T::Changed] {
        assert!(
          RULES.iter().any(|r| r.kind == kind && r.transition == t),
          "{kind} / {t:?} has no rule"
        );
      }
    }
  }
}
