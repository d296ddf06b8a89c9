//! The write → detect → notify pipeline.
//!
//! Every fact that enters the client goes through a [`Reconciler`]: the store
//! setter returns the value it replaced, [`classify`] compares the two, and
//! [`emit`] turns a notifiable transition into exactly one notification.

use std::{collections::HashMap, sync::Arc};

use crate::{
  Error,
  detect::{Transition, classify},
  fact::{EscrowStatus, FactKind, OrderSnapshot, OrderStatus, Role, VerificationFact},
  notify::{Notification, Notifier, Observation, emit},
  remote::OrderRecord,
  store::FactStore,
};

/// Owns nothing but handles: cheap to clone and share between fetchers.
#[derive(Clone)]
pub struct Reconciler {
  store:    Arc<FactStore>,
  notifier: Arc<dyn Notifier>,
}

impl Reconciler {
  pub fn new(store: Arc<FactStore>, notifier: Arc<dyn Notifier>) -> Self {
    Self { store, notifier }
  }

  pub fn store(&self) -> &Arc<FactStore> { &self.store }

  // ── Facts ─────────────────────────────────────────────────────────────

  pub fn apply_verification(
    &self,
    serial: &str,
    fact: VerificationFact,
  ) -> Transition {
    let write = self.store.set_verification(serial, fact);
    let transition = classify(write.previous.as_ref(), &write.current);
    self.dispatch(
      Observation::Verification {
        serial,
        fact: &write.current,
      },
      transition,
    );
    transition
  }

  pub fn apply_escrow(
    &self,
    escrow_id: &str,
    status: EscrowStatus,
    tx_hash: Option<String>,
  ) -> Transition {
    let write = self.store.set_escrow_status(escrow_id, status, tx_hash);
    let transition = classify(write.previous.as_ref(), &write.current);
    self.dispatch(
      Observation::Escrow {
        escrow_id,
        fact: &write.current,
      },
      transition,
    );
    transition
  }

  pub fn apply_trust(&self, seller_id: &str, score: Option<f64>) -> Transition {
    let write = self.store.set_trust(seller_id, score);
    let transition = classify(write.previous.as_ref(), &write.current);
    self.dispatch(
      Observation::Trust {
        seller_id,
        fact: &write.current,
      },
      transition,
    );
    transition
  }

  /// Record the escrow half of an order record (a creation response or a
  /// poll result). Orders without escrow information write nothing.
  pub fn observe_order(&self, order: &OrderRecord) -> Option<Transition> {
    let escrow_id = order.escrow_id.as_deref()?;
    let status = order.escrow_status().unwrap_or(EscrowStatus::Pending);
    Some(self.apply_escrow(
      escrow_id,
      status,
      order.tx_hash().map(str::to_owned),
    ))
  }

  /// Announce an order-status transition tracked by `tracker`.
  pub fn track_order(
    &self,
    tracker: &mut OrderTracker,
    order_id: &str,
    status: OrderStatus,
  ) -> Transition {
    let snapshot = OrderSnapshot { status };
    let transition = tracker.observe(order_id, snapshot);
    self.dispatch(
      Observation::Order {
        order_id,
        snapshot: &snapshot,
        role: tracker.role(),
      },
      transition,
    );
    transition
  }

  // ── Failures and session ──────────────────────────────────────────────

  /// Surface a failed fetch or action as a single error notification.
  /// Nothing is written to the store.
  pub fn report_failure(&self, kind: FactKind, key: &str, what: &str, err: &Error) {
    tracing::warn!(%kind, key, error = %err, "{what} failed");
    self
      .notifier
      .notify(Notification::error(kind, key, format!("{what} failed: {err}")));
  }

  /// Emit a notification that is not tied to a fact transition.
  pub fn announce(&self, notification: Notification) {
    tracing::info!(
      severity = %notification.severity,
      key = %notification.key,
      "{}",
      notification.message
    );
    self.notifier.notify(notification);
  }

  /// Session teardown.
  pub fn logout(&self) { self.store.clear(); }

  fn dispatch(&self, obs: Observation<'_>, transition: Transition) {
    match emit(obs, transition) {
      Some(notification) => self.announce(notification),
      None => {
        tracing::debug!(kind = %obs.kind(), key = obs.key(), "unchanged, suppressed")
      }
    }
  }
}

// ─── Order tracking ──────────────────────────────────────────────────────────

/// Previous order statuses for one running poller.
///
/// Not persisted: a new tracker starts empty, so orders seen by
/// a restarted poller are announced as new with their current status.
#[derive(Debug)]
pub struct OrderTracker {
  role: Role,
  seen: HashMap<String, OrderSnapshot>,
}

impl OrderTracker {
  pub fn new(role: Role) -> Self {
    Self {
      role,
      seen: HashMap::new(),
    }
  }

  pub fn role(&self) -> Role { self.role }

  pub fn len(&self) -> usize { self.seen.len() }

  pub fn is_empty(&self) -> bool { self.seen.is_empty() }

  /// Classify `snapshot` against the last one seen and remember it.
  pub fn observe(&mut self, order_id: &str, snapshot: OrderSnapshot) -> Transition {
    let previous = self.seen.insert(order_id.to_string(), snapshot);
    classify(previous.as_ref(), &snapshot)
  }
}
