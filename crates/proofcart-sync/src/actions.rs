//! User-initiated order actions.
//!
//! Unlike background polls, these never fail silently: every call ends in
//! exactly one success or error notification.

use std::sync::Arc;

use proofcart_core::{
  fact::FactKind,
  notify::{Notification, Severity},
  reconcile::Reconciler,
  remote::{ActionReceipt, Backend},
};

pub struct OrderActions<B> {
  backend:    Arc<B>,
  reconciler: Reconciler,
}

impl<B: Backend> OrderActions<B> {
  pub fn new(backend: Arc<B>, reconciler: Reconciler) -> Self {
    Self {
      backend,
      reconciler,
    }
  }

  /// Confirm delivery, optionally citing the serial scanned on receipt.
  pub async fn confirm_delivery(
    &self,
    order_id: &str,
    verification_serial: Option<&str>,
  ) -> bool {
    match self.backend.confirm_delivery(order_id, verification_serial).await {
      Ok(receipt) => {
        self.succeed(
          order_id,
          &receipt,
          format!("Delivery confirmed for order {order_id}"),
        );
        true
      }
      Err(err) => {
        self.reconciler.report_failure(
          FactKind::Order,
          order_id,
          "Delivery confirmation",
          &err,
        );
        false
      }
    }
  }

  pub async fn file_dispute(&self, order_id: &str, reason: &str) -> bool {
    match self.backend.file_dispute(order_id, reason).await {
      Ok(receipt) => {
        self.succeed(
          order_id,
          &receipt,
          format!("Dispute filed for order {order_id}"),
        );
        true
      }
      Err(err) => {
        self
          .reconciler
          .report_failure(FactKind::Order, order_id, "Dispute filing", &err);
        false
      }
    }
  }

  fn succeed(&self, order_id: &str, receipt: &ActionReceipt, fallback: String) {
    let message = receipt.message.clone().unwrap_or(fallback);
    self.reconciler.announce(Notification::new(
      FactKind::Order,
      order_id,
      Severity::Success,
      message,
    ));
    if let (Some(escrow_id), Some(status)) =
      (receipt.escrow_id.as_deref(), receipt.escrow_status)
    {
      self
        .reconciler
        .apply_escrow(escrow_id, status, receipt.transaction_hash.clone());
    }
  }
}
