//! Verification fetcher: serial → backend record → ledger cross-check.

use std::sync::Arc;

use proofcart_core::{
  Result,
  fact::{FactKind, VerificationFact},
  reconcile::Reconciler,
  remote::{Backend, Ledger},
};

/// Looks a serial up on the backend and, when the backend names a ledger
/// contract, confirms the asset on the ledger directly. A backend record
/// alone is not proof: both checks must agree for `verified` to be true.
pub struct VerificationFetcher<B, L> {
  backend:    Arc<B>,
  ledger:     Arc<L>,
  reconciler: Reconciler,
}

impl<B, L> Clone for VerificationFetcher<B, L> {
  fn clone(&self) -> Self {
    Self {
      backend:    self.backend.clone(),
      ledger:     self.ledger.clone(),
      reconciler: self.reconciler.clone(),
    }
  }
}

impl<B: Backend, L: Ledger> VerificationFetcher<B, L> {
  pub fn new(backend: Arc<B>, ledger: Arc<L>, reconciler: Reconciler) -> Self {
    Self {
      backend,
      ledger,
      reconciler,
    }
  }

  /// Fetch without touching the store. `Err` only on transport failure; an
  /// unknown serial is `Ok` with `verified: false`.
  pub async fn lookup(&self, serial: &str) -> Result<VerificationFact> {
    let Some(resp) = self.backend.verify_serial(serial).await? else {
      tracing::debug!(serial, "serial not registered");
      return Ok(VerificationFact::not_found());
    };

    if !resp.exists() {
      return Ok(VerificationFact::not_found());
    }

    let mut metadata = resp.metadata();
    let mut verified = true;
    if let Some(address) = resp.contract_address() {
      let asset = self.ledger.query_asset(address).await;
      tracing::debug!(serial, address, on_chain = asset.exists, "ledger cross-check");
      metadata.on_chain = Some(asset.exists);
      verified = asset.exists;
    }

    Ok(VerificationFact {
      verified,
      metadata: Some(metadata),
    })
  }

  /// Fetch and write through the reconciler. Transport failures become one
  /// error notification and leave the store untouched; the caller only sees
  /// `None`.
  pub async fn verify(&self, serial: &str) -> Option<VerificationFact> {
    match self.lookup(serial).await {
      Ok(fact) => {
        self.reconciler.apply_verification(serial, fact.clone());
        Some(fact)
      }
      Err(err) => {
        self.reconciler.report_failure(
          FactKind::Verification,
          serial,
          "Verification",
          &err,
        );
        None
      }
    }
  }
}
