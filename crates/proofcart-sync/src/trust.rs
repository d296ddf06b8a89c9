//! Trust fetcher: one-shot per seller, cached in the fact store.

use std::sync::Arc;

use proofcart_core::{
  fact::{FactKind, TrustFact},
  reconcile::Reconciler,
  remote::Backend,
};

pub struct TrustFetcher<B> {
  backend:    Arc<B>,
  reconciler: Reconciler,
}

impl<B> Clone for TrustFetcher<B> {
  fn clone(&self) -> Self {
    Self {
      backend:    self.backend.clone(),
      reconciler: self.reconciler.clone(),
    }
  }
}

impl<B: Backend> TrustFetcher<B> {
  pub fn new(backend: Arc<B>, reconciler: Reconciler) -> Self {
    Self {
      backend,
      reconciler,
    }
  }

  /// Return the cached score, fetching only if this seller was never seen.
  pub async fn ensure(&self, seller_id: &str) -> Option<TrustFact> {
    if let Some(cached) = self.reconciler.store().trust(seller_id) {
      return Some(cached);
    }
    self.refresh(seller_id).await
  }

  /// Always fetch. A seller without a score record is stored as `N/A`.
  pub async fn refresh(&self, seller_id: &str) -> Option<TrustFact> {
    match self.backend.seller_trust(seller_id).await {
      Ok(found) => {
        let fact = TrustFact::new(found.and_then(|r| r.trust_score));
        self.reconciler.apply_trust(seller_id, fact.score);
        Some(fact)
      }
      Err(err) => {
        self.reconciler.report_failure(
          FactKind::Trust,
          seller_id,
          "Trust score lookup",
          &err,
        );
        None
      }
    }
  }
}
