//! Change detection: previous fact + incoming fact → transition.
//!
//! Comparison is on the significant field of each fact type only. A
//! verification whose metadata was re-fetched but whose verdict did not move
//! is `Unchanged`.

use crate::fact::{
  EscrowFact, EscrowStatus, OrderSnapshot, OrderStatus, TrustFact,
  VerificationFact,
};

/// How an incoming fact relates to the one it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
  /// First fact seen for this key since the store was created or cleared.
  New,
  /// The significant field differs from the previous fact.
  Changed,
  /// Same significant field; suppressed downstream.
  Unchanged,
}

impl Transition {
  pub fn is_notifiable(self) -> bool { !matches!(self, Self::Unchanged) }
}

/// Extracts the field that decides whether two facts differ.
pub trait Significant {
  type Value: PartialEq;

  fn significant(&self) -> Self::Value;
}

impl Significant for VerificationFact {
  type Value = bool;

  fn significant(&self) -> bool { self.verified }
}

impl Significant for EscrowFact {
  type Value = EscrowStatus;

  fn significant(&self) -> EscrowStatus { self.status }
}

impl Significant for TrustFact {
  type Value = Option<f64>;

  fn significant(&self) -> Option<f64> { self.score }
}

impl Significant for OrderSnapshot {
  type Value = OrderStatus;

  fn significant(&self) -> OrderStatus { self.status }
}

/// Classify `current` against the value it replaced.
///
/// `previous` must be the stored value read before `current` was written.
pub fn classify<F: Significant>(previous: Option<&F>, current: &F) -> Transition {
  match previous {
    None => Transition::New,
    Some(prev) if prev.significant() == current.significant() => {
      Transition::Unchanged
    }
    Some(_) => Transition::Changed,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fact::ProductMetadata;

  fn verification(verified: bool, name: &str) -> VerificationFact {
    VerificationFact {
      verified,
      metadata: Some(ProductMetadata {
        name: Some(name.into()),
        ..Default::default()
      }),
    }
  }

  #[test]
  fn first_fact_is_new() {
    let fact = verification(true, "Redmi 14 Pro");
    assert_eq!(classify(None, &fact), Transition::New);
  }

  #[test]
  fn verdict_flip_is_changed() {
    let before = verification(false, "Redmi 14 Pro");
    let after = verification(true, "Redmi 14 Pro");
    assert_eq!(classify(Some(&before), &after), Transition::Changed);
  }

  #[test]
  fn metadata_only_difference_is_unchanged() {
    let before = verification(true, "Redmi 14 Pro");
    let after = verification(true, "Redmi 14 Pro (Global)");
    assert_eq!(classify(Some(&before), &after), Transition::Unchanged);
  }

  #[test]
  fn escrow_tx_hash_alone_is_unchanged() {
    let before = EscrowFact {
      status:  EscrowStatus::Locked,
      tx_hash: None,
    };
    let after = EscrowFact {
      status:  EscrowStatus::Locked,
      tx_hash: Some("5xQ...".into()),
    };
    assert_eq!(classify(Some(&before), &after), Transition::Unchanged);
  }

  #[test]
  fn escrow_regression_is_still_a_change() {
    let before = EscrowFact {
      status:  EscrowStatus::Released,
      tx_hash: None,
    };
    let after = EscrowFact {
      status:  EscrowStatus::Pending,
      tx_hash: None,
    };
    assert_eq!(classify(Some(&before), &after), Transition::Changed);
  }

  #[test]
  fn trust_score_appearing_is_a_change() {
    let before = TrustFact::new(None);
    let after = TrustFact::new(Some(72.0));
    assert_eq!(classify(Some(&before), &after), Transition::Changed);
    assert_eq!(classify(Some(&after), &after.clone()), Transition::Unchanged);
  }
}
