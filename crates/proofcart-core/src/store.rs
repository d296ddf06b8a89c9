//! The keyed fact store.
//!
//! Three independent mappings (verification by serial, escrow by id, trust by
//! seller), each behind its own lock so writes to one never wait on another.
//! Every setter replaces the value for its key wholesale and hands back the
//! value it replaced, captured under the same write lock, so change detection
//! never races the write it is classifying.
//!
//! The store is an ordinary owned value. Share it with `Arc<FactStore>`;
//! there is no process-wide instance.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::fact::{EscrowFact, EscrowStatus, TrustFact, VerificationFact};

/// Capacity of the update channel. Slow subscribers observe `Lagged` and
/// should resynchronise from [`FactStore::snapshot`].
const EVENT_CAPACITY: usize = 256;

// ─── Events ──────────────────────────────────────────────────────────────────

/// Published to subscribers for every write, before its lock is released.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
  Verification { serial: String, fact: VerificationFact },
  Escrow { escrow_id: String, fact: EscrowFact },
  Trust { seller_id: String, fact: TrustFact },
  Cleared,
}

/// The outcome of a setter: the value replaced (if any) and the new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Write<F> {
  pub previous: Option<F>,
  pub current:  F,
}

/// A consistent copy of all three mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
  pub verification: HashMap<String, VerificationFact>,
  pub escrow:       HashMap<String, EscrowFact>,
  pub trust:        HashMap<String, TrustFact>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

pub struct FactStore {
  verification: RwLock<HashMap<String, VerificationFact>>,
  escrow:       RwLock<HashMap<String, EscrowFact>>,
  trust:        RwLock<HashMap<String, TrustFact>>,
  events:       broadcast::Sender<StoreEvent>,
}

impl Default for FactStore {
  fn default() -> Self { Self::new() }
}

impl FactStore {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      verification: RwLock::new(HashMap::new()),
      escrow: RwLock::new(HashMap::new()),
      trust: RwLock::new(HashMap::new()),
      events,
    }
  }

  /// Receive every subsequent write.
  pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
    self.events.subscribe()
  }

  // ── Writes ────────────────────────────────────────────────────────────

  pub fn set_verification(
    &self,
    serial: &str,
    fact: VerificationFact,
  ) -> Write<VerificationFact> {
    let mut map = self.verification.write();
    let previous = map.insert(serial.to_string(), fact.clone());
    tracing::debug!(serial, verified = fact.verified, "verification written");
    self.publish(StoreEvent::Verification {
      serial: serial.to_string(),
      fact:   fact.clone(),
    });
    drop(map);
    Write {
      previous,
      current: fact,
    }
  }

  pub fn set_escrow_status(
    &self,
    escrow_id: &str,
    status: EscrowStatus,
    tx_hash: Option<String>,
  ) -> Write<EscrowFact> {
    let fact = EscrowFact { status, tx_hash };
    let mut map = self.escrow.write();
    let previous = map.insert(escrow_id.to_string(), fact.clone());
    tracing::debug!(escrow_id, %status, "escrow written");
    self.publish(StoreEvent::Escrow {
      escrow_id: escrow_id.to_string(),
      fact:      fact.clone(),
    });
    drop(map);
    Write {
      previous,
      current: fact,
    }
  }

  pub fn set_trust(
    &self,
    seller_id: &str,
    score: Option<f64>,
  ) -> Write<TrustFact> {
    let fact = TrustFact::new(score);
    let mut map = self.trust.write();
    let previous = map.insert(seller_id.to_string(), fact.clone());
    tracing::debug!(seller_id, score = ?fact.score, "trust written");
    self.publish(StoreEvent::Trust {
      seller_id: seller_id.to_string(),
      fact:      fact.clone(),
    });
    drop(map);
    Write {
      previous,
      current: fact,
    }
  }

  /// Empty all three mappings. Used on logout; harmless when already empty.
  pub fn clear(&self) {
    // Fixed lock order, shared with `snapshot`.
    let mut verification = self.verification.write();
    let mut escrow = self.escrow.write();
    let mut trust = self.trust.write();
    verification.clear();
    escrow.clear();
    trust.clear();
    self.publish(StoreEvent::Cleared);
    drop((verification, escrow, trust));
  }

  /// Called with the written map's lock held, so events for one key reach
  /// subscribers in the order the writes were applied.
  fn publish(&self, event: StoreEvent) {
    // No receivers is not an error.
    let _ = self.events.send(event);
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub fn verification(&self, serial: &str) -> Option<VerificationFact> {
    self.verification.read().get(serial).cloned()
  }

  pub fn escrow(&self, escrow_id: &str) -> Option<EscrowFact> {
    self.escrow.read().get(escrow_id).cloned()
  }

  pub fn trust(&self, seller_id: &str) -> Option<TrustFact> {
    self.trust.read().get(seller_id).cloned()
  }

  pub fn is_empty(&self) -> bool {
    self.verification.read().is_empty()
      && self.escrow.read().is_empty()
      && self.trust.read().is_empty()
  }

  /// Copy all three mappings under one set of read locks.
  pub fn snapshot(&self) -> Snapshot {
    let verification = self.verification.read();
    let escrow = self.escrow.read();
    let trust = self.trust.read();
    Snapshot {
      verification: verification.clone(),
      escrow:       escrow.clone(),
      trust:        trust.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn verified() -> VerificationFact {
    VerificationFact {
      verified: true,
      metadata: None,
    }
  }

  #[test]
  fn setter_returns_replaced_value() {
    let store = FactStore::new();
    let first = store.set_escrow_status("esc-1", EscrowStatus::Pending, None);
    assert_eq!(first.previous, None);

    let second = store.set_escrow_status(
      "esc-1",
      EscrowStatus::Locked,
      Some("tx-1".into()),
    );
    assert_eq!(second.previous.map(|f| f.status), Some(EscrowStatus::Pending));
    assert_eq!(store.escrow("esc-1").unwrap().tx_hash.as_deref(), Some("tx-1"));
  }

  #[test]
  fn writes_replace_wholesale() {
    let store = FactStore::new();
    store.set_escrow_status("esc-1", EscrowStatus::Locked, Some("tx-1".into()));
    store.set_escrow_status("esc-1", EscrowStatus::Released, None);
    let fact = store.escrow("esc-1").unwrap();
    assert_eq!(fact.status, EscrowStatus::Released);
    assert_eq!(fact.tx_hash, None);
  }

  #[test]
  fn trust_write_leaves_other_entries_alone() {
    let store = FactStore::new();
    store.set_trust("S2", Some(40.0));
    store.set_verification("SN-1", verified());
    store.set_escrow_status("esc-1", EscrowStatus::Locked, None);
    let before = store.snapshot();

    store.set_trust("S1", Some(90.0));

    let after = store.snapshot();
    assert_eq!(after.trust.get("S2"), before.trust.get("S2"));
    assert_eq!(after.verification, before.verification);
    assert_eq!(after.escrow, before.escrow);
    assert_eq!(store.trust("S1").unwrap().score, Some(90.0));
  }

  #[test]
  fn clear_empties_everything_and_is_idempotent() {
    let store = FactStore::new();
    store.clear();
    store.set_verification("SN-1", verified());
    store.set_trust("S1", Some(10.0));
    store.clear();
    assert!(store.is_empty());
    store.clear();
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn subscribers_see_writes_in_order() {
    let store = FactStore::new();
    let mut rx = store.subscribe();

    store.set_trust("S1", Some(50.0));
    store.clear();

    assert_eq!(
      rx.recv().await.unwrap(),
      StoreEvent::Trust {
        seller_id: "S1".into(),
        fact:      TrustFact::new(Some(50.0)),
      }
    );
    assert_eq!(rx.recv().await.unwrap(), StoreEvent::Cleared);
  }

  #[test]
  fn last_event_for_a_key_matches_the_stored_value() {
    let store = FactStore::new();
    let mut rx = store.subscribe();

    std::thread::scope(|scope| {
      for worker in 0..4 {
        let store = &store;
        scope.spawn(move || {
          for i in 0..50 {
            store.set_trust("S1", Some(f64::from(worker * 100 + i)));
          }
        });
      }
    });

    let mut last = None;
    let mut seen = 0;
    while let Ok(event) = rx.try_recv() {
      if let StoreEvent::Trust { fact, .. } = event {
        last = Some(fact);
        seen += 1;
      }
    }
    assert_eq!(seen, 200);
    assert_eq!(last, store.trust("S1"));
  }
}
