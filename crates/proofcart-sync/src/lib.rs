//! Fact acquisition for ProofCart: fetchers, pollers and the scan resolver.
//!
//! Everything here is generic over the [`proofcart_core::remote`] traits and
//! writes through a [`proofcart_core::reconcile::Reconciler`], so the write →
//! detect → notify pipeline is the same no matter which routine produced the
//! fact.

pub mod actions;
pub mod error;
pub mod poll;
pub mod resolve;
pub mod scan;
pub mod trust;
pub mod verify;

pub use error::{ScanError, ScanResult};
