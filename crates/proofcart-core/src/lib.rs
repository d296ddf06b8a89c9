//! Core types and trait definitions for the ProofCart reconciliation engine.
//!
//! No HTTP and no timers live here. The crate holds the keyed
//! fact store, the change detector, the notification table and the traits
//! the remote collaborators (backend, ledger) are consumed through.

pub mod detect;
pub mod error;
pub mod fact;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod store;

pub use error::{Error, Result};
