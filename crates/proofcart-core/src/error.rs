//! Error types for `proofcart-core`.
//!
//! "Not found" answers from a remote source are not errors: lookups that can
//! miss return `Option`. Everything here is a transport-level failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Connectivity loss, timeout, TLS failure.
  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The remote answered, but not with something we can read.
  #[error("malformed response: {0}")]
  Decode(String),

  /// The remote answered with a non-success status that is not a plain miss.
  #[error("request rejected ({status}): {message}")]
  Rejected { status: u16, message: String },

  /// A user action targeted a record the backend does not know.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
