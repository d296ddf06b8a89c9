//! Error type for scan input devices.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
  #[error("nfc reader error: {0}")]
  Nfc(String),

  #[error("camera error: {0}")]
  Camera(String),
}

pub type ScanResult<T, E = ScanError> = std::result::Result<T, E>;
