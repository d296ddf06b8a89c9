//! Scan/input resolver.
//!
//! Camera QR decodes, NFC reads and manual entry all land in
//! [`ScanResolver::submit`]. The resolver is either idle or resolving one
//! serial; input that arrives while it is resolving is dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use proofcart_core::{
  fact::VerificationFact,
  remote::{Backend, Ledger},
};

use crate::verify::VerificationFetcher;

/// Invoked with the canonical serial whenever a scan is accepted.
pub type FoundCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Resolving,
}

/// What a single [`ScanResolver::submit`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  /// Blank input, or a resolution was already in flight.
  Ignored,
  /// Same serial as the last successful resolution: no fetch, callback fired.
  Acknowledged(String),
  Resolved {
    serial: String,
    fact:   VerificationFact,
  },
  /// Lookup failed; the serial can be retried immediately.
  Failed(String),
}

struct State {
  phase:         Phase,
  last_resolved: Option<String>,
}

pub struct ScanResolver<B, L> {
  fetcher:  VerificationFetcher<B, L>,
  state:    Mutex<State>,
  on_found: FoundCallback,
}

impl<B: Backend, L: Ledger> ScanResolver<B, L> {
  pub fn new(
    fetcher: VerificationFetcher<B, L>,
    on_found: impl Fn(&str) + Send + Sync + 'static,
  ) -> Self {
    Self {
      fetcher,
      state: Mutex::new(State {
        phase:         Phase::Idle,
        last_resolved: None,
      }),
      on_found: Arc::new(on_found),
    }
  }

  pub fn phase(&self) -> Phase { self.state.lock().phase }

  pub fn last_resolved(&self) -> Option<String> {
    self.state.lock().last_resolved.clone()
  }

  /// Resolve raw scanner or keyboard input.
  pub async fn submit(&self, raw: &str) -> Resolution {
    let Some(serial) = canonical_serial(raw) else {
      return Resolution::Ignored;
    };

    {
      let mut state = self.state.lock();
      if state.phase == Phase::Resolving {
        tracing::debug!(serial = %serial, "resolution in flight, input dropped");
        return Resolution::Ignored;
      }
      if state.last_resolved.as_deref() == Some(serial.as_str()) {
        drop(state);
        (self.on_found)(&serial);
        return Resolution::Acknowledged(serial);
      }
      state.phase = Phase::Resolving;
    }

    let guard = Resolving {
      state: &self.state,
      armed: true,
    };
    match self.fetcher.verify(&serial).await {
      Some(fact) => {
        guard.finish(Some(&serial));
        (self.on_found)(&serial);
        Resolution::Resolved { serial, fact }
      }
      None => {
        guard.finish(None);
        Resolution::Failed(serial)
      }
    }
  }
}

/// Returns the resolver to idle on every exit path, including the submit
/// future being dropped mid-lookup.
struct Resolving<'a> {
  state: &'a Mutex<State>,
  armed: bool,
}

impl Resolving<'_> {
  fn finish(mut self, resolved: Option<&str>) {
    let mut state = self.state.lock();
    state.phase = Phase::Idle;
    if let Some(serial) = resolved {
      state.last_resolved = Some(serial.to_string());
    }
    self.armed = false;
  }
}

impl Drop for Resolving<'_> {
  fn drop(&mut self) {
    if self.armed {
      self.state.lock().phase = Phase::Idle;
    }
  }
}

/// Normalise raw input to a serial.
///
/// Plain text is trimmed. Verification links printed in QR codes
/// (`https://host/verify/<serial>` or `...?serial=<serial>`) yield the serial
/// they point at.
pub fn canonical_serial(raw: &str) -> Option<String> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  if !raw.contains("://") {
    return Some(raw.to_string());
  }

  let (path, query) = match raw.split_once('?') {
    Some((path, rest)) => (path, rest.split('#').next().unwrap_or_default()),
    None => (raw.split('#').next().unwrap_or_default(), ""),
  };

  let from_query = query.split('&').find_map(|pair| {
    let (k, v) = pair.split_once('=')?;
    matches!(k, "serial" | "serial_number").then(|| v.trim().to_string())
  });
  if let Some(serial) = from_query.filter(|s| !s.is_empty()) {
    return Some(serial);
  }

  let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
  let segments: Vec<&str> = after_scheme
    .split('/')
    .skip(1)
    .filter(|s| !s.is_empty())
    .collect();
  let serial = match segments.iter().position(|s| *s == "verify") {
    Some(i) => segments.get(i + 1).copied(),
    None => segments.last().copied(),
  };
  serial.map(str::to_owned)
}
