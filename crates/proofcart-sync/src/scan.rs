//! Scan sessions: scoped ownership of camera streams and NFC readers.
//!
//! A session owns its device handle exclusively and releases it on drop, so
//! the handle is freed on every exit path including a consumer that goes
//! away mid-scan.

use std::{future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use proofcart_core::remote::{Backend, Ledger};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
  ScanResult,
  resolve::{Resolution, ScanResolver},
};

/// How often a live camera stream is sampled for a QR code.
pub const SCAN_INTERVAL: Duration = Duration::from_millis(250);

/// One captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
  pub width:  u32,
  pub height: u32,
  pub pixels: Vec<u8>,
}

/// An acquired camera stream.
pub trait MediaStream: Send + 'static {
  /// Grab the current frame; `Ok(None)` if none is ready yet.
  fn capture(&mut self) -> ScanResult<Option<Frame>>;

  /// Stop every track of the stream. Called exactly once.
  fn stop_tracks(&mut self);
}

pub trait QrDecoder: Send + Sync + 'static {
  fn decode(&self, frame: &Frame) -> Option<String>;
}

/// An acquired NFC reader.
pub trait NfcReader: Send {
  /// Wait for one tag. `Ok(None)` if the tag carried no text record.
  fn read(&mut self) -> impl Future<Output = ScanResult<Option<String>>> + Send + '_;

  /// Release the reader. Called exactly once.
  fn release(&mut self);
}

// ─── Camera ──────────────────────────────────────────────────────────────────

struct StreamSlot<M> {
  stream:  M,
  stopped: bool,
}

impl<M: MediaStream> StreamSlot<M> {
  fn stop(&mut self) {
    if !self.stopped {
      self.stream.stop_tracks();
      self.stopped = true;
    }
  }
}

/// A camera stream sampled at a fixed interval, each decoded QR payload
/// submitted to the resolver. Dropping the session clears the sampling task
/// and stops the stream.
pub struct CameraSession<M: MediaStream> {
  slot: Arc<Mutex<StreamSlot<M>>>,
  task: JoinHandle<()>,
}

impl<M: MediaStream> CameraSession<M> {
  pub fn start<B, L, D>(
    stream: M,
    decoder: D,
    resolver: Arc<ScanResolver<B, L>>,
    period: Duration,
  ) -> Self
  where
    B: Backend + 'static,
    L: Ledger + 'static,
    D: QrDecoder,
  {
    let slot = Arc::new(Mutex::new(StreamSlot {
      stream,
      stopped: false,
    }));
    let task = tokio::spawn(sample_loop(slot.clone(), decoder, resolver, period));
    Self { slot, task }
  }

  /// Whether the stream is still live.
  pub fn is_active(&self) -> bool { !self.slot.lock().stopped }
}

impl<M: MediaStream> Drop for CameraSession<M> {
  fn drop(&mut self) {
    self.task.abort();
    self.slot.lock().stop();
  }
}

async fn sample_loop<M, B, L, D>(
  slot: Arc<Mutex<StreamSlot<M>>>,
  decoder: D,
  resolver: Arc<ScanResolver<B, L>>,
  period: Duration,
) where
  M: MediaStream,
  B: Backend,
  L: Ledger,
  D: QrDecoder,
{
  let mut interval = tokio::time::interval(period);
  interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    interval.tick().await;
    let decoded = {
      let mut slot = slot.lock();
      if slot.stopped {
        break;
      }
      match slot.stream.capture() {
        Ok(frame) => frame.and_then(|f| decoder.decode(&f)),
        Err(err) => {
          tracing::warn!(error = %err, "camera capture failed, stopping stream");
          slot.stop();
          break;
        }
      }
    };
    if let Some(text) = decoded {
      resolver.submit(&text).await;
    }
  }
}

// ─── NFC ─────────────────────────────────────────────────────────────────────

struct NfcSession<R: NfcReader> {
  reader: R,
}

impl<R: NfcReader> Drop for NfcSession<R> {
  fn drop(&mut self) { self.reader.release(); }
}

/// Take one reading from `reader`, release it, and resolve what was read.
pub async fn read_nfc_once<R, B, L>(
  reader: R,
  resolver: &ScanResolver<B, L>,
) -> ScanResult<Resolution>
where
  R: NfcReader,
  B: Backend,
  L: Ledger,
{
  let tag = {
    let mut session = NfcSession { reader };
    session.reader.read().await?
  };
  match tag {
    Some(text) => Ok(resolver.submit(&text).await),
    None => Ok(Resolution::Ignored),
  }
}
