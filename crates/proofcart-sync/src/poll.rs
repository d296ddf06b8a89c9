//! Order and escrow pollers.
//!
//! A poller runs as a tokio task until its [`PollHandle`] is stopped or
//! dropped. Fetch failures are logged and the timer keeps going. Teardown
//! does not abort a fetch already in flight; its result is discarded once it
//! arrives because the mount flag is down. A list batch also stops at the
//! first order reached after teardown.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use proofcart_core::{
  fact::Role,
  reconcile::{OrderTracker, Reconciler},
  remote::Backend,
};
use tokio::{
  sync::Notify,
  task::{JoinError, JoinHandle},
  time::{Interval, MissedTickBehavior},
};

/// Poll period while a single order's detail view is open.
pub const DETAIL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll period while a purchase or sale list is monitored.
pub const LIST_INTERVAL: Duration = Duration::from_secs(30);

// ─── Mount flag ──────────────────────────────────────────────────────────────

/// Shared between a poller task and its handle.
#[derive(Clone)]
struct Mount {
  mounted: Arc<AtomicBool>,
  stop:    Arc<Notify>,
}

impl Mount {
  fn new() -> Self {
    Self {
      mounted: Arc::new(AtomicBool::new(true)),
      stop:    Arc::new(Notify::new()),
    }
  }

  fn is_mounted(&self) -> bool { self.mounted.load(Ordering::Acquire) }

  fn unmount(&self) {
    if self.mounted.swap(false, Ordering::AcqRel) {
      // Stores a permit if the task is mid-fetch rather than waiting.
      self.stop.notify_one();
    }
  }

  /// Wait for the next tick. `false` once the consumer is gone.
  async fn tick(&self, interval: &mut Interval) -> bool {
    if !self.is_mounted() {
      return false;
    }
    tokio::select! {
      _ = self.stop.notified() => false,
      _ = interval.tick() => self.is_mounted(),
    }
  }
}

fn interval(period: Duration) -> Interval {
  let mut interval = tokio::time::interval(period);
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
  interval
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Owning handle to a running poller. Dropping it tears the poller down.
pub struct PollHandle {
  mount: Mount,
  task:  Option<JoinHandle<()>>,
}

impl PollHandle {
  pub fn is_running(&self) -> bool {
    self.mount.is_mounted()
      && self.task.as_ref().is_some_and(|t| !t.is_finished())
  }

  /// Signal teardown. Idempotent; does not wait.
  pub fn stop(&self) { self.mount.unmount(); }

  /// Signal teardown and wait until the task has exited, including any
  /// fetch that was in flight.
  pub async fn join(mut self) -> Result<(), JoinError> {
    self.stop();
    match self.task.take() {
      Some(task) => task.await,
      None => Ok(()),
    }
  }
}

impl Drop for PollHandle {
  fn drop(&mut self) { self.mount.unmount(); }
}

// ─── Poller ──────────────────────────────────────────────────────────────────

pub struct OrderPoller<B> {
  backend:    Arc<B>,
  reconciler: Reconciler,
}

impl<B: Backend + 'static> OrderPoller<B> {
  pub fn new(backend: Arc<B>, reconciler: Reconciler) -> Self {
    Self {
      backend,
      reconciler,
    }
  }

  /// Poll one order and keep its escrow fact current.
  pub fn watch_order(
    &self,
    order_id: impl Into<String>,
    period: Duration,
  ) -> PollHandle {
    let mount = Mount::new();
    let task = tokio::spawn(detail_loop(
      self.backend.clone(),
      self.reconciler.clone(),
      order_id.into(),
      period,
      mount.clone(),
    ));
    PollHandle {
      mount,
      task: Some(task),
    }
  }

  /// Poll the user's purchases or sales, announcing order-status
  /// transitions and keeping escrow facts current. Each call starts with an
  /// empty transition history.
  pub fn watch_orders(&self, role: Role, period: Duration) -> PollHandle {
    let mount = Mount::new();
    let task = tokio::spawn(list_loop(
      self.backend.clone(),
      self.reconciler.clone(),
      role,
      period,
      mount.clone(),
    ));
    PollHandle {
      mount,
      task: Some(task),
    }
  }
}

async fn detail_loop<B: Backend>(
  backend: Arc<B>,
  reconciler: Reconciler,
  order_id: String,
  period: Duration,
  mount: Mount,
) {
  let mut interval = interval(period);
  tracing::debug!(order_id = %order_id, ?period, "order poller started");

  while mount.tick(&mut interval).await {
    match backend.order(&order_id).await {
      Ok(_) if !mount.is_mounted() => {
        tracing::debug!(%order_id, "consumer gone, poll result discarded");
      }
      Ok(Some(order)) => {
        reconciler.observe_order(&order);
      }
      Ok(None) => tracing::debug!(%order_id, "order not found"),
      Err(err) => {
        tracing::warn!(%order_id, error = %err, "order poll failed")
      }
    }
  }

  tracing::debug!(order_id = %order_id, "order poller stopped");
}

async fn list_loop<B: Backend>(
  backend: Arc<B>,
  reconciler: Reconciler,
  role: Role,
  period: Duration,
  mount: Mount,
) {
  let mut interval = interval(period);
  let mut tracker = OrderTracker::new(role);
  tracing::debug!(%role, ?period, "order list poller started");

  while mount.tick(&mut interval).await {
    match backend.orders(role).await {
      Ok(_) if !mount.is_mounted() => {
        tracing::debug!(%role, "consumer gone, poll result discarded");
      }
      Ok(orders) => {
        for order in &orders {
          // A notification sink may tear the poller down mid-batch.
          if !mount.is_mounted() {
            tracing::debug!(%role, "consumer gone, rest of batch discarded");
            break;
          }
          let Some(order_id) = order.key() else {
            tracing::warn!(%role, "order without id skipped");
            continue;
          };
          reconciler.track_order(&mut tracker, order_id, order.status);
          reconciler.observe_order(order);
        }
      }
      Err(err) => tracing::warn!(%role, error = %err, "order list poll failed"),
    }
  }

  tracing::debug!(%role, tracked = tracker.len(), "order list poller stopped");
}
