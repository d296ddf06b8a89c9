//! Wires the store, reconciler, fetchers and pollers behind each subcommand.

use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use proofcart_client::{ApiConfig, HttpBackend, HttpLedger};
use proofcart_core::{
  fact::{Role, VerificationFact},
  notify::Notifier,
  reconcile::Reconciler,
  store::FactStore,
};
use proofcart_sync::{
  actions::OrderActions,
  poll::{OrderPoller, PollHandle},
  resolve::{Resolution, ScanResolver},
  trust::TrustFetcher,
  verify::VerificationFetcher,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::Settings;

type Resolver = ScanResolver<HttpBackend, HttpLedger>;

pub struct App {
  backend:    Arc<HttpBackend>,
  ledger:     Arc<HttpLedger>,
  reconciler: Reconciler,
  settings:   Settings,
}

impl App {
  pub fn new(settings: Settings, notifier: Arc<dyn Notifier>) -> Result<Self> {
    let backend = HttpBackend::new(ApiConfig {
      base_url: settings.api_url.clone(),
      token:    settings.token.clone(),
    })
    .context("failed to build API client")?;
    let ledger = HttpLedger::new(settings.ledger_url.clone())
      .context("failed to build ledger client")?;

    Ok(Self {
      backend: Arc::new(backend),
      ledger: Arc::new(ledger),
      reconciler: Reconciler::new(Arc::new(FactStore::new()), notifier),
      settings,
    })
  }

  fn resolver(&self) -> Resolver {
    let fetcher = VerificationFetcher::new(
      self.backend.clone(),
      self.ledger.clone(),
      self.reconciler.clone(),
    );
    ScanResolver::new(fetcher, |serial| {
      tracing::info!(serial, "product page ready");
    })
  }

  fn poller(&self) -> OrderPoller<HttpBackend> {
    OrderPoller::new(self.backend.clone(), self.reconciler.clone())
  }

  fn actions(&self) -> OrderActions<HttpBackend> {
    OrderActions::new(self.backend.clone(), self.reconciler.clone())
  }

  // ── One-shot commands ─────────────────────────────────────────────────────

  pub async fn verify(&self, serial: &str) -> Result<ExitCode> {
    let outcome = self.resolver().submit(serial).await;
    Ok(exit(report(&outcome)))
  }

  pub async fn trust(&self, seller_id: &str) -> Result<ExitCode> {
    let fetcher = TrustFetcher::new(self.backend.clone(), self.reconciler.clone());
    Ok(exit(fetcher.refresh(seller_id).await.is_some()))
  }

  pub async fn confirm_delivery(
    &self,
    order_id: &str,
    serial: Option<&str>,
  ) -> Result<ExitCode> {
    Ok(exit(self.actions().confirm_delivery(order_id, serial).await))
  }

  pub async fn dispute(&self, order_id: &str, reason: &str) -> Result<ExitCode> {
    Ok(exit(self.actions().file_dispute(order_id, reason).await))
  }

  // ── Long-running commands ─────────────────────────────────────────────────

  /// Read serials from stdin, one per line, until EOF or Ctrl-C.
  pub async fn scan(&self) -> Result<ExitCode> {
    let resolver = self.resolver();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
      let line = tokio::select! {
        _ = tokio::signal::ctrl_c() => break,
        line = lines.next_line() => line.context("failed to read stdin")?,
      };
      let Some(line) = line else { break };
      report(&resolver.submit(&line).await);
    }

    let snapshot = self.reconciler.store().snapshot();
    let mut serials: Vec<_> = snapshot.verification.iter().collect();
    serials.sort_by(|a, b| a.0.cmp(b.0));
    for (serial, fact) in serials {
      let verdict = if fact.verified { "authentic" } else { "unverified" };
      println!("{serial}: {verdict}");
    }
    Ok(ExitCode::SUCCESS)
  }

  pub async fn watch_order(&self, order_id: &str) -> Result<ExitCode> {
    let period = Duration::from_secs(self.settings.detail_poll_secs);
    let handle = self.poller().watch_order(order_id, period);
    until_interrupted(handle).await
  }

  pub async fn watch_orders(&self, role: Role) -> Result<ExitCode> {
    let period = Duration::from_secs(self.settings.list_poll_secs);
    let handle = self.poller().watch_orders(role, period);
    until_interrupted(handle).await
  }
}

async fn until_interrupted(handle: PollHandle) -> Result<ExitCode> {
  tokio::signal::ctrl_c()
    .await
    .context("failed to listen for Ctrl-C")?;
  tracing::info!("stopping poller");
  handle.join().await.context("poller task failed")?;
  Ok(ExitCode::SUCCESS)
}

fn exit(ok: bool) -> ExitCode {
  if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Print product details for a fresh resolution. `false` if the lookup
/// failed.
fn report(outcome: &Resolution) -> bool {
  match outcome {
    Resolution::Resolved { serial, fact } => describe(serial, fact),
    Resolution::Acknowledged(serial) => println!("{serial}: already verified"),
    Resolution::Ignored => {}
    Resolution::Failed(_) => return false,
  }
  true
}

fn describe(serial: &str, fact: &VerificationFact) {
  let Some(meta) = &fact.metadata else {
    return;
  };
  println!("  serial:   {serial}");
  if let Some(name) = &meta.name {
    println!("  product:  {name}");
  }
  if let Some(seller) = &meta.seller {
    println!("  seller:   {seller}");
  }
  if let Some(contract) = &meta.contract {
    let ledger = match meta.on_chain {
      Some(true) => "registered",
      Some(false) => "not registered",
      None => "not checked",
    };
    println!("  contract: {contract} ({ledger})");
  }
}
