//! Terminal notification sink.

use proofcart_core::notify::{Notification, Notifier};

/// Prints each notification on its own stdout line, either as
/// `[severity] message` or as one JSON object.
pub struct Console {
  json: bool,
}

impl Console {
  pub fn new(json: bool) -> Self { Self { json } }

  fn render(&self, notification: &Notification) -> Option<String> {
    if !self.json {
      return Some(format!(
        "[{:<7}] {}",
        notification.severity.as_ref(),
        notification.message
      ));
    }
    match serde_json::to_string(notification) {
      Ok(line) => Some(line),
      Err(err) => {
        tracing::warn!(error = %err, "failed to encode notification");
        None
      }
    }
  }
}

impl Notifier for Console {
  fn notify(&self, notification: Notification) {
    if let Some(line) = self.render(&notification) {
      println!("{line}");
    }
  }
}
