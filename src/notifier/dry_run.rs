//! Dry-run notifier: writes alerts to the log instead of sending them

use async_trait::async_trait;
use tracing::info;

use super::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> bool {
        info!(target: "engulf_alert::alert", "\n{text}");
        true
    }
}
