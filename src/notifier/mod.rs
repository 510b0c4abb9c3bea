//! Alert delivery
//!
//! [`Notifier::send`] never fails loudly: transport problems are logged and
//! reported as `false`, which leaves the signal eligible for the next pass.

pub mod dry_run;
pub mod telegram;

use async_trait::async_trait;

pub use self::dry_run::LogNotifier;
pub use self::telegram::TelegramNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text`; `true` only when the channel confirmed it
    async fn send(&self, text: &str) -> bool;
}
