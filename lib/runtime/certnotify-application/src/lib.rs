//! Certificate classification and notification scheduling.

pub mod classify;
pub mod ledger;
pub mod scheduler;

pub use classify::{Classification, classify};
pub use ledger::{NOTIFICATION_COOLDOWN_HOURS, NotificationLedger, notification_cooldown};
pub use scheduler::{ExpiryScheduler, SchedulerSettings, TickSummary};

#[cfg(test)]
mod testing;
