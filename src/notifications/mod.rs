//! Pickup, return and overdue notifications: the checks that find orders to
//! notify and the job that sends each notification.

pub mod dedup;
pub mod dispatch;
pub mod eligibility;
pub mod log;
pub mod reminders;
pub mod template;

pub use dispatch::DispatchNotificationJob;
pub use reminders::{ReminderCheck, ReminderCheckJob};
