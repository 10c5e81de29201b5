//! Fieldline background delivery infrastructure.
//!
//! This crate provides the out-of-band halves of the real-time delivery
//! core:
//!
//! - [`delivery::push`] — Web Push dispatch with self-healing subscription
//!   pruning, independent of whether a live WebSocket connection exists.
//! - [`ReminderScheduler`] — periodic, timezone-aware appointment reminder
//!   scan with at-most-once delivery per (appointment, recipient, date).
//! - [`AssignmentNotifier`] — synchronous assignment-change notifications
//!   triggered by appointment mutations.

pub mod assignments;
pub mod delivery;
pub mod reminders;

pub use assignments::AssignmentNotifier;
pub use delivery::push::{PushDispatcher, VapidConfig, NATIVE_SCHEME_PREFIX};
pub use reminders::{ReminderConfig, ReminderScheduler};
