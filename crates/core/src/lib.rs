//! Domain primitives for the Fieldline real-time delivery core.
//!
//! This crate has zero internal dependencies so it can be used by the
//! persistence layer, the background delivery services, and the API server
//! alike. It holds shared types, the domain error enum, operator role
//! constants, the connect-token codec, and the pure reminder-window /
//! dedup logic exercised by the appointment reminder scheduler.

pub mod error;
pub mod reminders;
pub mod roles;
pub mod token;
pub mod types;
