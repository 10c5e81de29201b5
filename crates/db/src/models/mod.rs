pub mod appointment;
pub mod chat;
pub mod crew_member;
pub mod notification;
pub mod operator;
pub mod push_subscription;
