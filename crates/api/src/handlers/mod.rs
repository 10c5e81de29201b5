pub mod appointments;
pub mod chat;
pub mod push;
pub mod realtime;
