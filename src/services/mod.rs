//! Core engine services

pub mod clock;
pub mod delivery;
pub mod dispatch;
pub mod lifecycle;
pub mod mailer;
pub mod render;
pub mod scheduler;
