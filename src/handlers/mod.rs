//! HTTP handlers

pub mod callback_handlers;
pub mod health_handlers;
pub mod notification_handlers;
