//! Data models

pub mod entity;
pub mod notification;
