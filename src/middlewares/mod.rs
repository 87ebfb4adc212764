//! HTTP middlewares

pub mod auth_middlewares;
