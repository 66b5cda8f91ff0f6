//! HTTP handlers for user-auth.

pub mod access;
pub mod auth;
pub mod user;
