//! tutor-alerts library crate.
//!
//! Tutor-call notification delivery: persistence, best-effort real-time
//! fan-out, per-student stats, and the client-side reconciliation that keeps
//! a student's view fresh when pushes are lost.

pub mod api;
pub mod client;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod notification;

pub use error::{Error, Result};
