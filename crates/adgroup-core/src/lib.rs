//! Core types shared by the directory group crates.
//!
//! Nothing in here touches the database: configuration, the core error type,
//! the acting principal and request context, and tracing bootstrap.

pub mod config;
pub mod error;
pub mod principal;
pub mod telemetry;
pub mod types;
