//! Common types and utilities for the VLAN tenancy controller.
//!
//! This crate provides the value types, controller commands, frame
//! classification and configuration loading shared by the decision engine,
//! the session layer and the command-line tool.

pub mod command;
pub mod config;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
