//! # Helideck Core
//!
//! Shared configuration and error types for the Helideck workspace.

pub mod config;
pub mod error;

pub use config::{HelideckConfig, NotificationConfig, StorageBackend, ToastDurations};
pub use error::{HelideckError, Result};
