//! rclone-ndk Core - shared configuration and errors
//!
//! This crate holds the immutable build configuration every operation
//! receives and the error taxonomy used across the workspace.

pub mod config;
pub mod error;

pub use config::{BuildConfig, DependencyConfig, OutputConfig, ToolchainConfig};
pub use error::{Error, ErrorKind, Result};
