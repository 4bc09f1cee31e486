//! Error types for rclone-ndk
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rclone-ndk
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Android SDK not found: {0}")]
    SdkNotFound(String),

    #[error("NDK installation failed: {0}")]
    NdkInstall(String),

    #[error("Unsupported host platform: {os}/{arch}")]
    UnsupportedHost { os: String, arch: String },

    #[error("Unsupported ABI: {0}")]
    UnsupportedAbi(String),

    #[error("Go toolchain error: {0}")]
    GoToolchain(String),

    #[error("Dependency fetch failed: {0}")]
    Fetch(String),

    #[error("Build failed for {abi}: {message}")]
    Build { abi: String, message: String },

    #[error("Build finished but artifact is missing: {0}")]
    MissingArtifact(PathBuf),
}

/// Result type alias for rclone-ndk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure classes. None of them is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local setup is wrong; the user has to fix it.
    Configuration,
    /// Network or version resolution of the pinned dependency.
    Fetch,
    /// Compiler or linker failure for one architecture.
    Build,
    Filesystem,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a build error for the given ABI name
    pub fn build(abi: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Build {
            abi: abi.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::TomlParse(_)
            | Error::SdkNotFound(_)
            | Error::NdkInstall(_)
            | Error::UnsupportedHost { .. }
            | Error::UnsupportedAbi(_)
            | Error::GoToolchain(_) => ErrorKind::Configuration,
            Error::Fetch(_) => ErrorKind::Fetch,
            Error::Build { .. } | Error::MissingArtifact(_) => ErrorKind::Build,
            Error::Io(_) => ErrorKind::Filesystem,
        }
    }

    /// Every failure is a hard stop for the current invocation.
    pub fn is_retriable(&self) -> bool {
        false
    }

    /// Suggest what the user should change, if there is something obvious
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::SdkNotFound(_) => {
                Some("set ANDROID_HOME or add sdk.dir to local.properties")
            }
            Error::NdkInstall(_) => {
                Some("install the NDK with Android Studio's SDK manager or set toolchain.ndk_version")
            }
            Error::UnsupportedHost { .. } => {
                Some("supported hosts are windows/x86_64, linux/x86_64 and macos")
            }
            Error::UnsupportedAbi(_) => Some("use one of armv7, arm64, x86, x86_64"),
            Error::GoToolchain(_) => {
                Some("install a recent Go toolchain or set toolchain.go_binary")
            }
            Error::Fetch(_) => Some("the cache is left in place; check the network and run fetch again"),
            _ => None,
        }
    }
}
