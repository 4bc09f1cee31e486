//! rclone-ndk - Android cross-compilation of rclone
//!
//! Resolves the Android SDK and NDK, fetches a pinned rclone module and
//! builds `librclone.so` for every supported ABI.
//!
//! ## Architecture
//!
//! - `rclone-ndk-core`: configuration and errors
//! - `rclone-ndk-android-toolchain`: SDK/NDK resolution, ABI table, build environment
//! - `rclone-ndk-build-engine`: Go toolchain, fetch, per-ABI builds, cleanup

#![warn(clippy::all)]

pub mod commands;

pub use rclone_ndk_core as core;
pub use rclone_ndk_android_toolchain as toolchain;
pub use rclone_ndk_build_engine as build;

/// Prelude module for convenient imports
pub mod prelude {
    pub use rclone_ndk_core::{BuildConfig, Error, Result};
    pub use rclone_ndk_android_toolchain::{Abi, BuildEnv, HostPlatform, NdkResolver, SdkLocator, Toolchain};
    pub use rclone_ndk_build_engine::{BuildRunner, CacheCleaner, DependencyFetcher, GoToolchain};
}
