//! Android Toolchain Management
//!
//! Handles everything rclone-ndk needs from the Android side:
//! - Android SDK location (environment, `local.properties`)
//! - Pinned NDK resolution and on-demand installation
//! - Host platform and clang wrapper selection per ABI
//! - Per-invocation cross-compilation environments

pub mod detector;
pub mod sdk_manager;
pub mod ndk;
pub mod env;

pub use detector::{SdkLocator, NdkResolver, SdkInfo, NdkInfo};
pub use sdk_manager::{SdkManager, SdkComponent, SdkManagerError};
pub use ndk::{Abi, HostArch, HostOs, HostPlatform, Toolchain};
pub use env::BuildEnv;
