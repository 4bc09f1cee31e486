//! rclone Build Engine
//!
//! Fetches the pinned rclone module and cross-compiles it into one shared
//! library per Android ABI using the Go toolchain and the NDK clang.

pub mod process;
pub mod go_toolchain;
pub mod fetch;
pub mod go_build;
pub mod clean;
pub mod runner;

pub use go_toolchain::{GoToolchain, GoVersion};
pub use fetch::{marker_state, DependencyFetcher, FetchOutcome, MarkerState};
pub use go_build::{Artifact, GoBuild};
pub use clean::{CacheCleaner, CleanReport};
pub use runner::{BuildRunner, BuildEvent, BuildSummary};
