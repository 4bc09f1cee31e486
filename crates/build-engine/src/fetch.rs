//! Dependency Fetch
//!
//! Prepares an isolated Go module workspace in the cache directory and
//! fetches the pinned dependency into it. A marker file recording
//! `<module>@<version>` makes the step idempotent.

use std::path::Path;
use tracing::{info, debug, warn};

use rclone_ndk_android_toolchain::BuildEnv;
use rclone_ndk_core::{BuildConfig, Error, Result};

use crate::go_toolchain::GoToolchain;
use crate::process;

/// What a fetch call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The marker matched the configured coordinate; nothing ran
    Cached,
    /// The dependency was fetched during this call
    Fetched,
}

/// State of the cache relative to the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    Missing,
    Current,
    /// The cache holds a different coordinate
    Stale(String),
}

/// Compare the marker file with the configured coordinate
pub fn marker_state(config: &BuildConfig) -> Result<MarkerState> {
    let marker = config.fetch_marker_path();
    if !marker.is_file() {
        return Ok(MarkerState::Missing);
    }

    let recorded = std::fs::read_to_string(&marker)?.trim().to_string();
    if recorded == config.dependency_coordinate() {
        Ok(MarkerState::Current)
    } else {
        Ok(MarkerState::Stale(recorded))
    }
}

/// Fetches the pinned dependency into the module cache
pub struct DependencyFetcher<'a> {
    config: &'a BuildConfig,
    go: &'a GoToolchain,
}

impl<'a> DependencyFetcher<'a> {
    pub fn new(config: &'a BuildConfig, go: &'a GoToolchain) -> Self {
        Self { config, go }
    }

    pub fn marker_state(&self) -> Result<MarkerState> {
        marker_state(self.config)
    }

    /// Fetch unless the cache already holds the configured version
    pub async fn ensure(&self) -> Result<FetchOutcome> {
        let coordinate = self.config.dependency_coordinate();

        match self.marker_state()? {
            MarkerState::Current => {
                info!("{} already fetched, skipping", coordinate);
                return Ok(FetchOutcome::Cached);
            }
            MarkerState::Stale(previous) => {
                warn!("Cache holds {}, re-fetching {}", previous, coordinate);
            }
            MarkerState::Missing => {}
        }

        let cache = self.config.cache_path();
        tokio::fs::create_dir_all(&cache).await?;
        let env = BuildEnv::go_workspace(self.config);

        if !cache.join("go.mod").is_file() {
            let args = vec![
                "mod".to_string(),
                "init".to_string(),
                self.config.dependency.workspace_module.clone(),
            ];
            self.run_go(&args, &env, &cache).await?;
        } else {
            debug!("go.mod already present in {:?}", cache);
        }

        info!("Fetching {}", coordinate);
        let args = vec!["get".to_string(), coordinate.clone()];
        self.run_go(&args, &env, &cache).await?;

        // written last so an interrupted fetch is retried next time
        tokio::fs::write(self.config.fetch_marker_path(), format!("{}\n", coordinate)).await?;
        info!("Fetched {}", coordinate);
        Ok(FetchOutcome::Fetched)
    }

    async fn run_go(&self, args: &[String], env: &BuildEnv, dir: &Path) -> Result<()> {
        let label = format!("go {}", args.join(" "));
        let cmd = self.go.command(args, env, dir);
        let output = process::run(cmd, &label)
            .await
            .map_err(|e| Error::Fetch(format!("cannot run {}: {}", self.go.binary().display(), e)))?;

        if !output.success {
            return Err(Error::Fetch(format!("{} failed, {}", label, output.diagnostic())));
        }
        Ok(())
    }
}
