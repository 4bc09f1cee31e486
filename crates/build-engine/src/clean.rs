//! Cache Cleaner
//!
//! Purges the Go caches, the dependency cache directory and every produced
//! artifact. Each step is attempted even when an earlier one failed; a failed
//! `go clean` is only logged.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rclone_ndk_android_toolchain::{Abi, BuildEnv};
use rclone_ndk_core::BuildConfig;

use crate::go_toolchain::GoToolchain;
use crate::process;

/// What a clean removed and what went wrong
#[derive(Debug, Default)]
pub struct CleanReport {
    pub go_caches_cleared: bool,
    pub cache_removed: bool,
    pub removed_artifacts: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Removes caches and artifacts
pub struct CacheCleaner<'a> {
    config: &'a BuildConfig,
    go: Option<&'a GoToolchain>,
}

impl<'a> CacheCleaner<'a> {
    /// Without a Go toolchain the `go clean` step is skipped
    pub fn new(config: &'a BuildConfig, go: Option<&'a GoToolchain>) -> Self {
        Self { config, go }
    }

    pub async fn clean(&self) -> CleanReport {
        let mut report = CleanReport::default();
        let cache = self.config.cache_path();

        if cache.is_dir() {
            match self.go {
                Some(go) => self.clean_go_caches(go, &cache, &mut report).await,
                None => warn!("No Go toolchain available, skipping go clean"),
            }

            match tokio::fs::remove_dir_all(&cache).await {
                Ok(()) => {
                    info!("Removed {:?}", cache);
                    report.cache_removed = true;
                }
                Err(e) => report.failures.push(format!("remove {}: {}", cache.display(), e)),
            }
        }

        for abi in Abi::ALL {
            let artifact = self.config.artifact_path(abi.abi_name());
            if artifact.exists() {
                match tokio::fs::remove_file(&artifact).await {
                    Ok(()) => {
                        info!("Removed {:?}", artifact);
                        report.removed_artifacts.push(artifact.clone());
                    }
                    Err(e) => {
                        report.failures.push(format!("remove {}: {}", artifact.display(), e));
                        continue;
                    }
                }
            }
            if let Some(abi_dir) = artifact.parent() {
                remove_if_empty(abi_dir).await;
            }
        }

        for failure in &report.failures {
            warn!("clean: {}", failure);
        }
        report
    }

    async fn clean_go_caches(&self, go: &GoToolchain, cache: &Path, report: &mut CleanReport) {
        let args: Vec<String> = ["clean", "-cache", "-modcache", "-testcache"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cmd = go.command(&args, &BuildEnv::go_workspace(self.config), cache);

        // the cache directory is removed next either way
        match process::run(cmd, "go clean").await {
            Ok(output) if output.success => report.go_caches_cleared = true,
            Ok(output) => warn!("go clean failed, {}", output.diagnostic()),
            Err(e) => warn!("cannot run go clean: {}", e),
        }
    }
}

async fn remove_if_empty(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    if let Ok(None) = entries.next_entry().await {
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(config: &BuildConfig) {
        std::fs::create_dir_all(config.gopath().join("pkg")).unwrap();
        std::fs::write(config.fetch_marker_path(), "x").unwrap();
        for abi in Abi::ALL {
            let artifact = config.artifact_path(abi.abi_name());
            std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
            std::fs::write(&artifact, "elf").unwrap();
        }
    }

    #[tokio::test]
    async fn test_clean_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        populate(&config);
        // unrelated file next to an artifact survives
        std::fs::write(config.output_root_path().join("x86").join("libother.so"), "").unwrap();

        let report = CacheCleaner::new(&config, None).clean().await;

        assert!(report.is_clean());
        assert!(report.cache_removed);
        assert_eq!(report.removed_artifacts.len(), 4);
        assert!(!config.cache_path().exists());
        for abi in Abi::ALL {
            assert!(!config.artifact_path(abi.abi_name()).exists());
        }
        assert!(!config.output_root_path().join("arm64-v8a").exists());
        assert!(config.output_root_path().join("x86").join("libother.so").exists());
    }

    #[tokio::test]
    async fn test_go_clean_failure_does_not_stop_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        populate(&config);

        let go = GoToolchain::new("/nonexistent/rclone-ndk/go");
        let report = CacheCleaner::new(&config, Some(&go)).clean().await;

        assert!(!report.go_caches_cleared);
        assert!(report.is_clean());
        assert!(report.cache_removed);
        assert_eq!(report.removed_artifacts.len(), 4);
    }

    #[tokio::test]
    async fn test_clean_on_empty_project() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let report = CacheCleaner::new(&config, None).clean().await;
        assert!(report.is_clean());
        assert!(!report.cache_removed);
        assert!(report.removed_artifacts.is_empty());
    }
}
