//! Build Runner
//!
//! Coordinates the whole process: the dependency fetch runs once, then the
//! per-ABI builds fan out. ABI builds are independent, so one failing does
//! not stop the others.

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, error};

use rclone_ndk_android_toolchain::{Abi, Toolchain};
use rclone_ndk_core::{BuildConfig, Error, Result};

use crate::fetch::{DependencyFetcher, FetchOutcome};
use crate::go_build::{Artifact, GoBuild};
use crate::go_toolchain::GoToolchain;

/// Build progress
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Fetching,
    Fetched(FetchOutcome),
    Started { abi: Abi },
    Finished { abi: Abi, artifact: Artifact },
    Failed { abi: Abi, error: String },
}

/// Outcome of building several ABIs
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<(Abi, Error)>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into an error naming every failed ABI
    pub fn into_result(self) -> Result<Vec<Artifact>> {
        let mut failures = self.failures;
        match failures.len() {
            0 => return Ok(self.artifacts),
            1 => return Err(failures.remove(0).1),
            _ => {}
        }

        let abis: Vec<&str> = failures.iter().map(|(abi, _)| abi.abi_name()).collect();
        let details: Vec<String> = failures.iter().map(|(_, e)| e.to_string()).collect();
        Err(Error::build(abis.join(", "), details.join("; ")))
    }
}

/// Build runner that coordinates fetch and per-ABI builds
pub struct BuildRunner {
    config: Arc<BuildConfig>,
    toolchain: Arc<Toolchain>,
    go: Arc<GoToolchain>,
}

impl BuildRunner {
    pub fn new(config: BuildConfig, toolchain: Toolchain, go: GoToolchain) -> Self {
        Self {
            config: Arc::new(config),
            toolchain: Arc::new(toolchain),
            go: Arc::new(go),
        }
    }

    /// Fetch the pinned dependency if needed
    pub async fn fetch(&self) -> Result<FetchOutcome> {
        DependencyFetcher::new(&self.config, &self.go).ensure().await
    }

    /// Fetch, then build a single ABI
    pub async fn build(&self, abi: Abi) -> Result<Artifact> {
        self.fetch().await?;
        self.build_one(abi).await
    }

    async fn build_one(&self, abi: Abi) -> Result<Artifact> {
        self.toolchain.verify(abi)?;
        GoBuild::new(&self.config, &self.toolchain, &self.go, abi).run().await
    }

    /// Fetch once, then build every supported ABI
    pub async fn build_all(
        &self,
        jobs: usize,
        progress: Option<mpsc::Sender<BuildEvent>>,
    ) -> Result<BuildSummary> {
        self.build_many(&Abi::ALL, jobs, progress).await
    }

    /// Fetch once, then build `abis` with at most `jobs` builds at a time.
    ///
    /// Only a failed fetch is returned as `Err`; per-ABI failures end up in
    /// the summary.
    pub async fn build_many(
        &self,
        abis: &[Abi],
        jobs: usize,
        progress: Option<mpsc::Sender<BuildEvent>>,
    ) -> Result<BuildSummary> {
        let notify = |event: BuildEvent| {
            let progress = progress.clone();
            async move {
                if let Some(tx) = progress {
                    let _ = tx.send(event).await;
                }
            }
        };

        notify(BuildEvent::Fetching).await;
        let fetched = self.fetch().await?;
        notify(BuildEvent::Fetched(fetched)).await;

        let jobs = jobs.max(1);
        info!("Building {} ABIs, {} at a time", abis.len(), jobs);
        let permits = Arc::new(Semaphore::new(jobs));

        let builds = abis.iter().copied().map(|abi| {
            let permits = permits.clone();
            let notify = &notify;
            async move {
                let result = match permits.acquire().await {
                    Ok(_permit) => {
                        notify(BuildEvent::Started { abi }).await;
                        self.build_one(abi).await
                    }
                    Err(e) => Err(Error::build(abi.abi_name(), e.to_string())),
                };

                match &result {
                    Ok(artifact) => {
                        notify(BuildEvent::Finished { abi, artifact: artifact.clone() }).await;
                    }
                    Err(e) => {
                        error!("{} failed: {}", abi, e);
                        notify(BuildEvent::Failed { abi, error: e.to_string() }).await;
                    }
                }
                (abi, result)
            }
        });

        let mut summary = BuildSummary::default();
        for (abi, result) in futures::future::join_all(builds).await {
            match result {
                Ok(artifact) => summary.artifacts.push(artifact),
                Err(e) => summary.failures.push((abi, e)),
            }
        }

        info!(
            "{} built, {} failed",
            summary.artifacts.len(),
            summary.failures.len()
        );
        Ok(summary)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rclone_ndk_core::config::FETCH_MARKER_NAME;
    use crate::go_build::tests::{fake_go, linux_toolchain};

    /// Project with a fetched cache and empty compiler stubs for every ABI
    fn project(dir: &std::path::Path) -> (BuildConfig, Toolchain) {
        let config = BuildConfig {
            project_dir: dir.to_path_buf(),
            ..Default::default()
        };
        std::fs::create_dir_all(config.cache_path()).unwrap();
        std::fs::write(
            config.cache_path().join(FETCH_MARKER_NAME),
            config.dependency_coordinate(),
        )
        .unwrap();

        let toolchain = linux_toolchain(&dir.join("ndk"));
        std::fs::create_dir_all(toolchain.bin_dir()).unwrap();
        for abi in Abi::ALL {
            std::fs::write(toolchain.compiler(abi), "").unwrap();
        }
        (config, toolchain)
    }

    #[tokio::test]
    async fn test_build_all_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let (config, toolchain) = project(dir.path());
        let go = fake_go(dir.path(), "none");
        let runner = BuildRunner::new(config.clone(), toolchain, go);

        let (tx, mut rx) = mpsc::channel(64);
        let summary = runner.build_all(4, Some(tx)).await.unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.artifacts.len(), 4);
        for abi in Abi::ALL {
            let env = std::fs::read_to_string(config.artifact_path(abi.abi_name())).unwrap();
            assert!(env.lines().any(|l| l == format!("GOARCH={}", abi.goarch())));
        }

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], BuildEvent::Fetching));
        assert!(matches!(events[1], BuildEvent::Fetched(FetchOutcome::Cached)));
        let finished = events
            .iter()
            .filter(|e| matches!(e, BuildEvent::Finished { .. }))
            .count();
        assert_eq!(finished, 4);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let (config, toolchain) = project(dir.path());
        let go = fake_go(dir.path(), "386");
        let runner = BuildRunner::new(config.clone(), toolchain, go);

        let summary = runner.build_all(1, None).await.unwrap();

        assert_eq!(summary.artifacts.len(), 3);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, Abi::X86);
        assert!(config.artifact_path("x86_64").is_file());
        assert!(!config.artifact_path("x86").exists());

        let err = summary.into_result().unwrap_err();
        assert!(matches!(err, Error::Build { ref abi, .. } if abi == "x86"));
    }

    #[tokio::test]
    async fn test_single_build_checks_compiler() {
        let dir = tempfile::tempdir().unwrap();
        let (config, toolchain) = project(dir.path());
        std::fs::remove_file(toolchain.compiler(Abi::ArmeabiV7a)).unwrap();
        let go = fake_go(dir.path(), "none");
        let runner = BuildRunner::new(config, toolchain, go);

        assert!(matches!(runner.build(Abi::ArmeabiV7a).await, Err(Error::Config(_))));
        let artifact = runner.build(Abi::Arm64V8a).await.unwrap();
        assert!(artifact.path.ends_with("arm64-v8a/librclone.so"));
    }
}
