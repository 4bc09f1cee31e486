//! CLI commands for rclone-ndk
//!
//! Each command resolves only what it needs: `fetch` never touches the
//! Android SDK, `clean` works without one, and the build commands resolve
//! the full toolchain.

use std::path::PathBuf;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use rclone_ndk_android_toolchain::{
    Abi, BuildEnv, HostPlatform, NdkResolver, SdkInfo, SdkLocator, Toolchain,
};
use rclone_ndk_build_engine::{
    marker_state, Artifact, BuildEvent, BuildRunner, CacheCleaner, DependencyFetcher, FetchOutcome,
    GoToolchain, MarkerState,
};
use rclone_ndk_core::BuildConfig;

/// Resolve SDK, NDK and host into a toolchain, installing the NDK if allowed
pub async fn resolve_toolchain(config: &BuildConfig) -> Result<Toolchain> {
    let host = HostPlatform::detect()?;
    let sdk = SdkLocator::from_env(config).locate(&config.project_dir)?;
    let ndk = NdkResolver::new(config).resolve(&sdk).await?;
    Ok(Toolchain::new(ndk.path, host, config.toolchain.ndk_api_level))
}

/// Locate `go` and check its version
pub async fn resolve_go(config: &BuildConfig) -> Result<GoToolchain> {
    let go = GoToolchain::locate(config)?;
    go.check_version(&config.toolchain.go_version).await?;
    Ok(go)
}

/// Fetch the pinned dependency
pub struct FetchCommand;

impl FetchCommand {
    pub async fn execute(&self, config: &BuildConfig) -> Result<FetchOutcome> {
        let go = resolve_go(config).await?;
        let outcome = DependencyFetcher::new(config, &go).ensure().await?;
        match outcome {
            FetchOutcome::Cached => println!("{} is already fetched", config.dependency_coordinate()),
            FetchOutcome::Fetched => println!("Fetched {}", config.dependency_coordinate()),
        }
        Ok(outcome)
    }
}

/// Build one ABI
pub struct BuildCommand {
    pub abi: Abi,
}

impl BuildCommand {
    pub async fn execute(&self, config: &BuildConfig) -> Result<Artifact> {
        let go = resolve_go(config).await?;
        let toolchain = resolve_toolchain(config).await?;
        let runner = BuildRunner::new(config.clone(), toolchain, go);

        let artifact = runner.build(self.abi).await?;
        println!("{}: {}", self.abi, artifact.path.display());
        Ok(artifact)
    }
}

/// Build every ABI
pub struct BuildAllCommand {
    pub jobs: usize,
    pub show_progress: bool,
}

impl BuildAllCommand {
    pub async fn execute(&self, config: &BuildConfig) -> Result<Vec<Artifact>> {
        let go = resolve_go(config).await?;
        let toolchain = resolve_toolchain(config).await?;
        let runner = BuildRunner::new(config.clone(), toolchain, go);

        let (tx, rx) = mpsc::channel(32);
        let reporter = tokio::spawn(report_progress(rx, self.show_progress));

        let summary = runner.build_all(self.jobs, Some(tx)).await;
        reporter.await.context("progress reporter panicked")?;
        let summary = summary?;

        for artifact in &summary.artifacts {
            println!("{}: {}", artifact.abi, artifact.path.display());
        }
        for (abi, err) in &summary.failures {
            eprintln!("{}: {}", abi, err);
        }
        Ok(summary.into_result()?)
    }
}

async fn report_progress(mut rx: mpsc::Receiver<BuildEvent>, visible: bool) {
    let bar = if visible {
        ProgressBar::new(Abi::ALL.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    bar.set_message("fetching");

    while let Some(event) = rx.recv().await {
        match event {
            BuildEvent::Fetching => bar.set_message("fetching"),
            BuildEvent::Fetched(_) => bar.set_message("building"),
            BuildEvent::Started { abi } => bar.set_message(format!("building {}", abi)),
            BuildEvent::Finished { abi, .. } => {
                bar.inc(1);
                bar.println(format!("✓ {}", abi));
            }
            BuildEvent::Failed { abi, error } => {
                bar.inc(1);
                bar.println(format!("✗ {}: {}", abi, error));
            }
        }
    }
    bar.finish_and_clear();
}

/// Remove caches and artifacts
pub struct CleanCommand;

impl CleanCommand {
    pub async fn execute(&self, config: &BuildConfig) -> Result<()> {
        let go = match GoToolchain::locate(config) {
            Ok(go) => Some(go),
            Err(e) => {
                warn!("{}; Go caches will not be cleared", e);
                None
            }
        };

        let report = CacheCleaner::new(config, go.as_ref()).clean().await;
        println!(
            "Removed {} artifact(s){}",
            report.removed_artifacts.len(),
            if report.cache_removed { " and the dependency cache" } else { "" }
        );

        if !report.is_clean() {
            anyhow::bail!("clean finished with errors:\n  {}", report.failures.join("\n  "));
        }
        Ok(())
    }
}

/// Print the environment a build would use
pub struct EnvCommand {
    pub abi: Abi,
    pub json: bool,
}

impl EnvCommand {
    pub fn execute(&self, config: &BuildConfig) -> Result<BuildEnv> {
        let host = HostPlatform::detect()?;
        let sdk = SdkLocator::from_env(config).locate(&config.project_dir)?;
        let resolver = NdkResolver::new(config);
        let ndk_path = match resolver.detect(&sdk) {
            Some(ndk) => ndk.path,
            None => {
                warn!("NDK {} is not installed yet", config.toolchain.ndk_version);
                resolver.ndk_path(&sdk)
            }
        };

        let toolchain = Toolchain::new(ndk_path, host, config.toolchain.ndk_api_level);
        let env = BuildEnv::for_abi(config, &toolchain, self.abi);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&env)?);
        } else {
            print!("{}", env.shell_exports());
        }
        Ok(env)
    }
}

/// Status of one compiler wrapper
#[derive(Debug, Serialize)]
pub struct CompilerStatus {
    pub abi: Abi,
    pub path: PathBuf,
    pub present: bool,
}

/// Environment report
#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    pub host: Option<String>,
    pub sdk: Option<PathBuf>,
    pub sdk_source: Option<String>,
    pub ndk: Option<PathBuf>,
    pub ndk_revision: Option<String>,
    pub compilers: Vec<CompilerStatus>,
    pub go: Option<PathBuf>,
    pub go_version: Option<String>,
    pub dependency: String,
    pub fetched: bool,
    pub problems: Vec<String>,
}

impl DoctorReport {
    pub fn is_ready(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check the local environment without changing anything
pub struct DoctorCommand {
    pub json: bool,
}

impl DoctorCommand {
    pub async fn execute(&self, config: &BuildConfig) -> Result<DoctorReport> {
        let report = Self::inspect(config).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        if !report.is_ready() {
            anyhow::bail!("{} problem(s) found", report.problems.len());
        }
        Ok(report)
    }

    async fn inspect(config: &BuildConfig) -> DoctorReport {
        let mut report = DoctorReport {
            dependency: config.dependency_coordinate(),
            ..Default::default()
        };

        let host = match HostPlatform::detect() {
            Ok(host) => {
                report.host = Some(host.prebuilt_tag().to_string());
                Some(host)
            }
            Err(e) => {
                report.problems.push(e.to_string());
                None
            }
        };

        let sdk: Option<SdkInfo> = match SdkLocator::from_env(config).locate(&config.project_dir) {
            Ok(sdk) => {
                report.sdk = Some(sdk.path.clone());
                report.sdk_source = Some(sdk.source.clone());
                Some(sdk)
            }
            Err(e) => {
                report.problems.push(e.to_string());
                None
            }
        };

        if let Some(ref sdk) = sdk {
            match NdkResolver::new(config).detect(sdk) {
                Some(ndk) => {
                    report.ndk = Some(ndk.path.clone());
                    report.ndk_revision = ndk.revision.clone();
                    if let Some(host) = host {
                        let toolchain =
                            Toolchain::new(ndk.path, host, config.toolchain.ndk_api_level);
                        for abi in Abi::ALL {
                            let path = toolchain.compiler(abi);
                            let present = path.is_file();
                            if !present {
                                report.problems.push(format!("missing compiler {}", path.display()));
                            }
                            report.compilers.push(CompilerStatus { abi, path, present });
                        }
                    }
                }
                None => report.problems.push(format!(
                    "NDK {} not installed (run a build to install it)",
                    config.toolchain.ndk_version
                )),
            }
        }

        match GoToolchain::locate(config) {
            Ok(go) => {
                report.go = Some(go.binary().to_path_buf());
                match go.check_version(&config.toolchain.go_version).await {
                    Ok(version) => report.go_version = Some(version.to_string()),
                    Err(e) => report.problems.push(e.to_string()),
                }
            }
            Err(e) => report.problems.push(e.to_string()),
        }

        match marker_state(config) {
            Ok(state) => report.fetched = state == MarkerState::Current,
            Err(e) => report.problems.push(e.to_string()),
        }

        info!("doctor found {} problem(s)", report.problems.len());
        report
    }
}

fn print_report(report: &DoctorReport) {
    let show = |label: &str, value: Option<String>| match value {
        Some(v) => println!("✓ {}: {}", label, v),
        None => println!("✗ {}: not found", label),
    };

    println!("rclone-ndk environment");
    println!("======================");
    show("Host", report.host.clone());
    show(
        "Android SDK",
        report.sdk.as_ref().map(|p| {
            format!("{} ({})", p.display(), report.sdk_source.as_deref().unwrap_or("?"))
        }),
    );
    show(
        "Android NDK",
        report.ndk.as_ref().map(|p| {
            let revision = report.ndk_revision.as_deref().unwrap_or("unknown revision");
            format!("{} ({})", p.display(), revision)
        }),
    );
    for compiler in &report.compilers {
        let mark = if compiler.present { "✓" } else { "✗" };
        println!("  {} {}: {}", mark, compiler.abi, compiler.path.display());
    }
    show(
        "Go",
        report.go.as_ref().map(|p| {
            format!("{} ({})", p.display(), report.go_version.as_deref().unwrap_or("unusable"))
        }),
    );
    println!(
        "{} {}: {}",
        if report.fetched { "✓" } else { "·" },
        report.dependency,
        if report.fetched { "fetched" } else { "not fetched" }
    );

    for problem in &report.problems {
        eprintln!("problem: {}", problem);
    }
}
