//! Per-ABI Go Build
//!
//! Cross-compiles the fetched dependency for one Android ABI with the NDK
//! clang as cgo compiler, producing `<output-root>/<abi>/<library-name>`.

use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, debug};

use rclone_ndk_android_toolchain::{Abi, BuildEnv, Toolchain};
use rclone_ndk_core::{BuildConfig, Error, Result};

use crate::go_toolchain::GoToolchain;
use crate::process;

/// A finished artifact
#[derive(Debug, Clone)]
pub struct Artifact {
    pub abi: Abi,
    pub path: PathBuf,
    pub size: u64,
    pub duration_secs: f64,
}

/// Builds the shared library for a single ABI
pub struct GoBuild<'a> {
    config: &'a BuildConfig,
    toolchain: &'a Toolchain,
    go: &'a GoToolchain,
    abi: Abi,
}

impl<'a> GoBuild<'a> {
    pub fn new(
        config: &'a BuildConfig,
        toolchain: &'a Toolchain,
        go: &'a GoToolchain,
        abi: Abi,
    ) -> Self {
        Self { config, toolchain, go, abi }
    }

    /// Where the artifact ends up
    pub fn output_path(&self) -> PathBuf {
        self.config.artifact_path(self.abi.abi_name())
    }

    /// Environment for this build only
    pub fn env(&self) -> BuildEnv {
        BuildEnv::for_abi(self.config, self.toolchain, self.abi)
    }

    /// Arguments passed to `go`
    pub fn args(&self) -> Vec<String> {
        let dep = &self.config.dependency;
        let mut args = vec!["build".to_string(), "-trimpath".to_string()];
        if !dep.build_tags.is_empty() {
            args.push("-tags".to_string());
            args.push(dep.build_tags.join(","));
        }
        args.push("-ldflags".to_string());
        args.push(self.config.ldflags());
        args.push("-o".to_string());
        args.push(self.output_path().to_string_lossy().to_string());
        args.push(dep.module.clone());
        args
    }

    /// Run the build
    pub async fn run(&self) -> Result<Artifact> {
        let abi = self.abi.abi_name();
        let start = Instant::now();
        let output_path = self.output_path();

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // a stale library must not stand in for this build's output
        match tokio::fs::remove_file(&output_path).await {
            Ok(()) => debug!("Removed previous {:?}", output_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!("Building {} for {}", self.config.embedded_version(), abi);
        let args = self.args();
        debug!("go {:?}", args);

        let cmd = self.go.command(&args, &self.env(), &self.config.cache_path());
        let output = process::run(cmd, abi)
            .await
            .map_err(|e| Error::build(abi, format!("cannot run {}: {}", self.go.binary().display(), e)))?;

        if !output.success {
            return Err(Error::build(abi, output.diagnostic()));
        }

        let metadata = tokio::fs::metadata(&output_path)
            .await
            .map_err(|_| Error::MissingArtifact(output_path.clone()))?;

        let duration_secs = start.elapsed().as_secs_f64();
        info!("Built {:?} ({} bytes) in {:.1}s", output_path, metadata.len(), duration_secs);

        Ok(Artifact {
            abi: self.abi,
            path: output_path,
            size: metadata.len(),
            duration_secs,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rclone_ndk_android_toolchain::HostPlatform;

    pub(crate) fn linux_toolchain(ndk: &std::path::Path) -> Toolchain {
        Toolchain::new(ndk, HostPlatform::from_parts("linux", "x86_64").unwrap(), 21)
    }

    /// Fake `go` that dumps its environment into the `-o` target and fails
    /// when `GOARCH` equals `$FAIL_GOARCH`
    #[cfg(unix)]
    pub(crate) fn fake_go(dir: &std::path::Path, fail_goarch: &str) -> GoToolchain {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-go");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 out=\"\"\n\
                 while [ $# -gt 0 ]; do\n\
                   if [ \"$1\" = \"-o\" ]; then out=\"$2\"; shift; fi\n\
                   shift\n\
                 done\n\
                 if [ \"$GOARCH\" = \"{fail}\" ]; then echo \"link failed for $GOARCH\" >&2; exit 2; fi\n\
                 if [ -n \"$out\" ]; then env > \"$out\"; fi\n",
                fail = fail_goarch
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        GoToolchain::new(script)
    }

    #[test]
    fn test_build_args() {
        let config = BuildConfig {
            project_dir: PathBuf::from("/work"),
            ..Default::default()
        };
        let toolchain = linux_toolchain(std::path::Path::new("/ndk"));
        let go = GoToolchain::new("go");
        let build = GoBuild::new(&config, &toolchain, &go, Abi::Arm64V8a);

        assert_eq!(
            build.args(),
            vec![
                "build",
                "-trimpath",
                "-tags",
                "android,noselfupdate",
                "-ldflags",
                "-s -w -X github.com/rclone/rclone/fs.Version=v1.65.0-android",
                "-o",
                "/work/app/lib/arm64-v8a/librclone.so",
                "github.com/rclone/rclone",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arm64_build_produces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        std::fs::create_dir_all(config.cache_path()).unwrap();
        let toolchain = linux_toolchain(&dir.path().join("ndk"));
        let go = fake_go(dir.path(), "none");

        let artifact = GoBuild::new(&config, &toolchain, &go, Abi::Arm64V8a)
            .run()
            .await
            .unwrap();

        assert_eq!(artifact.path, dir.path().join("app/lib/arm64-v8a/librclone.so"));
        let env = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(env.lines().any(|l| l == "GOARCH=arm64"));
        assert!(env.lines().any(|l| l == "GOOS=android"));
        assert!(env
            .lines()
            .any(|l| l.starts_with("CC=") && l.ends_with("aarch64-linux-android21-clang")));
        assert!(!env.lines().any(|l| l.starts_with("GOARM=")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_build_names_abi() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        std::fs::create_dir_all(config.cache_path()).unwrap();
        let toolchain = linux_toolchain(&dir.path().join("ndk"));
        let go = fake_go(dir.path(), "386");

        let err = GoBuild::new(&config, &toolchain, &go, Abi::X86).run().await.unwrap_err();
        match err {
            Error::Build { abi, message } => {
                assert_eq!(abi, "x86");
                assert!(message.contains("link failed for 386"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_artifact_does_not_hide_missing_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        std::fs::create_dir_all(config.cache_path()).unwrap();
        let stale = config.artifact_path("arm64-v8a");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old build").unwrap();

        // exits 0 without writing -o
        let script = dir.path().join("silent-go");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let go = GoToolchain::new(&script);
        let toolchain = linux_toolchain(&dir.path().join("ndk"));

        let err = GoBuild::new(&config, &toolchain, &go, Abi::Arm64V8a).run().await.unwrap_err();
        assert!(matches!(err, Error::MissingArtifact(ref path) if *path == stale));
        assert!(!stale.exists());
    }
}
