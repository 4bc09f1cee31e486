//! Host Go Toolchain
//!
//! Locates the `go` executable and checks it against the minimum version
//! the pinned dependency needs.

use std::fmt;
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::{info, debug};

use rclone_ndk_android_toolchain::BuildEnv;
use rclone_ndk_core::{BuildConfig, Error, Result};

use crate::process;

/// A Go release number; missing components count as zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GoVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GoVersion {
    /// Parse `1.21`, `1.21.3`, `go1.21.3` or a full `go version` line
    pub fn parse(text: &str) -> Result<Self> {
        let re = Regex::new(r"(?:^|go|\s)(\d+)\.(\d+)(?:\.(\d+))?")
            .map_err(|e| Error::GoToolchain(e.to_string()))?;
        let caps = re
            .captures(text.trim())
            .ok_or_else(|| Error::GoToolchain(format!("cannot parse Go version from {:?}", text)))?;

        let number = |i: usize| -> Result<u32> {
            match caps.get(i) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| Error::GoToolchain(format!("bad version component in {:?}", text))),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
        })
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The `go` command used for fetching, building and cleaning
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: PathBuf,
}

impl GoToolchain {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Use `toolchain.go_binary` when set, otherwise find `go` on PATH
    pub fn locate(config: &BuildConfig) -> Result<Self> {
        if let Some(ref binary) = config.toolchain.go_binary {
            debug!("Using configured go binary {:?}", binary);
            return Ok(Self::new(binary.clone()));
        }

        which::which("go")
            .map(Self::new)
            .map_err(|e| Error::GoToolchain(format!("go not found on PATH: {}", e)))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Build a `go` subcommand invocation
    pub fn command(&self, args: &[String], env: &BuildEnv, dir: &Path) -> tokio::process::Command {
        process::command(&self.binary, args, env, dir)
    }

    /// Ask the toolchain for its version
    pub async fn version(&self) -> Result<GoVersion> {
        let dir = std::env::temp_dir();
        let cmd = self.command(&["version".to_string()], &BuildEnv::new(), &dir);
        let output = process::run(cmd, "go version").await.map_err(|e| {
            Error::GoToolchain(format!("cannot run {}: {}", self.binary.display(), e))
        })?;

        if !output.success {
            return Err(Error::GoToolchain(format!("go version failed, {}", output.diagnostic())));
        }
        GoVersion::parse(&output.stdout)
    }

    /// Fail unless the toolchain is at least `required`
    pub async fn check_version(&self, required: &str) -> Result<GoVersion> {
        let required = GoVersion::parse(required)?;
        let found = self.version().await?;

        if found < required {
            return Err(Error::GoToolchain(format!(
                "{} is Go {}, at least {} is required",
                self.binary.display(),
                found,
                required
            )));
        }

        info!("Using Go {} from {:?}", found, self.binary);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!(
            GoVersion::parse("go version go1.21.3 linux/amd64").unwrap(),
            GoVersion { major: 1, minor: 21, patch: 3 }
        );
        assert_eq!(
            GoVersion::parse("1.22").unwrap(),
            GoVersion { major: 1, minor: 22, patch: 0 }
        );
        assert_eq!(
            GoVersion::parse("go version go1.22rc1 darwin/arm64").unwrap(),
            GoVersion { major: 1, minor: 22, patch: 0 }
        );
        assert!(GoVersion::parse("no version here").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let old = GoVersion::parse("1.20.14").unwrap();
        let new = GoVersion::parse("1.21").unwrap();
        assert!(old < new);
        assert!(GoVersion::parse("1.21.0").unwrap() >= new);
    }

    #[test]
    fn test_configured_binary_wins() {
        let mut config = BuildConfig::default();
        config.toolchain.go_binary = Some(PathBuf::from("/opt/go/bin/go"));
        let go = GoToolchain::locate(&config).unwrap();
        assert_eq!(go.binary(), Path::new("/opt/go/bin/go"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_toolchain_error() {
        let go = GoToolchain::new("/nonexistent/rclone-ndk/go");
        let err = go.check_version("1.21").await.unwrap_err();
        assert!(matches!(err, Error::GoToolchain(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_old_go_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("go");
        std::fs::write(&script, "#!/bin/sh\necho 'go version go1.19.5 linux/amd64'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let go = GoToolchain::new(&script);
        assert_eq!(go.version().await.unwrap(), GoVersion { major: 1, minor: 19, patch: 5 });
        assert!(matches!(go.check_version("1.21").await, Err(Error::GoToolchain(_))));
        assert!(go.check_version("1.18").await.is_ok());
    }
}
