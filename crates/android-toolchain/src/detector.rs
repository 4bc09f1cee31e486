//! Toolchain Detection
//!
//! Locates the Android SDK from the environment or `local.properties` and
//! resolves the pinned NDK inside it, installing the NDK on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, debug, warn};

use rclone_ndk_core::{BuildConfig, Error, Result};

use crate::sdk_manager::{SdkComponent, SdkManager};

/// File Android Studio writes the SDK location into
pub const LOCAL_PROPERTIES: &str = "local.properties";

/// Result of SDK detection
#[derive(Debug, Clone)]
pub struct SdkInfo {
    pub path: PathBuf,
    /// Where the path came from, e.g. `ANDROID_HOME` or `local.properties`
    pub source: String,
}

/// Result of NDK detection
#[derive(Debug, Clone)]
pub struct NdkInfo {
    pub path: PathBuf,
    /// `Pkg.Revision` from `source.properties`
    pub revision: Option<String>,
}

/// Finds the Android SDK root
pub struct SdkLocator {
    env_vars: Vec<String>,
    env: HashMap<String, String>,
}

impl SdkLocator {
    /// Locator reading the current process environment
    pub fn from_env(config: &BuildConfig) -> Self {
        Self::with_env(config, std::env::vars().collect())
    }

    /// Locator reading a fixed set of variables
    pub fn with_env(config: &BuildConfig, env: HashMap<String, String>) -> Self {
        Self {
            env_vars: config.toolchain.sdk_env_vars.clone(),
            env,
        }
    }

    /// Resolve the SDK for a project directory.
    ///
    /// Environment variables win over `local.properties`. A candidate that
    /// does not point at an existing directory is skipped with a warning.
    pub fn locate(&self, project_dir: &Path) -> Result<SdkInfo> {
        let mut checked = Vec::new();

        for var in &self.env_vars {
            match self.env.get(var).filter(|v| !v.trim().is_empty()) {
                Some(value) => {
                    let path = PathBuf::from(value);
                    if path.is_dir() {
                        info!("Using Android SDK from {}: {:?}", var, path);
                        return Ok(SdkInfo { path, source: var.clone() });
                    }
                    warn!("{} points at {:?}, which is not a directory", var, path);
                    checked.push(format!("{}={}", var, value));
                }
                None => checked.push(format!("{} (unset)", var)),
            }
        }

        let props_path = project_dir.join(LOCAL_PROPERTIES);
        if props_path.is_file() {
            let content = std::fs::read_to_string(&props_path)?;
            match parse_properties(&content).get("sdk.dir") {
                Some(dir) => {
                    let path = PathBuf::from(dir);
                    if path.is_dir() {
                        info!("Using Android SDK from {:?}: {:?}", props_path, path);
                        return Ok(SdkInfo {
                            path,
                            source: LOCAL_PROPERTIES.to_string(),
                        });
                    }
                    checked.push(format!("sdk.dir={} in {}", dir, props_path.display()));
                }
                None => checked.push(format!("{} (no sdk.dir)", props_path.display())),
            }
        } else {
            checked.push(format!("{} (missing)", props_path.display()));
        }

        Err(Error::SdkNotFound(format!("checked {}", checked.join(", "))))
    }
}

/// Parse a Java properties file.
///
/// Handles `key=value` and `key:value`, comments, and the escapes Android
/// Studio writes for Windows paths (`C\:\\Users`).
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();

    for line in content.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut key = String::new();
        let mut chars = line.chars();
        let mut escaped = false;
        for c in chars.by_ref() {
            if escaped {
                key.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '=' || c == ':' {
                break;
            } else {
                key.push(c);
            }
        }

        let value = unescape(chars.as_str().trim());
        props.insert(key.trim().to_string(), value);
    }

    props
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Resolves the pinned NDK inside an SDK
pub struct NdkResolver<'a> {
    config: &'a BuildConfig,
}

impl<'a> NdkResolver<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self { config }
    }

    /// `<sdk>/ndk/<ndk_version>`
    pub fn ndk_path(&self, sdk: &SdkInfo) -> PathBuf {
        sdk.path.join("ndk").join(&self.config.toolchain.ndk_version)
    }

    /// Find the NDK without installing anything
    pub fn detect(&self, sdk: &SdkInfo) -> Option<NdkInfo> {
        let path = self.ndk_path(sdk);
        if !is_valid_ndk(&path) {
            return None;
        }

        let revision = read_revision(&path);
        if let Some(ref rev) = revision {
            if rev != &self.config.toolchain.ndk_version {
                warn!(
                    "NDK at {:?} reports revision {}, expected {}",
                    path, rev, self.config.toolchain.ndk_version
                );
            }
        }

        Some(NdkInfo { path, revision })
    }

    /// Find the NDK, installing it through sdkmanager if allowed
    pub async fn resolve(&self, sdk: &SdkInfo) -> Result<NdkInfo> {
        if let Some(info) = self.detect(sdk) {
            info!("Found Android NDK at {:?}", info.path);
            return Ok(info);
        }

        let version = &self.config.toolchain.ndk_version;
        if !self.config.toolchain.auto_install_ndk {
            return Err(Error::NdkInstall(format!(
                "NDK {} is not installed at {} and auto_install_ndk is off",
                version,
                self.ndk_path(sdk).display()
            )));
        }

        info!("NDK {} missing, installing through sdkmanager", version);
        let manager = SdkManager::new(sdk.path.clone())?;
        manager.accept_licenses().await?;
        manager.install(&[SdkComponent::Ndk(version.clone())]).await?;

        self.detect(sdk).ok_or_else(|| {
            Error::NdkInstall(format!(
                "sdkmanager finished but {} is still missing",
                self.ndk_path(sdk).display()
            ))
        })
    }
}

/// Check if a path contains a usable NDK
fn is_valid_ndk(path: &Path) -> bool {
    path.join("source.properties").is_file()
}

/// Read `Pkg.Revision` from `source.properties`
fn read_revision(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path.join("source.properties")).ok()?;
    let revision = parse_properties(&content).remove("Pkg.Revision");
    debug!("NDK revision at {:?}: {:?}", path, revision);
    revision
}
