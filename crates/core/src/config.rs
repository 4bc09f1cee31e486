//! Build Configuration
//!
//! Everything a build invocation needs to know, read once and then passed by
//! reference to every operation:
//! - Toolchain versions (NDK, NDK API level, Go)
//! - The pinned dependency coordinate and how its version is embedded
//! - Cache and output locations

use std::path::{Component, Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{info, debug};

use crate::error::{Error, Result};

/// File name looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "rclone-ndk.toml";

/// Marker written into the cache once the dependency has been fetched
pub const FETCH_MARKER_NAME: &str = ".rclone-ndk-fetch";

/// Host toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolchainConfig {
    /// NDK version installed under `<sdk>/ndk/<version>`
    pub ndk_version: String,
    /// API level baked into the clang wrapper names
    pub ndk_api_level: u32,
    /// Minimum Go version on the host
    pub go_version: String,
    /// Explicit `go` executable; looked up on PATH when unset
    pub go_binary: Option<PathBuf>,
    /// Install the NDK through sdkmanager when it is missing
    pub auto_install_ndk: bool,
    /// Environment variables naming the SDK root, checked in order
    pub sdk_env_vars: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            ndk_version: "26.1.10909125".to_string(),
            ndk_api_level: 21,
            go_version: "1.21".to_string(),
            go_binary: None,
            auto_install_ndk: true,
            sdk_env_vars: vec!["ANDROID_HOME".to_string(), "ANDROID_SDK_ROOT".to_string()],
        }
    }
}

/// Pinned dependency configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DependencyConfig {
    /// Module coordinate of the dependency
    pub module: String,
    /// Exact version tag
    pub version: String,
    /// Appended to the version embedded in the binary
    pub version_suffix: String,
    /// Module name of the local fetch workspace
    pub workspace_module: String,
    /// Symbol overridden with `-X` to embed the version
    pub version_variable: String,
    /// Go build tags
    pub build_tags: Vec<String>,
    /// Extra flags for the cgo linker
    pub cgo_ldflags: String,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            module: "github.com/rclone/rclone".to_string(),
            version: "v1.65.0".to_string(),
            version_suffix: "-android".to_string(),
            workspace_module: "rclone.local".to_string(),
            version_variable: "github.com/rclone/rclone/fs.Version".to_string(),
            build_tags: vec!["android".to_string(), "noselfupdate".to_string()],
            cgo_ldflags: "-Wl,-z,max-page-size=16384".to_string(),
        }
    }
}

/// Cache and output locations, relative to the project directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub cache_dir: PathBuf,
    pub output_root: PathBuf,
    pub library_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("rclone").join("cache"),
            output_root: PathBuf::from("app").join("lib"),
            library_name: "librclone.so".to_string(),
        }
    }
}

/// Complete build configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Project root; every relative path is resolved against it
    #[serde(skip)]
    pub project_dir: PathBuf,
    pub toolchain: ToolchainConfig,
    pub dependency: DependencyConfig,
    pub output: OutputConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            toolchain: ToolchainConfig::default(),
            dependency: DependencyConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Load configuration for a project.
    ///
    /// An explicit file must exist. Without one, `rclone-ndk.toml` in the
    /// project directory is used, then the per-user config file, then the
    /// built-in defaults.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let source = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => Self::candidates(project_dir).into_iter().find(|p| p.is_file()),
        };

        let mut config = match source {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml(&content)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.project_dir = project_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn candidates(project_dir: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![project_dir.join(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("rclone-ndk").join("config.toml"));
        }
        candidates
    }

    /// Reject values no build could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.dependency.module.trim().is_empty() {
            return Err(Error::config("dependency.module must not be empty"));
        }
        if self.dependency.version.trim().is_empty() {
            return Err(Error::config("dependency.version must not be empty"));
        }
        if self.toolchain.ndk_version.trim().is_empty() {
            return Err(Error::config("toolchain.ndk_version must not be empty"));
        }
        if self.toolchain.ndk_api_level == 0 {
            return Err(Error::config("toolchain.ndk_api_level must be positive"));
        }
        let name = &self.output.library_name;
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(Error::config(format!(
                "output.library_name must be a plain file name, got {:?}",
                name
            )));
        }
        self.validate_cache_dir()
    }

    /// `clean` deletes the cache tree, so it must not cover the project or
    /// the output root.
    fn validate_cache_dir(&self) -> Result<()> {
        if self.output.cache_dir.as_os_str().is_empty() {
            return Err(Error::config("output.cache_dir must not be empty"));
        }

        let cache = normalize(&self.cache_path());
        if normalize(&self.project_dir).starts_with(&cache) {
            return Err(Error::config(format!(
                "output.cache_dir {} would contain the project directory",
                self.output.cache_dir.display()
            )));
        }
        if normalize(&self.output_root_path()).starts_with(&cache) {
            return Err(Error::config(format!(
                "output.cache_dir {} would contain output.output_root {}",
                self.output.cache_dir.display(),
                self.output.output_root.display()
            )));
        }
        Ok(())
    }

    /// Version string embedded in the produced binary
    pub fn embedded_version(&self) -> String {
        format!("{}{}", self.dependency.version, self.dependency.version_suffix)
    }

    /// `-ldflags` value for `go build`
    pub fn ldflags(&self) -> String {
        format!(
            "-s -w -X {}={}",
            self.dependency.version_variable,
            self.embedded_version()
        )
    }

    /// `<module>@<version>` as passed to `go get`
    pub fn dependency_coordinate(&self) -> String {
        format!("{}@{}", self.dependency.module, self.dependency.version)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.output.cache_dir)
    }

    /// Isolated GOPATH inside the cache
    pub fn gopath(&self) -> PathBuf {
        self.cache_path().join("gopath")
    }

    pub fn fetch_marker_path(&self) -> PathBuf {
        self.cache_path().join(FETCH_MARKER_NAME)
    }

    pub fn output_root_path(&self) -> PathBuf {
        self.resolve(&self.output.output_root)
    }

    /// `<output-root>/<abi>/<library-name>`
    pub fn artifact_path(&self, abi_name: &str) -> PathBuf {
        self.output_root_path()
            .join(abi_name)
            .join(&self.output.library_name)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

/// Lexically drop `.` and fold `..` so paths can be compared by prefix
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
