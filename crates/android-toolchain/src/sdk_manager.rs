//! SDK Manager
//!
//! Wraps the Android SDK manager to install the pinned NDK on demand.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{info, debug, warn};

use rclone_ndk_core::Error;

/// SDK component types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkComponent {
    Ndk(String), // ndk;XX.X.XXXXX
}

impl SdkComponent {
    /// Get the SDK manager package name
    pub fn package_name(&self) -> String {
        match self {
            SdkComponent::Ndk(version) => format!("ndk;{}", version),
        }
    }
}

/// SDK Manager errors
#[derive(Debug, thiserror::Error)]
pub enum SdkManagerError {
    #[error("SDK not found at {0}")]
    SdkNotFound(PathBuf),
    #[error("sdkmanager not found under {0}")]
    SdkManagerNotFound(PathBuf),
    #[error("Command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SdkManagerError> for Error {
    fn from(err: SdkManagerError) -> Self {
        Error::NdkInstall(err.to_string())
    }
}

/// Android SDK Manager wrapper
pub struct SdkManager {
    sdk_root: PathBuf,
    sdkmanager_path: PathBuf,
}

impl SdkManager {
    /// Create a new SDK manager
    pub fn new(sdk_root: PathBuf) -> Result<Self, SdkManagerError> {
        if !sdk_root.exists() {
            return Err(SdkManagerError::SdkNotFound(sdk_root));
        }

        let sdkmanager_path = Self::find_sdkmanager(&sdk_root)?;

        Ok(Self {
            sdk_root,
            sdkmanager_path,
        })
    }

    /// Find the sdkmanager executable
    fn find_sdkmanager(sdk_root: &Path) -> Result<PathBuf, SdkManagerError> {
        let exe_name = if cfg!(windows) { "sdkmanager.bat" } else { "sdkmanager" };

        // cmdline-tools/latest
        let path = sdk_root.join("cmdline-tools").join("latest").join("bin").join(exe_name);
        if path.exists() {
            return Ok(path);
        }

        // cmdline-tools/X.X
        let cmdline_tools = sdk_root.join("cmdline-tools");
        if let Ok(entries) = std::fs::read_dir(&cmdline_tools) {
            for entry in entries.flatten() {
                let path = entry.path().join("bin").join(exe_name);
                if path.exists() {
                    return Ok(path);
                }
            }
        }

        // legacy tools directory
        let path = sdk_root.join("tools").join("bin").join(exe_name);
        if path.exists() {
            return Ok(path);
        }

        Err(SdkManagerError::SdkManagerNotFound(sdk_root.to_path_buf()))
    }

    /// Create the base command with environment variables
    fn create_command(&self) -> Command {
        let mut cmd = Command::new(&self.sdkmanager_path);
        cmd.env("ANDROID_SDK_ROOT", &self.sdk_root);
        cmd.env("ANDROID_HOME", &self.sdk_root);
        cmd.arg(format!("--sdk_root={}", self.sdk_root.display()));
        cmd
    }

    /// Accept all licenses
    pub async fn accept_licenses(&self) -> Result<(), SdkManagerError> {
        info!("Accepting Android SDK licenses...");

        let mut child = self.create_command()
            .arg("--licenses")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // sdkmanager asks once per unaccepted license
        if let Some(mut stdin) = child.stdin.take() {
            for _ in 0..20 {
                if stdin.write_all(b"y\n").await.is_err() {
                    break;
                }
            }
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("License acceptance may have failed: {}", stderr);
        }

        Ok(())
    }

    /// Install SDK components
    pub async fn install(&self, components: &[SdkComponent]) -> Result<(), SdkManagerError> {
        let packages: Vec<String> = components.iter().map(|c| c.package_name()).collect();

        info!("Installing SDK packages: {:?}", packages);

        let mut cmd = self.create_command();
        cmd.args(&packages);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            for _ in 0..10 {
                if stdin.write_all(b"y\n").await.is_err() {
                    break;
                }
            }
        }

        // both pipes are drained together so a chatty stderr cannot stall stdout
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, stderr, status) = tokio::join!(
            drain_lines(stdout),
            drain_lines(stderr),
            child.wait(),
        );
        let status = status?;

        if !status.success() {
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(20)..].join("\n");
            return Err(SdkManagerError::CommandFailed(format!(
                "installation of {} exited with {:?}: {}",
                packages.join(" "),
                status.code(),
                tail.trim()
            )));
        }

        info!("SDK packages installed successfully");
        Ok(())
    }

    /// Get the SDK root path
    pub fn sdk_root(&self) -> &Path {
        &self.sdk_root
    }
}

async fn drain_lines<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut collected = String::new();
    let Some(reader) = reader else {
        return collected;
    };

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("sdkmanager: {}", line);
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fake `cmdline-tools/latest/bin/sdkmanager`. It floods stderr, installs
    /// any `ndk;<version>` package under its `--sdk_root` and exits with
    /// `exit_code`.
    #[cfg(unix)]
    pub(crate) fn fake_sdkmanager(sdk: &Path, exit_code: i32) {
        use std::os::unix::fs::PermissionsExt;

        let bin = sdk.join("cmdline-tools").join("latest").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join("sdkmanager");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 root=\"\"\n\
                 for arg in \"$@\"; do\n\
                   case \"$arg\" in\n\
                     --sdk_root=*) root=\"${{arg#--sdk_root=}}\" ;;\n\
                     --licenses) exit 0 ;;\n\
                     ndk\\;*)\n\
                       version=\"${{arg#ndk;}}\"\n\
                       mkdir -p \"$root/ndk/$version\"\n\
                       echo \"Pkg.Revision = $version\" > \"$root/ndk/$version/source.properties\" ;;\n\
                   esac\n\
                 done\n\
                 head -c 200000 /dev/zero | tr '\\000' x >&2\n\
                 echo done\n\
                 exit {code}\n",
                code = exit_code
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_component_package_name() {
        assert_eq!(
            SdkComponent::Ndk("26.1.10909125".into()).package_name(),
            "ndk;26.1.10909125"
        );
    }

    #[test]
    fn test_missing_sdkmanager() {
        let sdk = tempfile::tempdir().unwrap();
        let err = SdkManager::new(sdk.path().to_path_buf()).err().unwrap();
        assert!(matches!(err, SdkManagerError::SdkManagerNotFound(_)));
        assert!(matches!(Error::from(err), Error::NdkInstall(_)));
    }

    #[test]
    fn test_finds_versioned_cmdline_tools() {
        let sdk = tempfile::tempdir().unwrap();
        let exe_name = if cfg!(windows) { "sdkmanager.bat" } else { "sdkmanager" };
        let bin = sdk.path().join("cmdline-tools").join("11.0").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(exe_name), "").unwrap();

        let manager = SdkManager::new(sdk.path().to_path_buf()).unwrap();
        assert_eq!(manager.sdk_root(), sdk.path());
        assert_eq!(manager.sdkmanager_path, bin.join(exe_name));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_with_noisy_stderr_completes() {
        let sdk = tempfile::tempdir().unwrap();
        fake_sdkmanager(sdk.path(), 0);

        let manager = SdkManager::new(sdk.path().to_path_buf()).unwrap();
        let components = [SdkComponent::Ndk("26.1.10909125".into())];
        let install = manager.install(&components);
        tokio::time::timeout(std::time::Duration::from_secs(30), install)
            .await
            .expect("install should not stall on a full stderr pipe")
            .unwrap();

        assert!(sdk.path().join("ndk/26.1.10909125/source.properties").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_install_reports_stderr() {
        let sdk = tempfile::tempdir().unwrap();
        fake_sdkmanager(sdk.path(), 1);

        let manager = SdkManager::new(sdk.path().to_path_buf()).unwrap();
        let components = [SdkComponent::Ndk("26.1.10909125".into())];
        let install = manager.install(&components);
        let err = tokio::time::timeout(std::time::Duration::from_secs(30), install)
            .await
            .expect("install should not stall on a full stderr pipe")
            .unwrap_err();

        match err {
            SdkManagerError::CommandFailed(msg) => {
                assert!(msg.contains("ndk;26.1.10909125"));
                assert!(msg.contains("Some(1)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
