//! NDK Toolchain
//!
//! Maps target ABIs and host platforms onto the clang wrappers shipped in
//! the NDK's LLVM prebuilt directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use serde::Serialize;
use tracing::debug;

use rclone_ndk_core::{Error, Result};

/// Target ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Abi {
    #[serde(rename = "armeabi-v7a")]
    ArmeabiV7a,
    #[serde(rename = "arm64-v8a")]
    Arm64V8a,
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Abi {
    /// All supported ABIs
    pub const ALL: [Abi; 4] = [Abi::ArmeabiV7a, Abi::Arm64V8a, Abi::X86, Abi::X86_64];

    /// Get the ABI name as used in the app's lib directory
    pub fn abi_name(&self) -> &'static str {
        match self {
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::Arm64V8a => "arm64-v8a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }

    /// Short name used on the command line
    pub fn short_name(&self) -> &'static str {
        match self {
            Abi::ArmeabiV7a => "armv7",
            Abi::Arm64V8a => "arm64",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }

    /// Get the clang target triple prefix for this ABI
    pub fn clang_triple(&self) -> &'static str {
        match self {
            Abi::ArmeabiV7a => "armv7a-linux-androideabi",
            Abi::Arm64V8a => "aarch64-linux-android",
            Abi::X86 => "i686-linux-android",
            Abi::X86_64 => "x86_64-linux-android",
        }
    }

    /// `GOARCH` for this ABI
    pub fn goarch(&self) -> &'static str {
        match self {
            Abi::ArmeabiV7a => "arm",
            Abi::Arm64V8a => "arm64",
            Abi::X86 => "386",
            Abi::X86_64 => "amd64",
        }
    }

    /// `GOARM` sub-variant, only meaningful for 32-bit ARM
    pub fn goarm(&self) -> Option<&'static str> {
        match self {
            Abi::ArmeabiV7a => Some("7"),
            _ => None,
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

impl FromStr for Abi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Abi::ALL
            .into_iter()
            .find(|abi| s == abi.abi_name() || s == abi.short_name() || s == abi.clang_triple())
            .ok_or_else(|| Error::UnsupportedAbi(s.to_string()))
    }
}

/// Host operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
}

/// Host CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostArch {
    X86_64,
    Aarch64,
}

/// A host the NDK ships prebuilt compilers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: HostOs,
    pub arch: HostArch,
}

impl HostPlatform {
    /// Detect the platform this process runs on
    pub fn detect() -> Result<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Build from OS and CPU names as reported by `std::env::consts`.
    ///
    /// Only pairs the NDK ships compilers for are accepted: Windows and Linux
    /// on x86_64, macOS on x86_64 or arm64.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedHost {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let host_os = match os {
            "windows" => HostOs::Windows,
            "linux" => HostOs::Linux,
            "macos" | "darwin" => HostOs::MacOs,
            _ => return Err(unsupported()),
        };
        let host_arch = match arch {
            "x86_64" | "amd64" => HostArch::X86_64,
            "aarch64" | "arm64" => HostArch::Aarch64,
            _ => return Err(unsupported()),
        };

        match (host_os, host_arch) {
            (HostOs::Windows, HostArch::X86_64)
            | (HostOs::Linux, HostArch::X86_64)
            | (HostOs::MacOs, _) => Ok(Self { os: host_os, arch: host_arch }),
            _ => Err(unsupported()),
        }
    }

    /// Directory name under `toolchains/llvm/prebuilt`
    pub fn prebuilt_tag(&self) -> &'static str {
        match self.os {
            HostOs::Windows => "windows-x86_64",
            HostOs::Linux => "linux-x86_64",
            // the darwin toolchain is a universal binary
            HostOs::MacOs => "darwin-x86_64",
        }
    }

    /// Suffix of the clang wrapper scripts
    pub fn wrapper_suffix(&self) -> &'static str {
        match self.os {
            HostOs::Windows => ".cmd",
            _ => "",
        }
    }
}

/// NDK clang toolchain for one host
#[derive(Debug, Clone)]
pub struct Toolchain {
    ndk_root: PathBuf,
    host: HostPlatform,
    api_level: u32,
}

impl Toolchain {
    pub fn new(ndk_root: impl Into<PathBuf>, host: HostPlatform, api_level: u32) -> Self {
        Self {
            ndk_root: ndk_root.into(),
            host,
            api_level,
        }
    }

    pub fn ndk_root(&self) -> &Path {
        &self.ndk_root
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    /// `<ndk>/toolchains/llvm/prebuilt/<host-tag>/bin`
    pub fn bin_dir(&self) -> PathBuf {
        self.ndk_root
            .join("toolchains")
            .join("llvm")
            .join("prebuilt")
            .join(self.host.prebuilt_tag())
            .join("bin")
    }

    /// Path of the C compiler for an ABI. This is a pure lookup.
    pub fn compiler(&self, abi: Abi) -> PathBuf {
        let name = format!(
            "{}{}-clang{}",
            abi.clang_triple(),
            self.api_level,
            self.host.wrapper_suffix()
        );
        self.bin_dir().join(name)
    }

    /// Compiler path, failing if the NDK does not actually contain it
    pub fn verify(&self, abi: Abi) -> Result<PathBuf> {
        let compiler = self.compiler(abi);
        debug!("Checking compiler {:?}", compiler);
        if compiler.is_file() {
            Ok(compiler)
        } else {
            Err(Error::config(format!(
                "compiler for {} not found at {} (is ndk_api_level {} supported by this NDK?)",
                abi,
                compiler.display(),
                self.api_level
            )))
        }
    }
}
