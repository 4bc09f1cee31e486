//! Build Environment
//!
//! Per-invocation environment for the Go toolchain. A `BuildEnv` is handed
//! to exactly one subprocess; nothing here touches the environment of the
//! running process, so several builds can run side by side.

use std::collections::BTreeMap;
use std::path::Path;
use serde::Serialize;

use rclone_ndk_core::BuildConfig;

use crate::ndk::{Abi, Toolchain};

/// Environment variables for one subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables shared by every Go invocation against the module cache
    pub fn go_workspace(config: &BuildConfig) -> Self {
        let mut env = Self::new();
        env.set("GOPATH", path_value(&config.gopath()));
        // keeps the module cache deletable
        env.set("GOFLAGS", "-modcacherw");
        env
    }

    /// Full cross-compilation environment for one ABI
    pub fn for_abi(config: &BuildConfig, toolchain: &Toolchain, abi: Abi) -> Self {
        let compiler = path_value(&toolchain.compiler(abi));

        let mut env = Self::go_workspace(config);
        env.set("CC", compiler.clone());
        env.set("CC_FOR_TARGET", compiler);
        env.set("CGO_ENABLED", "1");
        env.set("GOOS", "android");
        env.set("GOARCH", abi.goarch());
        if let Some(goarm) = abi.goarm() {
            env.set("GOARM", goarm);
        }
        if !config.dependency.cgo_ldflags.is_empty() {
            env.set("CGO_LDFLAGS", config.dependency.cgo_ldflags.clone());
        }
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Shell export lines, for display
    pub fn shell_exports(&self) -> String {
        let mut exports = String::new();
        for (key, value) in &self.vars {
            if cfg!(windows) {
                exports.push_str(&format!("set {}={}\n", key, value));
            } else {
                exports.push_str(&format!("export {}=\"{}\"\n", key, value));
            }
        }
        exports
    }
}

impl<'a> IntoIterator for &'a BuildEnv {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
