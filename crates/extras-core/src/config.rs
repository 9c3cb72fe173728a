//! Where the external tools live and how the icon is patched.
//!
//! Each setting is taken from an explicit override (command line), then an
//! environment variable, then a default next to the running executable.

use crate::patcher::IconBackend;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Path of the resource editor executable
pub const RCEDIT_ENV: &str = "PACKAGER_EXTRAS_RCEDIT";
/// Path of the installer compiler executable
pub const ISCC_ENV: &str = "PACKAGER_EXTRAS_ISCC";
/// `rcedit` or `embedded`
pub const ICON_BACKEND_ENV: &str = "PACKAGER_EXTRAS_ICON_BACKEND";

/// Directory holding bundled tools, relative to the executable
const TOOLS_DIR: &str = "third-party";

/// Which icon patcher to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// External resource editor (rcedit)
    #[default]
    ResourceEditor,
    /// In-process PE resource editing
    Embedded,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rcedit" => Ok(BackendKind::ResourceEditor),
            "embedded" => Ok(BackendKind::Embedded),
            other => Err(format!(
                "unknown icon backend '{}' (expected 'rcedit' or 'embedded')",
                other
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::ResourceEditor => write!(f, "rcedit"),
            BackendKind::Embedded => write!(f, "embedded"),
        }
    }
}

/// Explicit settings that take priority over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rcedit: Option<PathBuf>,
    pub iscc: Option<PathBuf>,
    pub icon_backend: Option<BackendKind>,
}

/// Settings for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub icon_backend: IconBackend,
    pub installer_compiler: PathBuf,
    /// Show the delivered installer in the file browser after success
    pub reveal_output: bool,
    /// Where per-run temporary directories are created; system temp dir when unset
    pub work_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve settings against the process environment and the directory of
    /// the running executable.
    pub fn from_env(overrides: Overrides) -> Result<Config, String> {
        Self::resolve(overrides, &default_tools_dir(), |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit tools directory and variable lookup.
    pub fn resolve<F>(overrides: Overrides, tools_dir: &Path, env: F) -> Result<Config, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let kind = match overrides.icon_backend {
            Some(kind) => kind,
            None => match from_env(ICON_BACKEND_ENV) {
                Some(value) => value.parse()?,
                None => BackendKind::default(),
            },
        };

        let icon_backend = match kind {
            BackendKind::ResourceEditor => IconBackend::ResourceEditor(
                overrides
                    .rcedit
                    .or_else(|| from_env(RCEDIT_ENV).map(PathBuf::from))
                    .unwrap_or_else(|| tools_dir.join("rcedit").join("rcedit-x86.exe")),
            ),
            BackendKind::Embedded => IconBackend::Embedded,
        };

        let installer_compiler = overrides
            .iscc
            .or_else(|| from_env(ISCC_ENV).map(PathBuf::from))
            .unwrap_or_else(|| tools_dir.join("inno").join("iscc.exe"));

        Ok(Config {
            icon_backend,
            installer_compiler,
            reveal_output: true,
            work_dir: None,
        })
    }
}

/// `third-party/` next to the running executable
pub fn default_tools_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(TOOLS_DIR)))
        .unwrap_or_else(|| PathBuf::from(TOOLS_DIR))
}
