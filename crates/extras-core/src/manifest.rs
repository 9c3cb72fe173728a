use crate::constants::MANIFEST_FILENAME;
use crate::error::PipelineError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The parts of a package's `package.json` this tool reads.
///
/// Unknown fields are ignored. The manifest is re-read every time it is
/// needed rather than cached for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    /// Window configuration (present in some NW.js builds)
    #[serde(default)]
    pub window: Option<WindowConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WindowConfig {
    #[serde(default)]
    pub icon: Option<String>,
}

impl PackageManifest {
    /// Path of the manifest inside a package directory
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILENAME)
    }

    pub fn load(dir: &Path) -> Result<PackageManifest, PipelineError> {
        let path = Self::path_in(dir);
        let content = fs::read_to_string(&path).map_err(|e| PipelineError::ManifestError {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|reason| PipelineError::ManifestError { path, reason })
    }

    pub fn parse(content: &str) -> Result<PackageManifest, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    /// Icon filename from the window block, if one is set
    pub fn icon_override(&self) -> Option<&str> {
        self.window.as_ref().and_then(|w| w.icon.as_deref())
    }

    /// Package name, required for building an installer
    pub fn require_name(&self, dir: &Path) -> Result<&str, PipelineError> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(PipelineError::ManifestError {
                path: Self::path_in(dir),
                reason: "missing \"name\"".to_string(),
            }),
        }
    }
}
