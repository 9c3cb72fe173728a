//! Replacing the icon embedded in the package executable.
//!
//! Two backends share one contract: the executable is modified in place and
//! any failure is reported as [`PipelineError::IconPatchFailed`].
//! - `ResourceEditor` shells out to rcedit: `rcedit <exe> --set-icon <ico>`.
//! - `Embedded` rewrites the PE resource table in-process with editpe.

use crate::error::PipelineError;
use crate::executable;
use crate::icon;
use crate::process::run_command;
use editpe::Image;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconBackend {
    /// Path to the external resource editor
    ResourceEditor(PathBuf),
    /// In-process resource editing
    Embedded,
}

impl IconBackend {
    /// Set `icon_path` as the main icon of `exe_path`.
    pub fn set_icon(&self, exe_path: &Path, icon_path: &Path) -> Result<(), PipelineError> {
        let result = match self {
            IconBackend::ResourceEditor(program) => run_command(
                program,
                &[
                    exe_path.as_os_str(),
                    OsStr::new("--set-icon"),
                    icon_path.as_os_str(),
                ],
                true,
            )
            .map(|_| ()),
            IconBackend::Embedded => embed_icon(exe_path, icon_path),
        };

        result.map_err(|e| match e {
            PipelineError::IconPatchFailed { .. } => e,
            other => PipelineError::IconPatchFailed {
                executable: exe_path.to_path_buf(),
                reason: other.to_string(),
            },
        })
    }
}

/// Convert the package icon and patch it into the package executable.
///
/// Returns the path of the generated .ico.
pub fn fix_icon(dir: &Path, backend: &IconBackend) -> Result<PathBuf, PipelineError> {
    let exe_path = dir.join(executable::locate(dir)?);
    let ico_path = icon::extract_icon(dir)?;
    log::info!(
        "Setting icon of {} to {}",
        exe_path.display(),
        ico_path.display()
    );
    backend.set_icon(&exe_path, &ico_path)?;
    Ok(ico_path)
}

/// Embed an icon into a Windows executable without external tools.
fn embed_icon(exe_path: &Path, icon_path: &Path) -> Result<(), PipelineError> {
    let patch_failed = |reason: String| PipelineError::IconPatchFailed {
        executable: exe_path.to_path_buf(),
        reason,
    };

    let mut image = Image::parse_file(exe_path)
        .map_err(|e| patch_failed(format!("failed to parse PE: {}", e)))?;

    let mut resources = image.resource_directory().cloned().unwrap_or_default();

    let icon_path_str = icon_path
        .to_str()
        .ok_or_else(|| patch_failed("icon path is not valid UTF-8".to_string()))?;
    resources
        .set_main_icon_file(icon_path_str)
        .map_err(|e| patch_failed(format!("failed to embed icon: {}", e)))?;

    image
        .set_resource_directory(resources)
        .map_err(|e| patch_failed(format!("failed to embed icon: {}", e)))?;

    image
        .write_file(exe_path)
        .map_err(|e| patch_failed(format!("failed to write PE: {}", e)))?;

    Ok(())
}
