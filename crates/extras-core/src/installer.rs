//! Building a Windows installer from an extracted package.
//!
//! An Inno Setup script is rendered from the package metadata, written into
//! the package directory and compiled with the external installer compiler.

use crate::constants::{INSTALLER_OUTPUT_DIR, INSTALLER_SCRIPT_FILENAME, INSTALLER_VERSION};
use crate::error::PipelineError;
use crate::executable;
use crate::html;
use crate::icon;
use crate::manifest::PackageManifest;
use crate::process::run_command;
use std::fs;
use std::path::{Path, PathBuf};

/// Make a value safe to interpolate into the installer script.
///
/// `{` starts a constant in Inno Setup, so it is doubled; `"` would end the
/// quoted value, so it is dropped.
pub fn escape_inno_value(value: &str) -> String {
    value.replace('{', "{{").replace('"', "")
}

/// Installer base filename (without extension) for a package name
pub fn output_name(package_name: &str) -> String {
    format!("{} Setup", package_name)
}

/// Where the compiler is expected to write the installer for `package_name`.
pub fn expected_output(dir: &Path, package_name: &str) -> PathBuf {
    dir.join(INSTALLER_OUTPUT_DIR)
        .join(format!("{}.exe", output_name(package_name)))
}

/// Default place to save the installer: `<archive dir>/<archive stem> Setup.exe`.
pub fn suggested_destination(archive_path: &Path) -> PathBuf {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{}.exe", output_name(&stem));
    match archive_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Values substituted into the installer script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerScript {
    pub title: String,
    pub package_name: String,
    pub executable: String,
    pub version: String,
    pub output_dir: String,
    pub output_name: String,
    pub icon: String,
}

impl InstallerScript {
    /// Render the script. Every value passes through [`escape_inno_value`].
    pub fn render(&self) -> String {
        format!(
            r##"; Generated by packager-extras. Avoid changing by hand.

#define TITLE "{title}"
#define PACKAGE_NAME "{package_name}"
#define EXECUTABLE "{executable}"
#define VERSION "{version}"

[Setup]
AppName={{#PACKAGE_NAME}}
AppVersion={{#VERSION}}
WizardStyle=classic
DefaultDirName={{autopf}}\{{#PACKAGE_NAME}}
UninstallDisplayIcon={{app}}\{{#EXECUTABLE}}
DefaultGroupName={{#TITLE}}
PrivilegesRequired=lowest
Compression=lzma2
SolidCompression=yes
OutputDir={output_dir}
OutputBaseFilename={output_name}
SetupIconFile={icon}

[Files]
Source: "*"; DestDir: "{{app}}"; Excludes: "*.iss"; Flags: recursesubdirs ignoreversion

[Icons]
Name: "{{group}}\{{#TITLE}}"; Filename: "{{app}}\{{#EXECUTABLE}}"

[Run]
Filename: "{{app}}\{{#EXECUTABLE}}"; Description: "Launch application"; Flags: postinstall nowait skipifsilent

[UninstallDelete]
Type: filesandordirs; Name: "{{localappdata}}\{{#PACKAGE_NAME}}"
"##,
            title = escape_inno_value(&self.title),
            package_name = escape_inno_value(&self.package_name),
            executable = escape_inno_value(&self.executable),
            version = escape_inno_value(&self.version),
            output_dir = escape_inno_value(&self.output_dir),
            output_name = escape_inno_value(&self.output_name),
            icon = escape_inno_value(&self.icon),
        )
    }
}

/// Gather everything the script needs from the package in `dir`.
///
/// Converts the package icon as a side effect.
pub fn prepare_script(dir: &Path) -> Result<InstallerScript, PipelineError> {
    let executable = executable::locate(dir)?;
    let manifest = PackageManifest::load(dir)?;
    let package_name = manifest.require_name(dir)?.to_string();
    let title = html::project_title(dir)?;
    let icon = icon::extract_icon(dir)?;

    Ok(InstallerScript {
        title,
        output_name: output_name(&package_name),
        package_name,
        executable,
        version: INSTALLER_VERSION.to_string(),
        output_dir: INSTALLER_OUTPUT_DIR.to_string(),
        icon: icon.display().to_string(),
    })
}

/// Build an installer for the package in `dir` with the compiler at `compiler`.
///
/// Returns the path of the compiled installer inside `dir`. The script is left
/// behind in `dir`.
pub fn generate(dir: &Path, compiler: &Path) -> Result<PathBuf, PipelineError> {
    let script = prepare_script(dir)?;
    let script_path = dir.join(INSTALLER_SCRIPT_FILENAME);
    fs::write(&script_path, script.render())
        .map_err(|e| PipelineError::io(format!("writing {}", script_path.display()), e))?;

    run_command(compiler, &[script_path.as_os_str()], true).map_err(|e| {
        PipelineError::InstallerBuildFailed {
            reason: e.to_string(),
        }
    })?;

    let expected = expected_output(dir, &script.package_name);
    if !expected.is_file() {
        return Err(PipelineError::InstallerBuildFailed {
            reason: format!("did not output to expected location {}", expected.display()),
        });
    }
    Ok(expected)
}
