//! Post-processing for archives produced by a web-app-to-desktop packager.
//!
//! A run extracts the archive into a temporary directory, optionally replaces
//! the executable's icon with the application's own icon and rezips the tree
//! over the original archive, and optionally builds a Windows installer from
//! the extracted tree.

pub mod archive;
pub mod config;
mod constants;
pub mod error;
pub mod executable;
pub mod html;
pub mod icon;
pub mod installer;
pub mod manifest;
pub mod patcher;
pub mod pipeline;
pub mod process;
pub mod reveal;

pub use constants::{
    DEFAULT_ICON_FILENAME, ENTRY_DOCUMENT, EXECUTABLE_SUFFIX, HELPER_EXECUTABLE,
    INSTALLER_OUTPUT_DIR, INSTALLER_SCRIPT_FILENAME, INSTALLER_VERSION, MANIFEST_FILENAME,
    MARKER_FILENAME,
};
pub use error::PipelineError;
