//! Locating the application executable inside an extracted package.

use crate::constants::{EXECUTABLE_SUFFIX, HELPER_EXECUTABLE};
use crate::error::PipelineError;
use std::fs;
use std::io;
use std::path::Path;

/// Whether a filename can be the application executable.
pub fn is_candidate(name: &str) -> bool {
    name.ends_with(EXECUTABLE_SUFFIX) && name != HELPER_EXECUTABLE
}

/// Find the application executable among the direct children of `dir`.
///
/// Only regular files count. When several qualify, the lexicographically
/// first one wins, so the result does not depend on enumeration order.
pub fn locate(dir: &Path) -> Result<String, PipelineError> {
    let listing_error = |e: io::Error| PipelineError::io(format!("listing {}", dir.display()), e);

    let mut best: Option<String> = None;
    for entry in fs::read_dir(dir).map_err(listing_error)? {
        let entry = entry.map_err(listing_error)?;
        if !entry.file_type().map_err(listing_error)?.is_file() {
            continue;
        }
        // Names that are not UTF-8 cannot match the suffix check anyway
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_candidate(&name) && best.as_ref().is_none_or(|current| name < *current) {
            best = Some(name);
        }
    }

    best.ok_or_else(|| PipelineError::ExecutableNotFound {
        dir: dir.to_path_buf(),
    })
}
