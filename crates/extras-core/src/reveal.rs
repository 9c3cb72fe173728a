//! Showing a delivered file in the platform's file browser.

use crate::process::run_command;
use std::path::Path;

/// Best effort: failures are logged and otherwise ignored.
pub fn reveal_in_file_browser(path: &Path) {
    log::info!("Trying to reveal {}", path.display());
    let (program, args) = reveal_command(path);
    if let Err(e) = run_command(Path::new(program), &args, false) {
        log::warn!("Could not reveal {}: {}", path.display(), e);
    }
}

#[cfg(windows)]
fn reveal_command(path: &Path) -> (&'static str, Vec<String>) {
    let target = path.display().to_string().replace('/', "\\");
    ("explorer.exe", vec!["/select,".to_string(), target])
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path) -> (&'static str, Vec<String>) {
    ("open", vec!["-R".to_string(), path.display().to_string()])
}

#[cfg(not(any(windows, target_os = "macos")))]
fn reveal_command(path: &Path) -> (&'static str, Vec<String>) {
    let dir = path.parent().unwrap_or(path);
    ("xdg-open", vec![dir.display().to_string()])
}
