//! The per-run state machine.
//!
//! ```text
//! Idle -> Extracting -> Ready -> Running(FixIcon) -> Repackaging
//!                         ^   -> Running(CreateInstaller) -> Delivering -> Done
//!                         |                |
//!                         +---- Failed <---+
//! ```
//!
//! A failure while extracting discards the run and its temporary directory.
//! A failure after options were chosen goes back to `Ready` with the
//! extracted tree intact so the user can retry.

mod session;
mod worker;

pub use session::Session;
pub use worker::{Job, Worker, spawn};

use crate::archive::{self, ExtractedPackage};
use crate::config::Config;
use crate::error::PipelineError;
use crate::installer;
use crate::patcher;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutation step being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FixIcon,
    CreateInstaller,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::FixIcon => write!(f, "fixing icon"),
            Step::CreateInstaller => write!(f, "creating installer"),
        }
    }
}

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    /// Extracted and waiting for options
    Ready,
    Running(Step),
    Repackaging,
    Delivering,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Extracting => write!(f, "Extracting"),
            RunState::Ready => write!(f, "Ready"),
            RunState::Running(step) => write!(f, "Running ({})", step),
            RunState::Repackaging => write!(f, "Repackaging"),
            RunState::Delivering => write!(f, "Delivering"),
            RunState::Done => write!(f, "Done"),
            RunState::Failed => write!(f, "Failed"),
        }
    }
}

/// What the user asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub fix_icon: bool,
    pub create_installer: bool,
}

impl Options {
    /// Both steps, matching the options' initial checked state
    pub fn all() -> Self {
        Options {
            fix_icon: true,
            create_installer: true,
        }
    }

    /// At least one step must be selected, and an installer needs a destination.
    pub fn validate(&self, destination: Option<&Path>) -> Result<(), PipelineError> {
        if !self.fix_icon && !self.create_installer {
            return Err(PipelineError::NoOptionSelected);
        }
        if self.create_installer && destination.is_none() {
            return Err(PipelineError::NoDestinationSelected);
        }
        Ok(())
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Extraction finished; the run is `Ready`
    Extracted { root: PathBuf },
    /// All selected steps finished
    Succeeded { installer: Option<PathBuf> },
    /// A step failed; `discarded` is true when the run was torn down
    Failed { message: String, discarded: bool },
}

/// Event emitted while a job runs. `Finished` is always the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StateChanged(RunState),
    Progress(String),
    Finished(Outcome),
}

/// Cooperative cancellation, checked between stages (never mid-subprocess).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One user-initiated run over one archive.
///
/// Owns the temporary directory the archive is extracted into; dropping the
/// run (or calling [`Run::remove`]) deletes it.
#[derive(Debug)]
pub struct Run {
    archive: PathBuf,
    config: Config,
    state: RunState,
    package: Option<ExtractedPackage>,
    cancel: CancelFlag,
}

impl Run {
    pub fn new(archive: impl Into<PathBuf>, config: Config) -> Self {
        Self::with_cancel_flag(archive, config, CancelFlag::new())
    }

    pub fn with_cancel_flag(archive: impl Into<PathBuf>, config: Config, cancel: CancelFlag) -> Self {
        Run {
            archive: archive.into(),
            config,
            state: RunState::Idle,
            package: None,
            cancel,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Root of the extracted package while the run holds one
    pub fn extracted_root(&self) -> Option<&Path> {
        self.package.as_ref().map(|p| p.root())
    }

    /// Whether the run still owns an extracted package
    pub fn is_open(&self) -> bool {
        self.package.is_some()
    }

    /// Extract and validate the archive: `Idle -> Extracting -> Ready`.
    ///
    /// On failure the temporary directory is deleted and the run ends in
    /// `Failed`; it cannot be used again.
    pub fn extract<F>(&mut self, mut on_event: F) -> Result<(), PipelineError>
    where
        F: FnMut(Event),
    {
        if self.state != RunState::Idle {
            return Err(PipelineError::InvalidState(format!(
                "cannot extract while {}",
                self.state
            )));
        }

        self.transition(RunState::Extracting, &mut on_event);
        on_event(Event::Progress(format!(
            "Extracting {}",
            self.archive.display()
        )));

        let extracted = match &self.config.work_dir {
            Some(parent) => archive::extract_in(&self.archive, parent),
            None => archive::extract(&self.archive),
        };
        let result = extracted.and_then(|package| {
            // Dropping the package here on cancellation removes it
            self.cancel.check()?;
            Ok(package)
        });

        match result {
            Ok(package) => {
                let root = package.root().to_path_buf();
                self.package = Some(package);
                self.transition(RunState::Ready, &mut on_event);
                on_event(Event::Finished(Outcome::Extracted { root }));
                Ok(())
            }
            Err(e) => {
                log::warn!("Extraction of {} failed: {}", self.archive.display(), e);
                self.package = None;
                self.transition(RunState::Failed, &mut on_event);
                on_event(Event::Finished(Outcome::Failed {
                    message: e.to_string(),
                    discarded: true,
                }));
                Err(e)
            }
        }
    }

    /// Perform the selected steps: `Ready -> Running -> ... -> Done`.
    ///
    /// Invalid options are rejected before any state change or event. Any
    /// later failure moves the run back to `Ready` with the extracted tree
    /// kept for a retry. Returns the delivered installer path, if any.
    pub fn execute<F>(
        &mut self,
        options: Options,
        destination: Option<&Path>,
        mut on_event: F,
    ) -> Result<Option<PathBuf>, PipelineError>
    where
        F: FnMut(Event),
    {
        options.validate(destination)?;
        if self.state != RunState::Ready {
            return Err(PipelineError::InvalidState(format!(
                "cannot run steps while {}",
                self.state
            )));
        }

        match self.run_steps(options, destination, &mut on_event) {
            Ok(installer) => {
                self.transition(RunState::Done, &mut on_event);
                on_event(Event::Finished(Outcome::Succeeded {
                    installer: installer.clone(),
                }));
                Ok(installer)
            }
            Err(e) => {
                log::warn!("Run failed: {}", e);
                self.transition(RunState::Failed, &mut on_event);
                self.transition(RunState::Ready, &mut on_event);
                on_event(Event::Finished(Outcome::Failed {
                    message: e.to_string(),
                    discarded: false,
                }));
                Err(e)
            }
        }
    }

    fn run_steps<F>(
        &mut self,
        options: Options,
        destination: Option<&Path>,
        on_event: &mut F,
    ) -> Result<Option<PathBuf>, PipelineError>
    where
        F: FnMut(Event),
    {
        let (temp_path, root) = match &self.package {
            Some(package) => (package.temp_path().to_path_buf(), package.root().to_path_buf()),
            None => return Err(PipelineError::InvalidState("no extracted package".to_string())),
        };

        if options.fix_icon {
            self.cancel.check()?;
            self.transition(RunState::Running(Step::FixIcon), on_event);
            on_event(Event::Progress("Fixing icon".to_string()));
            patcher::fix_icon(&root, &self.config.icon_backend)?;

            self.cancel.check()?;
            self.transition(RunState::Repackaging, on_event);
            on_event(Event::Progress("Recompressing (slow!)".to_string()));
            archive::repackage(&temp_path, &self.archive)?;
        }

        let mut delivered = None;
        if options.create_installer {
            let destination = destination.ok_or(PipelineError::NoDestinationSelected)?;

            self.cancel.check()?;
            self.transition(RunState::Running(Step::CreateInstaller), on_event);
            on_event(Event::Progress("Creating installer (very slow!!)".to_string()));
            let built = installer::generate(&root, &self.config.installer_compiler)?;

            self.cancel.check()?;
            self.transition(RunState::Delivering, on_event);
            on_event(Event::Progress(format!(
                "Moving installer to {}",
                destination.display()
            )));
            move_file(&built, destination)?;
            delivered = Some(destination.to_path_buf());
        }

        Ok(delivered)
    }

    /// Delete the temporary directory and end the run.
    pub fn remove(mut self) -> Result<(), PipelineError> {
        match self.package.take() {
            Some(package) => {
                let temp = package.temp_path().to_path_buf();
                package
                    .remove()
                    .map_err(|e| PipelineError::io(format!("removing {}", temp.display()), e))
            }
            None => Ok(()),
        }
    }

    fn transition<F>(&mut self, state: RunState, on_event: &mut F)
    where
        F: FnMut(Event),
    {
        log::debug!("{} -> {}", self.state, state);
        self.state = state;
        on_event(Event::StateChanged(state));
    }
}

/// Move a file, replacing the destination.
///
/// Falls back to copy and delete when a rename is not possible (for example
/// across volumes).
fn move_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let copy = || -> io::Result<()> {
        fs::copy(from, to)?;
        fs::remove_file(from)
    };
    copy().map_err(|e| {
        PipelineError::io(
            format!("moving {} to {}", from.display(), to.display()),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn options_require_a_selection() {
        let none = Options::default();
        assert!(matches!(
            none.validate(None),
            Err(PipelineError::NoOptionSelected)
        ));
    }

    #[test]
    fn installer_requires_destination() {
        let options = Options {
            fix_icon: false,
            create_installer: true,
        };
        assert!(matches!(
            options.validate(None),
            Err(PipelineError::NoDestinationSelected)
        ));
        assert!(options.validate(Some(Path::new("out.exe"))).is_ok());
    }

    #[test]
    fn fix_icon_alone_needs_no_destination() {
        let options = Options {
            fix_icon: true,
            create_installer: false,
        };
        assert!(options.validate(None).is_ok());
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());
        clone.cancel();
        assert!(matches!(flag.check(), Err(PipelineError::Cancelled)));
        flag.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn move_file_replaces_destination() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("built.exe");
        let to = dir.path().join("dest.exe");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn state_display() {
        assert_eq!(
            RunState::Running(Step::CreateInstaller).to_string(),
            "Running (creating installer)"
        );
        assert_eq!(RunState::Ready.to_string(), "Ready");
    }
}
