use std::fmt;
use std::io;
use std::path::PathBuf;

/// Error type for every stage of a run.
#[derive(Debug)]
pub enum PipelineError {
    /// Archive is empty, unsafe, has no common root, or lacks the marker file
    InvalidArchive { reason: String },
    /// No suitable executable in the package root
    ExecutableNotFound { dir: PathBuf },
    /// Icon image referenced by the manifest (or the default) does not exist
    IconAssetMissing { path: PathBuf },
    /// Icon image could not be decoded or re-encoded as .ico
    IconConversionError { path: PathBuf, reason: String },
    /// Replacing the executable's icon failed
    IconPatchFailed { executable: PathBuf, reason: String },
    /// Entry document has no <title> tag
    TitleNotFound { document: PathBuf },
    /// Installer compiler failed or produced nothing
    InstallerBuildFailed { reason: String },
    /// Neither fixing the icon nor creating an installer was selected
    NoOptionSelected,
    /// Installer requested without a destination
    NoDestinationSelected,
    /// External tool exited with a non-zero status
    SubprocessNonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    /// package.json unreadable, malformed, or missing a required field
    ManifestError { path: PathBuf, reason: String },
    /// Filesystem error
    Io { context: String, source: io::Error },
    /// Cancellation was requested between stages
    Cancelled,
    /// A project is already open in this session
    AlreadyOpen,
    /// Operation not allowed in the current state
    InvalidState(String),
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_archive(reason: impl Into<String>) -> Self {
        PipelineError::InvalidArchive {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidArchive { reason } => {
                write!(f, "invalid archive: {}", reason)
            }
            PipelineError::ExecutableNotFound { dir } => {
                write!(f, "cannot find executable in {}", dir.display())
            }
            PipelineError::IconAssetMissing { path } => {
                write!(f, "icon not found: {}", path.display())
            }
            PipelineError::IconConversionError { path, reason } => {
                write!(f, "failed to convert icon {}: {}", path.display(), reason)
            }
            PipelineError::IconPatchFailed { executable, reason } => {
                write!(
                    f,
                    "failed to set icon of {}: {}",
                    executable.display(),
                    reason
                )
            }
            PipelineError::TitleNotFound { document } => {
                write!(f, "no <title> found in {}", document.display())
            }
            PipelineError::InstallerBuildFailed { reason } => {
                write!(f, "installer build failed: {}", reason)
            }
            PipelineError::NoOptionSelected => {
                write!(f, "you have to select at least one option")
            }
            PipelineError::NoDestinationSelected => {
                write!(f, "no installer destination selected")
            }
            PipelineError::SubprocessNonZeroExit {
                program,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "{} exited with code {}", program, code)?,
                    None => write!(f, "{} terminated by signal", program)?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            PipelineError::ManifestError { path, reason } => {
                write!(f, "manifest error in {}: {}", path.display(), reason)
            }
            PipelineError::Io { context, source } => {
                write!(f, "{}: {}", context, source)
            }
            PipelineError::Cancelled => write!(f, "cancelled"),
            PipelineError::AlreadyOpen => write!(f, "Already have a file open"),
            PipelineError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_exit_includes_trimmed_stderr() {
        let err = PipelineError::SubprocessNonZeroExit {
            program: "iscc.exe".to_string(),
            code: Some(2),
            stderr: "  bad script\n".to_string(),
        };
        assert_eq!(err.to_string(), "iscc.exe exited with code 2: bad script");
    }

    #[test]
    fn nonzero_exit_without_stderr() {
        let err = PipelineError::SubprocessNonZeroExit {
            program: "rcedit".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "rcedit terminated by signal");
    }

    #[test]
    fn io_error_exposes_source() {
        use std::error::Error;

        let err = PipelineError::io(
            "reading package.json",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "reading package.json: gone");
    }
}
