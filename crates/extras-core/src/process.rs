//! Running external tools with captured output.

use crate::error::PipelineError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

/// Windows process creation flag that keeps console tools from opening a window
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// stdin is an empty pipe. With `check` set, a non-zero exit is returned as
/// [`PipelineError::SubprocessNonZeroExit`]; without it the status is
/// returned unexamined. Output is logged, never printed.
pub fn run_command<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    check: bool,
) -> Result<CommandOutput, PipelineError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let argv: Vec<String> = std::iter::once(program.as_os_str())
        .chain(args.iter().map(|a| AsRef::<OsStr>::as_ref(a)))
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    let output = command
        .output()
        .map_err(|e| PipelineError::io(format!("failed to run {}", program.display()), e))?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    log::info!("Command {:?} finished with code {:?}", argv, result.code);
    if !result.stdout.is_empty() {
        log::debug!("stdout:\n{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        log::debug!("stderr:\n{}", result.stderr);
    }

    if check && !result.success() {
        return Err(PipelineError::SubprocessNonZeroExit {
            program: program.display().to_string(),
            code: result.code,
            stderr: result.stderr,
        });
    }

    Ok(result)
}
