//! Running a job off the calling thread.
//!
//! The worker takes ownership of the run for the duration of the job and
//! streams events back over a channel. Joining the worker returns the run, or
//! `None` when the job discarded it.

use super::{Event, Options, Run};
use crate::error::PipelineError;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Work to perform on a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Extract,
    Execute {
        options: Options,
        destination: Option<PathBuf>,
    },
}

/// Handle to a job in progress
#[derive(Debug)]
pub struct Worker {
    events: mpsc::Receiver<Event>,
    handle: JoinHandle<Option<Run>>,
}

/// Start `job` on a background thread.
pub fn spawn(mut run: Run, job: Job) -> Worker {
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let send = |event: Event| {
            // Receiver may be gone if the caller stopped listening
            let _ = tx.send(event);
        };
        match job {
            Job::Extract => match run.extract(send) {
                Ok(()) => Some(run),
                Err(_) => None,
            },
            Job::Execute {
                options,
                destination,
            } => {
                let _ = run.execute(options, destination.as_deref(), send);
                Some(run)
            }
        }
    });

    Worker { events: rx, handle }
}

impl Worker {
    /// Events received so far, without blocking
    pub fn try_events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }

    /// Block for the next event. `None` once the job has ended and every
    /// event has been delivered.
    pub fn recv(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    /// Whether the job's thread has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to end and take back the run.
    pub fn join(self) -> Result<Option<Run>, PipelineError> {
        self.handle
            .join()
            .map_err(|_| PipelineError::InvalidState("worker thread panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::patcher::IconBackend;
    use crate::pipeline::{Outcome, RunState};
    use std::fs;
    use tempfile::tempdir;

    fn test_config() -> Config {
        Config {
            icon_backend: IconBackend::Embedded,
            installer_compiler: PathBuf::from("no-such-iscc"),
            reveal_output: false,
            work_dir: None,
        }
    }

    #[test]
    fn failed_extract_discards_run() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let worker = spawn(Run::new(&archive, test_config()), Job::Extract);
        let mut events = Vec::new();
        while let Some(event) = worker.recv() {
            events.push(event);
        }

        assert_eq!(events[0], Event::StateChanged(RunState::Extracting));
        assert_eq!(
            events[events.len() - 2],
            Event::StateChanged(RunState::Failed)
        );
        match events.last() {
            Some(Event::Finished(Outcome::Failed { discarded, .. })) => assert!(discarded),
            other => panic!("Expected Failed outcome, got {:?}", other),
        }
        assert!(worker.join().unwrap().is_none());
    }

    #[test]
    fn execute_before_extract_keeps_run() {
        let dir = tempdir().unwrap();
        let worker = spawn(
            Run::new(dir.path().join("a.zip"), test_config()),
            Job::Execute {
                options: Options::all(),
                destination: Some(dir.path().join("out.exe")),
            },
        );

        // Rejected up front, so nothing is emitted
        assert!(worker.recv().is_none());
        let run = worker.join().unwrap().unwrap();
        assert_eq!(run.state(), RunState::Idle);
    }
}
