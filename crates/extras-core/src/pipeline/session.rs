//! At most one open run per session.
//!
//! A session owns the current run (or the worker holding it). Opening a
//! second archive while one is open is refused; the caller has to close the
//! first.

use super::worker::{self, Job, Worker};
use super::{CancelFlag, Event, Options, Outcome, Run, RunState};
use crate::config::Config;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Session {
    config: Config,
    cancel: CancelFlag,
    run: Option<Run>,
    worker: Option<Worker>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self::with_cancel_flag(config, CancelFlag::new())
    }

    pub fn with_cancel_flag(config: Config, cancel: CancelFlag) -> Self {
        Session {
            config,
            cancel,
            run: None,
            worker: None,
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Whether a job is in flight
    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.run.is_some() || self.worker.is_some()
    }

    /// State of the current run, `None` when nothing is open or a job holds it
    pub fn state(&self) -> Option<RunState> {
        self.run.as_ref().map(|r| r.state())
    }

    pub fn extracted_root(&self) -> Option<&Path> {
        self.run.as_ref().and_then(|r| r.extracted_root())
    }

    /// Start extracting `archive` in the background.
    pub fn open(&mut self, archive: impl Into<PathBuf>) -> Result<(), PipelineError> {
        if self.is_open() {
            return Err(PipelineError::AlreadyOpen);
        }
        let run = Run::with_cancel_flag(archive, self.config.clone(), self.cancel.clone());
        self.worker = Some(worker::spawn(run, Job::Extract));
        Ok(())
    }

    /// Start the selected steps in the background.
    ///
    /// Options are validated here, before anything is handed to the worker.
    pub fn execute(
        &mut self,
        options: Options,
        destination: Option<PathBuf>,
    ) -> Result<(), PipelineError> {
        options.validate(destination.as_deref())?;
        if self.worker.is_some() {
            return Err(PipelineError::InvalidState("a job is already running".to_string()));
        }
        let run = match self.run.take() {
            Some(run) => run,
            None => return Err(PipelineError::InvalidState("no archive is open".to_string())),
        };
        if run.state() != RunState::Ready {
            let state = run.state();
            self.run = Some(run);
            return Err(PipelineError::InvalidState(format!(
                "cannot run steps while {}",
                state
            )));
        }
        self.worker = Some(worker::spawn(
            run,
            Job::Execute {
                options,
                destination,
            },
        ));
        Ok(())
    }

    /// Block until the current job ends, passing every event to `on_event`.
    ///
    /// Returns the job's outcome. After success of an execute job the run is
    /// closed and its temporary directory removed.
    pub fn wait<F>(&mut self, mut on_event: F) -> Result<Outcome, PipelineError>
    where
        F: FnMut(&Event),
    {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return Err(PipelineError::InvalidState("no job is running".to_string())),
        };

        let mut outcome = None;
        while let Some(event) = worker.recv() {
            on_event(&event);
            if let Event::Finished(o) = event {
                outcome = Some(o);
            }
        }
        self.settle(worker, outcome)
    }

    /// Deliver pending events without blocking.
    ///
    /// Returns the outcome once the job has ended, `None` while it is still
    /// running or when there is no job.
    pub fn poll<F>(&mut self, mut on_event: F) -> Result<Option<Outcome>, PipelineError>
    where
        F: FnMut(&Event),
    {
        let Some(worker) = &self.worker else {
            return Ok(None);
        };
        let mut outcome = None;
        for event in worker.try_events() {
            on_event(&event);
            if let Event::Finished(o) = event {
                outcome = Some(o);
            }
        }
        if outcome.is_none() && !worker.is_finished() {
            return Ok(None);
        }

        let Some(worker) = self.worker.take() else {
            return Ok(None);
        };
        for event in worker.try_events() {
            on_event(&event);
            if let Event::Finished(o) = event {
                outcome = Some(o);
            }
        }
        self.settle(worker, outcome).map(Some)
    }

    fn settle(&mut self, worker: Worker, outcome: Option<Outcome>) -> Result<Outcome, PipelineError> {
        self.run = worker.join()?;
        let outcome = match outcome {
            Some(outcome) => outcome,
            // Rejected before any event was sent
            None => {
                return Err(PipelineError::InvalidState(
                    "job ended without an outcome".to_string(),
                ));
            }
        };
        if let Outcome::Succeeded { .. } = outcome {
            self.close()?;
        }
        Ok(outcome)
    }

    /// Close the current run and delete its temporary directory.
    ///
    /// Waits for a running job first.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        if let Some(worker) = self.worker.take() {
            while worker.recv().is_some() {}
            self.run = worker.join()?;
        }
        match self.run.take() {
            Some(run) => run.remove(),
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to clean up: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patcher::IconBackend;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn test_config() -> Config {
        Config {
            icon_backend: IconBackend::Embedded,
            installer_compiler: PathBuf::from("no-such-iscc"),
            reveal_output: false,
            work_dir: None,
        }
    }

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(fs::File::create(path).unwrap());
        for (name, data) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn second_open_is_refused() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip(&archive, &[("app/resources.pak", b"pak")]);

        let mut session = Session::new(test_config());
        session.open(&archive).unwrap();
        assert!(matches!(
            session.open(&archive),
            Err(PipelineError::AlreadyOpen)
        ));

        let outcome = session.wait(|_| {}).unwrap();
        assert!(matches!(outcome, Outcome::Extracted { .. }));
        assert_eq!(session.state(), Some(RunState::Ready));
        assert!(matches!(
            session.open(&archive),
            Err(PipelineError::AlreadyOpen)
        ));
    }

    #[test]
    fn close_removes_temp_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip(&archive, &[("app/resources.pak", b"pak")]);

        let mut session = Session::new(test_config());
        session.open(&archive).unwrap();
        session.wait(|_| {}).unwrap();
        let root = session.extracted_root().unwrap().to_path_buf();
        assert!(root.exists());

        session.close().unwrap();
        assert!(!root.exists());
        assert!(!session.is_open());
        session.open(&archive).unwrap();
        session.wait(|_| {}).unwrap();
    }

    #[test]
    fn failed_open_frees_the_session() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip(&archive, &[("app/readme.txt", b"no marker")]);
        let work = tempdir().unwrap();
        let mut config = test_config();
        config.work_dir = Some(work.path().to_path_buf());

        let mut session = Session::new(config);
        session.open(&archive).unwrap();
        let outcome = session.wait(|_| {}).unwrap();

        assert!(matches!(outcome, Outcome::Failed { discarded: true, .. }));
        assert!(!session.is_open());
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn close_empties_work_dir() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip(&archive, &[("app/resources.pak", b"pak")]);
        let work = tempdir().unwrap();
        let mut config = test_config();
        config.work_dir = Some(work.path().to_path_buf());

        let mut session = Session::new(config);
        session.open(&archive).unwrap();
        session.wait(|_| {}).unwrap();
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 1);

        session.close().unwrap();
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn execute_validates_before_spawning() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip(&archive, &[("app/resources.pak", b"pak")]);

        let mut session = Session::new(test_config());
        session.open(&archive).unwrap();
        session.wait(|_| {}).unwrap();

        assert!(matches!(
            session.execute(Options::default(), None),
            Err(PipelineError::NoOptionSelected)
        ));
        assert!(matches!(
            session.execute(Options::all(), None),
            Err(PipelineError::NoDestinationSelected)
        ));
        assert!(!session.is_busy());
        assert_eq!(session.state(), Some(RunState::Ready));
    }

    #[test]
    fn execute_without_archive() {
        let mut session = Session::new(test_config());
        let options = Options {
            fix_icon: true,
            create_installer: false,
        };
        assert!(matches!(
            session.execute(options, None),
            Err(PipelineError::InvalidState(_))
        ));
    }
}
