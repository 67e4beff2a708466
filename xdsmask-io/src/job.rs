//! Launching and supervising the processing engine.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};

use crate::command::ProcessingCommand;
use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, ProgressUpdate};

/// Log file the engine's stdout and stderr are redirected to.
pub const JOB_LOG_FILE: &str = "xdsmask_process.log";

/// A running processing job and its progress tracker.
#[derive(Debug)]
pub struct ProcessingJob {
    child: Child,
    program: String,
    log_path: PathBuf,
    tracker: ProgressTracker,
}

impl ProcessingJob {
    /// Creates the output directory and spawns the engine.
    ///
    /// # Errors
    /// `Io` if the directory, log file or process cannot be created.
    pub fn launch(command: &ProcessingCommand, output_dir: &Path, timeout_polls: u32) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        let log_path = output_dir.join(JOB_LOG_FILE);
        let log = File::create(&log_path)?;
        let err_log = log.try_clone()?;
        log::debug!("{}", command.display_line());
        let child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(err_log)
            .spawn()?;
        log::info!(
            "started {} (pid {}), log in {}",
            command.program.display(),
            child.id(),
            log_path.display()
        );
        Ok(Self {
            child,
            program: command.program.display().to_string(),
            log_path,
            tracker: ProgressTracker::new(output_dir, timeout_polls),
        })
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Exit status if the process has ended.
    ///
    /// # Errors
    /// `Io` if the process state cannot be queried.
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// One supervision step: process state first, then stage markers.
    ///
    /// A process that exits unsuccessfully is `ToolFailed`; one that exits
    /// cleanly counts as finished even if the last marker is missing.
    ///
    /// # Errors
    /// `ToolFailed` on abnormal exit, `Io` if the process cannot be queried.
    pub fn poll(&mut self) -> Result<ProgressUpdate> {
        if let Some(status) = self.try_status()? {
            if !status.success() {
                return Err(Error::ToolFailed {
                    program: self.program.clone(),
                    status: status.to_string(),
                    stderr: format!("see {}", self.log_path.display()),
                });
            }
            self.tracker.poll();
            log::info!("{} finished", self.program);
            return Ok(ProgressUpdate::Finished);
        }
        Ok(self.tracker.poll())
    }

    /// Terminates the process.
    ///
    /// # Errors
    /// `Io` if the signal cannot be delivered.
    pub fn kill(&mut self) -> Result<()> {
        log::warn!("terminating {}", self.program);
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::command::{CommandArg, ProcessingCommand};
    use std::time::Duration;

    fn shell(script: &str) -> ProcessingCommand {
        ProcessingCommand {
            program: PathBuf::from("sh"),
            args: vec![CommandArg::Flag("-c".to_string()), CommandArg::Flag(script.to_string())],
        }
    }

    fn wait_for(job: &mut ProcessingJob) -> Result<ProgressUpdate> {
        for _ in 0..200 {
            match job.poll()? {
                ProgressUpdate::Finished => return Ok(ProgressUpdate::Finished),
                _ => std::thread::sleep(Duration::from_millis(25)),
            }
        }
        job.poll()
    }

    #[test]
    fn test_successful_job_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("proc");
        let mut job = ProcessingJob::launch(&shell("echo hello"), &out, 1000).unwrap();
        assert_eq!(wait_for(&mut job).unwrap(), ProgressUpdate::Finished);
        let log = fs::read_to_string(job.log_path()).unwrap();
        assert_eq!(log.trim(), "hello");
    }

    #[test]
    fn test_failing_job_reports_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = ProcessingJob::launch(&shell("exit 3"), dir.path(), 1000).unwrap();
        let result = wait_for(&mut job);
        assert!(matches!(result, Err(Error::ToolFailed { .. })));
    }
}
