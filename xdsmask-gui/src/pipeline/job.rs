//! Processing job worker.
//!
//! Launches the engine, then polls it and its output directory until it
//! finishes, fails, stalls or is cancelled from the UI.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use xdsmask_io::{ProcessingCommand, ProcessingJob, ProgressUpdate};

use crate::message::AppMessage;

/// Configuration for the job worker.
pub struct JobWorkerConfig {
    pub command: ProcessingCommand,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub timeout_polls: u32,
}

/// Run a processing job in a background thread.
pub fn run_job_worker(config: &JobWorkerConfig, tx: &Sender<AppMessage>, cancel_flag: &AtomicBool) {
    let mut job = match ProcessingJob::launch(&config.command, &config.output_dir, config.timeout_polls)
    {
        Ok(job) => job,
        Err(e) => {
            let _ = tx.send(AppMessage::JobError(e.to_string()));
            return;
        }
    };

    loop {
        if cancel_flag.load(Ordering::SeqCst) {
            let message = match job.kill() {
                Ok(()) => "Processing stopped".to_string(),
                Err(e) => format!("Could not stop processing: {e}"),
            };
            let _ = tx.send(AppMessage::JobError(message));
            return;
        }
        match job.poll() {
            Ok(ProgressUpdate::Advanced(stage)) => {
                let _ = tx.send(AppMessage::JobProgress(stage));
            }
            Ok(ProgressUpdate::Unchanged(_)) => {}
            Ok(ProgressUpdate::Finished) => {
                let _ = tx.send(AppMessage::JobFinished(job.log_path().to_path_buf()));
                return;
            }
            Ok(ProgressUpdate::TimedOut(stage)) => {
                let _ = job.kill();
                let last = stage.map_or_else(|| "start".to_string(), |s| s.to_string());
                let _ = tx.send(AppMessage::JobError(format!(
                    "No progress after {last}, processing stopped"
                )));
                return;
            }
            Err(e) => {
                let _ = tx.send(AppMessage::JobError(e.to_string()));
                return;
            }
        }
        thread::sleep(config.poll_interval);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc::channel;
    use xdsmask_io::CommandArg;

    fn worker(script: &str, output_dir: PathBuf) -> JobWorkerConfig {
        JobWorkerConfig {
            command: ProcessingCommand {
                program: PathBuf::from("sh"),
                args: vec![
                    CommandArg::Flag("-c".to_string()),
                    CommandArg::Flag(script.to_string()),
                ],
            },
            output_dir,
            poll_interval: Duration::from_millis(20),
            timeout_polls: 1000,
        }
    }

    #[test]
    fn test_worker_reports_finish() {
        let dir = tempfile::tempdir().unwrap();
        let config = worker("exit 0", dir.path().to_path_buf());
        let (tx, rx) = channel();
        run_job_worker(&config, &tx, &AtomicBool::new(false));
        let messages: Vec<_> = rx.try_iter().collect();
        assert!(matches!(messages.last(), Some(AppMessage::JobFinished(_))));
    }

    #[test]
    fn test_worker_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let config = worker("sleep 30", dir.path().to_path_buf());
        let (tx, rx) = channel();
        run_job_worker(&config, &tx, &AtomicBool::new(true));
        match rx.try_recv() {
            Ok(AppMessage::JobError(message)) => assert_eq!(message, "Processing stopped"),
            _ => panic!("expected a stop message"),
        }
    }

    #[test]
    fn test_worker_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = worker("exit 2", dir.path().to_path_buf());
        let (tx, rx) = channel();
        run_job_worker(&config, &tx, &AtomicBool::new(false));
        let messages: Vec<_> = rx.try_iter().collect();
        assert!(matches!(messages.last(), Some(AppMessage::JobError(_))));
    }
}
