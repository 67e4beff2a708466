//! Background workers for header reading and processing jobs.

mod job;
mod loader;

pub use job::{run_job_worker, JobWorkerConfig};
pub use loader::{load_header_worker, raster_path_for};
