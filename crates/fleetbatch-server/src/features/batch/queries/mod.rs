//! Read operations: artifact download and job status

pub mod download_artifact;
pub mod get_job;
