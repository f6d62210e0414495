//! Batch feature: CSV import/export job submission, artifact download and
//! job status lookup

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::batch_routes;
