//! Write operations: job submission

pub mod submit_export;
pub mod submit_import;

pub use submit_export::{SubmitExportCommand, SubmitExportError, SubmitExportResponse};
pub use submit_import::{SubmitImportCommand, SubmitImportError, SubmitImportResponse};
