//! Batch routes
//!
//! Submission endpoints answer 202 with the queued job id; the actual work
//! happens in the worker pool and results surface through the notification
//! socket, the download endpoint and the job status endpoint.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::commands::{
    submit_export::{handle as handle_submit_export, SubmitExportCommand, SubmitExportError},
    submit_import::{handle as handle_submit_import, SubmitImportCommand, SubmitImportError},
};
use super::queries::{download_artifact, get_job};
use crate::api::{response::ApiResponse, AppState};
use crate::error::AppError;

/// Create batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(submit_import))
        .route("/export", post(submit_export))
        .route("/download/:job_id", get(download))
        .route("/jobs/:job_id", get(job_status))
}

/// Queue a CSV import
///
/// POST /batch/import (multipart, field `file`)
async fn submit_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut csv_data: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            csv_data = Some(
                field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?,
            );
            break;
        }
    }

    let csv_data =
        csv_data.ok_or_else(|| AppError::BadRequest("Missing multipart field 'file'".to_string()))?;

    let command = SubmitImportCommand { csv_data };
    match handle_submit_import(&state.queue, &state.config.batch, command).await {
        Ok(response) => {
            Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
        }
        Err(SubmitImportError::EmptyFile) => {
            Err(AppError::Validation("Uploaded file is empty".to_string()))
        }
        Err(SubmitImportError::Database(e)) => Err(AppError::Database(e)),
    }
}

/// Queue a vehicle export
///
/// POST /batch/export  {"min_age": 10}
async fn submit_export(
    State(state): State<AppState>,
    Json(command): Json<SubmitExportCommand>,
) -> Result<Response, AppError> {
    match handle_submit_export(&state.queue, command).await {
        Ok(response) => {
            Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
        }
        Err(e @ SubmitExportError::NegativeAge(_)) => Err(AppError::Validation(e.to_string())),
        Err(SubmitExportError::Database(e)) => Err(AppError::Database(e)),
    }
}

/// Download a finished export artifact
///
/// GET /batch/download/:job_id
async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let artifact = download_artifact::handle(&state.cache, job_id)
        .await
        .ok_or_else(|| AppError::NotFound("Export file not found or has expired".to_string()))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_artifact::artifact_filename(job_id)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.as_str().to_owned(),
    )
        .into_response())
}

/// Look up a job's status and attempt history
///
/// GET /batch/jobs/:job_id
async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = get_job::handle(&state.queue, job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    Ok(ApiResponse::success(record).into_response())
}
