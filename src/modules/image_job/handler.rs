use super::dto::{CreateJobResponse, JobStatusResponse};
use super::service::{parse_parameters, ImageJobService};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::{read_image_field, ImageUpload};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

/// Submit an image for processing
///
/// Multipart form with a `file` part (image/*) and an optional `params` part
/// holding the JSON transform parameters.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Job accepted", body = ApiResponse<CreateJobResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Jobs"
)]
pub async fn create_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload: Option<ImageUpload> = None;
    let mut raw_params: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return ApiError::bad_request(e).into_response(),
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => match read_image_field(field, state.config.max_upload_bytes).await {
                Ok(file) => upload = Some(file),
                Err(e) => return ApiError::bad_request(e).into_response(),
            },
            "params" => match field.text().await {
                Ok(text) => raw_params = Some(text),
                Err(e) => return ApiError::bad_request(e).into_response(),
            },
            _ => {}
        }
    }

    let Some(upload) = upload else {
        return ApiError::bad_request("No file field found in multipart request").into_response();
    };

    let params = match parse_parameters(raw_params.as_deref()) {
        Ok(params) => params,
        Err(e) => return ApiError::from(e).into_response(),
    };

    info!("Received {} ({} bytes)", upload.file_name, upload.data.len());

    match ImageJobService::create_and_submit(state, upload, params).await {
        Ok(job) => ApiSuccess::accepted(job, "Job accepted").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Get job status
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job status", body = ApiResponse<JobStatusResponse>),
        (status = 404, description = "Job not found")
    ),
    tag = "Jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match ImageJobService::get_status(state, id).await {
        Ok(job) => ApiSuccess::ok(job, "Job retrieved successfully").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
