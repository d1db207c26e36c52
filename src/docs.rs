use utoipa::OpenApi;
use crate::modules::image_job::dto::{CreateJobResponse, JobStatusResponse};
use crate::modules::image_job::model::JobStatus;
use crate::modules::image_job::params::{CompressionParams, CropParams, ResizeParams, TransformParameters};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::image_job::handler::create_job,
        crate::modules::image_job::handler::get_job,
    ),
    components(
        schemas(
            CreateJobResponse, JobStatusResponse, JobStatus,
            TransformParameters, ResizeParams, CropParams, CompressionParams,
        )
    ),
    tags(
        (name = "Jobs", description = "Asynchronous image processing jobs")
    )
)]
pub struct ApiDoc;
