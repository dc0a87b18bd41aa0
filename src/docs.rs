use utoipa::OpenApi;
use crate::modules::dispatch::dto::*;
use crate::modules::jobs::dto::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::get_job,
        crate::modules::jobs::handler::update_status,
        crate::modules::dispatch::handler::object_created,
        crate::modules::dispatch::handler::admission,
    ),
    components(
        schemas(
            JobResponse, StatusUpdateRequest, StatusUpdateResponse,
            ObjectCreatedNotification, EventRecord, S3Entity, S3Bucket, S3Object,
            NotificationResponse, RecordResult, RecordOutcome,
            crate::modules::dispatch::admission::AdmissionSnapshot,
            crate::modules::jobs::model::JobStatus,
            crate::modules::jobs::model::JobMetadata,
            crate::modules::jobs::events::ReportedStatus,
        )
    ),
    tags(
        (name = "Jobs", description = "Job records and worker status callbacks"),
        (name = "Dispatch", description = "Upload notifications and admission state")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
