use super::dto::{JobResponse, StatusUpdateRequest, StatusUpdateResponse};
use crate::common::error::{DispatchError, DispatchResult};
use crate::modules::dispatch::completion::{CompletionHandler, StatusOutcome};
use crate::state::AppState;
use uuid::Uuid;

pub struct JobService;

impl JobService {
    pub async fn find_by_id(state: AppState, id: Uuid) -> DispatchResult<JobResponse> {
        let job = state
            .scheduler
            .jobs
            .get(id)
            .await?
            .ok_or(DispatchError::JobNotFound(id))?;

        Ok(JobResponse::from(job))
    }

    pub async fn update_status(
        state: AppState,
        id: Uuid,
        req: StatusUpdateRequest,
    ) -> DispatchResult<StatusUpdateResponse> {
        let outcome = CompletionHandler::handle(&state.scheduler, req.into_event(id)).await?;

        Ok(StatusUpdateResponse {
            job_id: id,
            applied: outcome == StatusOutcome::Applied,
        })
    }
}
