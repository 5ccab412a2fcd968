//! Sales pipeline handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::pipelines::{
    AddNoteRequest, FollowRequest, PipelineDetailQuery, PipelineDetailResponse,
    PipelineListItemResponse, PipelineStateResponse, StageCountResponse, SweepRequest,
    SweepResponse, UpdateStageRequest,
};
use crate::dtos::MessageResponse;
use crate::models::PipelineHistoryEntry;
use crate::services::PipelineFilter;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// GET /pipelines
pub async fn pipeline_list(
    State(state): State<AppState>,
    Query(filter): Query<PipelineFilter>,
) -> Result<Json<Vec<PipelineListItemResponse>>, AppError> {
    let items = state.service.pipeline_list(&filter).await?;
    Ok(Json(
        items
            .into_iter()
            .map(PipelineListItemResponse::from)
            .collect(),
    ))
}

/// GET /pipelines/summary
pub async fn pipeline_summary(
    State(state): State<AppState>,
    Query(filter): Query<PipelineFilter>,
) -> Result<Json<Vec<StageCountResponse>>, AppError> {
    let counts = state.service.pipeline_summary(&filter).await?;
    Ok(Json(counts.into_iter().map(StageCountResponse::from).collect()))
}

/// GET /pipelines/invoice/:invoice_id
pub async fn pipeline_detail(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<PipelineDetailQuery>,
) -> Result<Json<PipelineDetailResponse>, AppError> {
    let detail = state
        .service
        .pipeline_detail(invoice_id, query.user_id)
        .await?;
    Ok(Json(detail.into()))
}

/// POST /pipelines/invoice/:invoice_id/status
pub async fn update_pipeline_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStageRequest>,
) -> Result<Json<PipelineStateResponse>, AppError> {
    let actor = req.actor.actor()?;
    let (pipeline, effective_stage) = state
        .service
        .update_pipeline_status(invoice_id, &req.stage, req.note, &actor)
        .await?;
    Ok(Json(PipelineStateResponse {
        pipeline,
        effective_stage,
    }))
}

/// POST /pipelines/invoice/:invoice_id/note
pub async fn add_pipeline_note(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddNoteRequest>,
) -> Result<(StatusCode, Json<PipelineHistoryEntry>), AppError> {
    let actor = req.actor.actor()?;
    let entry = state
        .service
        .add_pipeline_note(invoice_id, req.stage.as_deref(), req.note, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

fn follower(req: &FollowRequest) -> Result<Uuid, AppError> {
    req.user_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("user_id is required")))
}

/// POST /pipelines/invoice/:invoice_id/follow
pub async fn follow_pipeline(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<FollowRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let user_id = follower(&req)?;
    if state.service.follow_pipeline(invoice_id, user_id).await? {
        Ok((StatusCode::CREATED, Json(MessageResponse::new("following"))))
    } else {
        Ok((StatusCode::OK, Json(MessageResponse::new("already following"))))
    }
}

/// POST /pipelines/invoice/:invoice_id/unfollow
pub async fn unfollow_pipeline(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<FollowRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = follower(&req)?;
    state.service.unfollow_pipeline(invoice_id, user_id).await?;
    Ok(Json(MessageResponse::new("unfollowed")))
}

/// POST /pipelines/escalations/sweep
pub async fn sweep_escalations(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SweepRequest>,
) -> Result<Json<SweepResponse>, AppError> {
    let actor = req.actor.actor()?;
    let escalated = state.service.sweep_escalations(&actor).await?;
    Ok(Json(SweepResponse { escalated }))
}
