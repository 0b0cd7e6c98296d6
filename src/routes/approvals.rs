use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{Actor, ApprovalState, ReviewItem},
    error::AppResult,
    routes::{documents::UNKNOWN_AUTHOR, format_timestamp},
    state::AppState,
};

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub approved: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub program_name: String,
    pub author_name: String,
    pub state: ApprovalState,
    pub comment: Option<String>,
    pub created_at: String,
}

impl From<ReviewItem> for ReviewResponse {
    fn from(item: ReviewItem) -> Self {
        Self {
            id: item.flow.id,
            document_id: item.flow.document_id,
            document_title: item.document_title,
            program_name: item.program_name,
            author_name: item
                .author_name
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            state: item.flow.state,
            comment: item.flow.comment,
            created_at: format_timestamp(item.flow.created_at),
        }
    }
}

pub async fn list_pending(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<ReviewResponse>>> {
    let items = state.approvals.list_pending(&actor)?;
    Ok(Json(items.into_iter().map(ReviewResponse::from).collect()))
}

pub async fn decide(
    State(state): State<AppState>,
    actor: Actor,
    Path(flow_id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> AppResult<StatusCode> {
    state
        .approvals
        .decide(&actor, flow_id, payload.approved, payload.comment)?;
    Ok(StatusCode::NO_CONTENT)
}
