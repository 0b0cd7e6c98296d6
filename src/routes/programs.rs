use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::OptionalActor,
    domain::{Actor, Program, ProgramInput},
    error::AppResult,
    routes::format_timestamp,
    state::AppState,
};

#[derive(Deserialize)]
pub struct ProgramRequest {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<ProgramRequest> for ProgramInput {
    fn from(payload: ProgramRequest) -> Self {
        ProgramInput {
            name: payload.name,
            code: payload.code,
            description: payload.description,
        }
    }
}

#[derive(Serialize)]
pub struct ProgramResponse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Program> for ProgramResponse {
    fn from(program: Program) -> Self {
        Self {
            id: program.id,
            name: program.name,
            code: program.code,
            description: program.description,
            created_at: format_timestamp(program.created_at),
            updated_at: format_timestamp(program.updated_at),
        }
    }
}

pub async fn list_programs(
    State(state): State<AppState>,
    OptionalActor(actor): OptionalActor,
) -> AppResult<Json<Vec<ProgramResponse>>> {
    let programs = state.programs.list(actor.as_ref())?;
    Ok(Json(programs.into_iter().map(ProgramResponse::from).collect()))
}

pub async fn get_program(
    State(state): State<AppState>,
    OptionalActor(actor): OptionalActor,
    Path(program_id): Path<Uuid>,
) -> AppResult<Json<ProgramResponse>> {
    let program = state.programs.get(actor.as_ref(), program_id)?;
    Ok(Json(program.into()))
}

pub async fn create_program(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ProgramRequest>,
) -> AppResult<(StatusCode, Json<ProgramResponse>)> {
    let program = state.programs.create(&actor, payload.into())?;
    Ok((StatusCode::CREATED, Json(program.into())))
}

pub async fn update_program(
    State(state): State<AppState>,
    actor: Actor,
    Path(program_id): Path<Uuid>,
    Json(payload): Json<ProgramRequest>,
) -> AppResult<Json<ProgramResponse>> {
    let program = state.programs.update(&actor, program_id, payload.into())?;
    Ok(Json(program.into()))
}

pub async fn delete_program(
    State(state): State<AppState>,
    actor: Actor,
    Path(program_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.programs.delete(&actor, program_id)?;
    Ok(StatusCode::NO_CONTENT)
}
