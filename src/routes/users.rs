use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{Actor, Role, User},
    error::AppResult,
    routes::format_timestamp,
    services::users::{Registration, UserUpdate},
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl From<RegisterUserRequest> for Registration {
    fn from(payload: RegisterUserRequest) -> Self {
        Registration {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role: payload.role,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            active: user.active,
            created_at: format_timestamp(user.created_at),
            updated_at: format_timestamp(user.updated_at),
        }
    }
}

pub async fn self_register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state.users.register_self(payload.into())?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let user = state.users.create(&actor, payload.into())?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.users.list(&actor)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state.users.update(
        &actor,
        user_id,
        UserUpdate {
            name: payload.name,
            email: payload.email,
            role: payload.role,
            password: payload.password,
        },
    )?;
    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.users.delete(&actor, user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.users.activate(&actor, user_id)?;
    Ok(Json(user.into()))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.users.deactivate(&actor, user_id)?;
    Ok(Json(user.into()))
}
