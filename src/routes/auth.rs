use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    domain::Actor,
    error::{AppError, AppResult},
    routes::users::UserResponse,
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state.users.authenticate(&payload.email, &payload.password)?;

    let access_token = state
        .jwt
        .generate_token(user.id, &user.email, user.role)
        .map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

pub async fn me(State(state): State<AppState>, actor: Actor) -> AppResult<Json<UserResponse>> {
    let user = state.users.profile(&actor)?;
    Ok(Json(user.into()))
}
