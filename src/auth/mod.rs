pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::{domain::Actor, error::AppError, state::AppState};

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        Ok(Actor::from(claims))
    }
}

/// Caller identity for routes that also serve anonymous requests. A missing
/// header yields `None`; a present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalActor(pub Option<Actor>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts
            .headers
            .contains_key(axum::http::header::AUTHORIZATION)
        {
            return Ok(OptionalActor(None));
        }

        Actor::from_request_parts(parts, state)
            .await
            .map(|actor| OptionalActor(Some(actor)))
    }
}
