use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub mod approvals;
pub mod auth;
pub mod documents;
pub mod health;
pub mod programs;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = build_cors(state.config.cors_allowed_origin.as_deref());
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/self-register", post(users::self_register))
        .route("/:id", put(users::update_user).delete(users::delete_user))
        .route("/:id/activate", patch(users::activate_user))
        .route("/:id/deactivate", patch(users::deactivate_user));

    let programs_routes = Router::new()
        .route("/", get(programs::list_programs).post(programs::create_program))
        .route(
            "/:id",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        );

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route("/download/:id", get(documents::download_document))
        .route(
            "/:id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/:id/summary", post(documents::summarize_document));

    let approvals_routes = Router::new()
        .route("/pending", get(approvals::list_pending))
        .route("/:id", patch(approvals::decide));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", users_routes)
        .nest("/api/programs", programs_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/approvals", approvals_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(body_limit)
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub(crate) fn format_timestamp(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).to_rfc3339()
}
