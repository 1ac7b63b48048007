use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::{AppError, AppResult};
use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod cases;
pub mod deadlines;
pub mod documents;
pub mod health;
pub mod invitations;
pub mod messages;
pub mod participants;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me).patch(auth::update_me));

    let cases_routes = Router::new()
        .route("/", get(cases::list_cases).post(cases::create_case))
        .route("/stats", get(cases::case_stats))
        .route(
            "/:id",
            get(cases::get_case)
                .patch(cases::update_case)
                .delete(cases::delete_case),
        )
        .route(
            "/:id/participants",
            get(participants::list_participants).post(participants::add_participant),
        )
        .route(
            "/:id/participants/:user_id",
            axum::routing::delete(participants::remove_participant),
        )
        .route("/:id/permissions", get(participants::participant_permissions))
        .route("/:id/invitations", post(invitations::create_invitation))
        .route(
            "/:id/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/:id/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/:id/events", get(messages::case_events))
        .route(
            "/:id/deadlines",
            get(deadlines::list_deadlines).post(deadlines::create_deadline),
        );

    let documents_routes = Router::new()
        .route("/:id/download", get(documents::download_document))
        .route("/:id", axum::routing::delete(documents::delete_document));

    let deadlines_routes = Router::new()
        .route("/upcoming", get(deadlines::upcoming_deadlines))
        .route(
            "/:id",
            axum::routing::patch(deadlines::update_deadline)
                .delete(deadlines::delete_deadline),
        );

    let invitations_routes = Router::new().route("/accept", post(invitations::accept_invitation));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/cases", cases_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/deadlines", deadlines_routes)
        .nest("/api/invitations", invitations_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 50))
}

pub(crate) fn to_iso(timestamp: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(timestamp, Utc).to_rfc3339()
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> AppResult<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.naive_utc())
        .map_err(|_| AppError::bad_request(format!("{field} must be an RFC 3339 timestamp")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_rfc3339("due_date", "2026-03-01T12:00:00-05:00").unwrap();
        assert_eq!(to_iso(parsed), "2026-03-01T17:00:00+00:00");
    }

    #[test]
    fn rejects_bare_dates() {
        let err = parse_rfc3339("due_date", "2026-03-01").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
