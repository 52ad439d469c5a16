use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod attachments;
pub mod auth;
pub mod health;
pub mod referrals;
pub mod topics;
pub mod units;
pub mod urgencies;
pub mod users;

const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 100;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_deref() {
        Some(origins) => AllowOrigin::list(parse_origins(origins)),
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let users_routes = Router::new().route("/", get(users::list_users).post(users::create_user));

    let units_routes = Router::new()
        .route("/", get(units::list_units).post(units::create_unit))
        .route("/:id", get(units::get_unit))
        .route("/:id/members", post(units::add_member))
        .route("/:id/members/:user_id", delete(units::remove_member))
        .route("/:id/topics", get(units::list_unit_topics))
        .route("/:id/referrals", get(units::unit_inbox));

    let topics_routes =
        Router::new().route("/", get(topics::list_topics).post(topics::create_topic));

    let urgencies_routes = Router::new().route(
        "/",
        get(urgencies::list_urgencies).post(urgencies::create_urgency),
    );

    let referrals_routes = Router::new()
        .route(
            "/",
            get(referrals::list_referrals).post(referrals::create_referral),
        )
        .route("/:id", get(referrals::get_referral))
        .route("/:id/answer", post(referrals::answer_referral))
        .route("/:id/assign", post(referrals::assign_referral))
        .route("/:id/unassign", post(referrals::unassign_referral))
        .route("/:id/activities", get(referrals::list_activities));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/users", users_routes)
        .nest("/api/units", units_routes)
        .nest("/api/topics", topics_routes)
        .nest("/api/urgencies", urgencies_routes)
        .nest("/api/referrals", referrals_routes)
        .route(
            "/api/referral-attachments/:id",
            get(attachments::download_referral_attachment),
        )
        .route(
            "/api/referral-answer-attachments/:id",
            get(attachments::download_answer_attachment),
        )
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins = parse_origins("https://a.example, ,https://b.example ");
        assert_eq!(
            origins,
            vec![
                HeaderValue::from_static("https://a.example"),
                HeaderValue::from_static("https://b.example"),
            ]
        );
    }
}
