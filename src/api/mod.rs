pub mod auth;
mod error;
mod events;
mod members;
mod validation;

pub use error::{ApiError, FieldError};

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public; /me gates itself through the member extractor)
    let auth_routes = Router::new()
        .route("/register", post(members::register))
        .route("/login", post(auth::login))
        .route("/validate", get(auth::validate))
        .route("/me", get(auth::me));

    // Public API routes
    let public_routes = Router::new()
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event));

    // Member routes (any valid session)
    let member_routes = Router::new()
        .route("/events/:id/register", post(events::register_for_event))
        .route("/me/registrations", get(events::my_registrations))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Admin routes
    let admin_routes = Router::new()
        .route("/members", get(members::list_members))
        .route("/members/:id", get(members::get_member))
        .route("/members/:id/status", put(members::update_member_status))
        .route("/events", post(events::create_event))
        .route("/events/:id", put(events::update_event))
        .route("/events/:id", delete(events::delete_event))
        .route(
            "/events/:id/registrations",
            get(events::list_event_registrations),
        )
        .route(
            "/event-registrations/:id/attendance",
            get(events::attendance_preview),
        )
        .route(
            "/event-registrations/:id/attendance",
            put(events::set_attendance),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_middleware,
        ));

    let api_routes = public_routes.merge(member_routes).merge(admin_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
