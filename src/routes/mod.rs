use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod assignments;
pub mod health;
pub mod tickets;
pub mod trips;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    tracing::warn!(origin = value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let tickets_routes = Router::new()
        .route(
            "/",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route("/:id", get(tickets::get_ticket))
        .route("/:id/status", patch(tickets::update_ticket_status))
        .route(
            "/:id/assignments",
            get(assignments::list_assignments).post(assignments::create_assignment),
        )
        .route("/:id/trips", get(trips::list_ticket_trips));

    let assignments_routes = Router::new()
        .route("/:id", delete(assignments::delete_assignment))
        .route(
            "/:id/driver-mark-status",
            patch(assignments::update_driver_mark_status),
        );

    let trips_routes = Router::new()
        .route("/", post(trips::create_trip))
        .route("/:id", get(trips::get_trip));

    let api_routes = Router::new()
        .nest("/tickets", tickets_routes)
        .nest("/assignments", assignments_routes)
        .nest("/trips", trips_routes)
        .route("/akimat/tickets", get(tickets::list_akimat_tickets))
        .route("/too/tickets", get(tickets::list_too_tickets))
        .route("/contractor/tickets", get(tickets::list_contractor_tickets))
        .route("/driver/tickets", get(tickets::list_driver_tickets));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
