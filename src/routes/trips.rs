use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};

use crate::auth::Principal;
use crate::error::AppResult;
use crate::models::Trip;
use crate::repository::PgStore;
use crate::services::parse_uuid;
use crate::services::trips::{CreateTripInput, TripService};
use crate::state::AppState;

/// Ingest endpoint for the detection pipeline; it carries no end-user identity.
pub async fn create_trip(
    State(state): State<AppState>,
    Json(payload): Json<CreateTripInput>,
) -> AppResult<(StatusCode, Json<Trip>)> {
    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let trip = TripService::new(&store, &store).create(payload)?;
    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn list_ticket_trips(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<Vec<Trip>>> {
    let ticket_id = parse_uuid(&ticket_id, "ticket id")?;

    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let trips = TripService::new(&store, &store).list_by_ticket(&principal, ticket_id)?;
    Ok(Json(trips))
}

pub async fn get_trip(
    State(state): State<AppState>,
    principal: Principal,
    Path(trip_id): Path<String>,
) -> AppResult<Json<Trip>> {
    let trip_id = parse_uuid(&trip_id, "trip id")?;

    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let trip = TripService::new(&store, &store).get(&principal, trip_id)?;
    Ok(Json(trip))
}
