use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use serde::Deserialize;

use crate::auth::Principal;
use crate::error::{AppError, AppResult};
use crate::models::{DriverMarkStatus, TicketAssignment};
use crate::repository::PgStore;
use crate::services::assignments::{AssignmentService, CreateAssignmentInput};
use crate::services::{parse_uuid, ServiceError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    #[serde(default)]
    pub driver_id: String,
    #[serde(default)]
    pub vehicle_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DriverMarkStatusRequest {
    #[serde(default)]
    pub driver_mark_status: String,
}

pub async fn create_assignment(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<String>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> AppResult<(StatusCode, Json<TicketAssignment>)> {
    let input = CreateAssignmentInput {
        ticket_id,
        driver_id: payload.driver_id,
        vehicle_id: payload.vehicle_id,
    };

    let mut conn = state.db()?;
    let assignment = conn.transaction::<_, AppError, _>(|conn| {
        let store = PgStore::locking(conn);
        Ok(AssignmentService::new(&store, &store).create(&principal, input)?)
    })?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<Vec<TicketAssignment>>> {
    let ticket_id = parse_uuid(&ticket_id, "ticket id")?;

    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let assignments = AssignmentService::new(&store, &store).list_by_ticket(&principal, ticket_id)?;
    Ok(Json(assignments))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    principal: Principal,
    Path(assignment_id): Path<String>,
) -> AppResult<StatusCode> {
    let assignment_id = parse_uuid(&assignment_id, "assignment id")?;

    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let store = PgStore::locking(conn);
        Ok(AssignmentService::new(&store, &store).delete(&principal, assignment_id)?)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_driver_mark_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(assignment_id): Path<String>,
    Json(payload): Json<DriverMarkStatusRequest>,
) -> AppResult<Json<TicketAssignment>> {
    let assignment_id = parse_uuid(&assignment_id, "assignment id")?;
    let status: DriverMarkStatus = payload
        .driver_mark_status
        .parse()
        .map_err(|_| ServiceError::invalid("unknown driver mark status"))?;

    let mut conn = state.db()?;
    let assignment = conn.transaction::<_, AppError, _>(|conn| {
        let store = PgStore::locking(conn);
        Ok(AssignmentService::new(&store, &store).update_driver_mark_status(
            &principal,
            assignment_id,
            status,
        )?)
    })?;

    Ok(Json(assignment))
}
