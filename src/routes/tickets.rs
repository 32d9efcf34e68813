use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use diesel::prelude::*;
use serde::Deserialize;

use crate::auth::{Principal, Role};
use crate::error::{AppError, AppResult};
use crate::models::{Ticket, TicketStatus};
use crate::repository::PgStore;
use crate::services::policy::TicketScope;
use crate::services::tickets::{
    CreateTicketInput, TicketListQuery, TicketService, UpdateTicketStatusInput,
};
use crate::services::{parse_uuid, ServiceError, ServiceResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TicketListParams {
    pub status: Option<String>,
    pub contractor_id: Option<String>,
    pub cleaning_area_id: Option<String>,
}

impl TicketListParams {
    fn into_query(self) -> ServiceResult<TicketListQuery> {
        let status = match present(self.status.as_deref()) {
            Some(raw) => Some(
                raw.parse::<TicketStatus>()
                    .map_err(|_| ServiceError::invalid("unknown status"))?,
            ),
            None => None,
        };
        let contractor_id = present(self.contractor_id.as_deref())
            .map(|raw| parse_uuid(raw, "contractor_id"))
            .transpose()?;
        let cleaning_area_id = present(self.cleaning_area_id.as_deref())
            .map(|raw| parse_uuid(raw, "cleaning_area_id"))
            .transpose()?;

        Ok(TicketListQuery {
            status,
            contractor_id,
            cleaning_area_id,
        })
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub async fn create_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateTicketInput>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let ticket = TicketService::new(&store, &store).create(&principal, payload)?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<TicketListParams>,
) -> AppResult<Json<Vec<Ticket>>> {
    list_scoped(&state, &principal, params)
}

pub async fn list_akimat_tickets(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<TicketListParams>,
) -> AppResult<Json<Vec<Ticket>>> {
    require_role(&principal, Role::AkimatAdmin)?;
    list_scoped(&state, &principal, params)
}

pub async fn list_too_tickets(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<TicketListParams>,
) -> AppResult<Json<Vec<Ticket>>> {
    require_role(&principal, Role::TooAdmin)?;
    list_scoped(&state, &principal, params)
}

pub async fn list_contractor_tickets(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<TicketListParams>,
) -> AppResult<Json<Vec<Ticket>>> {
    require_role(&principal, Role::ContractorAdmin)?;
    list_scoped(&state, &principal, params)
}

pub async fn list_driver_tickets(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<TicketListParams>,
) -> AppResult<Json<Vec<Ticket>>> {
    require_role(&principal, Role::Driver)?;
    list_scoped(&state, &principal, params)
}

fn require_role(principal: &Principal, role: Role) -> AppResult<()> {
    if principal.role != role {
        return Err(AppError::forbidden(format!("endpoint requires {role}")));
    }
    Ok(())
}

fn list_scoped(
    state: &AppState,
    principal: &Principal,
    params: TicketListParams,
) -> AppResult<Json<Vec<Ticket>>> {
    let query = params.into_query()?;
    // Scope errors (missing org, missing driver id) surface before a
    // connection is checked out.
    TicketScope::for_principal(principal)?;

    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let tickets = TicketService::new(&store, &store).list(principal, query)?;
    Ok(Json(tickets))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<String>,
) -> AppResult<Json<Ticket>> {
    let ticket_id = parse_uuid(&ticket_id, "ticket id")?;

    let mut conn = state.db()?;
    let store = PgStore::new(&mut conn);
    let ticket = TicketService::new(&store, &store).get(&principal, ticket_id)?;
    Ok(Json(ticket))
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(ticket_id): Path<String>,
    Json(payload): Json<UpdateTicketStatusInput>,
) -> AppResult<Json<Ticket>> {
    let ticket_id = parse_uuid(&ticket_id, "ticket id")?;
    payload.target_status()?;

    let mut conn = state.db()?;
    let ticket = conn.transaction::<Ticket, AppError, _>(|conn| {
        let store = PgStore::locking(conn);
        let ticket =
            TicketService::new(&store, &store).update_status(&principal, ticket_id, payload)?;
        Ok(ticket)
    })?;

    Ok(Json(ticket))
}
