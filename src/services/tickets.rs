use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::policy::{
    ensure_can_create_ticket, ensure_role_may_set_status, ensure_ticket_visible, TicketScope,
};
use super::status::validate_transition;
use super::{parse_timestamp, parse_uuid, ServiceError, ServiceResult};
use crate::auth::principal::Principal;
use crate::models::{NewTicket, Ticket, TicketStatus};
use crate::repository::{AssignmentRepository, TicketListFilter, TicketRepository};

/// Width of the `tickets.photo_url` column, counted in characters.
pub const PHOTO_URL_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTicketInput {
    pub cleaning_area_id: String,
    pub contractor_id: String,
    pub planned_start_at: String,
    pub planned_end_at: String,
    pub description: Option<String>,
}

/// Caller supplied list criteria, still unscoped.
#[derive(Debug, Clone, Default)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
    pub contractor_id: Option<Uuid>,
    pub cleaning_area_id: Option<Uuid>,
}

/// The ticket status can be requested either as a literal `status` or as an
/// `action` verb. A non-blank `status` takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicketStatusInput {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl UpdateTicketStatusInput {
    pub fn target_status(&self) -> ServiceResult<TicketStatus> {
        if let Some(status) = non_blank(self.status.as_deref()) {
            return status
                .parse()
                .map_err(|_| ServiceError::invalid("unknown status"));
        }

        match non_blank(self.action.as_deref())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("mark_in_progress") => Ok(TicketStatus::InProgress),
            Some("mark_completed") => Ok(TicketStatus::Completed),
            Some("mark_closed") => Ok(TicketStatus::Closed),
            Some("cancel") => Ok(TicketStatus::Cancelled),
            Some(_) => Err(ServiceError::invalid("unknown action")),
            None => Err(ServiceError::invalid("status or action must be provided")),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub struct TicketService<'a> {
    tickets: &'a dyn TicketRepository,
    assignments: &'a dyn AssignmentRepository,
}

impl<'a> TicketService<'a> {
    pub fn new(
        tickets: &'a dyn TicketRepository,
        assignments: &'a dyn AssignmentRepository,
    ) -> Self {
        Self {
            tickets,
            assignments,
        }
    }

    pub fn create(&self, principal: &Principal, input: CreateTicketInput) -> ServiceResult<Ticket> {
        let org_id = ensure_can_create_ticket(principal)?;

        let cleaning_area_id = parse_uuid(&input.cleaning_area_id, "cleaning_area_id")?;
        let contractor_id = parse_uuid(&input.contractor_id, "contractor_id")?;
        let planned_start_at = parse_timestamp(&input.planned_start_at, "planned_start_at")?;
        let planned_end_at = parse_timestamp(&input.planned_end_at, "planned_end_at")?;
        if planned_end_at < planned_start_at {
            return Err(ServiceError::invalid(
                "planned_end_at must not be before planned_start_at",
            ));
        }

        let ticket = self
            .tickets
            .create(NewTicket {
                id: Uuid::new_v4(),
                cleaning_area_id,
                contractor_id,
                created_by_org_id: org_id,
                status: TicketStatus::Planned,
                planned_start_at,
                planned_end_at,
                description: input
                    .description
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
            })
            .map_err(|err| ServiceError::from_repo("ticket", err))?;

        info!(ticket_id = %ticket.id, role = %principal.role, "ticket created");
        Ok(ticket)
    }

    pub fn get(&self, principal: &Principal, ticket_id: Uuid) -> ServiceResult<Ticket> {
        TicketScope::for_principal(principal)?;
        let ticket = self.load(ticket_id)?;
        ensure_ticket_visible(principal, &ticket, self.assignments)?;
        Ok(ticket)
    }

    pub fn list(&self, principal: &Principal, query: TicketListQuery) -> ServiceResult<Vec<Ticket>> {
        let scope = TicketScope::for_principal(principal)?;
        let filter = scope.restrict(TicketListFilter {
            status: query.status,
            contractor_id: query.contractor_id,
            cleaning_area_id: query.cleaning_area_id,
            ..Default::default()
        });

        self.tickets
            .list(&filter)
            .map_err(|err| ServiceError::from_repo("ticket", err))
    }

    /// Explicit status change. The role gate runs before the ticket is even
    /// loaded; ownership and the lifecycle graph are checked afterwards.
    pub fn update_status(
        &self,
        principal: &Principal,
        ticket_id: Uuid,
        input: UpdateTicketStatusInput,
    ) -> ServiceResult<Ticket> {
        let target = input.target_status()?;
        ensure_role_may_set_status(principal.role, target)?;
        validate_coordinates(input.latitude, input.longitude)?;
        validate_photo_url(input.photo_url.as_deref())?;

        let mut ticket = self.load(ticket_id)?;
        ensure_ticket_visible(principal, &ticket, self.assignments)?;
        validate_transition(ticket.status, target)?;

        let now = Utc::now();
        if ticket.status == TicketStatus::Planned
            && target == TicketStatus::InProgress
            && ticket.fact_start_at.is_none()
        {
            ticket.fact_start_at = Some(now);
        }
        if ticket.status == TicketStatus::InProgress
            && target == TicketStatus::Completed
            && ticket.fact_end_at.is_none()
        {
            ticket.fact_end_at = Some(now);
        }

        let previous = ticket.status;
        ticket.status = target;
        if let Some(photo_url) = input.photo_url {
            ticket.photo_url = Some(photo_url);
        }
        if input.latitude.is_some() {
            ticket.latitude = input.latitude;
        }
        if input.longitude.is_some() {
            ticket.longitude = input.longitude;
        }

        let saved = self
            .tickets
            .save(&ticket)
            .map_err(|err| ServiceError::from_repo("ticket", err))?;

        info!(
            ticket_id = %saved.id,
            from = %previous,
            to = %saved.status,
            role = %principal.role,
            "ticket status updated"
        );
        Ok(saved)
    }

    fn load(&self, ticket_id: Uuid) -> ServiceResult<Ticket> {
        self.tickets
            .get_by_id(ticket_id)
            .map_err(|err| ServiceError::from_repo("ticket", err))
    }
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> ServiceResult<()> {
    if latitude.is_some_and(|value| !(-90.0..=90.0).contains(&value)) {
        return Err(ServiceError::invalid("latitude must be within [-90, 90]"));
    }
    if longitude.is_some_and(|value| !(-180.0..=180.0).contains(&value)) {
        return Err(ServiceError::invalid("longitude must be within [-180, 180]"));
    }
    Ok(())
}

fn validate_photo_url(photo_url: Option<&str>) -> ServiceResult<()> {
    if photo_url.is_some_and(|url| url.chars().count() > PHOTO_URL_MAX_LEN) {
        return Err(ServiceError::invalid("photo_url must be at most 255 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Role;
    use crate::repository::MemoryStore;

    fn create_input(contractor: Uuid) -> CreateTicketInput {
        CreateTicketInput {
            cleaning_area_id: Uuid::new_v4().to_string(),
            contractor_id: contractor.to_string(),
            planned_start_at: "2025-01-20T09:00:00Z".to_string(),
            planned_end_at: "2025-01-20T11:00:00Z".to_string(),
            description: Some("  clear snow on Abaya ave  ".to_string()),
        }
    }

    fn status(value: &str) -> UpdateTicketStatusInput {
        UpdateTicketStatusInput {
            status: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn status_field_wins_over_action() {
        let input = UpdateTicketStatusInput {
            status: Some("cancelled".to_string()),
            action: Some("mark_completed".to_string()),
            ..Default::default()
        };
        assert_eq!(input.target_status().unwrap(), TicketStatus::Cancelled);
    }

    #[test]
    fn blank_status_falls_back_to_action() {
        let input = UpdateTicketStatusInput {
            status: Some("   ".to_string()),
            action: Some("MARK_IN_PROGRESS".to_string()),
            ..Default::default()
        };
        assert_eq!(input.target_status().unwrap(), TicketStatus::InProgress);
    }

    #[test]
    fn missing_or_unknown_target_is_invalid_input() {
        let cases = [
            (UpdateTicketStatusInput::default(), "status or action must be provided"),
            (status("DONE"), "unknown status"),
            (
                UpdateTicketStatusInput {
                    action: Some("archive".to_string()),
                    ..Default::default()
                },
                "unknown action",
            ),
        ];
        for (input, expected) in cases {
            match input.target_status() {
                Err(ServiceError::InvalidInput(message)) => assert_eq!(message, expected),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn create_stamps_creator_org_and_planned_status() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let org = Uuid::new_v4();

        let ticket = service
            .create(&Principal::too(org), create_input(Uuid::new_v4()))
            .unwrap();

        assert_eq!(ticket.created_by_org_id, org);
        assert_eq!(ticket.status, TicketStatus::Planned);
        assert_eq!(ticket.description, "clear snow on Abaya ave");
        assert!(ticket.fact_start_at.is_none());
    }

    #[test]
    fn create_rejects_reversed_plan_window() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let mut input = create_input(Uuid::new_v4());
        input.planned_end_at = "2025-01-20T08:00:00Z".to_string();

        let err = service
            .create(&Principal::akimat(Uuid::new_v4()), input)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn create_rejects_malformed_ids() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let mut input = create_input(Uuid::new_v4());
        input.contractor_id = "contractor-1".to_string();

        let err = service
            .create(&Principal::too(Uuid::new_v4()), input)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(ref m) if m == "invalid contractor_id"));
    }

    #[test]
    fn role_gate_runs_before_ticket_lookup() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);

        let err = service
            .update_status(
                &Principal::driver(Uuid::new_v4()),
                Uuid::new_v4(),
                status("CLOSED"),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    #[test]
    fn foreign_contractor_cannot_change_status() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let ticket = service
            .create(&Principal::too(Uuid::new_v4()), create_input(Uuid::new_v4()))
            .unwrap();

        let err = service
            .update_status(
                &Principal::contractor(Uuid::new_v4()),
                ticket.id,
                status("IN_PROGRESS"),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
        assert_eq!(
            service
                .get(&Principal::new(Role::AkimatAdmin, None, None), ticket.id)
                .unwrap()
                .status,
            TicketStatus::Planned
        );
    }

    #[test]
    fn invalid_transition_reports_both_statuses() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let contractor = Uuid::new_v4();
        let ticket = service
            .create(&Principal::too(Uuid::new_v4()), create_input(contractor))
            .unwrap();

        let err = service
            .update_status(&Principal::contractor(contractor), ticket.id, status("COMPLETED"))
            .unwrap_err();
        match err {
            ServiceError::Transition(err) => {
                assert_eq!(err.current, TicketStatus::Planned);
                assert_eq!(err.target, TicketStatus::Completed);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fact_timestamps_are_stamped_once() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let contractor = Uuid::new_v4();
        let principal = Principal::contractor(contractor);
        let ticket = service
            .create(&Principal::too(Uuid::new_v4()), create_input(contractor))
            .unwrap();

        let started = service
            .update_status(&principal, ticket.id, status("IN_PROGRESS"))
            .unwrap();
        let fact_start = started.fact_start_at.expect("fact start stamped");
        assert!(started.fact_end_at.is_none());

        let again = service
            .update_status(&principal, ticket.id, status("IN_PROGRESS"))
            .unwrap();
        assert_eq!(again.fact_start_at, Some(fact_start));

        let completed = service
            .update_status(&principal, ticket.id, status("COMPLETED"))
            .unwrap();
        assert_eq!(completed.fact_start_at, Some(fact_start));
        assert!(completed.fact_end_at.is_some());
    }

    #[test]
    fn photo_and_coordinates_are_applied() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let contractor = Uuid::new_v4();
        let ticket = service
            .create(&Principal::too(Uuid::new_v4()), create_input(contractor))
            .unwrap();

        let updated = service
            .update_status(
                &Principal::contractor(contractor),
                ticket.id,
                UpdateTicketStatusInput {
                    action: Some("mark_in_progress".to_string()),
                    photo_url: Some("https://cdn.example/photo.jpg".to_string()),
                    latitude: Some(51.1694),
                    longitude: Some(71.4491),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.photo_url.as_deref(), Some("https://cdn.example/photo.jpg"));
        assert_eq!(updated.latitude, Some(51.1694));
        assert_eq!(updated.longitude, Some(71.4491));
    }

    #[test]
    fn photo_url_longer_than_column_is_rejected() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let contractor = Uuid::new_v4();
        let ticket = service
            .create(&Principal::too(Uuid::new_v4()), create_input(contractor))
            .unwrap();
        let update = |photo_url: String| UpdateTicketStatusInput {
            status: Some("IN_PROGRESS".to_string()),
            photo_url: Some(photo_url),
            ..Default::default()
        };

        let err = service
            .update_status(
                &Principal::contractor(contractor),
                ticket.id,
                update("é".repeat(PHOTO_URL_MAX_LEN + 1)),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let unchanged = service.get(&Principal::akimat(Uuid::new_v4()), ticket.id).unwrap();
        assert_eq!(unchanged.status, TicketStatus::Planned);
        assert!(unchanged.photo_url.is_none());

        let updated = service
            .update_status(
                &Principal::contractor(contractor),
                ticket.id,
                update("é".repeat(PHOTO_URL_MAX_LEN)),
            )
            .unwrap();
        assert_eq!(updated.photo_url.map(|url| url.chars().count()), Some(PHOTO_URL_MAX_LEN));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let err = service
            .update_status(
                &Principal::contractor(Uuid::new_v4()),
                Uuid::new_v4(),
                UpdateTicketStatusInput {
                    status: Some("IN_PROGRESS".to_string()),
                    latitude: Some(123.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn list_is_scoped_per_role() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let (too_a, too_b, contractor) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        service
            .create(&Principal::too(too_a), create_input(contractor))
            .unwrap();
        service
            .create(&Principal::too(too_b), create_input(Uuid::new_v4()))
            .unwrap();

        let all = service
            .list(&Principal::akimat(Uuid::new_v4()), TicketListQuery::default())
            .unwrap();
        assert_eq!(all.len(), 2);

        let own = service
            .list(&Principal::too(too_a), TicketListQuery::default())
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].created_by_org_id, too_a);

        let contracted = service
            .list(&Principal::contractor(contractor), TicketListQuery::default())
            .unwrap();
        assert_eq!(contracted.len(), 1);

        let driver = service
            .list(&Principal::driver(Uuid::new_v4()), TicketListQuery::default())
            .unwrap();
        assert!(driver.is_empty());
    }

    #[test]
    fn too_admin_without_org_cannot_list() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        let err = service
            .list(
                &Principal::new(Role::TooAdmin, None, None),
                TicketListQuery::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingOrganization));
    }

    #[test]
    fn storage_failure_is_not_reported_as_missing() {
        let store = MemoryStore::new();
        let service = TicketService::new(&store, &store);
        store.set_unavailable(true);
        let err = service
            .get(&Principal::akimat(Uuid::new_v4()), Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Persistence(_)));
    }
}
