use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::policy::{ensure_ticket_visible, TicketScope};
use super::status::validate_transition;
use super::{parse_uuid, ServiceError, ServiceResult};
use crate::auth::principal::Principal;
use crate::models::{DriverMarkStatus, NewTicketAssignment, Ticket, TicketAssignment, TicketStatus};
use crate::repository::{AssignmentRepository, TicketRepository};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAssignmentInput {
    pub ticket_id: String,
    pub driver_id: String,
    pub vehicle_id: String,
}

pub struct AssignmentService<'a> {
    assignments: &'a dyn AssignmentRepository,
    tickets: &'a dyn TicketRepository,
}

impl<'a> AssignmentService<'a> {
    pub fn new(
        assignments: &'a dyn AssignmentRepository,
        tickets: &'a dyn TicketRepository,
    ) -> Self {
        Self {
            assignments,
            tickets,
        }
    }

    pub fn create(
        &self,
        principal: &Principal,
        input: CreateAssignmentInput,
    ) -> ServiceResult<TicketAssignment> {
        if !principal.is_contractor() {
            return Err(ServiceError::PermissionDenied(
                "only contractor admin can assign drivers",
            ));
        }

        let scope = TicketScope::for_principal(principal)?;

        let ticket_id = parse_uuid(&input.ticket_id, "ticket_id")?;
        let driver_id = parse_uuid(&input.driver_id, "driver_id")?;
        let vehicle_id = parse_uuid(&input.vehicle_id, "vehicle_id")?;

        let ticket = self.load_ticket(ticket_id)?;
        ensure_contractor_owns(scope, &ticket)?;

        let assignment = self
            .assignments
            .create(NewTicketAssignment {
                id: Uuid::new_v4(),
                ticket_id,
                driver_id,
                vehicle_id,
                assigned_at: Utc::now(),
                driver_mark_status: DriverMarkStatus::NotStarted,
                is_active: true,
            })
            .map_err(|err| ServiceError::from_repo("assignment", err))?;

        info!(assignment_id = %assignment.id, ticket_id = %ticket_id, "driver assigned");
        Ok(assignment)
    }

    pub fn delete(&self, principal: &Principal, assignment_id: Uuid) -> ServiceResult<()> {
        if !principal.is_contractor() {
            return Err(ServiceError::PermissionDenied(
                "only contractor admin can remove assignments",
            ));
        }

        let scope = TicketScope::for_principal(principal)?;

        let assignment = self.load_assignment(assignment_id)?;
        let ticket = self.load_ticket(assignment.ticket_id)?;
        ensure_contractor_owns(scope, &ticket)?;

        self.assignments
            .delete(assignment_id)
            .map_err(|err| ServiceError::from_repo("assignment", err))?;

        info!(assignment_id = %assignment_id, ticket_id = %ticket.id, "assignment removed");
        Ok(())
    }

    /// Records the driver's own progress mark. Marking `IN_WORK` on a ticket
    /// that has not started yet moves the ticket to `IN_PROGRESS`; this is the
    /// only status change that happens without an explicit status request.
    pub fn update_driver_mark_status(
        &self,
        principal: &Principal,
        assignment_id: Uuid,
        status: DriverMarkStatus,
    ) -> ServiceResult<TicketAssignment> {
        let driver_id = match (principal.is_driver(), principal.driver_id) {
            (true, Some(driver_id)) => driver_id,
            _ => {
                return Err(ServiceError::PermissionDenied(
                    "only the assigned driver can update the mark status",
                ))
            }
        };

        let assignment = self.load_assignment(assignment_id)?;
        if assignment.driver_id != driver_id {
            return Err(ServiceError::PermissionDenied(
                "assignment belongs to another driver",
            ));
        }

        let updated = self
            .assignments
            .update_driver_mark_status(assignment_id, status)
            .map_err(|err| ServiceError::from_repo("assignment", err))?;

        if status == DriverMarkStatus::InWork {
            let mut ticket = self.load_ticket(assignment.ticket_id)?;
            if ticket.status == TicketStatus::Planned && ticket.fact_start_at.is_none() {
                validate_transition(ticket.status, TicketStatus::InProgress)?;
                ticket.status = TicketStatus::InProgress;
                ticket.fact_start_at = Some(Utc::now());
                self.tickets
                    .save(&ticket)
                    .map_err(|err| ServiceError::from_repo("ticket", err))?;
                info!(
                    ticket_id = %ticket.id,
                    assignment_id = %assignment_id,
                    "ticket started by driver mark"
                );
            }
        }

        Ok(updated)
    }

    pub fn list_by_ticket(
        &self,
        principal: &Principal,
        ticket_id: Uuid,
    ) -> ServiceResult<Vec<TicketAssignment>> {
        let scope = TicketScope::for_principal(principal)?;
        let ticket = self.load_ticket(ticket_id)?;

        let assignments = match scope {
            TicketScope::Driver(driver_id) => self
                .list_for_ticket(ticket.id)?
                .into_iter()
                .filter(|assignment| assignment.driver_id == driver_id)
                .collect(),
            _ => {
                ensure_ticket_visible(principal, &ticket, self.assignments)?;
                self.list_for_ticket(ticket.id)?
            }
        };
        Ok(assignments)
    }

    fn list_for_ticket(&self, ticket_id: Uuid) -> ServiceResult<Vec<TicketAssignment>> {
        self.assignments
            .list_by_ticket_id(ticket_id)
            .map_err(|err| ServiceError::from_repo("assignment", err))
    }

    fn load_ticket(&self, ticket_id: Uuid) -> ServiceResult<Ticket> {
        self.tickets
            .get_by_id(ticket_id)
            .map_err(|err| ServiceError::from_repo("ticket", err))
    }

    fn load_assignment(&self, assignment_id: Uuid) -> ServiceResult<TicketAssignment> {
        self.assignments
            .get_by_id(assignment_id)
            .map_err(|err| ServiceError::from_repo("assignment", err))
    }
}

fn ensure_contractor_owns(scope: TicketScope, ticket: &Ticket) -> ServiceResult<()> {
    if scope.owns(ticket) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "ticket belongs to another contractor",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Role;
    use crate::models::NewTicket;
    use crate::repository::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        contractor: Uuid,
        ticket: Ticket,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new();
            let contractor = Uuid::new_v4();
            let now = Utc::now();
            let ticket = TicketRepository::create(
                &store,
                NewTicket {
                    id: Uuid::new_v4(),
                    cleaning_area_id: Uuid::new_v4(),
                    contractor_id: contractor,
                    created_by_org_id: Uuid::new_v4(),
                    status: TicketStatus::Planned,
                    planned_start_at: now,
                    planned_end_at: now,
                    description: String::new(),
                },
            )
            .unwrap();
            Self {
                store,
                contractor,
                ticket,
            }
        }

        fn service(&self) -> AssignmentService<'_> {
            AssignmentService::new(&self.store, &self.store)
        }

        fn assign(&self, driver_id: Uuid) -> TicketAssignment {
            self.service()
                .create(
                    &Principal::contractor(self.contractor),
                    CreateAssignmentInput {
                        ticket_id: self.ticket.id.to_string(),
                        driver_id: driver_id.to_string(),
                        vehicle_id: Uuid::new_v4().to_string(),
                    },
                )
                .unwrap()
        }

        fn ticket(&self) -> Ticket {
            TicketRepository::get_by_id(&self.store, self.ticket.id).unwrap()
        }
    }

    #[test]
    fn new_assignment_starts_not_started_and_active() {
        let fx = Fixture::new();
        let assignment = fx.assign(Uuid::new_v4());
        assert_eq!(assignment.driver_mark_status, DriverMarkStatus::NotStarted);
        assert!(assignment.is_active);
        assert_eq!(assignment.ticket_id, fx.ticket.id);
    }

    #[test]
    fn only_owning_contractor_creates_assignments() {
        let fx = Fixture::new();
        let input = CreateAssignmentInput {
            ticket_id: fx.ticket.id.to_string(),
            driver_id: Uuid::new_v4().to_string(),
            vehicle_id: Uuid::new_v4().to_string(),
        };

        let foreign = fx
            .service()
            .create(&Principal::contractor(Uuid::new_v4()), input.clone())
            .unwrap_err();
        assert!(matches!(foreign, ServiceError::PermissionDenied(_)));

        let too = fx
            .service()
            .create(&Principal::too(fx.contractor), input)
            .unwrap_err();
        assert!(matches!(too, ServiceError::PermissionDenied(_)));
    }

    #[test]
    fn contractor_without_organization_is_rejected_before_lookup() {
        let fx = Fixture::new();
        let assignment = fx.assign(Uuid::new_v4());
        let orphan = Principal::new(Role::ContractorAdmin, None, None);

        let create = fx
            .service()
            .create(
                &orphan,
                CreateAssignmentInput {
                    ticket_id: fx.ticket.id.to_string(),
                    driver_id: Uuid::new_v4().to_string(),
                    vehicle_id: Uuid::new_v4().to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(create, ServiceError::MissingOrganization));

        let delete = fx.service().delete(&orphan, assignment.id).unwrap_err();
        assert!(matches!(delete, ServiceError::MissingOrganization));
        let remaining = fx
            .service()
            .list_by_ticket(&Principal::contractor(fx.contractor), fx.ticket.id)
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn create_on_missing_ticket_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .service()
            .create(
                &Principal::contractor(fx.contractor),
                CreateAssignmentInput {
                    ticket_id: Uuid::new_v4().to_string(),
                    driver_id: Uuid::new_v4().to_string(),
                    vehicle_id: Uuid::new_v4().to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("ticket")));
    }

    #[test]
    fn foreign_contractor_cannot_delete() {
        let fx = Fixture::new();
        let assignment = fx.assign(Uuid::new_v4());

        let err = fx
            .service()
            .delete(&Principal::contractor(Uuid::new_v4()), assignment.id)
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));

        fx.service()
            .delete(&Principal::contractor(fx.contractor), assignment.id)
            .unwrap();
        let gone = fx
            .service()
            .delete(&Principal::contractor(fx.contractor), assignment.id)
            .unwrap_err();
        assert!(matches!(gone, ServiceError::NotFound("assignment")));
    }

    #[test]
    fn in_work_mark_starts_planned_ticket_once() {
        let fx = Fixture::new();
        let driver_id = Uuid::new_v4();
        let assignment = fx.assign(driver_id);
        let driver = Principal::driver(driver_id);

        let updated = fx
            .service()
            .update_driver_mark_status(&driver, assignment.id, DriverMarkStatus::InWork)
            .unwrap();
        assert_eq!(updated.driver_mark_status, DriverMarkStatus::InWork);

        let started = fx.ticket();
        assert_eq!(started.status, TicketStatus::InProgress);
        let fact_start = started.fact_start_at.expect("fact start stamped");

        fx.service()
            .update_driver_mark_status(&driver, assignment.id, DriverMarkStatus::InWork)
            .unwrap();
        let again = fx.ticket();
        assert_eq!(again.status, TicketStatus::InProgress);
        assert_eq!(again.fact_start_at, Some(fact_start));
    }

    #[test]
    fn other_marks_leave_ticket_untouched() {
        let fx = Fixture::new();
        let driver_id = Uuid::new_v4();
        let assignment = fx.assign(driver_id);

        fx.service()
            .update_driver_mark_status(
                &Principal::driver(driver_id),
                assignment.id,
                DriverMarkStatus::Completed,
            )
            .unwrap();
        assert_eq!(fx.ticket().status, TicketStatus::Planned);
    }

    #[test]
    fn in_work_on_cancelled_ticket_does_not_reopen_it() {
        let fx = Fixture::new();
        let driver_id = Uuid::new_v4();
        let assignment = fx.assign(driver_id);
        let mut cancelled = fx.ticket();
        cancelled.status = TicketStatus::Cancelled;
        fx.store.save(&cancelled).unwrap();

        fx.service()
            .update_driver_mark_status(
                &Principal::driver(driver_id),
                assignment.id,
                DriverMarkStatus::InWork,
            )
            .unwrap();
        let ticket = fx.ticket();
        assert_eq!(ticket.status, TicketStatus::Cancelled);
        assert!(ticket.fact_start_at.is_none());
    }

    #[test]
    fn mark_requires_the_assigned_driver() {
        let fx = Fixture::new();
        let assignment = fx.assign(Uuid::new_v4());

        let other = fx
            .service()
            .update_driver_mark_status(
                &Principal::driver(Uuid::new_v4()),
                assignment.id,
                DriverMarkStatus::InWork,
            )
            .unwrap_err();
        assert!(matches!(other, ServiceError::PermissionDenied(_)));

        let anonymous = fx
            .service()
            .update_driver_mark_status(
                &Principal::new(Role::Driver, None, None),
                assignment.id,
                DriverMarkStatus::InWork,
            )
            .unwrap_err();
        assert!(matches!(anonymous, ServiceError::PermissionDenied(_)));

        let contractor = fx
            .service()
            .update_driver_mark_status(
                &Principal::contractor(fx.contractor),
                assignment.id,
                DriverMarkStatus::InWork,
            )
            .unwrap_err();
        assert!(matches!(contractor, ServiceError::PermissionDenied(_)));
        assert_eq!(fx.ticket().status, TicketStatus::Planned);
    }

    #[test]
    fn driver_lists_only_own_assignments() {
        let fx = Fixture::new();
        let (mine, theirs) = (Uuid::new_v4(), Uuid::new_v4());
        fx.assign(mine);
        fx.assign(theirs);

        let listed = fx
            .service()
            .list_by_ticket(&Principal::driver(mine), fx.ticket.id)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].driver_id, mine);

        let contractor = fx
            .service()
            .list_by_ticket(&Principal::contractor(fx.contractor), fx.ticket.id)
            .unwrap();
        assert_eq!(contractor.len(), 2);

        let err = fx
            .service()
            .list_by_ticket(&Principal::new(Role::Driver, None, None), fx.ticket.id)
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }
}
