//! Role-based access rules shared by tickets, assignments and trips.

use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::principal::{Principal, Role};
use crate::models::{Ticket, TicketStatus};
use crate::repository::{AssignmentRepository, TicketListFilter};

/// Which tickets a principal may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    CreatedBy(Uuid),
    Contractor(Uuid),
    Driver(Uuid),
}

impl TicketScope {
    /// Resolves the scope for `principal`. Organization roles without an
    /// organization fail with [`ServiceError::MissingOrganization`]; a driver
    /// without a driver id is denied outright.
    pub fn for_principal(principal: &Principal) -> ServiceResult<Self> {
        match principal.role {
            Role::AkimatAdmin => Ok(TicketScope::All),
            Role::TooAdmin => principal
                .org_id
                .map(TicketScope::CreatedBy)
                .ok_or(ServiceError::MissingOrganization),
            Role::ContractorAdmin => principal
                .org_id
                .map(TicketScope::Contractor)
                .ok_or(ServiceError::MissingOrganization),
            Role::Driver => principal
                .driver_id
                .map(TicketScope::Driver)
                .ok_or(ServiceError::PermissionDenied("missing driver id")),
        }
    }

    /// Ownership checks that can be answered from the ticket row alone.
    /// Driver scope is never satisfied here; see [`ensure_ticket_visible`].
    pub fn owns(&self, ticket: &Ticket) -> bool {
        match *self {
            TicketScope::All => true,
            TicketScope::CreatedBy(org_id) => ticket.created_by_org_id == org_id,
            TicketScope::Contractor(org_id) => ticket.contractor_id == org_id,
            TicketScope::Driver(_) => false,
        }
    }

    /// Narrows a caller supplied filter to what the scope may see.
    pub fn restrict(&self, mut filter: TicketListFilter) -> TicketListFilter {
        match *self {
            TicketScope::All => {}
            TicketScope::CreatedBy(org_id) => filter.created_by_org_id = Some(org_id),
            TicketScope::Contractor(org_id) => filter.contractor_id = Some(org_id),
            TicketScope::Driver(driver_id) => filter.driver_id = Some(driver_id),
        }
        filter
    }
}

/// Read access to a single ticket. Drivers need at least one assignment on it.
pub fn ensure_ticket_visible(
    principal: &Principal,
    ticket: &Ticket,
    assignments: &dyn AssignmentRepository,
) -> ServiceResult<()> {
    let scope = TicketScope::for_principal(principal)?;
    let visible = match scope {
        TicketScope::Driver(driver_id) => assignments
            .list_by_ticket_id(ticket.id)
            .map_err(|err| ServiceError::from_repo("assignment", err))?
            .iter()
            .any(|assignment| assignment.driver_id == driver_id),
        _ => scope.owns(ticket),
    };

    if visible {
        Ok(())
    } else {
        tracing::debug!(role = %principal.role, "ticket outside principal scope");
        Err(ServiceError::PermissionDenied("ticket is outside your scope"))
    }
}

/// Only TOO and akimat administrators create tickets, on behalf of their
/// own organization. Returns that organization.
pub fn ensure_can_create_ticket(principal: &Principal) -> ServiceResult<Uuid> {
    match principal.role {
        Role::TooAdmin | Role::AkimatAdmin => {
            principal.org_id.ok_or(ServiceError::MissingOrganization)
        }
        _ => Err(ServiceError::PermissionDenied(
            "only TOO or AKIMAT admin can create tickets",
        )),
    }
}

/// Which roles may request a given target status, independent of the
/// ticket's current status and of ownership.
pub fn role_may_set_status(role: Role, target: TicketStatus) -> bool {
    match target {
        TicketStatus::InProgress | TicketStatus::Completed => {
            matches!(role, Role::Driver | Role::ContractorAdmin)
        }
        TicketStatus::Closed | TicketStatus::Cancelled => {
            matches!(role, Role::TooAdmin | Role::AkimatAdmin)
        }
        TicketStatus::Planned => true,
    }
}

pub fn ensure_role_may_set_status(role: Role, target: TicketStatus) -> ServiceResult<()> {
    if role_may_set_status(role, target) {
        Ok(())
    } else {
        tracing::debug!(%role, target = %target, "status change rejected by role gate");
        Err(ServiceError::PermissionDenied(
            "role is not allowed to set this status",
        ))
    }
}
