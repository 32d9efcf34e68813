//! Storage seams used by the core services.
//!
//! Every method is synchronous and does exactly one storage round trip (or
//! one statement batch). Services borrow the repositories they need, so a
//! caller that wants a read-validate-write sequence to be atomic hands them
//! implementations bound to a single transaction (see [`pg::PgStore`]).

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod pg;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    DriverMarkStatus, NewTicket, NewTicketAssignment, NewTrip, Ticket, TicketAssignment,
    TicketStatus, Trip,
};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    /// A foreign key pointed at a row that does not exist.
    #[error("referenced record does not exist")]
    DanglingReference,
    #[error("{0}")]
    Backend(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<diesel::result::Error> for RepoError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => RepoError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                _,
            ) => RepoError::DanglingReference,
            other => RepoError::Backend(other.to_string()),
        }
    }
}

/// Conjunction of optional criteria for listing tickets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketListFilter {
    pub status: Option<TicketStatus>,
    pub contractor_id: Option<Uuid>,
    pub cleaning_area_id: Option<Uuid>,
    pub created_by_org_id: Option<Uuid>,
    /// Only tickets the driver holds at least one assignment on.
    pub driver_id: Option<Uuid>,
}

pub trait TicketRepository {
    fn create(&self, ticket: NewTicket) -> RepoResult<Ticket>;

    fn get_by_id(&self, id: Uuid) -> RepoResult<Ticket>;

    /// Persists status, fact timestamps, photo and coordinates of `ticket`.
    fn save(&self, ticket: &Ticket) -> RepoResult<Ticket>;

    /// Newest first.
    fn list(&self, filter: &TicketListFilter) -> RepoResult<Vec<Ticket>>;
}

pub trait AssignmentRepository {
    fn create(&self, assignment: NewTicketAssignment) -> RepoResult<TicketAssignment>;

    fn get_by_id(&self, id: Uuid) -> RepoResult<TicketAssignment>;

    fn delete(&self, id: Uuid) -> RepoResult<()>;

    fn update_driver_mark_status(
        &self,
        id: Uuid,
        status: DriverMarkStatus,
    ) -> RepoResult<TicketAssignment>;

    fn list_by_ticket_id(&self, ticket_id: Uuid) -> RepoResult<Vec<TicketAssignment>>;
}

pub trait TripRepository {
    fn create(&self, trip: NewTrip) -> RepoResult<Trip>;

    fn get_by_id(&self, id: Uuid) -> RepoResult<Trip>;

    fn list_by_ticket_id(&self, ticket_id: Uuid) -> RepoResult<Vec<Trip>>;

    fn list_by_driver_id(&self, driver_id: Uuid, ticket_id: Option<Uuid>) -> RepoResult<Vec<Trip>>;
}
