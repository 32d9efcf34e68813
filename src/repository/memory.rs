use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use super::{
    AssignmentRepository, RepoError, RepoResult, TicketListFilter, TicketRepository,
    TripRepository,
};
use crate::models::{
    DriverMarkStatus, NewTicket, NewTicketAssignment, NewTrip, Ticket, TicketAssignment, Trip,
};

/// Process-local repositories, kept in insertion order.
///
/// `set_unavailable(true)` makes every call fail with a backend error, which
/// is how callers exercise the persistence-failure path.
#[derive(Default)]
pub struct MemoryStore {
    tickets: Mutex<Vec<Ticket>>,
    assignments: Mutex<Vec<TicketAssignment>>,
    trips: Mutex<Vec<Trip>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn guard<'a, T>(&self, table: &'a Mutex<T>) -> RepoResult<MutexGuard<'a, T>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Backend("storage unavailable".to_string()));
        }
        table
            .lock()
            .map_err(|_| RepoError::Backend("storage lock poisoned".to_string()))
    }
}

impl TicketRepository for MemoryStore {
    fn create(&self, ticket: NewTicket) -> RepoResult<Ticket> {
        let now = Utc::now();
        let created = Ticket {
            id: ticket.id,
            cleaning_area_id: ticket.cleaning_area_id,
            contractor_id: ticket.contractor_id,
            created_by_org_id: ticket.created_by_org_id,
            status: ticket.status,
            planned_start_at: ticket.planned_start_at,
            planned_end_at: ticket.planned_end_at,
            fact_start_at: None,
            fact_end_at: None,
            description: ticket.description,
            photo_url: None,
            latitude: None,
            longitude: None,
            created_at: now,
            updated_at: now,
        };
        self.guard(&self.tickets)?.push(created.clone());
        Ok(created)
    }

    fn get_by_id(&self, id: Uuid) -> RepoResult<Ticket> {
        self.guard(&self.tickets)?
            .iter()
            .find(|ticket| ticket.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    fn save(&self, ticket: &Ticket) -> RepoResult<Ticket> {
        let mut tickets = self.guard(&self.tickets)?;
        let stored = tickets
            .iter_mut()
            .find(|existing| existing.id == ticket.id)
            .ok_or(RepoError::NotFound)?;
        stored.status = ticket.status;
        stored.fact_start_at = ticket.fact_start_at;
        stored.fact_end_at = ticket.fact_end_at;
        stored.photo_url = ticket.photo_url.clone();
        stored.latitude = ticket.latitude;
        stored.longitude = ticket.longitude;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    fn list(&self, filter: &TicketListFilter) -> RepoResult<Vec<Ticket>> {
        let assigned: Option<Vec<Uuid>> = match filter.driver_id {
            Some(driver_id) => Some(
                self.guard(&self.assignments)?
                    .iter()
                    .filter(|assignment| assignment.driver_id == driver_id)
                    .map(|assignment| assignment.ticket_id)
                    .collect(),
            ),
            None => None,
        };

        let tickets = self.guard(&self.tickets)?;
        let mut rows: Vec<Ticket> = tickets
            .iter()
            .rev()
            .filter(|ticket| filter.status.map_or(true, |status| ticket.status == status))
            .filter(|ticket| {
                filter
                    .contractor_id
                    .map_or(true, |id| ticket.contractor_id == id)
            })
            .filter(|ticket| {
                filter
                    .cleaning_area_id
                    .map_or(true, |id| ticket.cleaning_area_id == id)
            })
            .filter(|ticket| {
                filter
                    .created_by_org_id
                    .map_or(true, |id| ticket.created_by_org_id == id)
            })
            .filter(|ticket| {
                assigned
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&ticket.id))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

impl AssignmentRepository for MemoryStore {
    fn create(&self, assignment: NewTicketAssignment) -> RepoResult<TicketAssignment> {
        let now = Utc::now();
        let created = TicketAssignment {
            id: assignment.id,
            ticket_id: assignment.ticket_id,
            driver_id: assignment.driver_id,
            vehicle_id: assignment.vehicle_id,
            assigned_at: assignment.assigned_at,
            driver_mark_status: assignment.driver_mark_status,
            is_active: assignment.is_active,
            created_at: now,
            updated_at: now,
        };
        self.guard(&self.assignments)?.push(created.clone());
        Ok(created)
    }

    fn get_by_id(&self, id: Uuid) -> RepoResult<TicketAssignment> {
        self.guard(&self.assignments)?
            .iter()
            .find(|assignment| assignment.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    fn delete(&self, id: Uuid) -> RepoResult<()> {
        let mut assignments = self.guard(&self.assignments)?;
        let before = assignments.len();
        assignments.retain(|assignment| assignment.id != id);
        if assignments.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn update_driver_mark_status(
        &self,
        id: Uuid,
        status: DriverMarkStatus,
    ) -> RepoResult<TicketAssignment> {
        let mut assignments = self.guard(&self.assignments)?;
        let stored = assignments
            .iter_mut()
            .find(|assignment| assignment.id == id)
            .ok_or(RepoError::NotFound)?;
        stored.driver_mark_status = status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    fn list_by_ticket_id(&self, ticket_id: Uuid) -> RepoResult<Vec<TicketAssignment>> {
        Ok(self
            .guard(&self.assignments)?
            .iter()
            .filter(|assignment| assignment.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

impl TripRepository for MemoryStore {
    fn create(&self, trip: NewTrip) -> RepoResult<Trip> {
        let created = Trip {
            id: trip.id,
            ticket_id: trip.ticket_id,
            ticket_assignment_id: trip.ticket_assignment_id,
            driver_id: trip.driver_id,
            vehicle_id: trip.vehicle_id,
            camera_id: trip.camera_id,
            polygon_id: trip.polygon_id,
            vehicle_plate_number: trip.vehicle_plate_number,
            detected_plate_number: trip.detected_plate_number,
            entry_lpr_event_id: trip.entry_lpr_event_id,
            exit_lpr_event_id: trip.exit_lpr_event_id,
            entry_volume_event_id: trip.entry_volume_event_id,
            exit_volume_event_id: trip.exit_volume_event_id,
            detected_volume_entry: trip.detected_volume_entry,
            detected_volume_exit: trip.detected_volume_exit,
            entry_at: trip.entry_at,
            exit_at: trip.exit_at,
            status: trip.status,
            created_at: Utc::now(),
        };
        self.guard(&self.trips)?.push(created.clone());
        Ok(created)
    }

    fn get_by_id(&self, id: Uuid) -> RepoResult<Trip> {
        self.guard(&self.trips)?
            .iter()
            .find(|trip| trip.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    fn list_by_ticket_id(&self, ticket_id: Uuid) -> RepoResult<Vec<Trip>> {
        let mut rows: Vec<Trip> = self
            .guard(&self.trips)?
            .iter()
            .filter(|trip| trip.ticket_id == Some(ticket_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.entry_at.cmp(&a.entry_at));
        Ok(rows)
    }

    fn list_by_driver_id(&self, driver_id: Uuid, ticket_id: Option<Uuid>) -> RepoResult<Vec<Trip>> {
        let mut rows: Vec<Trip> = self
            .guard(&self.trips)?
            .iter()
            .filter(|trip| trip.driver_id == Some(driver_id))
            .filter(|trip| ticket_id.map_or(true, |id| trip.ticket_id == Some(id)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.entry_at.cmp(&a.entry_at));
        Ok(rows)
    }
}
