use std::cell::RefCell;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use super::{
    AssignmentRepository, RepoError, RepoResult, TicketListFilter, TicketRepository,
    TripRepository,
};
use crate::models::{
    DriverMarkStatus, NewTicket, NewTicketAssignment, NewTrip, Ticket, TicketAssignment, Trip,
};
use crate::schema::{ticket_assignments, tickets, trips};

/// Diesel-backed repositories over one borrowed connection.
///
/// Built inside `conn.transaction(..)` it makes every call of a service
/// operation part of that transaction. [`PgStore::locking`] additionally
/// reads tickets with `FOR UPDATE`, so concurrent status changes on the same
/// ticket wait for each other instead of overwriting.
pub struct PgStore<'a> {
    conn: RefCell<&'a mut PgConnection>,
    lock_tickets: bool,
}

impl<'a> PgStore<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self {
            conn: RefCell::new(conn),
            lock_tickets: false,
        }
    }

    pub fn locking(conn: &'a mut PgConnection) -> Self {
        Self {
            conn: RefCell::new(conn),
            lock_tickets: true,
        }
    }
}

impl TicketRepository for PgStore<'_> {
    fn create(&self, ticket: NewTicket) -> RepoResult<Ticket> {
        let mut conn = self.conn.borrow_mut();
        let created = diesel::insert_into(tickets::table)
            .values(&ticket)
            .get_result::<Ticket>(&mut **conn)?;
        Ok(created)
    }

    fn get_by_id(&self, id: Uuid) -> RepoResult<Ticket> {
        let mut conn = self.conn.borrow_mut();
        let query = tickets::table.find(id);
        let ticket = if self.lock_tickets {
            query.for_update().first::<Ticket>(&mut **conn)?
        } else {
            query.first::<Ticket>(&mut **conn)?
        };
        Ok(ticket)
    }

    fn save(&self, ticket: &Ticket) -> RepoResult<Ticket> {
        let mut conn = self.conn.borrow_mut();
        let saved = diesel::update(tickets::table.find(ticket.id))
            .set((
                tickets::status.eq(ticket.status),
                tickets::fact_start_at.eq(ticket.fact_start_at),
                tickets::fact_end_at.eq(ticket.fact_end_at),
                tickets::photo_url.eq(ticket.photo_url.as_deref()),
                tickets::latitude.eq(ticket.latitude),
                tickets::longitude.eq(ticket.longitude),
                tickets::updated_at.eq(Utc::now()),
            ))
            .get_result::<Ticket>(&mut **conn)?;
        Ok(saved)
    }

    fn list(&self, filter: &TicketListFilter) -> RepoResult<Vec<Ticket>> {
        let mut conn = self.conn.borrow_mut();
        let mut query = tickets::table.into_boxed();

        if let Some(status) = filter.status {
            query = query.filter(tickets::status.eq(status));
        }
        if let Some(contractor_id) = filter.contractor_id {
            query = query.filter(tickets::contractor_id.eq(contractor_id));
        }
        if let Some(cleaning_area_id) = filter.cleaning_area_id {
            query = query.filter(tickets::cleaning_area_id.eq(cleaning_area_id));
        }
        if let Some(created_by_org_id) = filter.created_by_org_id {
            query = query.filter(tickets::created_by_org_id.eq(created_by_org_id));
        }
        if let Some(driver_id) = filter.driver_id {
            let assigned = ticket_assignments::table
                .filter(ticket_assignments::driver_id.eq(driver_id))
                .select(ticket_assignments::ticket_id);
            query = query.filter(tickets::id.eq_any(assigned));
        }

        let rows = query
            .order(tickets::created_at.desc())
            .load::<Ticket>(&mut **conn)?;
        Ok(rows)
    }
}

impl AssignmentRepository for PgStore<'_> {
    fn create(&self, assignment: NewTicketAssignment) -> RepoResult<TicketAssignment> {
        let mut conn = self.conn.borrow_mut();
        let created = diesel::insert_into(ticket_assignments::table)
            .values(&assignment)
            .get_result::<TicketAssignment>(&mut **conn)?;
        Ok(created)
    }

    fn get_by_id(&self, id: Uuid) -> RepoResult<TicketAssignment> {
        let mut conn = self.conn.borrow_mut();
        let assignment = ticket_assignments::table
            .find(id)
            .first::<TicketAssignment>(&mut **conn)?;
        Ok(assignment)
    }

    fn delete(&self, id: Uuid) -> RepoResult<()> {
        let mut conn = self.conn.borrow_mut();
        let deleted = diesel::delete(ticket_assignments::table.find(id)).execute(&mut **conn)?;
        if deleted == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn update_driver_mark_status(
        &self,
        id: Uuid,
        status: DriverMarkStatus,
    ) -> RepoResult<TicketAssignment> {
        let mut conn = self.conn.borrow_mut();
        let updated = diesel::update(ticket_assignments::table.find(id))
            .set((
                ticket_assignments::driver_mark_status.eq(status),
                ticket_assignments::updated_at.eq(Utc::now()),
            ))
            .get_result::<TicketAssignment>(&mut **conn)?;
        Ok(updated)
    }

    fn list_by_ticket_id(&self, ticket_id: Uuid) -> RepoResult<Vec<TicketAssignment>> {
        let mut conn = self.conn.borrow_mut();
        let rows = ticket_assignments::table
            .filter(ticket_assignments::ticket_id.eq(ticket_id))
            .order(ticket_assignments::assigned_at.asc())
            .load::<TicketAssignment>(&mut **conn)?;
        Ok(rows)
    }
}

impl TripRepository for PgStore<'_> {
    fn create(&self, trip: NewTrip) -> RepoResult<Trip> {
        let mut conn = self.conn.borrow_mut();
        let created = diesel::insert_into(trips::table)
            .values(&trip)
            .get_result::<Trip>(&mut **conn)?;
        Ok(created)
    }

    fn get_by_id(&self, id: Uuid) -> RepoResult<Trip> {
        let mut conn = self.conn.borrow_mut();
        let trip = trips::table.find(id).first::<Trip>(&mut **conn)?;
        Ok(trip)
    }

    fn list_by_ticket_id(&self, ticket_id: Uuid) -> RepoResult<Vec<Trip>> {
        let mut conn = self.conn.borrow_mut();
        let rows = trips::table
            .filter(trips::ticket_id.eq(ticket_id))
            .order(trips::entry_at.desc())
            .load::<Trip>(&mut **conn)?;
        Ok(rows)
    }

    fn list_by_driver_id(&self, driver_id: Uuid, ticket_id: Option<Uuid>) -> RepoResult<Vec<Trip>> {
        let mut conn = self.conn.borrow_mut();
        let mut query = trips::table
            .filter(trips::driver_id.eq(driver_id))
            .into_boxed();
        if let Some(ticket_id) = ticket_id {
            query = query.filter(trips::ticket_id.eq(ticket_id));
        }
        let rows = query
            .order(trips::entry_at.desc())
            .load::<Trip>(&mut **conn)?;
        Ok(rows)
    }
}
