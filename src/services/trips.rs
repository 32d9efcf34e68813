use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::policy::TicketScope;
use super::{parse_optional_uuid, parse_timestamp, ServiceError, ServiceResult};
use crate::auth::principal::Principal;
use crate::models::{NewTrip, Trip, TripStatus};
use crate::repository::{TicketRepository, TripRepository};

/// A vehicle movement reported by the detection pipeline. Identifiers and
/// timestamps arrive as text and are validated on creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTripInput {
    pub ticket_id: Option<String>,
    pub ticket_assignment_id: Option<String>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub camera_id: Option<String>,
    pub polygon_id: Option<String>,
    #[serde(default)]
    pub vehicle_plate_number: String,
    #[serde(default)]
    pub detected_plate_number: String,
    pub entry_lpr_event_id: Option<String>,
    pub exit_lpr_event_id: Option<String>,
    pub entry_volume_event_id: Option<String>,
    pub exit_volume_event_id: Option<String>,
    pub detected_volume_entry: Option<f64>,
    pub detected_volume_exit: Option<f64>,
    pub entry_at: String,
    pub exit_at: Option<String>,
    #[serde(default)]
    pub status: TripStatus,
}

pub struct TripService<'a> {
    trips: &'a dyn TripRepository,
    tickets: &'a dyn TicketRepository,
}

impl<'a> TripService<'a> {
    pub fn new(trips: &'a dyn TripRepository, tickets: &'a dyn TicketRepository) -> Self {
        Self { trips, tickets }
    }

    /// Stores the trip as reported. Linking a trip to a ticket does not
    /// change the ticket's status.
    pub fn create(&self, input: CreateTripInput) -> ServiceResult<Trip> {
        let entry_at = parse_timestamp(&input.entry_at, "entry_at")?;
        let exit_at = input
            .exit_at
            .as_deref()
            .map(|raw| parse_timestamp(raw, "exit_at"))
            .transpose()?;
        if exit_at.is_some_and(|exit_at| exit_at < entry_at) {
            return Err(ServiceError::invalid("exit_at must not be before entry_at"));
        }

        let trip = NewTrip {
            id: Uuid::new_v4(),
            ticket_id: parse_optional_uuid(input.ticket_id.as_deref(), "ticket_id")?,
            ticket_assignment_id: parse_optional_uuid(
                input.ticket_assignment_id.as_deref(),
                "ticket_assignment_id",
            )?,
            driver_id: parse_optional_uuid(input.driver_id.as_deref(), "driver_id")?,
            vehicle_id: parse_optional_uuid(input.vehicle_id.as_deref(), "vehicle_id")?,
            camera_id: parse_optional_uuid(input.camera_id.as_deref(), "camera_id")?,
            polygon_id: parse_optional_uuid(input.polygon_id.as_deref(), "polygon_id")?,
            vehicle_plate_number: input.vehicle_plate_number,
            detected_plate_number: input.detected_plate_number,
            entry_lpr_event_id: parse_optional_uuid(
                input.entry_lpr_event_id.as_deref(),
                "entry_lpr_event_id",
            )?,
            exit_lpr_event_id: parse_optional_uuid(
                input.exit_lpr_event_id.as_deref(),
                "exit_lpr_event_id",
            )?,
            entry_volume_event_id: parse_optional_uuid(
                input.entry_volume_event_id.as_deref(),
                "entry_volume_event_id",
            )?,
            exit_volume_event_id: parse_optional_uuid(
                input.exit_volume_event_id.as_deref(),
                "exit_volume_event_id",
            )?,
            detected_volume_entry: input.detected_volume_entry,
            detected_volume_exit: input.detected_volume_exit,
            entry_at,
            exit_at,
            status: input.status,
        };

        let trip = self
            .trips
            .create(trip)
            .map_err(|err| ServiceError::from_repo("trip", err))?;
        info!(trip_id = %trip.id, status = %trip.status, "trip recorded");
        Ok(trip)
    }

    pub fn list_by_ticket(&self, principal: &Principal, ticket_id: Uuid) -> ServiceResult<Vec<Trip>> {
        let scope = TicketScope::for_principal(principal)?;
        let ticket = self
            .tickets
            .get_by_id(ticket_id)
            .map_err(|err| ServiceError::from_repo("ticket", err))?;

        let trips = match scope {
            TicketScope::Driver(driver_id) => self.trips.list_by_driver_id(driver_id, Some(ticket.id)),
            _ if scope.owns(&ticket) => self.trips.list_by_ticket_id(ticket.id),
            _ => return Err(ServiceError::PermissionDenied("ticket is outside your scope")),
        };
        trips.map_err(|err| ServiceError::from_repo("trip", err))
    }

    /// A linked ticket must still exist. Drivers only see trips recorded under
    /// their own id; admins see a trip through its ticket, and unlinked trips
    /// are left to the akimat.
    pub fn get(&self, principal: &Principal, trip_id: Uuid) -> ServiceResult<Trip> {
        let scope = TicketScope::for_principal(principal)?;
        let trip = self
            .trips
            .get_by_id(trip_id)
            .map_err(|err| ServiceError::from_repo("trip", err))?;

        let linked_ticket = trip
            .ticket_id
            .map(|ticket_id| {
                self.tickets
                    .get_by_id(ticket_id)
                    .map_err(|err| ServiceError::from_repo("ticket", err))
            })
            .transpose()?;

        let visible = match (scope, linked_ticket) {
            (TicketScope::Driver(driver_id), _) => trip.driver_id == Some(driver_id),
            (TicketScope::All, _) => true,
            (_, Some(ticket)) => scope.owns(&ticket),
            (_, None) => false,
        };

        if visible {
            Ok(trip)
        } else {
            Err(ServiceError::PermissionDenied("trip is outside your scope"))
        }
    }
}
