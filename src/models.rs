use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.trim().to_string(),
        }
    }
}

/// Stores a closed enum as its upper snake case literal in a text column.
macro_rules! text_column_enum {
    ($ty:ty) => {
        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                raw.parse::<$ty>().map_err(Into::into)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Planned,
    InProgress,
    Completed,
    Closed,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Planned,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Closed,
        TicketStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Planned => "PLANNED",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::Closed => "CLOSED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed | TicketStatus::Cancelled)
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PLANNED" => Ok(TicketStatus::Planned),
            "IN_PROGRESS" => Ok(TicketStatus::InProgress),
            "COMPLETED" => Ok(TicketStatus::Completed),
            "CLOSED" => Ok(TicketStatus::Closed),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            _ => Err(ParseEnumError::new("status", value)),
        }
    }
}

text_column_enum!(TicketStatus);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverMarkStatus {
    NotStarted,
    InWork,
    Completed,
}

impl DriverMarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverMarkStatus::NotStarted => "NOT_STARTED",
            DriverMarkStatus::InWork => "IN_WORK",
            DriverMarkStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for DriverMarkStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Ok(DriverMarkStatus::NotStarted),
            "IN_WORK" => Ok(DriverMarkStatus::InWork),
            "COMPLETED" => Ok(DriverMarkStatus::Completed),
            _ => Err(ParseEnumError::new("driver mark status", value)),
        }
    }
}

text_column_enum!(DriverMarkStatus);

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    #[default]
    Ok,
    RouteViolation,
    ForeignArea,
    MismatchPlate,
    OverCapacity,
    NoAssignment,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Ok => "OK",
            TripStatus::RouteViolation => "ROUTE_VIOLATION",
            TripStatus::ForeignArea => "FOREIGN_AREA",
            TripStatus::MismatchPlate => "MISMATCH_PLATE",
            TripStatus::OverCapacity => "OVER_CAPACITY",
            TripStatus::NoAssignment => "NO_ASSIGNMENT",
        }
    }
}

impl FromStr for TripStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(TripStatus::Ok),
            "ROUTE_VIOLATION" => Ok(TripStatus::RouteViolation),
            "FOREIGN_AREA" => Ok(TripStatus::ForeignArea),
            "MISMATCH_PLATE" => Ok(TripStatus::MismatchPlate),
            "OVER_CAPACITY" => Ok(TripStatus::OverCapacity),
            "NO_ASSIGNMENT" => Ok(TripStatus::NoAssignment),
            _ => Err(ParseEnumError::new("trip status", value)),
        }
    }
}

text_column_enum!(TripStatus);

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub cleaning_area_id: Uuid,
    pub contractor_id: Uuid,
    pub created_by_org_id: Uuid,
    pub status: TicketStatus,
    pub planned_start_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,
    pub fact_start_at: Option<DateTime<Utc>>,
    pub fact_end_at: Option<DateTime<Utc>>,
    pub description: String,
    pub photo_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub id: Uuid,
    pub cleaning_area_id: Uuid,
    pub contractor_id: Uuid,
    pub created_by_org_id: Uuid,
    pub status: TicketStatus,
    pub planned_start_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = ticket_assignments)]
#[diesel(belongs_to(Ticket))]
pub struct TicketAssignment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub driver_mark_status: DriverMarkStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_assignments)]
pub struct NewTicketAssignment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub driver_mark_status: DriverMarkStatus,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize)]
#[diesel(table_name = trips)]
pub struct Trip {
    pub id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub ticket_assignment_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub camera_id: Option<Uuid>,
    pub polygon_id: Option<Uuid>,
    pub vehicle_plate_number: String,
    pub detected_plate_number: String,
    pub entry_lpr_event_id: Option<Uuid>,
    pub exit_lpr_event_id: Option<Uuid>,
    pub entry_volume_event_id: Option<Uuid>,
    pub exit_volume_event_id: Option<Uuid>,
    pub detected_volume_entry: Option<f64>,
    pub detected_volume_exit: Option<f64>,
    pub entry_at: DateTime<Utc>,
    pub exit_at: Option<DateTime<Utc>>,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = trips)]
pub struct NewTrip {
    pub id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub ticket_assignment_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub camera_id: Option<Uuid>,
    pub polygon_id: Option<Uuid>,
    pub vehicle_plate_number: String,
    pub detected_plate_number: String,
    pub entry_lpr_event_id: Option<Uuid>,
    pub exit_lpr_event_id: Option<Uuid>,
    pub entry_volume_event_id: Option<Uuid>,
    pub exit_volume_event_id: Option<Uuid>,
    pub detected_volume_entry: Option<f64>,
    pub detected_volume_exit: Option<f64>,
    pub entry_at: DateTime<Utc>,
    pub exit_at: Option<DateTime<Utc>>,
    pub status: TripStatus,
}
