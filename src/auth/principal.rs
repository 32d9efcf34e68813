use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    AkimatAdmin,
    TooAdmin,
    ContractorAdmin,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AkimatAdmin => "AKIMAT_ADMIN",
            Role::TooAdmin => "TOO_ADMIN",
            Role::ContractorAdmin => "CONTRACTOR_ADMIN",
            Role::Driver => "DRIVER",
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AKIMAT_ADMIN" => Ok(Role::AkimatAdmin),
            "TOO_ADMIN" => Ok(Role::TooAdmin),
            "CONTRACTOR_ADMIN" => Ok(Role::ContractorAdmin),
            "DRIVER" => Ok(Role::Driver),
            _ => Err(ParseEnumError::new("role", value)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller on whose behalf a core operation runs. Resolved once per
/// request and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub role: Role,
    pub org_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
}

impl Principal {
    pub fn new(role: Role, org_id: Option<Uuid>, driver_id: Option<Uuid>) -> Self {
        Self {
            role,
            org_id,
            driver_id,
        }
    }

    pub fn akimat(org_id: Uuid) -> Self {
        Self::new(Role::AkimatAdmin, Some(org_id), None)
    }

    pub fn too(org_id: Uuid) -> Self {
        Self::new(Role::TooAdmin, Some(org_id), None)
    }

    pub fn contractor(org_id: Uuid) -> Self {
        Self::new(Role::ContractorAdmin, Some(org_id), None)
    }

    pub fn driver(driver_id: Uuid) -> Self {
        Self::new(Role::Driver, None, Some(driver_id))
    }

    pub fn is_akimat(&self) -> bool {
        self.role == Role::AkimatAdmin
    }

    pub fn is_too(&self) -> bool {
        self.role == Role::TooAdmin
    }

    pub fn is_contractor(&self) -> bool {
        self.role == Role::ContractorAdmin
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}
