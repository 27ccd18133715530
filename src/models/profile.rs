use serde::Serialize;
use uuid::Uuid;

use super::admin::Admin;
use super::doctor::Doctor;
use super::enums::Portal;
use super::patient::Patient;

/// Role profile as a tagged union keyed by the identity's portal.
/// One `User` owns exactly one `Profile` variant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "portal", rename_all = "kebab-case")]
pub enum Profile {
    Patient(Patient),
    Doctor(Doctor),
    Admin(Admin),
}

impl Profile {
    pub fn portal(&self) -> Portal {
        match self {
            Self::Patient(_) => Portal::Patient,
            Self::Doctor(_) => Portal::Doctor,
            Self::Admin(_) => Portal::Admin,
        }
    }

    /// Profile record id (not the user id).
    pub fn id(&self) -> Uuid {
        match self {
            Self::Patient(p) => p.id,
            Self::Doctor(d) => d.id,
            Self::Admin(a) => a.id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Patient(p) => p.full_name(),
            Self::Doctor(d) => d.full_name(),
            Self::Admin(a) => format!("{} {}", a.first_name, a.last_name),
        }
    }

    pub fn as_patient(&self) -> Option<&Patient> {
        match self {
            Self::Patient(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_doctor(&self) -> Option<&Doctor> {
        match self {
            Self::Doctor(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_admin(&self) -> Option<&Admin> {
        match self {
            Self::Admin(a) => Some(a),
            _ => None,
        }
    }
}
