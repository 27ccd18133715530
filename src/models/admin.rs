use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an admin account is allowed to manage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPermissions {
    pub manage_patients: bool,
    pub manage_doctors: bool,
    pub manage_appointments: bool,
    pub view_reports: bool,
}

impl Default for AdminPermissions {
    fn default() -> Self {
        Self {
            manage_patients: true,
            manage_doctors: true,
            manage_appointments: true,
            view_reports: true,
        }
    }
}

/// Admin portal profile. No self-service signup path exists; admins are
/// seeded at bootstrap or created by another admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub position: String,
    pub permissions: AdminPermissions,
    pub created_at: DateTime<Utc>,
}
