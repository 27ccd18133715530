//! The portal gate: one authorization decision shared by login and every
//! protected route. Resolves an identity to its role profile or rejects
//! with a redirect hint to the portal's own login page.

use rusqlite::Connection;

use crate::db::repository::{admin, doctor, patient};
use crate::db::DatabaseError;
use crate::models::enums::Portal;
use crate::models::{Profile, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// No session, or the account is disabled.
    Unauthenticated,
    /// Logged in, but into a different portal.
    WrongPortal,
    /// Identity exists with no matching profile row (torn signup).
    ProfileMissing,
    /// Doctor identity whose profile an admin has not verified.
    Unverified,
}

/// Why the gate refused, plus where to send the caller. `required` is the
/// portal whose login page the client should redirect to.
#[derive(Debug, Clone, Copy)]
pub struct GateRejection {
    pub kind: RejectionKind,
    pub required: Portal,
}

impl GateRejection {
    fn new(kind: RejectionKind, required: Portal) -> Self {
        Self { kind, required }
    }

    pub fn redirect(&self) -> &'static str {
        self.required.login_path()
    }

    /// Only an unverified doctor gets their live session torn down; the
    /// other rejections leave the session intact for its own portal.
    pub fn revokes_session(&self) -> bool {
        self.kind == RejectionKind::Unverified
    }
}

/// Decide whether `user` may act in `required`'s portal, loading the role
/// profile on success.
pub fn authorize(
    conn: &Connection,
    user: Option<&User>,
    required: Portal,
) -> Result<Result<Profile, GateRejection>, DatabaseError> {
    let Some(user) = user else {
        return Ok(Err(GateRejection::new(
            RejectionKind::Unauthenticated,
            required,
        )));
    };
    if !user.active {
        return Ok(Err(GateRejection::new(
            RejectionKind::Unauthenticated,
            required,
        )));
    }
    if user.portal != required {
        return Ok(Err(GateRejection::new(RejectionKind::WrongPortal, required)));
    }

    let profile = match required {
        Portal::Patient => patient::get_patient_by_user(conn, &user.id)?.map(Profile::Patient),
        Portal::Doctor => doctor::get_doctor_by_user(conn, &user.id)?.map(Profile::Doctor),
        Portal::Admin => admin::get_admin_by_user(conn, &user.id)?.map(Profile::Admin),
    };
    let Some(profile) = profile else {
        return Ok(Err(GateRejection::new(
            RejectionKind::ProfileMissing,
            required,
        )));
    };

    if let Profile::Doctor(doctor) = &profile {
        if !doctor.is_verified {
            return Ok(Err(GateRejection::new(RejectionKind::Unverified, required)));
        }
    }

    Ok(Ok(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::testutil::{make_user, seed_admin, seed_doctor, seed_patient};
    use crate::db::repository::user::insert_user;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn anonymous_is_unauthenticated_with_redirect() {
        let conn = open_memory_database().unwrap();
        let rejection = authorize(&conn, None, Portal::Doctor)
            .unwrap()
            .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Unauthenticated);
        assert_eq!(rejection.redirect(), "/doctor/login");
        assert!(!rejection.revokes_session());
    }

    #[test]
    fn patient_admitted_to_patient_portal_only() {
        let conn = open_memory_database().unwrap();
        let (user, patient) = seed_patient(&conn, "asha");

        let profile = authorize(&conn, Some(&user), Portal::Patient)
            .unwrap()
            .unwrap();
        assert_eq!(profile.id(), patient.id);

        let rejection = authorize(&conn, Some(&user), Portal::Admin)
            .unwrap()
            .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::WrongPortal);
        assert_eq!(rejection.redirect(), "/admin/login");
        assert!(!rejection.revokes_session());
    }

    #[test]
    fn verified_doctor_passes_unverified_is_revoked() {
        let conn = open_memory_database().unwrap();
        let (ok_user, _) = seed_doctor(&conn, "verified", true);
        let (pending_user, _) = seed_doctor(&conn, "pending", false);

        assert!(authorize(&conn, Some(&ok_user), Portal::Doctor)
            .unwrap()
            .is_ok());

        let rejection = authorize(&conn, Some(&pending_user), Portal::Doctor)
            .unwrap()
            .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Unverified);
        assert!(rejection.revokes_session());
        assert_eq!(rejection.redirect(), "/doctor/login");
    }

    #[test]
    fn admin_profile_resolves() {
        let conn = open_memory_database().unwrap();
        let (user, admin) = seed_admin(&conn, "ira");
        let profile = authorize(&conn, Some(&user), Portal::Admin)
            .unwrap()
            .unwrap();
        assert_eq!(profile.id(), admin.id);
    }

    #[test]
    fn identity_without_profile_is_rejected() {
        let conn = open_memory_database().unwrap();
        let user = make_user(Portal::Patient, "torn");
        insert_user(&conn, &user).unwrap();

        let rejection = authorize(&conn, Some(&user), Portal::Patient)
            .unwrap()
            .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::ProfileMissing);
    }

    #[test]
    fn disabled_account_is_unauthenticated() {
        let conn = open_memory_database().unwrap();
        let (mut user, _) = seed_patient(&conn, "off");
        user.active = false;

        let rejection = authorize(&conn, Some(&user), Portal::Patient)
            .unwrap()
            .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Unauthenticated);
    }
}
