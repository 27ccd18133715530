//! Signup: creating an identity plus its role profile atomically.
//!
//! Identity and profile are written inside one transaction so a failure at
//! any point leaves neither row behind — there is no window in which a user
//! exists without a profile.

use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::credentials::hash_password;
use crate::db::repository::{admin as admin_repo, doctor as doctor_repo, patient as patient_repo, user as user_repo};
use crate::db::DatabaseError;
use crate::models::enums::{Gender, Portal};
use crate::models::{
    Admin, AdminPermissions, ConsultationFee, Doctor, Patient, Profile, User,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),

    /// Admin accounts are seeded or created by existing admins, never
    /// self-registered.
    #[error("admin accounts cannot be self-registered")]
    AdminSignupDisabled,

    #[error("an account with that email or username already exists")]
    DuplicateIdentity,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a patient or doctor submits at signup. Doctor-only fields are
/// ignored for patient signups.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    // Doctor portal extras.
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<u32>,
    pub consultation_fee: Option<f64>,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|_| unreachable!())
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{10}$").unwrap_or_else(|_| unreachable!()))
}

fn validate(request: &SignupRequest) -> Result<(), RegistrationError> {
    let fail = |msg: &str| Err(RegistrationError::Validation(msg.into()));

    if !email_pattern().is_match(request.email.trim()) {
        return fail("a valid email address is required");
    }
    let username = request.username.trim();
    if username.len() < 3 || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return fail("username must be at least 3 characters (letters, digits, underscore)");
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return fail("password must be at least 8 characters");
    }
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return fail("first and last name are required");
    }
    if !phone_pattern().is_match(&request.phone) {
        return fail("phone must be exactly 10 digits");
    }
    if request.date_of_birth >= Utc::now().date_naive() {
        return fail("date of birth must be in the past");
    }
    Ok(())
}

/// Register a new identity and role profile for `portal`.
///
/// Takes `&mut Connection` because the two inserts run inside a single
/// rusqlite transaction.
pub fn signup(
    conn: &mut Connection,
    portal: Portal,
    request: &SignupRequest,
) -> Result<(User, Profile), RegistrationError> {
    if portal == Portal::Admin {
        return Err(RegistrationError::AdminSignupDisabled);
    }
    validate(request)?;

    let user = User {
        id: Uuid::new_v4(),
        email: request.email.trim().to_lowercase(),
        username: request.username.trim().to_string(),
        portal,
        password_hash: hash_password(&request.password),
        active: true,
        created_at: Utc::now(),
    };

    let tx = conn.transaction().map_err(DatabaseError::Sqlite)?;
    user_repo::insert_user(&tx, &user).map_err(|err| match err {
        DatabaseError::ConstraintViolation(_) => RegistrationError::DuplicateIdentity,
        other => RegistrationError::Database(other),
    })?;

    let profile = match portal {
        Portal::Patient => {
            let patient = Patient {
                id: Uuid::new_v4(),
                user_id: user.id,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: request.phone.clone(),
                date_of_birth: request.date_of_birth,
                gender: request.gender,
                blood_group: None,
                address: None,
                city: None,
                emergency_contact: None,
                allergies: vec![],
                chronic_conditions: vec![],
                created_at: user.created_at,
            };
            patient_repo::insert_patient(&tx, &patient)?;
            Profile::Patient(patient)
        }
        Portal::Doctor => {
            let doctor = Doctor {
                id: Uuid::new_v4(),
                user_id: user.id,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: request.phone.clone(),
                date_of_birth: request.date_of_birth,
                gender: request.gender,
                specialization: request.specialization.clone(),
                license_number: request.license_number.clone(),
                experience_years: request.experience_years.unwrap_or(0),
                consultation_fee: ConsultationFee {
                    in_person: request.consultation_fee.unwrap_or(0.0),
                    online: None,
                    follow_up: None,
                },
                schedule: vec![],
                unavailable_dates: vec![],
                // Every doctor starts unverified and cannot log in until an
                // admin approves the profile.
                is_verified: false,
                verified_at: None,
                created_at: user.created_at,
            };
            doctor_repo::insert_doctor(&tx, &doctor)?;
            Profile::Doctor(doctor)
        }
        Portal::Admin => unreachable!("rejected above"),
    };

    tx.commit().map_err(DatabaseError::Sqlite)?;
    tracing::info!(user = %user.id, portal = %portal, "account registered");
    Ok((user, profile))
}

/// Create the bootstrap admin account if no admin exists yet. Returns
/// whether an account was created.
pub fn seed_default_admin(
    conn: &mut Connection,
    email: &str,
    username: &str,
    password: &str,
) -> Result<bool, RegistrationError> {
    if user_repo::count_by_portal(conn, Portal::Admin)? > 0 {
        return Ok(false);
    }

    let user = User {
        id: Uuid::new_v4(),
        email: email.to_lowercase(),
        username: username.to_string(),
        portal: Portal::Admin,
        password_hash: hash_password(password),
        active: true,
        created_at: Utc::now(),
    };
    let admin = Admin {
        id: Uuid::new_v4(),
        user_id: user.id,
        first_name: "System".into(),
        last_name: "Administrator".into(),
        department: "Administration".into(),
        position: "Administrator".into(),
        permissions: AdminPermissions::default(),
        created_at: user.created_at,
    };

    let tx = conn.transaction().map_err(DatabaseError::Sqlite)?;
    user_repo::insert_user(&tx, &user)?;
    admin_repo::insert_admin(&tx, &admin)?;
    tx.commit().map_err(DatabaseError::Sqlite)?;

    tracing::info!(username, "seeded bootstrap admin account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::verify_password;
    use crate::db::repository::user::find_by_login_or_email;
    use crate::db::sqlite::open_memory_database;

    fn request(tag: &str) -> SignupRequest {
        SignupRequest {
            email: format!("{tag}@example.com"),
            username: tag.to_string(),
            password: "hunter2hunter2".into(),
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            phone: "9876543210".into(),
            date_of_birth: "1990-05-20".parse().unwrap(),
            gender: Gender::Female,
            specialization: None,
            license_number: None,
            experience_years: None,
            consultation_fee: None,
        }
    }

    #[test]
    fn patient_signup_creates_identity_and_profile() {
        let mut conn = open_memory_database().unwrap();
        let (user, profile) = signup(&mut conn, Portal::Patient, &request("asha")).unwrap();

        assert_eq!(user.portal, Portal::Patient);
        assert!(verify_password("hunter2hunter2", &user.password_hash));
        assert!(profile.as_patient().is_some());

        let stored = find_by_login_or_email(&conn, "asha").unwrap().unwrap();
        assert_eq!(stored.id, user.id);
    }

    #[test]
    fn doctor_signup_starts_unverified() {
        let mut conn = open_memory_database().unwrap();
        let mut req = request("ravi");
        req.specialization = Some("Cardiology".into());
        req.consultation_fee = Some(650.0);

        let (_, profile) = signup(&mut conn, Portal::Doctor, &req).unwrap();
        let doctor = profile.as_doctor().unwrap();
        assert!(!doctor.is_verified);
        assert_eq!(doctor.consultation_fee.in_person, 650.0);
    }

    #[test]
    fn admin_self_signup_is_refused() {
        let mut conn = open_memory_database().unwrap();
        assert!(matches!(
            signup(&mut conn, Portal::Admin, &request("boss")),
            Err(RegistrationError::AdminSignupDisabled)
        ));
    }

    #[test]
    fn duplicate_email_reports_duplicate_not_internal_error() {
        let mut conn = open_memory_database().unwrap();
        signup(&mut conn, Portal::Patient, &request("dup")).unwrap();

        let mut again = request("dup2");
        again.email = "dup@example.com".into();
        assert!(matches!(
            signup(&mut conn, Portal::Patient, &again),
            Err(RegistrationError::DuplicateIdentity)
        ));
    }

    #[test]
    fn duplicate_signup_leaves_no_orphan_identity() {
        let mut conn = open_memory_database().unwrap();
        signup(&mut conn, Portal::Patient, &request("dup")).unwrap();

        // Same username: the user insert fails, nothing is committed.
        let again = request("dup");
        assert!(signup(&mut conn, Portal::Patient, &again).is_err());
        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        let patients: i64 = conn
            .query_row("SELECT COUNT(*) FROM patients", [], |r| r.get(0))
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(patients, 1);
    }

    #[test]
    fn field_validation_failures() {
        let mut conn = open_memory_database().unwrap();

        let mut bad = request("x1");
        bad.email = "not-an-email".into();
        assert!(matches!(
            signup(&mut conn, Portal::Patient, &bad),
            Err(RegistrationError::Validation(_))
        ));

        let mut bad = request("x2");
        bad.password = "short".into();
        assert!(matches!(
            signup(&mut conn, Portal::Patient, &bad),
            Err(RegistrationError::Validation(_))
        ));

        let mut bad = request("x3");
        bad.phone = "12345".into();
        assert!(matches!(
            signup(&mut conn, Portal::Patient, &bad),
            Err(RegistrationError::Validation(_))
        ));

        let mut bad = request("x4");
        bad.date_of_birth = "2999-01-01".parse().unwrap();
        assert!(matches!(
            signup(&mut conn, Portal::Patient, &bad),
            Err(RegistrationError::Validation(_))
        ));
    }

    #[test]
    fn seed_admin_runs_once() {
        let mut conn = open_memory_database().unwrap();
        assert!(seed_default_admin(&mut conn, "admin@example.com", "admin", "changeme123").unwrap());
        assert!(!seed_default_admin(&mut conn, "admin@example.com", "admin", "changeme123").unwrap());

        let admin = find_by_login_or_email(&conn, "admin").unwrap().unwrap();
        assert_eq!(admin.portal, Portal::Admin);
    }
}
