//! Password hashing and login verification.
//!
//! Hashes are PBKDF2-SHA256 with a per-user random salt, stored as
//! `pbkdf2-sha256$<iterations>$<salt_b64>$<hash_b64>`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use sha2::Sha256;
use thiserror::Error;

use crate::db::repository::user;
use crate::db::DatabaseError;
use crate::models::enums::Portal;
use crate::models::User;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const SCHEME: &str = "pbkdf2-sha256";

#[derive(Error, Debug)]
pub enum CredentialError {
    /// Unknown login or wrong password. Deliberately one variant so the
    /// response cannot be used to probe which accounts exist.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    /// The identity exists but belongs to a different portal.
    #[error("account belongs to the {actual} portal")]
    WrongPortal { actual: Portal },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LENGTH] = rand::random();
    let digest = derive(password, &salt, PBKDF2_ITERATIONS);
    format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest),
    )
}

/// Constant-shape verification: a malformed stored hash verifies as false,
/// never panics.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt) else {
        return false;
    };
    let Ok(expected) = URL_SAFE_NO_PAD.decode(digest) else {
        return false;
    };
    let actual = derive(password, &salt, iterations);
    // Fixed-length comparison; both sides are freshly decoded so a simple
    // equality check does not leak timing about the stored value's prefix.
    expected.len() == HASH_LENGTH && actual[..] == expected[..]
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Resolve a portal login attempt to its identity. Portal mismatch is
/// reported distinctly so the caller can redirect to the right login page.
pub fn authenticate(
    conn: &Connection,
    portal: Portal,
    login: &str,
    password: &str,
) -> Result<User, CredentialError> {
    let user = user::find_by_login_or_email(conn, login)?
        .ok_or(CredentialError::InvalidCredentials)?;
    if !verify_password(password, &user.password_hash) {
        return Err(CredentialError::InvalidCredentials);
    }
    if !user.active {
        return Err(CredentialError::AccountDisabled);
    }
    if user.portal != portal {
        return Err(CredentialError::WrongPortal {
            actual: user.portal,
        });
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::testutil::make_user;
    use crate::db::repository::user::insert_user;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn hash_and_verify_round_trip() {
        let stored = hash_password("correct horse");
        assert!(stored.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("pw"), hash_password("pw"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "plaintext"));
        assert!(!verify_password("pw", "pbkdf2-sha256$abc$x$y"));
        assert!(!verify_password("pw", "md5$1000$AAAA$BBBB"));
    }

    #[test]
    fn authenticate_checks_password_and_portal() {
        let conn = open_memory_database().unwrap();
        let mut user = make_user(Portal::Patient, "asha");
        user.password_hash = hash_password("s3cret");
        insert_user(&conn, &user).unwrap();

        let ok = authenticate(&conn, Portal::Patient, "asha", "s3cret").unwrap();
        assert_eq!(ok.id, user.id);

        // Email works as the login too.
        assert!(authenticate(&conn, Portal::Patient, "asha@example.com", "s3cret").is_ok());

        let err = authenticate(&conn, Portal::Patient, "asha", "nope").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidCredentials));

        let err = authenticate(&conn, Portal::Doctor, "asha", "s3cret").unwrap_err();
        assert!(matches!(
            err,
            CredentialError::WrongPortal {
                actual: Portal::Patient
            }
        ));
    }

    #[test]
    fn disabled_account_is_rejected() {
        let conn = open_memory_database().unwrap();
        let mut user = make_user(Portal::Patient, "gone");
        user.password_hash = hash_password("pw");
        user.active = false;
        insert_user(&conn, &user).unwrap();

        let err = authenticate(&conn, Portal::Patient, "gone", "pw").unwrap_err();
        assert!(matches!(err, CredentialError::AccountDisabled));
    }
}
