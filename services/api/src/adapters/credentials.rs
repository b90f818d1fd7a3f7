//! services/api/src/adapters/credentials.rs
//!
//! Argon2-backed implementation of the `CredentialVerifier` port. Only the
//! PHC-formatted hash of a password is ever written to the `users` table, and
//! each new identity gets its profile row in the same transaction.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use coderr_core::domain::{Identity, NewAccount};
use coderr_core::ports::{CredentialVerifier, LoginIdentifier, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::{error, warn};

#[derive(Clone)]
pub struct Argon2Credentials {
    pool: PgPool,
}

impl Argon2Credentials {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CredentialRecord {
    id: i64,
    username: String,
    email: String,
    is_staff: bool,
    hashed_password: String,
}

/// Produces a salted PHC string for `password`.
pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

/// Checks `password` against a stored PHC string.
pub fn password_matches(password: &str, stored: &str) -> PortResult<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Stored password hash is malformed".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[async_trait]
impl CredentialVerifier for Argon2Credentials {
    async fn create_account(&self, account: NewAccount) -> PortResult<Identity> {
        let hashed = hash_password(&account.password)?;
        let conflict = |e: sqlx::Error| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict("Username or email is already in use.".to_string())
            }
            other => PortError::Unexpected(other.to_string()),
        };

        let mut tx = self.pool.begin().await.map_err(conflict)?;
        let record = sqlx::query_as::<_, CredentialRecord>(
            "INSERT INTO users (username, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING id, username, email, is_staff, hashed_password",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&hashed)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict)?;

        sqlx::query("INSERT INTO profiles (user_id, type, email) VALUES ($1, $2, $3)")
            .bind(record.id)
            .bind(account.kind.as_str())
            .bind(&account.email)
            .execute(&mut *tx)
            .await
            .map_err(conflict)?;
        tx.commit().await.map_err(conflict)?;

        Ok(Identity {
            id: record.id,
            username: record.username,
            email: record.email,
            is_staff: record.is_staff,
        })
    }

    async fn verify(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> PortResult<Option<Identity>> {
        let (column, value) = match identifier {
            LoginIdentifier::Username(username) => ("username", username.as_str()),
            LoginIdentifier::Email(email) => ("email", email.as_str()),
        };
        let record = sqlx::query_as::<_, CredentialRecord>(&format!(
            "SELECT id, username, email, is_staff, hashed_password FROM users WHERE {} = $1",
            column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let Some(record) = record else {
            return Ok(None);
        };
        if !password_matches(password, &record.hashed_password)? {
            warn!(user_id = record.id, "Rejected login with a wrong password");
            return Ok(None);
        }
        Ok(Some(Identity {
            id: record.id,
            username: record.username,
            email: record.email,
            is_staff: record.is_staff,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_their_own_password() {
        let stored = hash_password("s3cret-pass").unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(password_matches("s3cret-pass", &stored).unwrap());
        assert!(!password_matches("other-pass", &stored).unwrap());
    }

    #[test]
    fn malformed_hashes_are_errors() {
        assert!(password_matches("x", "not-a-phc-string").is_err());
    }
}
