use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::models::User;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 150;

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials.")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials(e) => AppError::Authentication(e),
            AuthError::UnexpectedError(e) => AppError::Unexpected(e),
        }
    }
}

pub(crate) async fn user_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_staff, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

async fn user_by_username(db: &SqlitePool, username: &str) -> Result<Option<User>, AppError> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, is_staff, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(db)
    .await?)
}

/// Usernames are 1 to 150 characters of letters, digits and `@.+-_`.
fn validate_username(username: &str) -> Result<(), AppError> {
    let valid = !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LENGTH
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c));
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Enter a valid username: letters, digits and @/./+/-/_ only.".to_string(),
        ))
    }
}

#[tracing::instrument(name = "Register user", skip(db, registration), fields(username = %registration.username))]
pub async fn register(db: &SqlitePool, registration: &Registration) -> Result<User, AppError> {
    let username = registration.username.trim();
    validate_username(username)?;

    if registration.password1 != registration.password2 {
        tracing::warn!("Password confirmation mismatch");
        return Err(AppError::Validation("The two password fields didn't match.".to_string()));
    }
    if registration.password1.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        )));
    }

    let password_hash = compute_password_hash(registration.password1.clone()).await?;
    let id = insert_user(db, username, &password_hash, false)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => {
                AppError::Conflict("A user with that username already exists.".to_string())
            }
            other => other,
        })?;

    tracing::info!("User {} registered with id {}", username, id);
    user_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
}

pub(crate) async fn insert_user(
    db: &SqlitePool,
    username: &str,
    password_hash: &str,
    is_staff: bool,
) -> Result<i64, AppError> {
    let id = sqlx::query(
        "INSERT INTO users (username, password_hash, is_staff, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(is_staff)
    .bind(Utc::now())
    .execute(db)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Unknown usernames are verified against a fixed hash so both failure paths
/// cost the same.
#[tracing::instrument(name = "Validate user credentials", skip(credentials, db), fields(username = %credentials.username))]
pub async fn validate_credentials(credentials: &Credentials, db: &SqlitePool) -> Result<User, AuthError> {
    let mut user = None;
    let mut expected_password_hash = String::from(
        "$argon2id$v=19$m=15000,t=2,p=1$\
        gZiV/M1gPc22ElAH/Jh1Hw$\
        CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno",
    );

    match user_by_username(db, credentials.username.trim()).await {
        Ok(Some(found)) => {
            expected_password_hash = found.password_hash.clone();
            user = Some(found);
        }
        Ok(None) => tracing::debug!("No user named {}", credentials.username),
        Err(error) => {
            tracing::warn!("Failed to retrieve stored credentials: {:?}", error);
        }
    }

    verify_password_hash(&expected_password_hash, credentials.password.expose_secret())?;

    user.ok_or_else(|| AuthError::InvalidCredentials(anyhow::anyhow!("Unknown username.")))
}

#[tracing::instrument(name = "Verify password hash", skip(expected_password_hash, password_candidate))]
fn verify_password_hash(expected_password_hash: &str, password_candidate: &str) -> Result<(), AuthError> {
    let expected_password_hash = PasswordHash::new(expected_password_hash)
        .context("Failed to parse hash in PHC string format.")?;

    Argon2::default()
        .verify_password(password_candidate.as_bytes(), &expected_password_hash)
        .context("Invalid password.")
        .map_err(AuthError::InvalidCredentials)
}

#[tracing::instrument(name = "Compute password hash", skip(password))]
pub async fn compute_password_hash(password: String) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let params = Params::new(15000, 2, 1, None).map_err(|e| {
        tracing::error!("Failed to create Argon2 parameters: {:?}", e);
        AppError::Unexpected(anyhow::anyhow!("Failed to create Argon2 params: {}", e))
    })?;

    let password_hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("Failed to hash password: {:?}", e);
            AppError::Unexpected(anyhow::anyhow!("Failed to hash password: {}", e))
        })?
        .to_string();

    Ok(password_hash)
}
