//! Session-backed login state and one-shot flash messages.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Uri},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::errors::AppError;
use crate::models::User;

const USER_KEY: &str = "user";
const FLASH_KEY: &str = "flash";

pub const LOGIN_PATH: &str = "/accounts/login";

/// What the session remembers about the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

/// Rotates the session id and stores `user` in it.
#[tracing::instrument(name = "Log in session", skip(session, user), fields(username = %user.username))]
pub async fn log_in(session: &Session, user: &User) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(USER_KEY, SessionUser::from(user)).await?;
    Ok(())
}

pub async fn log_out(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

pub async fn session_user(session: &Session) -> Result<Option<SessionUser>, AppError> {
    Ok(session.get::<SessionUser>(USER_KEY).await?)
}

/// `/accounts/login?next=<path and query of uri>`.
pub fn login_redirect_target(uri: &Uri) -> String {
    let next = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    match serde_urlencoded::to_string(&[("next", next.as_str())]) {
        Ok(query) => format!("{}?{}", LOGIN_PATH, query),
        Err(_) => LOGIN_PATH.to_string(),
    }
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// A logged-in user. Anonymous requests are redirected to the login page
/// with the requested path in `next`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match session_user(&session).await.map_err(IntoResponse::into_response)? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::debug!("Anonymous request to {} redirected to login", parts.uri.path());
                Err(Redirect::to(&login_redirect_target(&parts.uri)).into_response())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

pub async fn flash(session: &Session, level: FlashLevel, text: impl Into<String>) -> Result<(), AppError> {
    let mut queued: Vec<FlashMessage> = session.get(FLASH_KEY).await?.unwrap_or_default();
    queued.push(FlashMessage {
        level,
        text: text.into(),
    });
    session.insert(FLASH_KEY, queued).await?;
    Ok(())
}

/// Queued messages, left in the session until a page shows them.
pub async fn peek_flashes(session: &Session) -> Result<Vec<FlashMessage>, AppError> {
    Ok(session.get(FLASH_KEY).await?.unwrap_or_default())
}

/// Drops the oldest `shown` messages, keeping anything queued since.
pub async fn discard_flashes(session: &Session, shown: usize) -> Result<(), AppError> {
    let mut queued = peek_flashes(session).await?;
    if shown >= queued.len() {
        session.remove::<Vec<FlashMessage>>(FLASH_KEY).await?;
    } else {
        queued.drain(..shown);
        session.insert(FLASH_KEY, queued).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    #[test]
    fn login_target_keeps_path_and_query() {
        let uri: Uri = "/interactions/profile/?tab=ratings".parse().unwrap();
        assert_eq!(
            login_redirect_target(&uri),
            "/accounts/login?next=%2Finteractions%2Fprofile%2F%3Ftab%3Dratings"
        );
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/movies/")), "/movies/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[tokio::test]
    async fn flashes_stay_queued_until_discarded() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        flash(&session, FlashLevel::Success, "Saved").await.unwrap();
        flash(&session, FlashLevel::Error, "Oops").await.unwrap();

        let messages = peek_flashes(&session).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].level, FlashLevel::Error);
        assert_eq!(peek_flashes(&session).await.unwrap().len(), 2);

        discard_flashes(&session, 2).await.unwrap();
        assert!(peek_flashes(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn discarding_keeps_newer_messages() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        flash(&session, FlashLevel::Info, "First").await.unwrap();
        let shown = peek_flashes(&session).await.unwrap().len();
        flash(&session, FlashLevel::Info, "Second").await.unwrap();

        discard_flashes(&session, shown).await.unwrap();
        let left = peek_flashes(&session).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].text, "Second");
    }
}
