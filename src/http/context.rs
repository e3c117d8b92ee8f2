use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use chrono::Utc;
use std::net::SocketAddr;
use tower_sessions::Session;

use super::session::{discard_flashes, peek_flashes, session_user, FlashMessage, SessionUser};
use crate::errors::AppError;
use crate::models::Advertisement;
use crate::services::ads::active_ads;
use crate::InnerState;

/// Everything the shared page layout needs, computed once per request:
/// the visitor, pending flash messages and the ads live right now.
///
/// Messages are only read here. They leave the session once a page that
/// displays them has rendered, so an error response does not swallow them.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<SessionUser>,
    pub messages: Vec<FlashMessage>,
    pub active_ads: Vec<Advertisement>,
    session: Option<Session>,
}

impl PageContext {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn ads_of_type(&self, ad_type: &str) -> Vec<&Advertisement> {
        self.active_ads
            .iter()
            .filter(|ad| ad.ad_type.as_str() == ad_type)
            .collect()
    }

    pub async fn mark_messages_shown(&self) -> Result<(), AppError> {
        match &self.session {
            Some(session) if !self.messages.is_empty() => discard_flashes(session, self.messages.len()).await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl FromRequestParts<InnerState> for PageContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &InnerState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Unexpected(anyhow::anyhow!(msg)))?;

        let user = session_user(&session).await?;
        let messages = peek_flashes(&session).await?;
        let active_ads = active_ads(&state.db, Utc::now()).await?;

        Ok(PageContext {
            user,
            messages,
            active_ads,
            session: Some(session),
        })
    }
}

/// First `X-Forwarded-For` entry, else the peer address when known.
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}
