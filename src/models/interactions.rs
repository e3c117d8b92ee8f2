use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::content::{ContentKind, ContentRef, PlayableRef};
use crate::errors::AppError;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A star rating known to be within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingValue(i64);

impl RatingValue {
    pub fn new(value: i64) -> Result<Self, AppError> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::Validation(
                "Invalid rating value. Please select 1-5 stars.".to_string(),
            ))
        }
    }

    /// Parses a raw form value; anything that is not an integer is invalid.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let value = raw
            .map(str::trim)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        Self::new(value)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Watch progress as a percentage within `0.0..=100.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress(f64);

impl Progress {
    pub fn new(value: f64) -> Result<Self, AppError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::Validation(
                "Progress must be between 0 and 100".to_string(),
            ))
        }
    }

    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::new(0.0),
            Some(s) => s
                .parse::<f64>()
                .map_err(|_| AppError::Validation("Progress must be a number".to_string()))
                .and_then(Self::new),
        }
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub target_kind: ContentKind,
    pub target_id: i64,
    pub rating: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub fn target(&self) -> ContentRef {
        ContentRef::new(self.target_kind, self.target_id)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub target_kind: ContentKind,
    pub target_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn target(&self) -> ContentRef {
        ContentRef::new(self.target_kind, self.target_id)
    }
}

/// A review joined with its author, as listed on detail pages.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    pub id: i64,
    pub username: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewWithAuthor {
    pub fn posted_on(&self) -> String {
        self.created_at.format("%B %-d, %Y").to_string()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Download {
    pub id: i64,
    pub user_id: i64,
    pub target_kind: ContentKind,
    pub target_id: i64,
    pub ip_address: Option<String>,
    pub downloaded_at: DateTime<Utc>,
}

impl Download {
    pub fn target(&self) -> Result<PlayableRef, AppError> {
        PlayableRef::try_from(ContentRef::new(self.target_kind, self.target_id))
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WatchHistory {
    pub id: i64,
    pub user_id: i64,
    pub target_kind: ContentKind,
    pub target_id: i64,
    pub progress: f64,
    pub watched_at: DateTime<Utc>,
}

/// One line of a user's activity with the title of what it points at.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityEntry {
    pub target_kind: ContentKind,
    pub target_id: i64,
    pub title: String,
    pub url: String,
    /// Star count, progress percentage or review title, depending on the list.
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn when(&self) -> String {
        self.at.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub preferred_language: String,
    pub date_of_birth: Option<NaiveDate>,
    pub country: String,
}

impl UserProfile {
    pub fn date_of_birth_value(&self) -> String {
        self.date_of_birth
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Whether a create-or-update call inserted a new row or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
}
