use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::content::ContentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Published,
}

impl Default for PublicationStatus {
    fn default() -> Self {
        PublicationStatus::Draft
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn url(&self) -> String {
        format!("/movies/category/{}/", self.slug)
    }
}

/// Actors and directors share the same shape.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub bio: String,
    pub birth_date: Option<NaiveDate>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub release_date: NaiveDate,
    /// Minutes.
    pub duration: i64,
    pub director_id: Option<i64>,
    pub category_id: i64,
    pub poster: Option<String>,
    pub trailer_url: Option<String>,
    pub video_file: Option<String>,
    pub status: PublicationStatus,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    pub fn url(&self) -> String {
        format!("/movies/{}/", self.slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub director_id: Option<i64>,
    pub category_id: i64,
    pub poster: Option<String>,
    pub trailer_url: Option<String>,
    pub status: PublicationStatus,
    pub seasons_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    pub fn url(&self) -> String {
        format!("/movies/series/{}/", self.slug)
    }
}

/// Episodes are grouped into seasons of this many by their number.
pub const EPISODES_PER_SEASON: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Episode {
    pub id: i64,
    pub series_id: i64,
    pub episode_number: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub duration: i64,
    pub release_date: NaiveDate,
    pub video_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Episode {
    pub fn season_number(&self) -> i64 {
        season_for(self.episode_number)
    }

    pub fn url(&self, series_slug: &str) -> String {
        format!("/movies/series/{}/episode/{}/", series_slug, self.episode_number)
    }

    pub fn label(&self, series_title: &str) -> String {
        format!(
            "{} - S{}E{}: {}",
            series_title,
            self.season_number(),
            self.episode_number,
            self.title
        )
    }
}

/// `ceil(episode_number / 10)`.
pub fn season_for(episode_number: i64) -> i64 {
    if episode_number <= 0 {
        return 0;
    }
    (episode_number + EPISODES_PER_SEASON - 1) / EPISODES_PER_SEASON
}

/// A published catalog item as shown in list, search and category pages.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CatalogItem {
    pub kind: ContentKind,
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub release_date: NaiveDate,
    pub poster: Option<String>,
    pub category_name: String,
    pub series_slug: Option<String>,
    pub episode_number: Option<i64>,
}

impl CatalogItem {
    pub fn url(&self) -> String {
        match self.kind {
            ContentKind::Movie => format!("/movies/{}/", self.slug),
            ContentKind::Series => format!("/movies/series/{}/", self.slug),
            ContentKind::Episode => format!(
                "/movies/series/{}/episode/{}/",
                self.series_slug.as_deref().unwrap_or_default(),
                self.episode_number.unwrap_or_default()
            ),
        }
    }

    pub fn poster_url(&self) -> String {
        match &self.poster {
            Some(path) if !path.is_empty() => format!("/media/{}", path),
            _ => String::new(),
        }
    }

    pub fn year(&self) -> String {
        self.release_date.format("%Y").to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AdType {
    Banner,
    Popup,
    Video,
    Sidebar,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Banner => "banner",
            AdType::Popup => "popup",
            AdType::Video => "video",
            AdType::Sidebar => "sidebar",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Advertisement {
    pub id: i64,
    pub title: String,
    pub ad_type: AdType,
    pub content: String,
    pub image: Option<String>,
    pub url: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Advertisement {
    /// Shown only when switched on and `now` falls inside `[start_date, end_date]`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }

    pub fn link(&self) -> String {
        self.url.clone().unwrap_or_default()
    }
}
