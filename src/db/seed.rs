//! First-run data: default categories, the admin account and JSON fixtures.
//! Every step can be re-run without creating duplicates.

use anyhow::Context;
use chrono::NaiveDate;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::errors::AppError;
use crate::models::PublicationStatus;
use crate::services::accounts::{compute_password_hash, insert_user};
use crate::services::catalog::category_by_slug;
use crate::services::records::{
    ensure_category, insert_actor, insert_advertisement, insert_director, insert_episode, insert_movie,
    insert_series, slugify, NewAdvertisement, NewCategory, NewEpisode, NewMovie, NewPerson, NewSeries,
};

pub const DEFAULT_CATEGORIES: [&str; 10] = [
    "Action",
    "Comedy",
    "Drama",
    "Horror",
    "Romance",
    "Sci-Fi",
    "Thriller",
    "Documentary",
    "Animation",
    "Adventure",
];

pub const ADMIN_USERNAME: &str = "admin";

/// Creates the default categories. Returns each name with whether it was new.
#[tracing::instrument(name = "Seed default categories", skip(db))]
pub async fn create_default_categories(db: &SqlitePool) -> Result<Vec<(String, bool)>, AppError> {
    let mut results = Vec::with_capacity(DEFAULT_CATEGORIES.len());
    for name in DEFAULT_CATEGORIES {
        let (category, created) = ensure_category(db, name, &name.to_lowercase()).await?;
        results.push((category.name, created));
    }
    Ok(results)
}

/// Creates the `admin` staff account unless it exists. Returns `true` when created.
#[tracing::instrument(name = "Seed superuser", skip(db, password))]
pub async fn create_superuser(db: &SqlitePool, password: &Secret<String>) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(ADMIN_USERNAME)
        .fetch_one(db)
        .await?;
    if exists {
        return Ok(false);
    }

    let password_hash = compute_password_hash(password.expose_secret().clone()).await?;
    insert_user(db, ADMIN_USERNAME, &password_hash, true).await?;
    tracing::info!("Superuser '{}' created", ADMIN_USERNAME);
    Ok(true)
}

#[derive(Debug, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub categories: Vec<NewCategory>,
    #[serde(default)]
    pub directors: Vec<NewPerson>,
    #[serde(default)]
    pub actors: Vec<NewPerson>,
    #[serde(default)]
    pub movies: Vec<MovieFixture>,
    #[serde(default)]
    pub series: Vec<SeriesFixture>,
    #[serde(default)]
    pub advertisements: Vec<NewAdvertisement>,
}

/// A movie whose category, director and cast are named rather than numbered.
#[derive(Debug, Deserialize)]
pub struct MovieFixture {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i64,
    /// Category slug.
    pub category: String,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub trailer_url: Option<String>,
    #[serde(default)]
    pub video_file: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct SeriesFixture {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    pub release_date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub trailer_url: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
    #[serde(default)]
    pub seasons_count: Option<i64>,
    #[serde(default)]
    pub episodes: Vec<EpisodeFixture>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodeFixture {
    pub episode_number: i64,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    pub duration: i64,
    pub release_date: NaiveDate,
    #[serde(default)]
    pub video_file: Option<String>,
}

/// How many records an import created and how many were already present.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub skipped: usize,
}

impl ImportReport {
    fn tally(&mut self, created: bool) {
        if created {
            self.created += 1;
        } else {
            self.skipped += 1;
        }
    }
}

pub fn load_fixtures(path: &Path) -> Result<Fixtures, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let fixtures = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse fixtures from {}", path.display()))?;
    Ok(fixtures)
}

async fn existing_id(db: &SqlitePool, sql: &str, key: &str) -> Result<Option<i64>, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(sql).bind(key).fetch_optional(db).await?)
}

async fn director_id(db: &SqlitePool, name: &str) -> Result<i64, AppError> {
    if let Some(id) = existing_id(db, "SELECT id FROM directors WHERE name = ?", name).await? {
        return Ok(id);
    }
    insert_director(db, &person(name)).await
}

async fn actor_ids(db: &SqlitePool, names: &[String]) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = match existing_id(db, "SELECT id FROM actors WHERE name = ?", name).await? {
            Some(id) => id,
            None => insert_actor(db, &person(name)).await?,
        };
        ids.push(id);
    }
    Ok(ids)
}

fn person(name: &str) -> NewPerson {
    NewPerson {
        name: name.to_string(),
        bio: String::new(),
        birth_date: None,
        image: None,
    }
}

async fn optional_director(db: &SqlitePool, name: &Option<String>) -> Result<Option<i64>, AppError> {
    match name {
        Some(name) => Ok(Some(director_id(db, name).await?)),
        None => Ok(None),
    }
}

fn fixture_slug(slug: &Option<String>, title: &str) -> String {
    slug.clone().unwrap_or_else(|| slugify(title))
}

/// Inserts fixture records that are not present yet. Categories match on
/// name, people on name, movies and series on slug, episodes on
/// `(series, number)` and advertisements on title.
#[tracing::instrument(name = "Import fixtures", skip(db, fixtures))]
pub async fn import_fixtures(db: &SqlitePool, fixtures: &Fixtures) -> Result<ImportReport, AppError> {
    let mut report = ImportReport::default();

    for category in &fixtures.categories {
        let slug = fixture_slug(&category.slug, &category.name);
        let (_, created) = ensure_category(db, &category.name, &slug).await?;
        report.tally(created);
    }

    for new in &fixtures.directors {
        let found = existing_id(db, "SELECT id FROM directors WHERE name = ?", &new.name).await?;
        if found.is_none() {
            insert_director(db, new).await?;
        }
        report.tally(found.is_none());
    }

    for new in &fixtures.actors {
        let found = existing_id(db, "SELECT id FROM actors WHERE name = ?", &new.name).await?;
        if found.is_none() {
            insert_actor(db, new).await?;
        }
        report.tally(found.is_none());
    }

    for fixture in &fixtures.movies {
        let slug = fixture_slug(&fixture.slug, &fixture.title);
        if existing_id(db, "SELECT id FROM movies WHERE slug = ?", &slug).await?.is_some() {
            report.tally(false);
            continue;
        }

        let category = category_by_slug(db, &fixture.category).await?;
        let new = NewMovie {
            title: fixture.title.clone(),
            slug: Some(slug),
            description: fixture.description.clone(),
            release_date: fixture.release_date,
            duration: fixture.duration,
            category_id: category.id,
            director_id: optional_director(db, &fixture.director).await?,
            actor_ids: actor_ids(db, &fixture.actors).await?,
            poster: fixture.poster.clone(),
            trailer_url: fixture.trailer_url.clone(),
            video_file: fixture.video_file.clone(),
            status: fixture.status,
        };
        insert_movie(db, &new).await?;
        report.tally(true);
    }

    for fixture in &fixtures.series {
        let slug = fixture_slug(&fixture.slug, &fixture.title);
        let series_id = match existing_id(db, "SELECT id FROM series WHERE slug = ?", &slug).await? {
            Some(id) => {
                report.tally(false);
                id
            }
            None => {
                let category = category_by_slug(db, &fixture.category).await?;
                let new = NewSeries {
                    title: fixture.title.clone(),
                    slug: Some(slug.clone()),
                    description: fixture.description.clone(),
                    release_date: fixture.release_date,
                    category_id: category.id,
                    director_id: optional_director(db, &fixture.director).await?,
                    actor_ids: actor_ids(db, &fixture.actors).await?,
                    poster: fixture.poster.clone(),
                    trailer_url: fixture.trailer_url.clone(),
                    status: fixture.status,
                    seasons_count: fixture.seasons_count.unwrap_or(1),
                };
                let id = insert_series(db, &new).await?;
                report.tally(true);
                id
            }
        };

        for episode in &fixture.episodes {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM episodes WHERE series_id = ? AND episode_number = ?)",
            )
            .bind(series_id)
            .bind(episode.episode_number)
            .fetch_one(db)
            .await?;
            if exists {
                report.tally(false);
                continue;
            }

            let new = NewEpisode {
                series_id,
                episode_number: episode.episode_number,
                title: episode.title.clone(),
                slug: Some(
                    episode
                        .slug
                        .clone()
                        .unwrap_or_else(|| format!("{}-episode-{}", slug, episode.episode_number)),
                ),
                description: episode.description.clone(),
                duration: episode.duration,
                release_date: episode.release_date,
                video_file: episode.video_file.clone(),
            };
            insert_episode(db, &new).await?;
            report.tally(true);
        }
    }

    for ad in &fixtures.advertisements {
        let found = existing_id(db, "SELECT id FROM advertisements WHERE title = ?", &ad.title).await?;
        if found.is_none() {
            insert_advertisement(db, ad).await?;
        }
        report.tally(found.is_none());
    }

    tracing::info!(
        "Fixture import finished: {} created, {} skipped",
        report.created,
        report.skipped
    );
    Ok(report)
}
