//! Inserts for catalog records, used by the setup command and fixtures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::models::{AdType, Category, PublicationStatus};

/// Lowercase ASCII slug: runs of anything that is not a letter or digit
/// collapse into a single dash.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    pub release_date: NaiveDate,
    pub duration: i64,
    pub category_id: i64,
    #[serde(default)]
    pub director_id: Option<i64>,
    #[serde(default)]
    pub actor_ids: Vec<i64>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub trailer_url: Option<String>,
    #[serde(default)]
    pub video_file: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSeries {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub description: String,
    pub release_date: NaiveDate,
    pub category_id: i64,
    #[serde(default)]
    pub director_id: Option<i64>,
    #[serde(default)]
    pub actor_ids: Vec<i64>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub trailer_url: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
    #[serde(default = "default_seasons")]
    pub seasons_count: i64,
}

fn default_seasons() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEpisode {
    pub series_id: i64,
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

#[derive(Debug, Clone, Deserialize)]
pub struct NewAdvertisement {
    pub title: String,
    pub ad_type: AdType,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Lower-cased title and description matched by catalog search. SQLite's
/// LOWER() and LIKE only fold ASCII letters.
pub fn search_text(title: &str, description: &str) -> String {
    format!("{}\n{}", title, description).to_lowercase()
}

fn slug_or_title(slug: &Option<String>, title: &str) -> Result<String, AppError> {
    let slug = match slug {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => slugify(title),
    };
    if slug.is_empty() {
        return Err(AppError::Validation(format!("Cannot derive a slug from '{}'", title)));
    }
    Ok(slug)
}

#[tracing::instrument(name = "Insert category", skip(db, new), fields(name = %new.name))]
pub async fn insert_category(db: &SqlitePool, new: &NewCategory) -> Result<i64, AppError> {
    let slug = slug_or_title(&new.slug, &new.name)?;
    let id = sqlx::query(
        "INSERT INTO categories (name, slug, description, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&new.name)
    .bind(&slug)
    .bind(&new.description)
    .bind(Utc::now())
    .execute(db)
    .await?
    .last_insert_rowid();

    tracing::debug!("Category {} created with id {}", new.name, id);
    Ok(id)
}

/// Returns the category with this name, creating it first when missing.
/// The boolean is `true` when a row was created.
#[tracing::instrument(name = "Get or create category", skip(db))]
pub async fn ensure_category(db: &SqlitePool, name: &str, slug: &str) -> Result<(Category, bool), AppError> {
    let inserted = sqlx::query(
        "INSERT INTO categories (name, slug, description, created_at) VALUES (?, ?, '', ?)
         ON CONFLICT(name) DO NOTHING",
    )
    .bind(name)
    .bind(slug)
    .bind(Utc::now())
    .execute(db)
    .await?
    .rows_affected()
        > 0;

    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, created_at FROM categories WHERE name = ?",
    )
    .bind(name)
    .fetch_one(db)
    .await?;

    Ok((category, inserted))
}

#[tracing::instrument(name = "Insert director", skip(db, new), fields(name = %new.name))]
pub async fn insert_director(db: &SqlitePool, new: &NewPerson) -> Result<i64, AppError> {
    insert_person(db, "directors", new).await
}

#[tracing::instrument(name = "Insert actor", skip(db, new), fields(name = %new.name))]
pub async fn insert_actor(db: &SqlitePool, new: &NewPerson) -> Result<i64, AppError> {
    insert_person(db, "actors", new).await
}

async fn insert_person(db: &SqlitePool, table: &'static str, new: &NewPerson) -> Result<i64, AppError> {
    let sql = format!(
        "INSERT INTO {} (name, bio, birth_date, image) VALUES (?, ?, ?, ?)",
        table
    );
    let id = sqlx::query(&sql)
        .bind(&new.name)
        .bind(&new.bio)
        .bind(new.birth_date)
        .bind(&new.image)
        .execute(db)
        .await?
        .last_insert_rowid();
    Ok(id)
}

#[tracing::instrument(name = "Insert movie", skip(db, new), fields(title = %new.title))]
pub async fn insert_movie(db: &SqlitePool, new: &NewMovie) -> Result<i64, AppError> {
    let slug = slug_or_title(&new.slug, &new.title)?;
    let now = Utc::now();
    let mut tx = db.begin().await?;

    let id = sqlx::query(
        r#"INSERT INTO movies
           (title, slug, description, release_date, duration, director_id, category_id,
            poster, trailer_url, video_file, search_text, status, views_count, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
    )
    .bind(&new.title)
    .bind(&slug)
    .bind(&new.description)
    .bind(new.release_date)
    .bind(new.duration)
    .bind(new.director_id)
    .bind(new.category_id)
    .bind(&new.poster)
    .bind(&new.trailer_url)
    .bind(&new.video_file)
    .bind(search_text(&new.title, &new.description))
    .bind(new.status)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for actor_id in &new.actor_ids {
        sqlx::query("INSERT OR IGNORE INTO movie_actors (movie_id, actor_id) VALUES (?, ?)")
            .bind(id)
            .bind(actor_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::debug!("Movie '{}' created with id {}", new.title, id);
    Ok(id)
}

#[tracing::instrument(name = "Insert series", skip(db, new), fields(title = %new.title))]
pub async fn insert_series(db: &SqlitePool, new: &NewSeries) -> Result<i64, AppError> {
    let slug = slug_or_title(&new.slug, &new.title)?;
    let now = Utc::now();
    let mut tx = db.begin().await?;

    let id = sqlx::query(
        r#"INSERT INTO series
           (title, slug, description, release_date, director_id, category_id,
            poster, trailer_url, search_text, status, seasons_count, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&new.title)
    .bind(&slug)
    .bind(&new.description)
    .bind(new.release_date)
    .bind(new.director_id)
    .bind(new.category_id)
    .bind(&new.poster)
    .bind(&new.trailer_url)
    .bind(search_text(&new.title, &new.description))
    .bind(new.status)
    .bind(new.seasons_count)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for actor_id in &new.actor_ids {
        sqlx::query("INSERT OR IGNORE INTO series_actors (series_id, actor_id) VALUES (?, ?)")
            .bind(id)
            .bind(actor_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(id)
}

#[tracing::instrument(name = "Insert episode", skip(db, new), fields(series_id = new.series_id, number = new.episode_number))]
pub async fn insert_episode(db: &SqlitePool, new: &NewEpisode) -> Result<i64, AppError> {
    let slug = slug_or_title(&new.slug, &new.title)?;
    let id = sqlx::query(
        r#"INSERT INTO episodes
           (series_id, episode_number, title, slug, description, duration, release_date, video_file,
            search_text, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new.series_id)
    .bind(new.episode_number)
    .bind(&new.title)
    .bind(&slug)
    .bind(&new.description)
    .bind(new.duration)
    .bind(new.release_date)
    .bind(&new.video_file)
    .bind(search_text(&new.title, &new.description))
    .bind(Utc::now())
    .execute(db)
    .await?
    .last_insert_rowid();
    Ok(id)
}

#[tracing::instrument(name = "Insert advertisement", skip(db, new), fields(title = %new.title))]
pub async fn insert_advertisement(db: &SqlitePool, new: &NewAdvertisement) -> Result<i64, AppError> {
    if new.end_date < new.start_date {
        return Err(AppError::Validation(
            "Advertisement end date precedes its start date".to_string(),
        ));
    }

    let id = sqlx::query(
        r#"INSERT INTO advertisements
           (title, ad_type, content, image, url, start_date, end_date, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&new.title)
    .bind(new.ad_type)
    .bind(&new.content)
    .bind(&new.image)
    .bind(&new.url)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.is_active)
    .bind(Utc::now())
    .execute(db)
    .await?
    .last_insert_rowid();
    Ok(id)
}
