//! Ratings, reviews, downloads and watch progress against one catalog item.
//!
//! Every write is a create-or-update keyed by `(user, target_kind, target_id)`
//! and only published content can be targeted.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    ActivityEntry, ContentKind, ContentRef, PlayableRef, Progress, RatingValue, RecordOutcome,
};

/// A published item an interaction may point at.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub target: ContentRef,
    pub title: String,
    pub url: String,
    /// Media-relative path of the video, for movies and episodes.
    pub video_file: Option<String>,
}

#[derive(FromRow)]
struct TargetRow {
    title: String,
    url: String,
    video_file: Option<String>,
}

/// Looks up `target` among published content. Unknown ids and drafts are
/// both not-found.
#[tracing::instrument(name = "Resolve interaction target", skip(db))]
pub async fn resolve_published(db: &SqlitePool, target: ContentRef) -> Result<ResolvedTarget, AppError> {
    let sql = match target.kind() {
        ContentKind::Movie => {
            "SELECT title, '/movies/' || slug || '/' AS url, video_file
             FROM movies WHERE id = ? AND status = 'published'"
        }
        ContentKind::Series => {
            "SELECT title, '/movies/series/' || slug || '/' AS url, NULL AS video_file
             FROM series WHERE id = ? AND status = 'published'"
        }
        ContentKind::Episode => {
            "SELECT s.title || ' - S' || ((e.episode_number + 9) / 10) || 'E' || e.episode_number
                    || ': ' || e.title AS title,
                    '/movies/series/' || s.slug || '/episode/' || e.episode_number || '/' AS url,
                    e.video_file
             FROM episodes e JOIN series s ON s.id = e.series_id
             WHERE e.id = ? AND s.status = 'published'"
        }
    };

    let row = sqlx::query_as::<_, TargetRow>(sql)
        .bind(target.id())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{}", target)))?;

    Ok(ResolvedTarget {
        target,
        title: row.title,
        url: row.url,
        video_file: row.video_file,
    })
}

async fn record_exists(
    db: &SqlitePool,
    table: &'static str,
    user_id: i64,
    target: ContentRef,
) -> Result<bool, AppError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {table} WHERE user_id = ? AND target_kind = ? AND target_id = ?)"
    );
    Ok(sqlx::query_scalar::<_, bool>(&sql)
        .bind(user_id)
        .bind(target.kind())
        .bind(target.id())
        .fetch_one(db)
        .await?)
}

fn outcome(existed: bool) -> RecordOutcome {
    if existed {
        RecordOutcome::Updated
    } else {
        RecordOutcome::Created
    }
}

#[tracing::instrument(name = "Rate content", skip(db))]
pub async fn rate(
    db: &SqlitePool,
    user_id: i64,
    target: ContentRef,
    value: RatingValue,
) -> Result<RecordOutcome, AppError> {
    resolve_published(db, target).await?;
    let existed = record_exists(db, "ratings", user_id, target).await?;
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO ratings (user_id, target_kind, target_id, rating, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT (user_id, target_kind, target_id)
           DO UPDATE SET rating = excluded.rating, updated_at = excluded.updated_at"#,
    )
    .bind(user_id)
    .bind(target.kind())
    .bind(target.id())
    .bind(value.get())
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    tracing::info!("User {} rated {} with {} stars", user_id, target, value.get());
    Ok(outcome(existed))
}

#[tracing::instrument(name = "Review content", skip(db, content))]
pub async fn write_review(
    db: &SqlitePool,
    user_id: i64,
    target: ContentRef,
    title: &str,
    content: &str,
) -> Result<RecordOutcome, AppError> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::Validation(
            "Please provide both title and content for your review.".to_string(),
        ));
    }

    resolve_published(db, target).await?;
    let existed = record_exists(db, "reviews", user_id, target).await?;
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO reviews (user_id, target_kind, target_id, title, content, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT (user_id, target_kind, target_id)
           DO UPDATE SET title = excluded.title, content = excluded.content,
                         updated_at = excluded.updated_at"#,
    )
    .bind(user_id)
    .bind(target.kind())
    .bind(target.id())
    .bind(title)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(outcome(existed))
}

/// Upserts the user's progress and hands back the item it was recorded on.
#[tracing::instrument(name = "Record watch progress", skip(db))]
pub async fn record_progress(
    db: &SqlitePool,
    user_id: i64,
    target: PlayableRef,
    progress: Progress,
) -> Result<(ResolvedTarget, RecordOutcome), AppError> {
    let resolved = resolve_published(db, target.into()).await?;
    let target = resolved.target;
    let existed = record_exists(db, "watch_history", user_id, target).await?;

    sqlx::query(
        r#"INSERT INTO watch_history (user_id, target_kind, target_id, progress, watched_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT (user_id, target_kind, target_id)
           DO UPDATE SET progress = excluded.progress, watched_at = excluded.watched_at"#,
    )
    .bind(user_id)
    .bind(target.kind())
    .bind(target.id())
    .bind(progress.get())
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok((resolved, outcome(existed)))
}

/// The published item behind a download together with its stored video
/// path, if it has one.
pub async fn download_source(
    db: &SqlitePool,
    target: PlayableRef,
) -> Result<(ResolvedTarget, Option<String>), AppError> {
    let resolved = resolve_published(db, target.into()).await?;
    let path = resolved.video_file.clone().filter(|f| !f.trim().is_empty());
    Ok((resolved, path))
}

#[tracing::instrument(name = "Record download", skip(db))]
pub async fn record_download(
    db: &SqlitePool,
    user_id: i64,
    target: PlayableRef,
    ip_address: Option<String>,
) -> Result<RecordOutcome, AppError> {
    let target = ContentRef::from(target);
    let existed = record_exists(db, "downloads", user_id, target).await?;

    sqlx::query(
        r#"INSERT INTO downloads (user_id, target_kind, target_id, ip_address, downloaded_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT (user_id, target_kind, target_id)
           DO UPDATE SET ip_address = excluded.ip_address, downloaded_at = excluded.downloaded_at"#,
    )
    .bind(user_id)
    .bind(target.kind())
    .bind(target.id())
    .bind(ip_address)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(outcome(existed))
}

/// Titles and links for interaction rows, resolved per target kind.
const TARGET_LABELS: &str = r#"
    CASE x.target_kind
        WHEN 'movie' THEN (SELECT title FROM movies WHERE id = x.target_id)
        WHEN 'series' THEN (SELECT title FROM series WHERE id = x.target_id)
        ELSE (SELECT s.title || ' - S' || ((e.episode_number + 9) / 10) || 'E' || e.episode_number || ': ' || e.title
              FROM episodes e JOIN series s ON s.id = e.series_id WHERE e.id = x.target_id)
    END AS title,
    CASE x.target_kind
        WHEN 'movie' THEN (SELECT '/movies/' || slug || '/' FROM movies WHERE id = x.target_id)
        WHEN 'series' THEN (SELECT '/movies/series/' || slug || '/' FROM series WHERE id = x.target_id)
        ELSE (SELECT '/movies/series/' || s.slug || '/episode/' || e.episode_number || '/'
              FROM episodes e JOIN series s ON s.id = e.series_id WHERE e.id = x.target_id)
    END AS url
"#;

/// Which per-user list to read and what its `detail` column shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Ratings,
    Reviews,
    Downloads,
    WatchHistory,
}

impl Activity {
    fn source(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Activity::Ratings => ("ratings", "x.rating || ' stars'", "x.updated_at"),
            Activity::Reviews => ("reviews", "x.title", "x.updated_at"),
            Activity::Downloads => ("downloads", "'downloaded'", "x.downloaded_at"),
            Activity::WatchHistory => ("watch_history", "printf('%.0f%%', x.progress)", "x.watched_at"),
        }
    }
}

/// A user's activity of one kind, newest first. `limit` of `None` reads all.
#[tracing::instrument(name = "User activity", skip(db))]
pub async fn user_activity(
    db: &SqlitePool,
    user_id: i64,
    activity: Activity,
    limit: Option<i64>,
) -> Result<Vec<ActivityEntry>, AppError> {
    let (table, detail, at) = activity.source();
    let sql = format!(
        "SELECT x.target_kind, x.target_id, {TARGET_LABELS}, {detail} AS detail, {at} AS at
         FROM {table} x WHERE x.user_id = ?
         ORDER BY {at} DESC, x.id DESC LIMIT ?"
    );

    let rows = sqlx::query_as::<_, ActivityEntry>(&sql)
        .bind(user_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(db)
        .await?;
    Ok(rows)
}
