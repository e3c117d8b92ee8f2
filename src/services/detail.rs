//! Detail pages: one published item with its people, ratings and reviews.

use serde::Serialize;
use sqlx::SqlitePool;

use super::catalog::related_published;
use crate::errors::AppError;
use crate::models::{
    CatalogItem, Category, ContentKind, ContentRef, Episode, Movie, Person, ReviewWithAuthor, Series,
};

const RELATED_LIMIT: i64 = 6;

pub(crate) const MOVIE_COLUMNS: &str = "id, title, slug, description, release_date, duration, director_id, \
     category_id, poster, trailer_url, video_file, status, views_count, created_at, updated_at";

pub(crate) const SERIES_COLUMNS: &str = "id, title, slug, description, release_date, director_id, category_id, \
     poster, trailer_url, status, seasons_count, created_at, updated_at";

pub(crate) const EPISODE_COLUMNS: &str = "id, series_id, episode_number, title, slug, description, duration, \
     release_date, video_file, created_at";

#[derive(Debug, Clone, Default, Serialize)]
pub struct RatingSummary {
    /// Mean of all ratings; `None` when nobody has rated yet.
    pub average: Option<f64>,
    pub count: i64,
    pub user_rating: Option<i64>,
}

impl RatingSummary {
    pub fn average_label(&self) -> String {
        match self.average {
            Some(avg) => format!("{:.1}/5", avg),
            None => "No ratings yet".to_string(),
        }
    }

    pub fn user_rating_label(&self) -> String {
        self.user_rating
            .map(|r| format!("{} stars", r))
            .unwrap_or_default()
    }
}

#[tracing::instrument(name = "Rating summary", skip(db))]
pub async fn rating_summary(
    db: &SqlitePool,
    target: ContentRef,
    viewer: Option<i64>,
) -> Result<RatingSummary, AppError> {
    let (average, count) = sqlx::query_as::<_, (Option<f64>, i64)>(
        "SELECT AVG(rating), COUNT(*) FROM ratings WHERE target_kind = ? AND target_id = ?",
    )
    .bind(target.kind())
    .bind(target.id())
    .fetch_one(db)
    .await?;

    let user_rating = match viewer {
        Some(user_id) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT rating FROM ratings WHERE user_id = ? AND target_kind = ? AND target_id = ?",
            )
            .bind(user_id)
            .bind(target.kind())
            .bind(target.id())
            .fetch_optional(db)
            .await?
        }
        None => None,
    };

    Ok(RatingSummary {
        average: if count == 0 { None } else { average },
        count,
        user_rating,
    })
}

/// Reviews of one item, newest first.
#[tracing::instrument(name = "Reviews for target", skip(db))]
pub async fn reviews_for(db: &SqlitePool, target: ContentRef) -> Result<Vec<ReviewWithAuthor>, AppError> {
    let reviews = sqlx::query_as::<_, ReviewWithAuthor>(
        r#"SELECT r.id, u.username, r.title, r.content, r.created_at
           FROM reviews r JOIN users u ON u.id = r.user_id
           WHERE r.target_kind = ? AND r.target_id = ?
           ORDER BY r.created_at DESC, r.id DESC"#,
    )
    .bind(target.kind())
    .bind(target.id())
    .fetch_all(db)
    .await?;
    Ok(reviews)
}

async fn category_by_id(db: &SqlitePool, id: i64) -> Result<Category, AppError> {
    Ok(sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, created_at FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_one(db)
    .await?)
}

async fn director_by_id(db: &SqlitePool, id: Option<i64>) -> Result<Option<Person>, AppError> {
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(sqlx::query_as::<_, Person>(
        "SELECT id, name, bio, birth_date, image FROM directors WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?)
}

async fn actors_of(db: &SqlitePool, join_table: &'static str, owner_column: &'static str, owner_id: i64) -> Result<Vec<Person>, AppError> {
    let sql = format!(
        "SELECT a.id, a.name, a.bio, a.birth_date, a.image FROM actors a \
         JOIN {join_table} j ON j.actor_id = a.id WHERE j.{owner_column} = ? ORDER BY a.name"
    );
    Ok(sqlx::query_as::<_, Person>(&sql).bind(owner_id).fetch_all(db).await?)
}

#[derive(Debug)]
pub struct MovieDetail {
    pub movie: Movie,
    pub category: Category,
    pub director: Option<Person>,
    pub actors: Vec<Person>,
    pub related: Vec<CatalogItem>,
    pub ratings: RatingSummary,
    pub reviews: Vec<ReviewWithAuthor>,
}

/// Resolves a published movie and counts the visit. The counter is bumped in
/// a single `UPDATE` so concurrent visits never overwrite each other.
#[tracing::instrument(name = "Movie detail", skip(db))]
pub async fn movie_detail(db: &SqlitePool, slug: &str, viewer: Option<i64>) -> Result<MovieDetail, AppError> {
    let bumped = sqlx::query(
        "UPDATE movies SET views_count = views_count + 1 WHERE slug = ? AND status = 'published'",
    )
    .bind(slug)
    .execute(db)
    .await?
    .rows_affected();

    if bumped == 0 {
        tracing::warn!("Movie '{}' not found or not published", slug);
        return Err(AppError::NotFound(format!("Movie '{}'", slug)));
    }

    let movie = sqlx::query_as::<_, Movie>(&format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE slug = ?"))
        .bind(slug)
        .fetch_one(db)
        .await?;

    let target = ContentRef::Movie(movie.id);
    let category = category_by_id(db, movie.category_id).await?;
    let director = director_by_id(db, movie.director_id).await?;
    let actors = actors_of(db, "movie_actors", "movie_id", movie.id).await?;
    let related = related_published(db, ContentKind::Movie, movie.category_id, movie.id, RELATED_LIMIT).await?;
    let ratings = rating_summary(db, target, viewer).await?;
    let reviews = reviews_for(db, target).await?;

    tracing::debug!("Movie '{}' now has {} views", movie.slug, movie.views_count);

    Ok(MovieDetail {
        movie,
        category,
        director,
        actors,
        related,
        ratings,
        reviews,
    })
}

pub(crate) async fn published_series_by_slug(db: &SqlitePool, slug: &str) -> Result<Series, AppError> {
    sqlx::query_as::<_, Series>(&format!(
        "SELECT {SERIES_COLUMNS} FROM series WHERE slug = ? AND status = 'published'"
    ))
    .bind(slug)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Series '{}'", slug)))
}

pub(crate) async fn episodes_of(db: &SqlitePool, series_id: i64) -> Result<Vec<Episode>, AppError> {
    Ok(sqlx::query_as::<_, Episode>(&format!(
        "SELECT {EPISODE_COLUMNS} FROM episodes WHERE series_id = ? ORDER BY episode_number"
    ))
    .bind(series_id)
    .fetch_all(db)
    .await?)
}

#[derive(Debug)]
pub struct SeriesDetail {
    pub series: Series,
    pub category: Category,
    pub director: Option<Person>,
    pub actors: Vec<Person>,
    pub episodes: Vec<Episode>,
    pub related: Vec<CatalogItem>,
    pub ratings: RatingSummary,
    pub reviews: Vec<ReviewWithAuthor>,
}

#[tracing::instrument(name = "Series detail", skip(db))]
pub async fn series_detail(db: &SqlitePool, slug: &str, viewer: Option<i64>) -> Result<SeriesDetail, AppError> {
    let series = published_series_by_slug(db, slug).await?;
    let target = ContentRef::Series(series.id);

    let category = category_by_id(db, series.category_id).await?;
    let director = director_by_id(db, series.director_id).await?;
    let actors = actors_of(db, "series_actors", "series_id", series.id).await?;
    let episodes = episodes_of(db, series.id).await?;
    let related = related_published(db, ContentKind::Series, series.category_id, series.id, RELATED_LIMIT).await?;
    let ratings = rating_summary(db, target, viewer).await?;
    let reviews = reviews_for(db, target).await?;

    Ok(SeriesDetail {
        series,
        category,
        director,
        actors,
        episodes,
        related,
        ratings,
        reviews,
    })
}

#[derive(Debug)]
pub struct EpisodeDetail {
    pub series: Series,
    pub episode: Episode,
    pub other_episodes: Vec<Episode>,
    pub ratings: RatingSummary,
    pub reviews: Vec<ReviewWithAuthor>,
}

#[tracing::instrument(name = "Episode detail", skip(db))]
pub async fn episode_detail(
    db: &SqlitePool,
    series_slug: &str,
    episode_number: i64,
    viewer: Option<i64>,
) -> Result<EpisodeDetail, AppError> {
    let series = published_series_by_slug(db, series_slug).await?;

    let mut episodes = episodes_of(db, series.id).await?;
    let position = episodes
        .iter()
        .position(|e| e.episode_number == episode_number)
        .ok_or_else(|| {
            AppError::NotFound(format!("Episode {} of '{}'", episode_number, series_slug))
        })?;
    let episode = episodes.remove(position);

    let target = ContentRef::Episode(episode.id);
    let ratings = rating_summary(db, target, viewer).await?;
    let reviews = reviews_for(db, target).await?;

    Ok(EpisodeDetail {
        series,
        episode,
        other_episodes: episodes,
        ratings,
        reviews,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PublicationStatus, RatingValue};
    use crate::services::interactions::{rate, write_review};
    use crate::test_support::*;

    #[tokio::test]
    async fn each_visit_increments_views_once() {
        let db = test_db().await;
        let category = seed_category(&db, "Action").await;
        seed_movie(&db, category, "Heat", PublicationStatus::Published).await;

        let first = movie_detail(&db, "heat", None).await.unwrap();
        assert_eq!(first.movie.views_count, 1);
        let second = movie_detail(&db, "heat", None).await.unwrap();
        assert_eq!(second.movie.views_count, 2);
    }

    #[tokio::test]
    async fn draft_movie_is_not_found_and_not_counted() {
        let db = test_db().await;
        let category = seed_category(&db, "Action").await;
        let id = seed_movie(&db, category, "Secret", PublicationStatus::Draft).await;

        let err = movie_detail(&db, "secret", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let views: i64 = sqlx::query_scalar("SELECT views_count FROM movies WHERE id = ?")
            .bind(id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(views, 0);
    }

    #[tokio::test]
    async fn average_is_absent_without_ratings() {
        let db = test_db().await;
        let category = seed_category(&db, "Action").await;
        seed_movie(&db, category, "Unrated", PublicationStatus::Published).await;

        let detail = movie_detail(&db, "unrated", None).await.unwrap();
        assert_eq!(detail.ratings.average, None);
        assert_eq!(detail.ratings.count, 0);
        assert_eq!(detail.ratings.average_label(), "No ratings yet");
    }

    #[tokio::test]
    async fn average_and_viewer_rating_are_per_item() {
        let db = test_db().await;
        let category = seed_category(&db, "Action").await;
        let movie = seed_movie(&db, category, "Rated", PublicationStatus::Published).await;
        let other = seed_movie(&db, category, "Other", PublicationStatus::Published).await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        rate(&db, alice, ContentRef::Movie(movie), RatingValue::new(5).unwrap()).await.unwrap();
        rate(&db, bob, ContentRef::Movie(movie), RatingValue::new(2).unwrap()).await.unwrap();
        rate(&db, bob, ContentRef::Movie(other), RatingValue::new(1).unwrap()).await.unwrap();

        let detail = movie_detail(&db, "rated", Some(alice)).await.unwrap();
        assert_eq!(detail.ratings.average, Some(3.5));
        assert_eq!(detail.ratings.count, 2);
        assert_eq!(detail.ratings.user_rating, Some(5));
        assert_eq!(detail.ratings.average_label(), "3.5/5");
    }

    #[tokio::test]
    async fn reviews_are_newest_first() {
        let db = test_db().await;
        let category = seed_category(&db, "Drama").await;
        let series = seed_series(&db, category, "Saga", PublicationStatus::Published).await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        write_review(&db, alice, ContentRef::Series(series), "First", "early").await.unwrap();
        write_review(&db, bob, ContentRef::Series(series), "Second", "later").await.unwrap();

        let detail = series_detail(&db, "saga", None).await.unwrap();
        let titles: Vec<&str> = detail.reviews.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn episode_detail_lists_siblings_in_order() {
        let db = test_db().await;
        let category = seed_category(&db, "Drama").await;
        let series = seed_series(&db, category, "Saga", PublicationStatus::Published).await;
        seed_episode(&db, series, 3, "Three").await;
        seed_episode(&db, series, 1, "One").await;
        seed_episode(&db, series, 12, "Twelve").await;

        let detail = episode_detail(&db, "saga", 12, None).await.unwrap();
        assert_eq!(detail.episode.season_number(), 2);
        let numbers: Vec<i64> = detail.other_episodes.iter().map(|e| e.episode_number).collect();
        assert_eq!(numbers, vec![1, 3]);

        let missing = episode_detail(&db, "saga", 2, None).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn episodes_of_draft_series_are_hidden() {
        let db = test_db().await;
        let category = seed_category(&db, "Drama").await;
        let series = seed_series(&db, category, "Unreleased", PublicationStatus::Draft).await;
        seed_episode(&db, series, 1, "Pilot").await;

        assert!(series_detail(&db, "unreleased", None).await.is_err());
        assert!(episode_detail(&db, "unreleased", 1, None).await.is_err());
    }
}
