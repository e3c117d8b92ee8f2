//! Seeding helpers shared by unit tests.

use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::db::connect_in_memory;
use crate::models::{AdType, PublicationStatus};
use crate::services::records::{
    insert_advertisement, insert_category, insert_episode, insert_movie, insert_series, slugify,
    NewAdvertisement, NewCategory, NewEpisode, NewMovie, NewSeries,
};

static SEQUENCE: AtomicI64 = AtomicI64::new(0);

pub(crate) async fn test_db() -> SqlitePool {
    connect_in_memory().await.expect("in-memory database")
}

fn release() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 5, 17).expect("valid date")
}

/// Rewrites `created_at` so rows seeded later always sort as newer.
async fn stamp(db: &SqlitePool, table: &str, id: i64) {
    let step = SEQUENCE.fetch_add(1, Ordering::SeqCst);
    let at = Utc::now() + Duration::seconds(step);
    sqlx::query(&format!("UPDATE {table} SET created_at = ? WHERE id = ?"))
        .bind(at)
        .bind(id)
        .execute(db)
        .await
        .expect("stamp created_at");
}

pub(crate) async fn seed_category(db: &SqlitePool, name: &str) -> i64 {
    insert_category(
        db,
        &NewCategory {
            name: name.to_string(),
            slug: None,
            description: String::new(),
        },
    )
    .await
    .expect("seed category")
}

pub(crate) async fn seed_movie(db: &SqlitePool, category_id: i64, title: &str, status: PublicationStatus) -> i64 {
    let id = insert_movie(
        db,
        &NewMovie {
            title: title.to_string(),
            slug: None,
            description: format!("About {}", title),
            release_date: release(),
            duration: 100,
            category_id,
            director_id: None,
            actor_ids: vec![],
            poster: None,
            trailer_url: None,
            video_file: Some(format!("movies/videos/{}.mp4", slugify(title))),
            status,
        },
    )
    .await
    .expect("seed movie");
    stamp(db, "movies", id).await;
    id
}

pub(crate) async fn seed_series(db: &SqlitePool, category_id: i64, title: &str, status: PublicationStatus) -> i64 {
    let id = insert_series(
        db,
        &NewSeries {
            title: title.to_string(),
            slug: None,
            description: format!("About {}", title),
            release_date: release(),
            category_id,
            director_id: None,
            actor_ids: vec![],
            poster: None,
            trailer_url: None,
            status,
            seasons_count: 1,
        },
    )
    .await
    .expect("seed series");
    stamp(db, "series", id).await;
    id
}

pub(crate) async fn seed_episode(db: &SqlitePool, series_id: i64, number: i64, title: &str) -> i64 {
    let id = insert_episode(
        db,
        &NewEpisode {
            series_id,
            episode_number: number,
            title: title.to_string(),
            slug: Some(format!("{}-{}-{}", series_id, number, slugify(title))),
            description: format!("About {}", title),
            duration: 45,
            release_date: release(),
            video_file: Some(format!("episodes/videos/{}-{}.mp4", series_id, number)),
        },
    )
    .await
    .expect("seed episode");
    stamp(db, "episodes", id).await;
    id
}

pub(crate) async fn seed_user(db: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, password_hash, is_staff, created_at) VALUES (?, 'x', 0, ?)")
        .bind(username)
        .bind(Utc::now())
        .execute(db)
        .await
        .expect("seed user")
        .last_insert_rowid()
}

/// An ad whose window is `[now + start_hours, now + end_hours]`.
pub(crate) async fn seed_ad(db: &SqlitePool, title: &str, active: bool, start_hours: i64, end_hours: i64) -> i64 {
    let now = Utc::now();
    insert_advertisement(
        db,
        &NewAdvertisement {
            title: title.to_string(),
            ad_type: AdType::Banner,
            content: format!("{} content", title),
            image: None,
            url: Some("https://example.com".to_string()),
            start_date: now + Duration::hours(start_hours),
            end_date: now + Duration::hours(end_hours),
            is_active: active,
        },
    )
    .await
    .expect("seed advertisement")
}
