pub mod seed;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::config::AppConfig;

#[tracing::instrument(name = "Initialize database pool", skip(config))]
pub async fn init_db(config: &AppConfig) -> Result<SqlitePool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(3))
        .connect_with(options)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    run_migrations(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// A private in-memory database with the full schema. A single connection
/// that never expires keeps the data alive for the lifetime of the pool.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_staff BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS actors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        bio TEXT NOT NULL DEFAULT '',
        birth_date TEXT,
        image TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS directors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        bio TEXT NOT NULL DEFAULT '',
        birth_date TEXT,
        image TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS movies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        release_date TEXT NOT NULL,
        duration INTEGER NOT NULL CHECK (duration >= 0),
        director_id INTEGER REFERENCES directors(id) ON DELETE SET NULL,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        poster TEXT,
        trailer_url TEXT,
        video_file TEXT,
        search_text TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
        views_count INTEGER NOT NULL DEFAULT 0 CHECK (views_count >= 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS movie_actors (
        movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
        actor_id INTEGER NOT NULL REFERENCES actors(id) ON DELETE CASCADE,
        PRIMARY KEY (movie_id, actor_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS series (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        release_date TEXT NOT NULL,
        director_id INTEGER REFERENCES directors(id) ON DELETE SET NULL,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        poster TEXT,
        trailer_url TEXT,
        search_text TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
        seasons_count INTEGER NOT NULL DEFAULT 1 CHECK (seasons_count >= 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS series_actors (
        series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
        actor_id INTEGER NOT NULL REFERENCES actors(id) ON DELETE CASCADE,
        PRIMARY KEY (series_id, actor_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS episodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
        episode_number INTEGER NOT NULL CHECK (episode_number >= 1),
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        duration INTEGER NOT NULL CHECK (duration >= 0),
        release_date TEXT NOT NULL,
        video_file TEXT,
        search_text TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        UNIQUE (series_id, episode_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS advertisements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        ad_type TEXT NOT NULL CHECK (ad_type IN ('banner', 'popup', 'video', 'sidebar')),
        content TEXT NOT NULL,
        image TEXT,
        url TEXT,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ratings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        target_kind TEXT NOT NULL CHECK (target_kind IN ('movie', 'series', 'episode')),
        target_id INTEGER NOT NULL,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, target_kind, target_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        target_kind TEXT NOT NULL CHECK (target_kind IN ('movie', 'series', 'episode')),
        target_id INTEGER NOT NULL,
        title TEXT NOT NULL CHECK (length(title) > 0),
        content TEXT NOT NULL CHECK (length(content) > 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, target_kind, target_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS downloads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        target_kind TEXT NOT NULL CHECK (target_kind IN ('movie', 'episode')),
        target_id INTEGER NOT NULL,
        ip_address TEXT,
        downloaded_at TEXT NOT NULL,
        UNIQUE (user_id, target_kind, target_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS watch_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        target_kind TEXT NOT NULL CHECK (target_kind IN ('movie', 'episode')),
        target_id INTEGER NOT NULL,
        progress REAL NOT NULL DEFAULT 0 CHECK (progress >= 0 AND progress <= 100),
        watched_at TEXT NOT NULL,
        UNIQUE (user_id, target_kind, target_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        preferred_language TEXT NOT NULL DEFAULT 'English',
        date_of_birth TEXT,
        country TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_favorite_categories (
        profile_id INTEGER NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        PRIMARY KEY (profile_id, category_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_movies_listing ON movies(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_series_listing ON series(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_ratings_target ON ratings(target_kind, target_id)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_target ON reviews(target_kind, target_id)",
    "CREATE INDEX IF NOT EXISTS idx_advertisements_active ON advertisements(is_active)",
    // Interaction rows have no foreign key to their target; these triggers
    // remove them together with the catalog item they point at.
    r#"
    CREATE TRIGGER IF NOT EXISTS movies_cleanup_interactions AFTER DELETE ON movies
    BEGIN
        DELETE FROM ratings WHERE target_kind = 'movie' AND target_id = OLD.id;
        DELETE FROM reviews WHERE target_kind = 'movie' AND target_id = OLD.id;
        DELETE FROM downloads WHERE target_kind = 'movie' AND target_id = OLD.id;
        DELETE FROM watch_history WHERE target_kind = 'movie' AND target_id = OLD.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS series_cleanup_interactions AFTER DELETE ON series
    BEGIN
        DELETE FROM ratings WHERE target_kind = 'series' AND target_id = OLD.id;
        DELETE FROM reviews WHERE target_kind = 'series' AND target_id = OLD.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS episodes_cleanup_interactions AFTER DELETE ON episodes
    BEGIN
        DELETE FROM ratings WHERE target_kind = 'episode' AND target_id = OLD.id;
        DELETE FROM reviews WHERE target_kind = 'episode' AND target_id = OLD.id;
        DELETE FROM downloads WHERE target_kind = 'episode' AND target_id = OLD.id;
        DELETE FROM watch_history WHERE target_kind = 'episode' AND target_id = OLD.id;
    END
    "#,
];

#[tracing::instrument(name = "Run database migrations", skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed ({} statements)", SCHEMA.len());
    Ok(())
}
