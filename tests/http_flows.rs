use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

use screenbox::config::AppConfig;
use screenbox::db::connect_in_memory;
use screenbox::models::{AdType, PublicationStatus};
use screenbox::routes::ProgressReply;
use screenbox::services::records::{
    insert_advertisement, insert_category, insert_episode, insert_movie, insert_series, NewAdvertisement,
    NewCategory, NewEpisode, NewMovie, NewSeries,
};
use screenbox::{create_app, InnerState};

static MEDIA_DIRS: AtomicUsize = AtomicUsize::new(0);

struct TestApp {
    router: Router,
    db: SqlitePool,
    media_root: PathBuf,
}

impl TestApp {
    async fn spawn() -> Self {
        let db = connect_in_memory().await.unwrap();
        let media_root = std::env::temp_dir().join(format!(
            "screenbox-media-{}-{}",
            std::process::id(),
            MEDIA_DIRS.fetch_add(1, Ordering::SeqCst)
        ));
        let config = AppConfig {
            media_root: media_root.clone(),
            ..AppConfig::default()
        };
        let router = create_app(InnerState::new(db.clone(), config));
        TestApp { router, db, media_root }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_empty(&self, uri: &str, cookie: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.to_string())).unwrap()).await
    }

    /// Registers `username` and returns the session cookie.
    async fn sign_up(&self, username: &str) -> String {
        let response = self
            .post_form(
                "/accounts/register",
                &format!("username={username}&password1=long-password&password2=long-password"),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    async fn category(&self, name: &str) -> i64 {
        insert_category(
            &self.db,
            &NewCategory {
                name: name.to_string(),
                slug: None,
                description: String::new(),
            },
        )
        .await
        .unwrap()
    }

    async fn movie(&self, category_id: i64, title: &str, status: PublicationStatus) -> i64 {
        insert_movie(
            &self.db,
            &NewMovie {
                title: title.to_string(),
                slug: None,
                description: format!("About {title}"),
                release_date: NaiveDate::from_ymd_opt(2021, 3, 4).unwrap(),
                duration: 110,
                category_id,
                director_id: None,
                actor_ids: vec![],
                poster: None,
                trailer_url: None,
                video_file: Some("movies/videos/heat.mp4".to_string()),
                status,
            },
        )
        .await
        .unwrap()
    }

    async fn series(&self, category_id: i64, title: &str, status: PublicationStatus) -> i64 {
        insert_series(
            &self.db,
            &NewSeries {
                title: title.to_string(),
                slug: None,
                description: format!("About {title}"),
                release_date: NaiveDate::from_ymd_opt(2020, 1, 10).unwrap(),
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
        .unwrap()
    }

    async fn episode(&self, series_id: i64, number: i64, title: &str) -> i64 {
        insert_episode(
            &self.db,
            &NewEpisode {
                series_id,
                episode_number: number,
                title: title.to_string(),
                slug: Some(format!("{series_id}-{number}")),
                description: format!("About {title}"),
                duration: 45,
                release_date: NaiveDate::from_ymd_opt(2020, 1, 10).unwrap(),
                video_file: None,
            },
        )
        .await
        .unwrap()
    }

    async fn ad(&self, title: &str, ad_type: AdType) {
        insert_advertisement(
            &self.db,
            &NewAdvertisement {
                title: title.to_string(),
                ad_type,
                content: format!("{title} content"),
                image: None,
                url: None,
                start_date: Utc::now() - Duration::hours(1),
                end_date: Utc::now() + Duration::hours(1),
                is_active: true,
            },
        )
        .await
        .unwrap();
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.db)
            .await
            .unwrap()
    }
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn health_check_answers_ok() {
    let app = TestApp::spawn().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn movie_listing_pages_by_twelve_and_clamps() {
    let app = TestApp::spawn().await;
    let category = app.category("Action").await;
    for n in 0..13 {
        app.movie(category, &format!("Movie {n:02}"), PublicationStatus::Published).await;
    }
    app.movie(category, "Hidden draft", PublicationStatus::Draft).await;

    let first = body_text(app.get("/movies/", None).await).await;
    assert_eq!(first.matches("class=\"card\"").count(), 12);
    assert!(first.contains("Page 1 of 2"));

    let second = body_text(app.get("/movies/?page=2", None).await).await;
    assert_eq!(second.matches("class=\"card\"").count(), 1);

    let clamped = body_text(app.get("/movies/?page=99", None).await).await;
    assert!(clamped.contains("Page 2 of 2"));

    let garbage = body_text(app.get("/movies/?page=abc", None).await).await;
    assert!(garbage.contains("Page 1 of 2"));
    assert!(!garbage.contains("Hidden draft"));
}

#[tokio::test]
async fn movie_detail_counts_views_and_hides_drafts() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    app.movie(category, "Unfinished", PublicationStatus::Draft).await;

    assert_eq!(app.get("/movies/heat/", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/movies/heat/", None).await.status(), StatusCode::OK);
    let views: i64 = sqlx::query_scalar("SELECT views_count FROM movies WHERE id = ?")
        .bind(movie)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(views, 2);

    assert_eq!(app.get("/movies/unfinished/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/movies/no-such-movie/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn series_routes_win_over_movie_slugs() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Series", PublicationStatus::Published).await;
    let series = app.series(category, "Saga", PublicationStatus::Published).await;
    app.episode(series, 1, "Pilot").await;

    let response = app.get("/movies/series/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_text(response).await;
    assert!(listing.contains("href=\"/movies/series/saga/\""));
    let views: i64 = sqlx::query_scalar("SELECT views_count FROM movies WHERE id = ?")
        .bind(movie)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(views, 0);

    let detail = app.get("/movies/series/saga/", None).await;
    assert_eq!(detail.status(), StatusCode::OK);
    assert!(body_text(detail).await.contains("S1E1: Pilot"));

    let episode = app.get("/movies/series/saga/episode/1/", None).await;
    assert_eq!(episode.status(), StatusCode::OK);
    assert!(body_text(episode).await.contains("Pilot"));

    assert_eq!(
        app.get("/movies/series/saga/episode/7/", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn draft_series_and_their_episodes_are_hidden() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let draft = app.series(category, "Hidden Saga", PublicationStatus::Draft).await;
    app.episode(draft, 1, "Secret").await;

    assert_eq!(app.get("/movies/series/hidden-saga/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/movies/series/hidden-saga/episode/1/", None).await.status(),
        StatusCode::NOT_FOUND
    );
    let listing = body_text(app.get("/movies/series/", None).await).await;
    assert!(!listing.contains("Hidden Saga"));
}

#[tokio::test]
async fn category_page_and_search_hide_drafts() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    app.movie(category, "Heat", PublicationStatus::Published).await;
    app.movie(category, "Heatwave Draft", PublicationStatus::Draft).await;
    let draft_series = app.series(category, "Unreleased", PublicationStatus::Draft).await;
    app.episode(draft_series, 1, "Heat Stroke").await;

    let response = app.get("/movies/category/drama/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("<h3>Heat</h3>"));
    assert!(!page.contains("Heatwave Draft"));
    assert!(!page.contains("Unreleased"));

    let response = app.get("/movies/search/?q=heat", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("<h3>Heat</h3>"));
    assert!(page.contains("Movies (1)"));
    assert!(!page.contains("Heatwave Draft"));
    assert!(!page.contains("Heat Stroke"));

    let blank = body_text(app.get("/movies/search/", None).await).await;
    assert!(blank.contains("Type something to search the catalog."));

    assert_eq!(app.get("/movies/category/nope/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn flash_messages_survive_an_error_page() {
    let app = TestApp::spawn().await;
    let cookie = app.sign_up("erin").await;

    let missing = app.get("/movies/no-such-movie/", Some(&cookie)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let page = body_text(app.get("/about/", Some(&cookie)).await).await;
    assert!(page.contains("Account created for erin!"));

    let page = body_text(app.get("/about/", Some(&cookie)).await).await;
    assert!(!page.contains("Account created for erin!"));
}

#[tokio::test]
async fn every_live_ad_placement_is_rendered() {
    let app = TestApp::spawn().await;
    app.ad("Top Banner", AdType::Banner).await;
    app.ad("Side Offer", AdType::Sidebar).await;
    app.ad("Popup Deal", AdType::Popup).await;
    app.ad("Video Spot", AdType::Video).await;

    let page = body_text(app.get("/about/", None).await).await;
    for title in ["Top Banner", "Side Offer", "Popup Deal", "Video Spot"] {
        assert!(page.contains(title), "{title} missing");
    }
    assert!(page.contains("ad ad-popup"));
    assert!(page.contains("ad ad-video"));
}

#[tokio::test]
async fn anonymous_interactions_redirect_to_login() {
    let app = TestApp::spawn().await;
    let response = app.post_form("/interactions/rate-movie/1/", "rating=5", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/accounts/login?next=%2Finteractions%2Frate-movie%2F1%2F"
    );

    let response = app.get("/interactions/profile/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn rating_twice_updates_the_same_record() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    let cookie = app.sign_up("alice").await;

    let response = app
        .post_form(&format!("/interactions/rate-movie/{movie}/"), "rating=4", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/movies/heat/");

    let page = body_text(app.get("/movies/heat/", Some(&cookie)).await).await;
    assert!(page.contains("with 4 stars!"));
    assert!(page.contains("4.0/5"));

    app.post_form(&format!("/interactions/rate-movie/{movie}/"), "rating=2", Some(&cookie))
        .await;
    let page = body_text(app.get("/movies/heat/", Some(&cookie)).await).await;
    assert!(page.contains("has been updated to 2 stars!"));

    let ratings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(ratings, 1);

    app.post_form(&format!("/interactions/rate-movie/{movie}/"), "rating=9", Some(&cookie))
        .await;
    let page = body_text(app.get("/movies/heat/", Some(&cookie)).await).await;
    assert!(page.contains("Invalid rating value. Please select 1-5 stars."));

    let stored: i64 = sqlx::query_scalar("SELECT rating FROM ratings WHERE target_id = ?")
        .bind(movie)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(stored, 2);
    assert_eq!(app.count("ratings").await, 1);
}

#[tokio::test]
async fn invalid_rating_on_a_fresh_target_stores_nothing() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    let cookie = app.sign_up("alice").await;

    for form in ["rating=0", "rating=abc", ""] {
        let response = app
            .post_form(&format!("/interactions/rate-movie/{movie}/"), form, Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/movies/heat/");
    }
    assert_eq!(app.count("ratings").await, 0);

    let page = body_text(app.get("/movies/heat/", Some(&cookie)).await).await;
    assert!(page.contains("Invalid rating value. Please select 1-5 stars."));
}

#[tokio::test]
async fn generic_rating_needs_exactly_one_target() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let series = app.series(category, "Saga", PublicationStatus::Published).await;
    let cookie = app.sign_up("alice").await;

    let response = app.post_form("/interactions/rate/", "rating=4", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let page = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(page.contains("A movie, series or episode must be selected"));

    let response = app
        .post_form("/interactions/rate/", &format!("movie=1&series={series}&rating=4"), Some(&cookie))
        .await;
    assert_eq!(location(&response), "/");
    let page = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(page.contains("Only one of movie, series or episode may be selected"));
    assert_eq!(app.count("ratings").await, 0);

    let response = app
        .post_form("/interactions/rate/", &format!("series={series}&movie=&rating=5"), Some(&cookie))
        .await;
    assert_eq!(location(&response), "/movies/series/saga/");
    let kind: String = sqlx::query_scalar("SELECT target_kind FROM ratings")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(kind, "series");
}

#[tokio::test]
async fn reviews_are_upserted_and_need_title_and_content() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    let series = app.series(category, "Saga", PublicationStatus::Published).await;
    let episode = app.episode(series, 1, "Pilot").await;
    let cookie = app.sign_up("alice").await;

    let response = app
        .post_form(&format!("/interactions/review-movie/{movie}/"), "title=Great&content=Loved+it", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/movies/heat/");
    let page = body_text(app.get("/movies/heat/", Some(&cookie)).await).await;
    assert!(page.contains("has been added!"));
    assert!(page.contains("Loved it"));

    app.post_form(&format!("/interactions/review-movie/{movie}/"), "title=Better&content=Still+good", Some(&cookie))
        .await;
    let page = body_text(app.get("/movies/heat/", Some(&cookie)).await).await;
    assert!(page.contains("has been updated!"));
    assert!(page.contains("Still good"));
    assert_eq!(app.count("reviews").await, 1);

    let response = app
        .post_form(&format!("/interactions/review-episode/{episode}/"), "title=Only+a+title", Some(&cookie))
        .await;
    assert_eq!(location(&response), "/movies/series/saga/episode/1/");
    let page = body_text(app.get("/movies/series/saga/episode/1/", Some(&cookie)).await).await;
    assert!(page.contains("Please provide both title and content for your review."));
    assert_eq!(app.count("reviews").await, 1);

    let response = app
        .post_form("/interactions/review/", &format!("series={series}&title=Epic&content=Wow"), Some(&cookie))
        .await;
    assert_eq!(location(&response), "/movies/series/saga/");
    assert_eq!(app.count("reviews").await, 2);

    let response = app
        .post_form("/interactions/review-series/999/", "title=Ghost&content=Nothing", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_endpoint_answers_json() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    let cookie = app.sign_up("bob").await;

    let response = app
        .post_form(&format!("/interactions/mark-progress/movie/{movie}/"), "progress=42.5", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let reply: ProgressReply = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(reply.success);
    assert_eq!(reply.message.as_deref(), Some("Progress saved for Heat"));

    let response = app
        .post_form(&format!("/interactions/mark-progress/movie/{movie}/"), "progress=150", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let reply: ProgressReply = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(!reply.success);

    let response = app
        .post_form(&format!("/interactions/mark-progress/podcast/{movie}/"), "progress=10", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_form("/interactions/mark-progress/movie/999/", "progress=10", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_without_a_form_body_records_zero() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    let cookie = app.sign_up("bob").await;

    let response = app
        .post_empty(&format!("/interactions/mark-progress/movie/{movie}/"), &cookie)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let reply: ProgressReply = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(reply.success);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/interactions/mark-progress/movie/{movie}/"))
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"progress": 70}"#))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let progress: f64 = sqlx::query_scalar("SELECT progress FROM watch_history WHERE target_id = ?")
        .bind(movie)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(progress, 0.0);
    assert_eq!(app.count("watch_history").await, 1);
}

#[tokio::test]
async fn downloads_stream_the_file_and_are_recorded_once() {
    let app = TestApp::spawn().await;
    let category = app.category("Drama").await;
    let movie = app.movie(category, "Heat", PublicationStatus::Published).await;
    let cookie = app.sign_up("carol").await;

    let missing = app
        .get(&format!("/interactions/download-movie/{movie}/"), Some(&cookie))
        .await;
    assert_eq!(missing.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&missing), "/movies/heat/");

    let video_dir = app.media_root.join("movies/videos");
    std::fs::create_dir_all(&video_dir).unwrap();
    std::fs::write(video_dir.join("heat.mp4"), b"not really a video").unwrap();

    for _ in 0..2 {
        let response = app
            .get(&format!("/interactions/download-movie/{movie}/"), Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"heat.mp4\""
        );
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "18");
        assert_eq!(body_text(response).await, "not really a video");
    }

    let downloads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(downloads, 1);

    let _ = std::fs::remove_dir_all(&app.media_root);
}

#[tokio::test]
async fn wrong_password_rerenders_login() {
    let app = TestApp::spawn().await;
    app.sign_up("dave").await;

    let response = app
        .post_form("/accounts/login", "username=dave&password=not-it", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("Please enter a correct username and password."));

    let response = app
        .post_form(
            "/accounts/login",
            "username=dave&password=long-password&next=%2Fmovies%2F",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/movies/");
}
