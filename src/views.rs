//! One askama template struct per rendered page. Every page carries the
//! per-request [`PageContext`] used by `base.html`.

use askama::Template;
use axum::response::Html;
use std::borrow::Borrow;

use crate::errors::AppError;
use crate::http::PageContext;
use crate::models::{ActivityEntry, CatalogItem, Category, ReviewWithAuthor, UserProfile};
use crate::services::catalog::{CategoryListing, SearchResults};
use crate::services::detail::{EpisodeDetail, MovieDetail, RatingSummary, SeriesDetail};
use crate::services::pagination::Page;

/// A page drawn inside `base.html`.
pub trait Layout {
    fn context(&self) -> &PageContext;
}

macro_rules! impl_layout {
    ($($page:ty),* $(,)?) => {
        $(impl Layout for $page {
            fn context(&self) -> &PageContext {
                &self.ctx
            }
        })*
    };
}

impl_layout!(
    HomePage,
    AboutPage,
    ContactPage,
    ListingPage,
    CategoriesPage,
    CategoryPage,
    SearchPage,
    MovieDetailPage,
    SeriesDetailPage,
    EpisodeDetailPage,
    WatchHistoryPage,
    ProfilePage,
    EditProfilePage,
    LoginPage,
    RegisterPage,
);

/// Renders `page` and then drops the flash messages it displayed.
pub async fn render<T: Template + Layout + Sync>(page: &T) -> Result<Html<String>, AppError> {
    let body = page.render()?;
    page.context().mark_messages_shown().await?;
    Ok(Html(body))
}

/// `path?k=v&...` keeping only non-empty values.
fn query_link(path: &str, pairs: &[(&str, String)]) -> String {
    let kept: Vec<(&str, &str)> = pairs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    match serde_urlencoded::to_string(&kept) {
        Ok(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path.to_string(),
    }
}

pub fn media_url(path: &Option<String>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("/media/{}", p),
        _ => String::new(),
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomePage {
    pub ctx: PageContext,
    pub featured_movies: Vec<CatalogItem>,
    pub featured_series: Vec<CatalogItem>,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutPage {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactPage {
    pub ctx: PageContext,
}

/// Movie or series listing with category and search filters.
#[derive(Template)]
#[template(path = "listing.html")]
pub struct ListingPage {
    pub ctx: PageContext,
    pub heading: &'static str,
    pub base_path: &'static str,
    pub page: Page<CatalogItem>,
    pub categories: Vec<Category>,
    pub selected_category: Option<i64>,
    pub search: String,
}

impl ListingPage {
    pub fn page_link<N: Borrow<i64>>(&self, number: N) -> String {
        let number = *number.borrow();
        query_link(
            self.base_path,
            &[
                ("page", number.to_string()),
                ("category", self.selected_category.map(|c| c.to_string()).unwrap_or_default()),
                ("search", self.search.clone()),
            ],
        )
    }

    pub fn is_selected<N: Borrow<i64>>(&self, category_id: N) -> bool {
        self.selected_category == Some(*category_id.borrow())
    }
}

#[derive(Template)]
#[template(path = "categories.html")]
pub struct CategoriesPage {
    pub ctx: PageContext,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "category_detail.html")]
pub struct CategoryPage {
    pub ctx: PageContext,
    pub listing: CategoryListing,
}

impl CategoryPage {
    pub fn movies_link<N: Borrow<i64>>(&self, number: N) -> String {
        let number = *number.borrow();
        query_link(
            &self.listing.category.url(),
            &[
                ("page_movies", number.to_string()),
                ("page_series", self.listing.series.number.to_string()),
            ],
        )
    }

    pub fn series_link<N: Borrow<i64>>(&self, number: N) -> String {
        let number = *number.borrow();
        query_link(
            &self.listing.category.url(),
            &[
                ("page_movies", self.listing.movies.number.to_string()),
                ("page_series", number.to_string()),
            ],
        )
    }
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchPage {
    pub ctx: PageContext,
    pub results: SearchResults,
}

impl SearchPage {
    fn link(&self, movies: i64, series: i64, episodes: i64) -> String {
        query_link(
            "/movies/search/",
            &[
                ("q", self.results.query.clone()),
                ("page_movies", movies.to_string()),
                ("page_series", series.to_string()),
                ("page_episodes", episodes.to_string()),
            ],
        )
    }

    pub fn movies_link<N: Borrow<i64>>(&self, number: N) -> String {
        let number = *number.borrow();
        self.link(number, self.results.series.number, self.results.episodes.number)
    }

    pub fn series_link<N: Borrow<i64>>(&self, number: N) -> String {
        let number = *number.borrow();
        self.link(self.results.movies.number, number, self.results.episodes.number)
    }

    pub fn episodes_link<N: Borrow<i64>>(&self, number: N) -> String {
        let number = *number.borrow();
        self.link(self.results.movies.number, self.results.series.number, number)
    }
}

#[derive(Template)]
#[template(path = "movie_detail.html")]
pub struct MovieDetailPage {
    pub ctx: PageContext,
    pub detail: MovieDetail,
}

impl MovieDetailPage {
    pub fn poster(&self) -> String {
        media_url(&self.detail.movie.poster)
    }

    pub fn trailer(&self) -> String {
        self.detail.movie.trailer_url.clone().unwrap_or_default()
    }

    pub fn downloadable(&self) -> bool {
        self.detail.movie.video_file.is_some()
    }

    pub fn ratings(&self) -> &RatingSummary {
        &self.detail.ratings
    }

    pub fn reviews(&self) -> &Vec<ReviewWithAuthor> {
        &self.detail.reviews
    }

    pub fn rate_action(&self) -> String {
        format!("/interactions/rate-movie/{}/", self.detail.movie.id)
    }

    pub fn review_action(&self) -> String {
        format!("/interactions/review-movie/{}/", self.detail.movie.id)
    }

    pub fn progress_action(&self) -> String {
        format!("/interactions/mark-progress/movie/{}/", self.detail.movie.id)
    }
}

#[derive(Template)]
#[template(path = "series_detail.html")]
pub struct SeriesDetailPage {
    pub ctx: PageContext,
    pub detail: SeriesDetail,
}

impl SeriesDetailPage {
    pub fn poster(&self) -> String {
        media_url(&self.detail.series.poster)
    }

    pub fn trailer(&self) -> String {
        self.detail.series.trailer_url.clone().unwrap_or_default()
    }

    pub fn ratings(&self) -> &RatingSummary {
        &self.detail.ratings
    }

    pub fn reviews(&self) -> &Vec<ReviewWithAuthor> {
        &self.detail.reviews
    }

    pub fn rate_action(&self) -> String {
        format!("/interactions/rate-series/{}/", self.detail.series.id)
    }

    pub fn review_action(&self) -> String {
        format!("/interactions/review-series/{}/", self.detail.series.id)
    }
}

#[derive(Template)]
#[template(path = "episode_detail.html")]
pub struct EpisodeDetailPage {
    pub ctx: PageContext,
    pub detail: EpisodeDetail,
}

impl EpisodeDetailPage {
    pub fn heading(&self) -> String {
        self.detail.episode.label(&self.detail.series.title)
    }

    pub fn downloadable(&self) -> bool {
        self.detail.episode.video_file.is_some()
    }

    pub fn ratings(&self) -> &RatingSummary {
        &self.detail.ratings
    }

    pub fn reviews(&self) -> &Vec<ReviewWithAuthor> {
        &self.detail.reviews
    }

    pub fn rate_action(&self) -> String {
        format!("/interactions/rate-episode/{}/", self.detail.episode.id)
    }

    pub fn review_action(&self) -> String {
        format!("/interactions/review-episode/{}/", self.detail.episode.id)
    }

    pub fn progress_action(&self) -> String {
        format!("/interactions/mark-progress/episode/{}/", self.detail.episode.id)
    }
}

#[derive(Template)]
#[template(path = "watch_history.html")]
pub struct WatchHistoryPage {
    pub ctx: PageContext,
    pub entries: Vec<ActivityEntry>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub ctx: PageContext,
    pub profile: UserProfile,
    pub favorites: Vec<Category>,
    pub ratings: Vec<ActivityEntry>,
    pub reviews: Vec<ActivityEntry>,
    pub downloads: Vec<ActivityEntry>,
    pub watch_history: Vec<ActivityEntry>,
}

#[derive(Template)]
#[template(path = "edit_profile.html")]
pub struct EditProfilePage {
    pub ctx: PageContext,
    pub profile: UserProfile,
    pub categories: Vec<Category>,
    pub favorite_ids: Vec<i64>,
}

impl EditProfilePage {
    pub fn is_favorite<N: Borrow<i64>>(&self, category_id: N) -> bool {
        self.favorite_ids.contains(category_id.borrow())
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub ctx: PageContext,
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage {
    pub ctx: PageContext,
    pub username: String,
    pub error: Option<String>,
}
