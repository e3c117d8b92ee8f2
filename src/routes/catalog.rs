//! Public catalog pages under `/movies/`.

use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::errors::AppError;
use crate::http::PageContext;
use crate::models::ContentKind;
use crate::services::catalog::{self, CatalogFilter, SearchPages};
use crate::services::detail;
use crate::views::{
    render, CategoriesPage, CategoryPage, EpisodeDetailPage, ListingPage, MovieDetailPage, SearchPage,
    SeriesDetailPage,
};
use crate::InnerState;

pub fn catalog_router() -> Router<InnerState> {
    Router::new()
        .route("/movies/", get(movies_list))
        .route("/movies/search/", get(search))
        .route("/movies/category/", get(categories_list))
        .route("/movies/category/:slug/", get(category_detail))
        .route("/movies/series/", get(series_list))
        .route("/movies/series/:slug/", get(series_detail))
        .route("/movies/series/:slug/episode/:episode_number/", get(episode_detail))
        .route("/movies/:slug/", get(movie_detail))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    /// Non-numeric category values are treated as absent.
    fn category_id(&self) -> Option<i64> {
        self.category.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

async fn listing(
    inner: InnerState,
    ctx: PageContext,
    params: ListParams,
    kind: ContentKind,
    heading: &'static str,
    base_path: &'static str,
) -> Result<Html<String>, AppError> {
    let selected_category = params.category_id();
    let filter = CatalogFilter::new(selected_category, params.search.clone());

    let page = catalog::list_published(&inner.db, kind, &filter, params.page.as_deref()).await?;
    let categories = catalog::list_categories(&inner.db, None).await?;

    render(&ListingPage {
        ctx,
        heading,
        base_path,
        page,
        categories,
        selected_category,
        search: filter.search.unwrap_or_default(),
    }).await
}

#[tracing::instrument(name = "Movies list", skip(inner, ctx))]
pub async fn movies_list(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Query(params): Query<ListParams>,
) -> Result<Html<String>, AppError> {
    listing(inner, ctx, params, ContentKind::Movie, "Movies", "/movies/").await
}

#[tracing::instrument(name = "Series list", skip(inner, ctx))]
pub async fn series_list(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Query(params): Query<ListParams>,
) -> Result<Html<String>, AppError> {
    listing(inner, ctx, params, ContentKind::Series, "Series", "/movies/series/").await
}

#[tracing::instrument(name = "Movie detail page", skip(inner, ctx))]
pub async fn movie_detail(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let detail = detail::movie_detail(&inner.db, &slug, ctx.user_id()).await?;
    render(&MovieDetailPage { ctx, detail }).await
}

#[tracing::instrument(name = "Series detail page", skip(inner, ctx))]
pub async fn series_detail(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let detail = detail::series_detail(&inner.db, &slug, ctx.user_id()).await?;
    render(&SeriesDetailPage { ctx, detail }).await
}

#[tracing::instrument(name = "Episode detail page", skip(inner, ctx))]
pub async fn episode_detail(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Path((series_slug, episode_number)): Path<(String, i64)>,
) -> Result<Html<String>, AppError> {
    let detail = detail::episode_detail(&inner.db, &series_slug, episode_number, ctx.user_id()).await?;
    render(&EpisodeDetailPage { ctx, detail }).await
}

pub async fn categories_list(State(inner): State<InnerState>, ctx: PageContext) -> Result<Html<String>, AppError> {
    let categories = catalog::list_categories(&inner.db, None).await?;
    render(&CategoriesPage { ctx, categories }).await
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
    pub page_movies: Option<String>,
    pub page_series: Option<String>,
}

#[tracing::instrument(name = "Category detail page", skip(inner, ctx))]
pub async fn category_detail(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Path(slug): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Result<Html<String>, AppError> {
    let listing = catalog::category_listing(
        &inner.db,
        &slug,
        params.page_movies.as_deref(),
        params.page_series.as_deref(),
    )
    .await?;
    render(&CategoryPage { ctx, listing }).await
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page_movies: Option<String>,
    pub page_series: Option<String>,
    pub page_episodes: Option<String>,
}

#[tracing::instrument(name = "Search page", skip(inner, ctx))]
pub async fn search(
    State(inner): State<InnerState>,
    ctx: PageContext,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, AppError> {
    let pages = SearchPages {
        movies: params.page_movies.as_deref(),
        series: params.page_series.as_deref(),
        episodes: params.page_episodes.as_deref(),
    };
    let results = catalog::search(&inner.db, params.q.as_deref(), pages).await?;
    render(&SearchPage { ctx, results }).await
}
