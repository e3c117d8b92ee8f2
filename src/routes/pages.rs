use axum::extract::State;
use axum::response::Html;

use crate::errors::AppError;
use crate::http::PageContext;
use crate::models::ContentKind;
use crate::services::catalog::{latest_published, list_categories};
use crate::views::{render, AboutPage, ContactPage, HomePage};
use crate::InnerState;

const FEATURED_LIMIT: i64 = 6;
const HOME_CATEGORY_LIMIT: i64 = 8;

#[tracing::instrument(name = "Home page", skip(inner, ctx))]
pub async fn home(State(inner): State<InnerState>, ctx: PageContext) -> Result<Html<String>, AppError> {
    let InnerState { db, .. } = inner;

    let featured_movies = latest_published(&db, ContentKind::Movie, FEATURED_LIMIT).await?;
    let featured_series = latest_published(&db, ContentKind::Series, FEATURED_LIMIT).await?;
    let categories = list_categories(&db, Some(HOME_CATEGORY_LIMIT)).await?;

    render(&HomePage {
        ctx,
        featured_movies,
        featured_series,
        categories,
    }).await
}

pub async fn about(ctx: PageContext) -> Result<Html<String>, AppError> {
    render(&AboutPage { ctx }).await
}

pub async fn contact(ctx: PageContext) -> Result<Html<String>, AppError> {
    render(&ContactPage { ctx }).await
}
