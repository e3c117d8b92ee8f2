use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::routing::get;
use axum::{Form, Router};
use tower_sessions::Session;

use crate::errors::AppError;
use crate::http::{flash, CurrentUser, FlashLevel, PageContext};
use crate::services::catalog::list_categories;
use crate::services::interactions::{user_activity, Activity};
use crate::services::profile::{self, ProfileUpdate};
use crate::views::{render, EditProfilePage, ProfilePage, WatchHistoryPage};
use crate::InnerState;

const PROFILE_PATH: &str = "/interactions/profile/";
const EDIT_PROFILE_PATH: &str = "/interactions/profile/edit/";

pub fn profile_router() -> Router<InnerState> {
    Router::new()
        .route("/interactions/watch-history/", get(watch_history))
        .route(PROFILE_PATH, get(show_profile))
        .route(EDIT_PROFILE_PATH, get(edit_profile_form).post(edit_profile))
}

pub async fn watch_history(
    State(inner): State<InnerState>,
    CurrentUser(user): CurrentUser,
    ctx: PageContext,
) -> Result<Html<String>, AppError> {
    let entries = user_activity(&inner.db, user.id, Activity::WatchHistory, None).await?;
    render(&WatchHistoryPage { ctx, entries }).await
}

#[tracing::instrument(name = "Profile page", skip(inner, ctx), fields(user_id = %user.id))]
pub async fn show_profile(
    State(inner): State<InnerState>,
    CurrentUser(user): CurrentUser,
    ctx: PageContext,
) -> Result<Html<String>, AppError> {
    let db = &inner.db;
    let profile = profile::get_or_create(db, user.id).await?;
    let favorites = profile::favorite_categories(db, profile.id).await?;

    render(&ProfilePage {
        ctx,
        favorites,
        ratings: user_activity(db, user.id, Activity::Ratings, None).await?,
        reviews: user_activity(db, user.id, Activity::Reviews, None).await?,
        downloads: user_activity(db, user.id, Activity::Downloads, None).await?,
        watch_history: user_activity(db, user.id, Activity::WatchHistory, None).await?,
        profile,
    }).await
}

pub async fn edit_profile_form(
    State(inner): State<InnerState>,
    CurrentUser(user): CurrentUser,
    ctx: PageContext,
) -> Result<Html<String>, AppError> {
    let profile = profile::get_or_create(&inner.db, user.id).await?;
    let favorite_ids = profile::favorite_categories(&inner.db, profile.id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let categories = list_categories(&inner.db, None).await?;

    render(&EditProfilePage {
        ctx,
        profile,
        categories,
        favorite_ids,
    }).await
}

pub async fn edit_profile(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Redirect, AppError> {
    let update = ProfileUpdate::from_pairs(&pairs);
    match profile::update(&inner.db, user.id, &update).await {
        Ok(_) => {
            flash(&session, FlashLevel::Success, "Your profile has been updated!").await?;
            Ok(Redirect::to(PROFILE_PATH))
        }
        Err(AppError::Validation(message)) => {
            flash(&session, FlashLevel::Error, message).await?;
            Ok(Redirect::to(EDIT_PROFILE_PATH))
        }
        Err(e) => Err(e),
    }
}
