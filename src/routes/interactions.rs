//! Logged-in actions on catalog items: rating, reviewing, downloading and
//! tracking watch progress.

use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Component, Path as FsPath, PathBuf};
use tokio_util::io::ReaderStream;
use tower_sessions::Session;

use crate::errors::AppError;
use crate::http::{client_ip, flash, CurrentUser, FlashLevel};
use crate::models::{ContentRef, PlayableRef, Progress, RatingValue, RecordOutcome};
use crate::services::interactions::{
    download_source, rate, record_download, record_progress, resolve_published, write_review,
};
use crate::services::records::slugify;
use crate::InnerState;

pub fn interactions_router() -> Router<InnerState> {
    Router::new()
        .route("/interactions/rate/", post(rate_any))
        .route("/interactions/rate-movie/:id/", post(rate_movie))
        .route("/interactions/rate-series/:id/", post(rate_series))
        .route("/interactions/rate-episode/:id/", post(rate_episode))
        .route("/interactions/review/", post(review_any))
        .route("/interactions/review-movie/:id/", post(review_movie))
        .route("/interactions/review-series/:id/", post(review_series))
        .route("/interactions/review-episode/:id/", post(review_episode))
        .route("/interactions/download-movie/:id/", get(download_movie))
        .route("/interactions/download-episode/:id/", get(download_episode))
        .route(
            "/interactions/mark-progress/:content_type/:content_id/",
            post(mark_progress),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct RatingForm {
    pub rating: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Target chosen by whichever of `movie`, `series` or `episode` is filled in.
#[derive(Debug, Default, Deserialize)]
pub struct TargetFields {
    pub movie: Option<String>,
    pub series: Option<String>,
    pub episode: Option<String>,
}

impl TargetFields {
    fn target(&self) -> Result<ContentRef, AppError> {
        fn id(raw: &Option<String>) -> Option<i64> {
            raw.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse().ok())
        }
        ContentRef::from_optional(id(&self.movie), id(&self.series), id(&self.episode))
    }
}

#[derive(Debug, Deserialize)]
pub struct AnyRatingForm {
    #[serde(flatten)]
    pub target: TargetFields,
    pub rating: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnyReviewForm {
    #[serde(flatten)]
    pub target: TargetFields,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Validation problems become a flash message; anything else propagates.
async fn flash_validation(session: &Session, result: Result<(), AppError>) -> Result<(), AppError> {
    match result {
        Err(AppError::Validation(message)) => flash(session, FlashLevel::Error, message).await,
        other => other,
    }
}

#[tracing::instrument(name = "Rate target", skip(inner, session, form))]
async fn rate_target(
    inner: &InnerState,
    session: &Session,
    user_id: i64,
    target: ContentRef,
    form: &RatingForm,
) -> Result<Redirect, AppError> {
    let resolved = resolve_published(&inner.db, target).await?;

    let result = async {
        let value = RatingValue::parse(form.rating.as_deref())?;
        let (level, text) = match rate(&inner.db, user_id, target, value).await? {
            RecordOutcome::Created => (
                FlashLevel::Success,
                format!("You rated '{}' with {} stars!", resolved.title, value.get()),
            ),
            RecordOutcome::Updated => (
                FlashLevel::Info,
                format!("Your rating for '{}' has been updated to {} stars!", resolved.title, value.get()),
            ),
        };
        flash(session, level, text).await
    }
    .await;

    flash_validation(session, result).await?;
    Ok(Redirect::to(&resolved.url))
}

#[tracing::instrument(name = "Review target", skip(inner, session, title, content))]
async fn review_target(
    inner: &InnerState,
    session: &Session,
    user_id: i64,
    target: ContentRef,
    title: &str,
    content: &str,
) -> Result<Redirect, AppError> {
    let resolved = resolve_published(&inner.db, target).await?;

    let result = async {
        let (level, text) = match write_review(&inner.db, user_id, target, title, content).await? {
            RecordOutcome::Created => (
                FlashLevel::Success,
                format!("Your review for '{}' has been added!", resolved.title),
            ),
            RecordOutcome::Updated => (
                FlashLevel::Info,
                format!("Your review for '{}' has been updated!", resolved.title),
            ),
        };
        flash(session, level, text).await
    }
    .await;

    flash_validation(session, result).await?;
    Ok(Redirect::to(&resolved.url))
}

pub async fn rate_movie(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<RatingForm>,
) -> Result<Redirect, AppError> {
    rate_target(&inner, &session, user.id, ContentRef::Movie(id), &form).await
}

pub async fn rate_series(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<RatingForm>,
) -> Result<Redirect, AppError> {
    rate_target(&inner, &session, user.id, ContentRef::Series(id), &form).await
}

pub async fn rate_episode(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<RatingForm>,
) -> Result<Redirect, AppError> {
    rate_target(&inner, &session, user.id, ContentRef::Episode(id), &form).await
}

/// Rates whichever single item the form names.
pub async fn rate_any(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<AnyRatingForm>,
) -> Result<Redirect, AppError> {
    match form.target.target() {
        Ok(target) => {
            let rating = RatingForm { rating: form.rating };
            rate_target(&inner, &session, user.id, target, &rating).await
        }
        Err(AppError::Validation(message)) => {
            flash(&session, FlashLevel::Error, message).await?;
            Ok(Redirect::to("/"))
        }
        Err(e) => Err(e),
    }
}

pub async fn review_movie(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, AppError> {
    review_target(&inner, &session, user.id, ContentRef::Movie(id), &form.title, &form.content).await
}

pub async fn review_series(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, AppError> {
    review_target(&inner, &session, user.id, ContentRef::Series(id), &form.title, &form.content).await
}

pub async fn review_episode(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect, AppError> {
    review_target(&inner, &session, user.id, ContentRef::Episode(id), &form.title, &form.content).await
}

pub async fn review_any(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<AnyReviewForm>,
) -> Result<Redirect, AppError> {
    match form.target.target() {
        Ok(target) => review_target(&inner, &session, user.id, target, &form.title, &form.content).await,
        Err(AppError::Validation(message)) => {
            flash(&session, FlashLevel::Error, message).await?;
            Ok(Redirect::to("/"))
        }
        Err(e) => Err(e),
    }
}

/// Joins a stored media path onto `root`, refusing anything that could
/// escape it.
fn media_path(root: &FsPath, relative: &str) -> Option<PathBuf> {
    let relative = FsPath::new(relative);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Some(root.join(relative))
    } else {
        None
    }
}

fn video_content_type(path: &FsPath) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

#[tracing::instrument(name = "Download", skip(inner, session, headers, peer))]
async fn download(
    inner: &InnerState,
    session: &Session,
    user_id: i64,
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    target: PlayableRef,
) -> Result<Response, AppError> {
    let (resolved, stored) = download_source(&inner.db, target).await?;
    let path = stored.and_then(|f| media_path(&inner.config.media_root, &f));

    let file = match path.as_ref() {
        Some(path) => tokio::fs::File::open(path).await.ok(),
        None => None,
    };

    let (Some(path), Some(file)) = (path, file) else {
        tracing::warn!("No video available for {}", resolved.target);
        flash(
            session,
            FlashLevel::Error,
            format!("'{}' is not available for download.", resolved.title),
        )
        .await?;
        return Ok(Redirect::to(&resolved.url).into_response());
    };

    let length = file.metadata().await.map_err(|e| AppError::Unexpected(e.into()))?.len();

    let ip = client_ip(headers, peer);
    let (level, text) = match record_download(&inner.db, user_id, target, ip).await? {
        RecordOutcome::Created => (
            FlashLevel::Success,
            format!("'{}' has been added to your downloads!", resolved.title),
        ),
        RecordOutcome::Updated => (
            FlashLevel::Info,
            format!("You have already downloaded '{}'.", resolved.title),
        ),
    };
    flash(session, level, text).await?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    let mut file_stem = slugify(&resolved.title);
    if file_stem.is_empty() {
        file_stem = "video".to_string();
    }
    let disposition = format!("attachment; filename=\"{}.{}\"", file_stem, extension);

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, video_content_type(&path)),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn download_movie(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    download(&inner, &session, user.id, &headers, peer.as_ref(), PlayableRef::Movie(id)).await
}

pub async fn download_episode(
    State(inner): State<InnerState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    download(&inner, &session, user.id, &headers, peer.as_ref(), PlayableRef::Episode(id)).await
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressForm {
    pub progress: Option<String>,
}

/// Body of the progress endpoint: `message` on success, `error` otherwise.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressReply {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message: Some(message),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
        }
    }
}

/// A POST without a form body (or with some other content type) carries
/// no progress field and records 0.
pub async fn mark_progress(
    State(inner): State<InnerState>,
    CurrentUser(user): CurrentUser,
    Path((content_type, content_id)): Path<(String, i64)>,
    form: Result<Form<ProgressForm>, FormRejection>,
) -> (StatusCode, Json<ProgressReply>) {
    let form = match form {
        Ok(Form(form)) => form,
        Err(FormRejection::InvalidFormContentType(_)) => ProgressForm::default(),
        Err(rejection) => {
            tracing::warn!("Unreadable progress form: {}", rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(ProgressReply::failed(rejection.body_text())));
        }
    };

    let result = async {
        let target = PlayableRef::parse(&content_type, content_id)?;
        let progress = Progress::parse(form.progress.as_deref())?;
        let (resolved, _) = record_progress(&inner.db, user.id, target, progress).await?;
        Ok::<_, AppError>(resolved.title)
    }
    .await;

    match result {
        Ok(title) => (
            StatusCode::OK,
            Json(ProgressReply::ok(format!("Progress saved for {}", title))),
        ),
        Err(AppError::Validation(message)) => (StatusCode::BAD_REQUEST, Json(ProgressReply::failed(message))),
        Err(AppError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ProgressReply::failed("Content not found".to_string())),
        ),
        Err(e) => {
            tracing::error!("Failed to save progress: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProgressReply::failed("Could not save progress".to_string())),
            )
        }
    }
}
