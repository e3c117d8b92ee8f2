//! Login, logout and sign-up pages under `/accounts/`.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use secrecy::Secret;
use serde::Deserialize;
use tower_sessions::Session;

use crate::errors::AppError;
use crate::http::session::{log_in, log_out, safe_next};
use crate::http::{flash, FlashLevel, PageContext};
use crate::services::accounts::{register, validate_credentials, Credentials, Registration};
use crate::views::{render, LoginPage, RegisterPage};
use crate::InnerState;

pub fn accounts_router() -> Router<InnerState> {
    Router::new()
        .route("/accounts/login", get(login_form).post(login))
        .route("/accounts/logout", post(logout))
        .route("/accounts/register", get(register_form).post(sign_up))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

pub async fn login_form(ctx: PageContext, Query(params): Query<NextParam>) -> Result<Response, AppError> {
    if ctx.is_authenticated() {
        return Ok(Redirect::to(&safe_next(params.next.as_deref())).into_response());
    }
    let page = LoginPage {
        ctx,
        next: safe_next(params.next.as_deref()),
        username: String::new(),
        error: None,
    };
    Ok(render(&page).await?.into_response())
}

#[tracing::instrument(name = "Login", skip(inner, session, ctx, form), fields(username = %form.username))]
pub async fn login(
    State(inner): State<InnerState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref());
    let credentials = Credentials {
        username: form.username.trim().to_string(),
        password: Secret::new(form.password),
    };

    match validate_credentials(&credentials, &inner.db).await {
        Ok(user) => {
            log_in(&session, &user).await?;
            tracing::info!("User {} logged in", user.username);
            Ok(Redirect::to(&next).into_response())
        }
        Err(e) => {
            tracing::warn!("Login failed: {:?}", e);
            let page = LoginPage {
                ctx,
                next,
                username: credentials.username,
                error: Some("Please enter a correct username and password.".to_string()),
            };
            Ok(render(&page).await?.into_response())
        }
    }
}

pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    log_out(&session).await?;
    Ok(Redirect::to("/"))
}

pub async fn register_form(ctx: PageContext) -> Result<Response, AppError> {
    if ctx.is_authenticated() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(render(&RegisterPage {
        ctx,
        username: String::new(),
        error: None,
    }).await?
    .into_response())
}

#[tracing::instrument(name = "Sign up", skip(inner, session, ctx, form), fields(username = %form.username))]
pub async fn sign_up(
    State(inner): State<InnerState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let registration = Registration {
        username: form.username.trim().to_string(),
        password1: form.password1,
        password2: form.password2,
    };

    match register(&inner.db, &registration).await {
        Ok(user) => {
            log_in(&session, &user).await?;
            flash(&session, FlashLevel::Success, format!("Account created for {}!", user.username)).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Validation(message)) | Err(AppError::Conflict(message)) => {
            let page = RegisterPage {
                ctx,
                username: registration.username,
                error: Some(message),
            };
            Ok(render(&page).await?.into_response())
        }
        Err(e) => Err(e),
    }
}
