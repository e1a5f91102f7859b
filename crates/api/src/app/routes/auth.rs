//! Account routes. `register` and `login` are public; the rest run behind
//! the auth middleware.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    routing::{get, post, put},
};
use chrono::Utc;

use assetkeep_auth::AccountUpdate;

use crate::app::dto::{self, ProfileView, SessionView, UserEnvelope};
use crate::app::errors::{self, ApiResult, json_body};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/profile", put(update_account))
        .route("/avatar", post(upload_avatar))
        .route("/unlink/:provider", post(unlink))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RegisterRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let session = services
        .accounts
        .register(&body.email, &body.password, body.full_name)
        .await?;
    let view = SessionView::new(&session.profile, session.token, Utc::now());
    Ok(errors::created("User registered successfully", view))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let session = services.accounts.login(&body.email, &body.password).await?;
    let view = SessionView::new(&session.profile, session.token, Utc::now());
    Ok(errors::ok_with_message("Login successful", view))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let profile = services.accounts.me(principal.profile_id()).await?;
    Ok(errors::ok(UserEnvelope {
        user: ProfileView::from_profile(&profile, Utc::now()),
    }))
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<AccountUpdate>, JsonRejection>,
) -> ApiResult {
    let update = json_body(body)?;
    let profile = services.accounts.update_account(principal.profile_id(), update).await?;
    Ok(errors::ok_with_message(
        "Profile updated successfully",
        UserEnvelope {
            user: ProfileView::from_profile(&profile, Utc::now()),
        },
    ))
}

pub async fn upload_avatar(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::AvatarRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;
    let profile = services
        .accounts
        .upload_avatar(principal.profile_id(), &body.avatar)
        .await?;
    Ok(errors::ok_with_message(
        "Avatar uploaded successfully",
        UserEnvelope {
            user: ProfileView::from_profile(&profile, Utc::now()),
        },
    ))
}

pub async fn unlink(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(provider): Path<String>,
) -> ApiResult {
    let profile = services.accounts.unlink(principal.profile_id(), &provider).await?;
    Ok(errors::ok_with_message(
        format!("{} unlinked successfully", provider.to_lowercase()),
        UserEnvelope {
            user: ProfileView::from_profile(&profile, Utc::now()),
        },
    ))
}
