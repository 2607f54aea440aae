use askama::Template;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::catalog::Postcard;
use crate::error::AppResult;
use crate::extractors::{IncomingFlash, RequireUser};
use crate::flash::{self, FlashKind};
use crate::routes::{filters, render, PageContext};
use crate::state::AppState;
use crate::users::{UserDirectory, UserUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/profile/edit", get(edit_page).post(edit))
        .route("/profile/password", get(password_page).post(password))
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
struct ProfileTemplate {
    ctx: PageContext,
    postcards: Vec<Postcard>,
}

#[derive(Template)]
#[template(path = "pages/profile_edit.html")]
struct ProfileEditTemplate {
    ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/profile_password.html")]
struct ProfilePasswordTemplate {
    ctx: PageContext,
}

#[derive(Deserialize)]
struct ProfileForm {
    username: String,
    email: String,
}

#[derive(Deserialize)]
struct PasswordForm {
    current_password: String,
    new_password: String,
    confirm_password: String,
}

/// Own postcards, every status visible to the owner.
async fn profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Response> {
    let postcards = state.catalog.for_user(&user.id).await?;
    let ctx = PageContext::new(Some(user), flash);
    let clear = ctx.has_flash();
    Ok(render(ProfileTemplate { ctx, postcards }, clear))
}

async fn edit_page(
    RequireUser(user): RequireUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    let ctx = PageContext::new(Some(user), flash);
    let clear = ctx.has_flash();
    render(ProfileEditTemplate { ctx }, clear)
}

async fn edit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() {
        return Ok(flash::redirect(
            "/profile/edit",
            FlashKind::Error,
            "Username and email are required",
        ));
    }

    // Duplicate checks excluding the user's own row.
    if let Some(existing) = state.users.find_by_email(email).await? {
        if existing.id != user.id {
            return Ok(flash::redirect(
                "/profile/edit",
                FlashKind::Error,
                "Email already in use",
            ));
        }
    }
    if let Some(existing) = state.users.find_by_username(username).await? {
        if existing.id != user.id {
            return Ok(flash::redirect(
                "/profile/edit",
                FlashKind::Error,
                "Username already in use",
            ));
        }
    }

    let update = UserUpdate {
        username: Some(username.to_string()),
        email: Some(email.to_string()),
        ..Default::default()
    };
    match state.users.update(&user.id, &update).await {
        Ok(Some(_)) => Ok(flash::redirect(
            "/profile",
            FlashKind::Success,
            "Profile updated successfully",
        )),
        Ok(None) => Ok(flash::redirect(
            "/profile/edit",
            FlashKind::Error,
            "Failed to update profile",
        )),
        Err(e) => {
            tracing::error!("Profile update failed: {}", e);
            Ok(flash::redirect(
                "/profile/edit",
                FlashKind::Error,
                "Failed to update profile",
            ))
        }
    }
}

async fn password_page(
    RequireUser(user): RequireUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    let ctx = PageContext::new(Some(user), flash);
    let clear = ctx.has_flash();
    render(ProfilePasswordTemplate { ctx }, clear)
}

async fn password(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<PasswordForm>,
) -> AppResult<Response> {
    if form.current_password.is_empty()
        || form.new_password.is_empty()
        || form.confirm_password.is_empty()
    {
        return Ok(flash::redirect(
            "/profile/password",
            FlashKind::Error,
            "All fields are required",
        ));
    }
    if form.new_password != form.confirm_password {
        return Ok(flash::redirect(
            "/profile/password",
            FlashKind::Error,
            "New passwords do not match",
        ));
    }

    let Some(record) = state.users.find_by_id(&user.id).await? else {
        return Ok(flash::redirect(
            "/profile/password",
            FlashKind::Error,
            "Failed to change password",
        ));
    };
    if !UserDirectory::verify_password(&record, &form.current_password) {
        return Ok(flash::redirect(
            "/profile/password",
            FlashKind::Error,
            "Current password is incorrect",
        ));
    }

    let password_hash = bcrypt::hash(&form.new_password, bcrypt::DEFAULT_COST)?;
    let update = UserUpdate {
        password_hash: Some(password_hash),
        ..Default::default()
    };
    match state.users.update(&user.id, &update).await {
        Ok(Some(_)) => Ok(flash::redirect(
            "/profile",
            FlashKind::Success,
            "Password changed successfully",
        )),
        _ => Ok(flash::redirect(
            "/profile/password",
            FlashKind::Error,
            "Failed to change password",
        )),
    }
}
