use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::catalog::{Postcard, Tag};
use crate::error::AppResult;
use crate::extractors::{IncomingFlash, RequireAdmin};
use crate::flash::{self, FlashKind};
use crate::moderation::{self, ReviewAction};
use crate::routes::{filters, render, PageContext};
use crate::state::AppState;
use crate::users::{DirectoryUser, Role, UserUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/users", get(users))
        .route("/admin/users/{id}", get(edit_user_page).post(edit_user))
        .route("/admin/tags", get(tags))
        .route("/admin/postcards/staged", get(staged))
        .route("/admin/postcards/{id}/review", post(review))
}

const USERS_PER_PAGE: usize = 20;

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct DashboardTemplate {
    ctx: PageContext,
    staged_count: usize,
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct UsersTemplate {
    ctx: PageContext,
    users: Vec<DirectoryUser>,
    page: usize,
}

#[derive(Template)]
#[template(path = "admin/edit_user.html")]
struct EditUserTemplate {
    ctx: PageContext,
    user: DirectoryUser,
    is_admin_role: bool,
}

#[derive(Template)]
#[template(path = "admin/tags.html")]
struct TagsTemplate {
    ctx: PageContext,
    tags: Vec<Tag>,
}

#[derive(Template)]
#[template(path = "admin/staged.html")]
struct StagedTemplate {
    ctx: PageContext,
    postcards: Vec<Postcard>,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
}

#[derive(Deserialize)]
struct EditUserForm {
    username: String,
    email: String,
    role: String,
}

#[derive(Deserialize)]
struct ReviewForm {
    action: String,
    #[serde(default)]
    notes: String,
}

async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Response> {
    let staged_count = state.catalog.staged().await?.len();
    let ctx = PageContext::new(Some(admin), flash);
    let clear = ctx.has_flash();
    Ok(render(DashboardTemplate { ctx, staged_count }, clear))
}

async fn users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    IncomingFlash(flash): IncomingFlash,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let page = query.page.unwrap_or(1).max(1);
    let users = state.users.list(page, USERS_PER_PAGE).await?;
    let ctx = PageContext::new(Some(admin), flash);
    let clear = ctx.has_flash();
    Ok(render(UsersTemplate { ctx, users, page }, clear))
}

async fn edit_user_page(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    IncomingFlash(flash): IncomingFlash,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(user) = state.users.find_by_id(&id).await? else {
        return Ok(flash::redirect(
            "/admin/users",
            FlashKind::Error,
            "User not found",
        ));
    };
    let ctx = PageContext::new(Some(admin), flash);
    let clear = ctx.has_flash();
    let is_admin_role = user.role == Role::Admin;
    Ok(render(
        EditUserTemplate {
            ctx,
            user,
            is_admin_role,
        },
        clear,
    ))
}

async fn edit_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    Form(form): Form<EditUserForm>,
) -> AppResult<Response> {
    if state.users.find_by_id(&id).await?.is_none() {
        return Ok(flash::redirect(
            "/admin/users",
            FlashKind::Error,
            "User not found",
        ));
    }

    let update = UserUpdate {
        username: Some(form.username.trim().to_string()),
        email: Some(form.email.trim().to_string()),
        role: Some(Role::parse(&form.role)),
        ..Default::default()
    };
    match state.users.update(&id, &update).await {
        Ok(Some(_)) => Ok(flash::redirect(
            "/admin/users",
            FlashKind::Success,
            "User updated successfully",
        )),
        _ => Ok(flash::redirect(
            &format!("/admin/users/{}", id),
            FlashKind::Error,
            "Failed to update user",
        )),
    }
}

async fn tags(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Response> {
    let tags = state.tags.all().await?;
    let ctx = PageContext::new(Some(admin), flash);
    let clear = ctx.has_flash();
    Ok(render(TagsTemplate { ctx, tags }, clear))
}

async fn staged(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Response> {
    let postcards = state.catalog.staged().await?;
    let ctx = PageContext::new(Some(admin), flash);
    let clear = ctx.has_flash();
    Ok(render(StagedTemplate { ctx, postcards }, clear))
}

/// Approve or reject a staged postcard. Review notes are kept verbatim on
/// rejection. Two concurrent reviews both succeed; last write wins.
async fn review(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> AppResult<Response> {
    let Some(action) = ReviewAction::parse(&form.action) else {
        return Ok(flash::redirect(
            "/admin/postcards/staged",
            FlashKind::Error,
            "Unknown review action",
        ));
    };
    let Some(postcard) = state.catalog.get(&id).await? else {
        return Ok(flash::redirect(
            "/admin/postcards/staged",
            FlashKind::Error,
            "Postcard not found",
        ));
    };

    let next = match moderation::review(postcard.status, action) {
        Ok(next) => next,
        Err(e) => {
            return Ok(flash::redirect(
                "/admin/postcards/staged",
                FlashKind::Error,
                &e.to_string(),
            ));
        }
    };

    let notes = match action {
        ReviewAction::Reject if !form.notes.trim().is_empty() => Some(form.notes.as_str()),
        _ => None,
    };
    state.catalog.set_status(&id, next, notes).await?;

    let message = match action {
        ReviewAction::Approve => "Postcard approved",
        ReviewAction::Reject => "Postcard rejected",
    };
    Ok(flash::redirect(
        "/admin/postcards/staged",
        FlashKind::Success,
        message,
    ))
}
