use askama::Template;
use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::{IncomingFlash, MaybePrincipal, RequireUser};
use crate::flash::{self, FlashKind};
use crate::routes::{render, PageContext};
use crate::session::{self, SessionData};
use crate::state::AppState;
use crate::users::Role;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
}

#[derive(Template)]
#[template(path = "pages/login.html")]
struct LoginTemplate {
    ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
struct RegisterTemplate {
    ctx: PageContext,
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterForm {
    username: String,
    email: String,
    password: String,
    confirm_password: String,
}

/// Field-specific duplicate rejection for registration, email checked
/// first. `None` means the registration may proceed; nothing is created
/// (locally or at the provider) until this passes.
fn registration_conflict(email_taken: bool, username_taken: bool) -> Option<&'static str> {
    if email_taken {
        Some("Email already in use")
    } else if username_taken {
        Some("Username already in use")
    } else {
        None
    }
}

fn session_response(state: &AppState, data: &SessionData, to: &str) -> AppResult<Response> {
    let sealed = session::seal(&state.config.session.secret, data)?;
    let cookie = session::cookie(
        &state.config.session.cookie_name,
        &sealed,
        state.config.session.max_age_hours,
    );
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(to),
    )
        .into_response())
}

async fn login_page(
    MaybePrincipal(user): MaybePrincipal,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let ctx = PageContext::new(None, flash);
    let clear = ctx.has_flash();
    render(LoginTemplate { ctx }, clear)
}

/// Log in against the identity provider, falling back to the locally
/// mirrored credential when the provider cannot be reached.
async fn login(
    State(state): State<AppState>,
    MaybePrincipal(current): MaybePrincipal,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    if form.email.is_empty() || form.password.is_empty() {
        return Ok(flash::redirect(
            "/login",
            FlashKind::Error,
            "Please enter both email and password",
        ));
    }

    match state.auth.sign_in(&form.email, &form.password).await {
        Ok(Some(auth_session)) => {
            // Mirror the user on first sight so later requests resolve
            // without a provider round-trip.
            state.users.upsert_mirror(&auth_session.user).await?;
            let data = SessionData::provider(
                &auth_session.user.id,
                &auth_session.access_token,
                &auth_session.refresh_token,
            );
            return session_response(&state, &data, "/");
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Identity provider unreachable, trying local fallback: {}", e);
        }
    }

    // Manual fallback path against the local directory.
    if let Some(user) = state.users.find_by_email(&form.email).await? {
        if crate::users::UserDirectory::verify_password(&user, &form.password) {
            let data = SessionData::local(&user.id);
            return session_response(&state, &data, "/");
        }
    }

    Ok(flash::redirect(
        "/login",
        FlashKind::Error,
        "Invalid email or password",
    ))
}

async fn register_page(
    MaybePrincipal(user): MaybePrincipal,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let ctx = PageContext::new(None, flash);
    let clear = ctx.has_flash();
    render(RegisterTemplate { ctx }, clear)
}

async fn register(
    State(state): State<AppState>,
    MaybePrincipal(current): MaybePrincipal,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return Ok(flash::redirect(
            "/register",
            FlashKind::Error,
            "All fields are required",
        ));
    }
    if form.password != form.confirm_password {
        return Ok(flash::redirect(
            "/register",
            FlashKind::Error,
            "Passwords do not match",
        ));
    }

    // Duplicate checks against the local directory happen before any
    // provider call or insert; a conflict leaves no record behind.
    let email_taken = state.users.find_by_email(email).await?.is_some();
    let username_taken = state.users.find_by_username(username).await?.is_some();
    if let Some(message) = registration_conflict(email_taken, username_taken) {
        return Ok(flash::redirect("/register", FlashKind::Error, message));
    }

    let Some(auth_user) = state.auth.sign_up(email, &form.password, username).await else {
        return Ok(flash::redirect(
            "/register",
            FlashKind::Error,
            "Registration failed. Please try again.",
        ));
    };

    // Mirror immediately, retaining a hash for the fallback auth path.
    let password_hash = bcrypt::hash(&form.password, bcrypt::DEFAULT_COST)?;
    state
        .users
        .create(&auth_user.id, username, email, Some(&password_hash), Role::User)
        .await?;

    Ok(flash::redirect(
        "/login",
        FlashKind::Success,
        "Registration successful! You can now log in.",
    ))
}

async fn logout(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    headers: axum::http::HeaderMap,
) -> Response {
    // Best-effort provider-side logout with the held token.
    if let Some(raw) = crate::extractors::cookie_value(&headers, &state.config.session.cookie_name)
    {
        if let Some(data) = session::open(&state.config.session.secret, raw) {
            if let Some(ref token) = data.access_token {
                state.auth.sign_out(token).await;
            }
        }
    }

    let clear = session::clear_cookie(&state.config.session.cookie_name);
    (
        AppendHeaders([(header::SET_COOKIE, clear)]),
        flash::redirect("/", FlashKind::Success, "You have been logged out."),
    )
        .into_response()
}
