//! Session/principal resolution.
//!
//! A middleware resolves the principal once per request through an ordered
//! fallback chain: signed session cookie → local user directory → identity
//! provider lookup (mirroring the user on first sight) → anonymous. Only a
//! provider that positively reports the principal gone invalidates the
//! cookie; an unreachable provider or directory degrades to anonymous.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{HeaderMap, HeaderValue};
use axum::http::request::Parts;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::backend::auth::ProviderLookup;
use crate::flash::{self, FlashKind};
use crate::session;
use crate::state::AppState;
use crate::users::{Principal, Role};

/// Resolved per-request principal, stashed in request extensions by the
/// middleware below.
#[derive(Clone)]
struct ResolvedPrincipal(Option<Principal>);

/// Read a cookie value out of raw Cookie headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            if key.trim() == name {
                Some(val.trim())
            } else {
                None
            }
        })
}

pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let (principal, stale) = resolve(&state, request.headers()).await;
    request.extensions_mut().insert(ResolvedPrincipal(principal));
    let mut response = next.run(request).await;
    if stale {
        // The session referred to a principal the provider no longer
        // recognises (or could not be verified at all): drop the cookie.
        let clear = session::clear_cookie(&state.config.session.cookie_name);
        if let Ok(value) = HeaderValue::from_str(&clear) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> (Option<Principal>, bool) {
    let Some(raw) = cookie_value(headers, &state.config.session.cookie_name) else {
        return (None, false);
    };
    let Some(session) = session::open(&state.config.session.secret, raw) else {
        return (None, true);
    };

    // Local directory first.
    match state.users.find_by_id(&session.user_id).await {
        Ok(Some(user)) => return (Some(user.principal()), false),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("User directory lookup failed: {}", e);
            return (None, false);
        }
    }

    // No mirrored row: fall back to the provider via the held token.
    let Some(token) = session.access_token else {
        return (None, true);
    };
    match state.auth.get_user(&token).await {
        ProviderLookup::Found(auth_user) => match state.users.upsert_mirror(&auth_user).await {
            Ok(row) => {
                let mut principal = row.principal();
                if let Some(hint) = auth_user.role_hint() {
                    principal.role = Role::parse(hint);
                }
                (Some(principal), false)
            }
            Err(e) => {
                tracing::error!("User mirror upsert failed: {}", e);
                (None, false)
            }
        },
        ProviderLookup::Gone => (None, true),
        ProviderLookup::Unavailable => (None, false),
    }
}

/// Optional principal; never rejects.
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<ResolvedPrincipal>()
            .and_then(|r| r.0.clone());
        Ok(MaybePrincipal(principal))
    }
}

/// Extractor requiring an authenticated user; otherwise flash + redirect
/// to the login page.
pub struct RequireUser(pub Principal);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybePrincipal(principal) = MaybePrincipal::from_request_parts(parts, state)
            .await
            .unwrap_or(MaybePrincipal(None));
        principal.map(RequireUser).ok_or_else(|| {
            flash::redirect(
                "/login",
                FlashKind::Error,
                "Please log in to access this page.",
            )
        })
    }
}

/// Extractor requiring the admin role; non-admins are sent home with the
/// same flash an unauthorized user would see.
pub struct RequireAdmin(pub Principal);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(principal) = RequireUser::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            return Err(flash::redirect(
                "/",
                FlashKind::Error,
                "You do not have permission to access this page.",
            ));
        }
        Ok(RequireAdmin(principal))
    }
}

/// Flash message queued by a previous redirect, if any. Pages that render
/// it are responsible for clearing the cookie (see `routes::render`).
pub struct IncomingFlash(pub Option<crate::flash::FlashMessage>);

impl FromRequestParts<AppState> for IncomingFlash {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let message =
            cookie_value(&parts.headers, crate::flash::COOKIE_NAME).and_then(crate::flash::decode);
        Ok(IncomingFlash(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let headers = headers_with_cookie("a=1; cartophile_session=abc.def; b=2");
        assert_eq!(cookie_value(&headers, "cartophile_session"), Some("abc.def"));
        assert_eq!(cookie_value(&headers, "a"), Some("1"));
    }

    #[test]
    fn cookie_value_missing_returns_none() {
        let headers = headers_with_cookie("a=1");
        assert_eq!(cookie_value(&headers, "cartophile_session"), None);
        assert_eq!(cookie_value(&HeaderMap::new(), "a"), None);
    }

    #[test]
    fn cookie_value_handles_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(cookie_value(&headers, "b"), Some("2"));
    }
}
