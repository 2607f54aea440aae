use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use crate::catalog::Postcard;
use crate::error::{error_page, AppResult};
use crate::extractors::{IncomingFlash, MaybePrincipal};
use crate::routes::{filters, render, PageContext};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub postcards: Vec<Postcard>,
}

/// Homepage with the latest approved postcards.
pub async fn index(
    State(state): State<AppState>,
    MaybePrincipal(user): MaybePrincipal,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Response> {
    let postcards = state.catalog.latest_approved(8).await?;
    let ctx = PageContext::new(user, flash);
    let clear = ctx.has_flash();
    Ok(render(HomeTemplate { ctx, postcards }, clear))
}

/// Catch-all 404 page.
pub async fn not_found() -> Response {
    error_page(StatusCode::NOT_FOUND, "Page not found")
}
