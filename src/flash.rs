//! One-shot user-facing messages carried across a redirect in a short-lived
//! cookie, read and cleared by the next rendered page.

use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

pub const COOKIE_NAME: &str = "cartophile_flash";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FlashKind::Success),
            "error" => Some(FlashKind::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    pub fn category(&self) -> &'static str {
        self.kind.as_str()
    }
}

pub fn encode(kind: FlashKind, message: &str) -> String {
    format!("{}:{}", kind.as_str(), URL_SAFE_NO_PAD.encode(message))
}

pub fn decode(value: &str) -> Option<FlashMessage> {
    let (kind, payload) = value.split_once(':')?;
    let kind = FlashKind::parse(kind)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let message = String::from_utf8(bytes).ok()?;
    Some(FlashMessage { kind, message })
}

fn set_cookie(kind: FlashKind, message: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=60",
        COOKIE_NAME,
        encode(kind, message)
    )
}

pub fn clear_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", COOKIE_NAME)
}

/// Redirect to `to` with a flash message queued for the next page.
pub fn redirect(to: &str, kind: FlashKind, message: &str) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, set_cookie(kind, message))]),
        Redirect::to(to),
    )
        .into_response()
}
