pub mod admin;
pub mod assets;
pub mod auth;
pub mod home;
pub mod postcards;
pub mod profile;

use askama::Template;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::flash::FlashMessage;
use crate::users::Principal;

/// Wrapper to render askama templates as axum responses.
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Shared template context: the signed-in user for the navbar and the
/// pending flash message, consumed by this render.
pub struct PageContext {
    pub user: Option<Principal>,
    pub flash: Option<FlashMessage>,
}

impl PageContext {
    pub fn new(user: Option<Principal>, flash: Option<FlashMessage>) -> Self {
        Self { user, flash }
    }

    pub fn has_flash(&self) -> bool {
        self.flash.is_some()
    }
}

/// Render a page, clearing the flash cookie when this render displayed it.
pub fn render<T: Template>(template: T, clear_flash: bool) -> Response {
    let mut response = Html(template).into_response();
    if clear_flash {
        if let Ok(value) = HeaderValue::from_str(&crate::flash::clear_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Option list entry for form/filter dropdowns.
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

pub fn select_options(values: &[&str], current: Option<&str>) -> Vec<SelectOption> {
    values
        .iter()
        .map(|v| SelectOption {
            value: v.to_string(),
            selected: current == Some(*v),
        })
        .collect()
}

/// Custom template filters, mirroring the site's display conventions.
pub mod filters {
    use chrono::{DateTime, NaiveDateTime};

    /// Format a stored timestamp as e.g. "May 01, 2024". Unparseable
    /// values pass through untouched.
    pub fn date(value: &str) -> askama::Result<String> {
        if value.is_empty() {
            return Ok(String::new());
        }
        let normalized = value.replace(' ', "T");
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized.replace('Z', "+00:00")) {
            return Ok(parsed.format("%B %d, %Y").to_string());
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(parsed.format("%B %d, %Y").to_string());
        }
        Ok(value.to_string())
    }

    /// Escape, then turn newlines into `<br>`. Pair with `safe`, which is
    /// sound because the input is escaped here first.
    pub fn nl2br(value: &str) -> askama::Result<String> {
        let escaped = askama_escape::escape(value, askama_escape::Html).to_string();
        Ok(escaped.replace("\r\n", "\n").replace('\n', "<br>"))
    }

    /// Truncate to `count` words with an ellipsis.
    pub fn truncate_words(value: &str, count: usize) -> askama::Result<String> {
        let words: Vec<&str> = value.split_whitespace().collect();
        if words.len() <= count {
            return Ok(value.to_string());
        }
        Ok(format!("{}...", words[..count].join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_filter_formats_rfc3339() {
        assert_eq!(filters::date("2024-05-01T12:00:00+00:00").unwrap(), "May 01, 2024");
        assert_eq!(filters::date("2024-05-01T12:00:00Z").unwrap(), "May 01, 2024");
    }

    #[test]
    fn date_filter_formats_naive_timestamps() {
        assert_eq!(filters::date("2024-05-01 12:00:00.123456").unwrap(), "May 01, 2024");
    }

    #[test]
    fn date_filter_passes_through_unparseable_values() {
        assert_eq!(filters::date("sometime").unwrap(), "sometime");
        assert_eq!(filters::date("").unwrap(), "");
    }

    #[test]
    fn nl2br_turns_newlines_into_breaks() {
        assert_eq!(filters::nl2br("one\ntwo").unwrap(), "one<br>two");
        assert_eq!(filters::nl2br("one\r\ntwo").unwrap(), "one<br>two");
        assert_eq!(filters::nl2br("plain").unwrap(), "plain");
    }

    #[test]
    fn nl2br_escapes_markup_before_breaking() {
        assert_eq!(
            filters::nl2br("<b>bold</b>\nnext").unwrap(),
            "&lt;b&gt;bold&lt;/b&gt;<br>next"
        );
    }

    #[test]
    fn truncate_words_shortens_long_text() {
        assert_eq!(
            filters::truncate_words("one two three four", 2).unwrap(),
            "one two..."
        );
        assert_eq!(
            filters::truncate_words("one two", 5).unwrap(),
            "one two"
        );
    }

    #[test]
    fn select_options_mark_the_current_value() {
        let options = select_options(&["1910s", "1920s"], Some("1920s"));
        assert!(!options[0].selected);
        assert!(options[1].selected);
        let options = select_options(&["1910s"], None);
        assert!(!options[0].selected);
    }
}
