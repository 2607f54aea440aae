use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

use crate::error::error_page;

/// Static files compiled into the binary; nothing to deploy alongside it.
#[derive(Embed)]
#[folder = "assets/"]
struct StaticAsset;

// Asset churn ships with a new binary, so clients may cache hard.
const CACHE_CONTROL: &str = "public, max-age=604800, immutable";

pub async fn serve(Path(path): Path<String>) -> Response {
    let Some(file) = StaticAsset::get(&path) else {
        return error_page(StatusCode::NOT_FOUND, "Page not found");
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    (
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        file.data.into_owned(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_is_embedded() {
        assert!(StaticAsset::get("css/styles.css").is_some());
    }

    #[tokio::test]
    async fn served_stylesheet_carries_css_mime_and_cache_header() {
        let response = serve(Path("css/styles.css".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/css"));
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            CACHE_CONTROL
        );
    }

    #[tokio::test]
    async fn unknown_asset_renders_the_error_page() {
        let response = serve(Path("css/missing.css".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
