use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Backend error: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Password hash error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    code: u16,
    message: String,
}

/// Render the generic error page. Falls back to plain text if the
/// template itself fails to render.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let template = ErrorTemplate {
        code: status.as_u16(),
        message: message.to_string(),
    };
    match template.render() {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error template render failed: {}", e);
            (status, message.to_string()).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::NotFound => error_page(StatusCode::NOT_FOUND, "Page not found"),
            AppError::BadRequest(msg) => error_page(StatusCode::BAD_REQUEST, msg),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Multipart(e) => {
                tracing::warn!("Multipart error: {}", e);
                error_page(StatusCode::BAD_REQUEST, "Invalid form submission")
            }
            AppError::Bcrypt(e) => {
                tracing::error!("Password hash error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_page_is_html() {
        let response = error_page(StatusCode::NOT_FOUND, "Page not found");
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("text/html"));
    }
}
