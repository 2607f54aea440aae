//! Object storage adapter for postcard images.

use serde_json::json;

use crate::error::AppResult;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

/// Lowercased extension of a filename, if it has one.
fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the filename carries an allowed image extension.
pub fn allowed_file(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

impl StorageClient {
    pub fn new(base_url: &str, api_key: &str, bucket: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    /// Public URL prefix under which stored objects are served.
    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.public_prefix(), key)
    }

    /// Derive the stored object key from a previously issued public URL.
    /// Foreign or malformed URLs yield `None` (deletion becomes a no-op).
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_prefix())?;
        if key.is_empty() || key.contains('/') {
            return None;
        }
        Some(key.to_string())
    }

    /// Upload image bytes under a fresh random key and return the public
    /// URL. Returns `None` when the filename's extension is not allowed.
    /// Key collisions are not checked.
    pub async fn save(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<Option<String>> {
        let Some(ext) = file_extension(filename) else {
            return Ok(None);
        };
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(None);
        }

        let key = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        self.http
            .post(self.object_url(&key))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;

        let url = self.public_url(&key);
        tracing::info!("Stored image {}", key);
        Ok(Some(url))
    }

    /// Remove the object behind a previously issued URL. Returns whether a
    /// deletion was actually attempted and succeeded.
    pub async fn delete(&self, image_url: &str) -> bool {
        let Some(key) = self.key_from_url(image_url) else {
            tracing::warn!("Ignoring delete of foreign image URL: {}", image_url);
            return false;
        };
        let result = self
            .http
            .delete(self.object_url(&key))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Error deleting image {}: {}", key, e);
                false
            }
        }
    }

    /// Startup check: the bucket exists and is publicly readable. Creates
    /// it when absent. Failures are logged and never fatal.
    pub async fn ensure_ready(&self) {
        let bucket_url = format!("{}/storage/v1/bucket/{}", self.base_url, self.bucket);
        let exists = self
            .http
            .get(&bucket_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await;
        match exists {
            Ok(r) if r.status().is_success() => {
                tracing::info!("Storage bucket '{}' ready", self.bucket);
            }
            Ok(_) => {
                let body = json!({ "id": self.bucket, "name": self.bucket, "public": true });
                let created = self
                    .http
                    .post(format!("{}/storage/v1/bucket", self.base_url))
                    .header("apikey", &self.api_key)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status());
                match created {
                    Ok(_) => tracing::info!("Created storage bucket '{}'", self.bucket),
                    Err(e) => tracing::error!("Could not create storage bucket: {}", e),
                }
            }
            Err(e) => tracing::error!("Storage bucket check failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StorageClient {
        StorageClient::new("https://backend.test", "key", "postcard-images")
    }

    #[test]
    fn allowed_file_accepts_listed_extensions() {
        assert!(allowed_file("front.png"));
        assert!(allowed_file("back.JPG"));
        assert!(allowed_file("card.jpeg"));
        assert!(allowed_file("anim.gif"));
    }

    #[test]
    fn allowed_file_rejects_everything_else() {
        assert!(!allowed_file("card.pdf"));
        assert!(!allowed_file("card"));
        assert!(!allowed_file("card."));
        assert!(!allowed_file(".gitignore.svg"));
    }

    #[test]
    fn public_url_includes_bucket_and_key() {
        assert_eq!(
            client().public_url("abc.png"),
            "https://backend.test/storage/v1/object/public/postcard-images/abc.png"
        );
    }

    #[test]
    fn key_from_url_recovers_trailing_segment() {
        let c = client();
        let url = c.public_url("123e4567.png");
        assert_eq!(c.key_from_url(&url), Some("123e4567.png".to_string()));
    }

    #[test]
    fn key_from_url_rejects_foreign_urls() {
        let c = client();
        assert_eq!(c.key_from_url("https://elsewhere.test/object/x.png"), None);
        assert_eq!(
            c.key_from_url("https://backend.test/storage/v1/object/public/other-bucket/x.png"),
            None
        );
        assert_eq!(c.key_from_url(""), None);
    }

    #[test]
    fn key_from_url_rejects_nested_paths() {
        let c = client();
        let url = format!("{}a/b.png", c.public_prefix());
        assert_eq!(c.key_from_url(&url), None);
        assert_eq!(c.key_from_url(&c.public_prefix()), None);
    }
}
