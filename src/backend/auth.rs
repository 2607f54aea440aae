//! Identity provider adapter (GoTrue-style HTTP API).
//!
//! Every operation is attempted exactly once. Provider failures are logged
//! and collapse to `None`/`Unavailable`; the session layer is responsible
//! for degrading to anonymous rather than failing the request.

use serde::Deserialize;
use serde_json::json;

#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Opaque user record as issued by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Map<String, serde_json::Value>,
}

impl AuthUser {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn username_hint(&self) -> Option<&str> {
        self.metadata_str("username")
    }

    pub fn role_hint(&self) -> Option<&str> {
        self.metadata_str("role")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Outcome of a bearer-token user lookup; `Gone` means the provider
/// answered and the principal no longer exists, which is the only case
/// that invalidates held session tokens.
#[derive(Debug)]
pub enum ProviderLookup {
    Found(AuthUser),
    Gone,
    Unavailable,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Register a user with the provider. Returns the provider-issued user
    /// record, or `None` on any failure.
    pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> Option<AuthUser> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "username": username },
        });
        let response = self
            .http
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Provider signup failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!("Provider signup rejected: {}", response.status());
            return None;
        }
        // The provider returns either the user record directly or a full
        // session wrapping it, depending on confirmation settings.
        let value: serde_json::Value = response.json().await.ok()?;
        let user_value = if value.get("user").map(|u| !u.is_null()).unwrap_or(false) {
            value.get("user").cloned()?
        } else {
            value
        };
        serde_json::from_value(user_value).ok()
    }

    /// Password-grant sign in. `Ok(None)` means the provider answered and
    /// rejected the credentials; `Err` means it could not be reached.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, reqwest::Error> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .http
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let session = response.json().await?;
        Ok(Some(session))
    }

    /// Best-effort provider-side logout.
    pub async fn sign_out(&self, access_token: &str) {
        let result = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!("Provider logout failed: {}", e);
        }
    }

    /// Resolve the principal behind an access token.
    pub async fn get_user(&self, access_token: &str) -> ProviderLookup {
        let response = self
            .http
            .get(self.url("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Provider lookup failed: {}", e);
                return ProviderLookup::Unavailable;
            }
        };
        let status = response.status();
        if status.is_success() {
            match response.json::<AuthUser>().await {
                Ok(user) => ProviderLookup::Found(user),
                Err(e) => {
                    tracing::warn!("Provider user payload undecodable: {}", e);
                    ProviderLookup::Unavailable
                }
            }
        } else if status.is_client_error() {
            // The provider answered: this principal is no longer valid.
            ProviderLookup::Gone
        } else {
            ProviderLookup::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_auth_path() {
        let client = AuthClient::new("https://backend.test/", "key");
        assert_eq!(client.url("signup"), "https://backend.test/auth/v1/signup");
    }

    #[test]
    fn metadata_hints_read_from_user_metadata() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u-1",
            "email": "alice@example.com",
            "user_metadata": { "username": "alice", "role": "admin" },
        }))
        .unwrap();
        assert_eq!(user.username_hint(), Some("alice"));
        assert_eq!(user.role_hint(), Some("admin"));
    }

    #[test]
    fn metadata_hints_default_to_none() {
        let user: AuthUser = serde_json::from_value(json!({ "id": "u-1" })).unwrap();
        assert_eq!(user.username_hint(), None);
        assert_eq!(user.role_hint(), None);
        assert_eq!(user.email, None);
    }
}
