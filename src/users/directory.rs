//! Local mirror of identity-provider users.
//!
//! The provider owns identity; this table exists so the app can look users
//! up by email/username, hold the role, and keep a bcrypt hash for the
//! manual fallback auth path. Rows are created on registration or lazily
//! upserted the first time a provider-backed session is seen.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::auth::AuthUser;
use crate::backend::data::{single, DataClient};
use crate::error::AppResult;

use super::{Principal, Role};

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl DirectoryUser {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Partial update; only set fields are written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// Username derived from the email's local-part; the provider id breaks
/// collisions when the local-part is taken.
pub fn username_from_email(email: &str, user_id: &str, taken: impl Fn(&str) -> bool) -> String {
    let local = email.split('@').next().unwrap_or("").trim();
    let base = if local.is_empty() { "user" } else { local };
    if !taken(base) {
        return base.to_string();
    }
    let suffix: String = user_id.chars().filter(|c| c.is_ascii_alphanumeric()).take(8).collect();
    format!("{}-{}", base, suffix)
}

#[derive(Clone)]
pub struct UserDirectory {
    data: DataClient,
}

impl UserDirectory {
    pub fn new(data: DataClient) -> Self {
        Self { data }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<DirectoryUser>> {
        self.data.from("users").select("*").eq("id", id).fetch_one().await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<DirectoryUser>> {
        self.data
            .from("users")
            .select("*")
            .eq("email", email)
            .fetch_one()
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<DirectoryUser>> {
        self.data
            .from("users")
            .select("*")
            .eq("username", username)
            .fetch_one()
            .await
    }

    /// Create a mirrored row with a provider-issued id.
    pub async fn create(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: Option<&str>,
        role: Role,
    ) -> AppResult<DirectoryUser> {
        let body = json!({
            "id": id,
            "username": username,
            "email": email,
            "password_hash": password_hash,
            "role": role,
        });
        let rows = self.data.from("users").insert(&body).await?;
        single(rows, "user")
    }

    /// Mirror a provider user seen for the first time. Username comes from
    /// provider metadata when present, otherwise from the email local-part;
    /// role from provider metadata, defaulting to `user`.
    pub async fn upsert_mirror(&self, auth_user: &AuthUser) -> AppResult<DirectoryUser> {
        if let Some(existing) = self.find_by_id(&auth_user.id).await? {
            return Ok(existing);
        }

        let email = auth_user.email.clone().unwrap_or_default();
        let username = match auth_user.username_hint() {
            Some(name) if self.find_by_username(name).await?.is_none() => name.to_string(),
            _ => {
                let collision = self
                    .find_by_username(email.split('@').next().unwrap_or(""))
                    .await?
                    .is_some();
                username_from_email(&email, &auth_user.id, |_| collision)
            }
        };
        let role = auth_user.role_hint().map(Role::parse).unwrap_or_default();

        self.create(&auth_user.id, &username, &email, None, role).await
    }

    pub async fn update(&self, id: &str, update: &UserUpdate) -> AppResult<Option<DirectoryUser>> {
        let mut rows: Vec<DirectoryUser> =
            self.data.from("users").eq("id", id).update(update).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Paginated listing for the admin screen, newest first.
    pub async fn list(&self, page: usize, per_page: usize) -> AppResult<Vec<DirectoryUser>> {
        let start = (page.max(1) - 1) * per_page;
        self.data
            .from("users")
            .select("id, username, email, role, created_at")
            .order_desc("created_at")
            .limit(per_page)
            .range(start, start + per_page - 1)
            .fetch()
            .await
    }

    /// Verify a password against the locally retained hash.
    pub fn verify_password(user: &DirectoryUser, password: &str) -> bool {
        match user.password_hash {
            Some(ref hash) => bcrypt::verify(password, hash).unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_uses_local_part_when_free() {
        let name = username_from_email("alice@example.com", "u-1", |_| false);
        assert_eq!(name, "alice");
    }

    #[test]
    fn username_suffixes_on_collision() {
        let name = username_from_email("alice@example.com", "3f2a9c11-aaaa", |_| true);
        assert_eq!(name, "alice-3f2a9c11");
    }

    #[test]
    fn username_falls_back_for_empty_email() {
        let name = username_from_email("", "abc123", |_| false);
        assert_eq!(name, "user");
    }

    #[test]
    fn verify_password_round_trips_bcrypt() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        let user = DirectoryUser {
            id: "u-1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            role: Role::User,
            password_hash: Some(hash),
            created_at: String::new(),
        };
        assert!(UserDirectory::verify_password(&user, "hunter2"));
        assert!(!UserDirectory::verify_password(&user, "wrong"));
    }

    #[test]
    fn verify_password_without_hash_is_false() {
        let user = DirectoryUser {
            id: "u-1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            role: Role::User,
            password_hash: None,
            created_at: String::new(),
        };
        assert!(!UserDirectory::verify_password(&user, "anything"));
    }

    #[test]
    fn directory_user_deserializes_without_optional_columns() {
        let user: DirectoryUser = serde_json::from_str(
            r#"{"id":"u-1","username":"alice","email":"alice@example.com"}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.password_hash.is_none());
    }
}
