//! CRUD over postcard records via the table API.

use crate::backend::data::{single, DataClient};
use crate::error::AppResult;

use super::models::{NewPostcard, Postcard, PostcardStatus, PostcardUpdate, PAGE_SIZE};

/// Exact-match filter set for catalog listings. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostcardFilters {
    pub era: Option<String>,
    pub kind: Option<String>,
    pub manufacturer: Option<String>,
    pub is_posted: Option<bool>,
    pub is_written: Option<bool>,
    pub status: Option<PostcardStatus>,
}

impl PostcardFilters {
    pub fn approved() -> Self {
        Self {
            status: Some(PostcardStatus::Approved),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Translate a 1-based page number into the API's inclusive item range.
pub fn page_range(page: usize, per_page: usize) -> (usize, usize) {
    let page = page.max(1);
    let start = (page - 1) * per_page;
    (start, start + per_page - 1)
}

#[derive(Clone)]
pub struct CatalogStore {
    data: DataClient,
}

impl CatalogStore {
    pub fn new(data: DataClient) -> Self {
        Self { data }
    }

    /// List postcards, newest first. Callers are responsible for having
    /// restricted `filters.status` appropriately for the requester.
    pub async fn list(&self, filters: &PostcardFilters, page: usize) -> AppResult<Vec<Postcard>> {
        let mut req = self.data.from("postcards").select("*");
        if let Some(ref era) = filters.era {
            req = req.eq("era", era);
        }
        if let Some(ref kind) = filters.kind {
            req = req.eq("type", kind);
        }
        if let Some(ref manufacturer) = filters.manufacturer {
            req = req.eq("manufacturer", manufacturer);
        }
        if let Some(is_posted) = filters.is_posted {
            req = req.eq("is_posted", is_posted);
        }
        if let Some(is_written) = filters.is_written {
            req = req.eq("is_written", is_written);
        }
        if let Some(status) = filters.status {
            req = req.eq("status", status);
        }
        let (start, end) = page_range(page, PAGE_SIZE);
        req.order_desc("created_at")
            .limit(PAGE_SIZE)
            .range(start, end)
            .fetch()
            .await
    }

    /// Latest approved postcards for the homepage.
    pub async fn latest_approved(&self, limit: usize) -> AppResult<Vec<Postcard>> {
        self.data
            .from("postcards")
            .select("*")
            .eq("status", PostcardStatus::Approved)
            .order_desc("created_at")
            .limit(limit)
            .fetch()
            .await
    }

    /// All of a user's postcards regardless of status, newest first.
    pub async fn for_user(&self, user_id: &str) -> AppResult<Vec<Postcard>> {
        self.data
            .from("postcards")
            .select("*")
            .eq("user_id", user_id)
            .order_desc("created_at")
            .fetch()
            .await
    }

    /// Postcards awaiting review, newest first.
    pub async fn staged(&self) -> AppResult<Vec<Postcard>> {
        self.data
            .from("postcards")
            .select("*")
            .eq("status", PostcardStatus::Staged)
            .order_desc("created_at")
            .fetch()
            .await
    }

    pub async fn get(&self, id: &str) -> AppResult<Option<Postcard>> {
        self.data
            .from("postcards")
            .select("*")
            .eq("id", id)
            .fetch_one()
            .await
    }

    pub async fn create(&self, new: &NewPostcard) -> AppResult<Postcard> {
        let rows = self.data.from("postcards").insert(new).await?;
        single(rows, "postcard")
    }

    pub async fn update(&self, id: &str, update: &PostcardUpdate) -> AppResult<Option<Postcard>> {
        let mut rows: Vec<Postcard> = self
            .data
            .from("postcards")
            .eq("id", id)
            .update(update)
            .await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Write a new status (and optional review notes). Last write wins;
    /// there is no concurrency token.
    pub async fn set_status(
        &self,
        id: &str,
        status: PostcardStatus,
        review_notes: Option<&str>,
    ) -> AppResult<Option<Postcard>> {
        let body = serde_json::json!({
            "status": status,
            "review_notes": review_notes,
        });
        let mut rows: Vec<Postcard> = self
            .data
            .from("postcards")
            .eq("id", id)
            .update(&body)
            .await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Remove the record. Asset cleanup is the caller's responsibility.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.data.from("postcards").eq("id", id).delete().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_range_is_inclusive() {
        assert_eq!(page_range(1, 20), (0, 19));
        assert_eq!(page_range(2, 20), (20, 39));
        assert_eq!(page_range(3, 8), (16, 23));
    }

    #[test]
    fn page_zero_is_treated_as_first_page() {
        assert_eq!(page_range(0, 20), (0, 19));
    }

    #[test]
    fn approved_filter_only_sets_status() {
        let filters = PostcardFilters::approved();
        assert_eq!(filters.status, Some(PostcardStatus::Approved));
        assert!(filters.era.is_none());
        assert!(!filters.is_empty());
    }

    #[test]
    fn default_filters_are_empty() {
        assert!(PostcardFilters::default().is_empty());
    }
}
