//! Tag creation and postcard association.
//!
//! Tag-name uniqueness is advisory: a case-insensitive scan over all
//! existing tags runs before each insert, with no constraint behind it.
//! Two concurrent creations of the same name can therefore both land;
//! that race is inherited behavior, not a guarantee to preserve.

use serde::Deserialize;
use serde_json::json;

use crate::backend::data::{single, DataClient};
use crate::error::AppResult;

use super::models::Tag;

/// Split comma-separated tag input, trimming entries, dropping empties and
/// case-insensitive duplicates (first spelling wins).
pub fn parse_tag_names(input: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut names = Vec::new();
    for raw in input.split(',') {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let folded = name.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        names.push(name.to_string());
    }
    names
}

/// Find a tag by case-insensitive name in a previously fetched list.
pub fn find_existing<'a>(tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
    let folded = name.to_lowercase();
    tags.iter().find(|t| t.name.to_lowercase() == folded)
}

#[derive(Deserialize)]
struct TaggedRow {
    #[serde(default)]
    tags: Option<Tag>,
}

#[derive(Clone)]
pub struct TagStore {
    data: DataClient,
}

impl TagStore {
    pub fn new(data: DataClient) -> Self {
        Self { data }
    }

    pub async fn all(&self) -> AppResult<Vec<Tag>> {
        self.data.from("tags").select("*").fetch().await
    }

    pub async fn create(&self, name: &str) -> AppResult<Tag> {
        let body = json!({ "id": uuid::Uuid::new_v4().to_string(), "name": name });
        let rows = self.data.from("tags").insert(&body).await?;
        single(rows, "tag")
    }

    pub async fn link(&self, postcard_id: &str, tag_id: &str) -> AppResult<()> {
        let body = json!({ "postcard_id": postcard_id, "tag_id": tag_id });
        let _: Vec<serde_json::Value> = self.data.from("postcard_tags").insert(&body).await?;
        Ok(())
    }

    /// Tags linked to a postcard, via the join table's nested tag payload.
    /// Join rows whose tag reference is null or missing are dropped.
    pub async fn for_postcard(&self, postcard_id: &str) -> AppResult<Vec<Tag>> {
        let rows: Vec<TaggedRow> = self
            .data
            .from("postcard_tags")
            .select("tags(*)")
            .eq("postcard_id", postcard_id)
            .fetch()
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.tags).collect())
    }

    /// Resolve-or-create each tag name and link it to the postcard once.
    pub async fn attach(&self, postcard_id: &str, raw_input: &str) -> AppResult<()> {
        for name in parse_tag_names(raw_input) {
            // Linear scan over all tags before creating; see module docs.
            let existing = self.all().await?;
            let tag = match find_existing(&existing, &name) {
                Some(tag) => tag.clone(),
                None => self.create(&name).await?,
            };
            self.link(postcard_id, &tag.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn parse_splits_trims_and_drops_empties() {
        assert_eq!(
            parse_tag_names(" beach , , sunset ,pier,"),
            vec!["beach", "sunset", "pier"]
        );
    }

    #[test]
    fn parse_dedupes_case_insensitively_keeping_first_spelling() {
        assert_eq!(
            parse_tag_names("Vintage, vintage, Holiday"),
            vec!["Vintage", "Holiday"]
        );
    }

    #[test]
    fn parse_empty_input_yields_nothing() {
        assert!(parse_tag_names("").is_empty());
        assert!(parse_tag_names(" , ,, ").is_empty());
    }

    #[test]
    fn find_existing_matches_case_insensitively() {
        let tags = vec![tag("1", "Vintage"), tag("2", "Holiday")];
        assert_eq!(find_existing(&tags, "vintage").map(|t| t.id.as_str()), Some("1"));
        assert_eq!(find_existing(&tags, "HOLIDAY").map(|t| t.id.as_str()), Some("2"));
        assert!(find_existing(&tags, "beach").is_none());
    }

    #[test]
    fn tagged_row_with_null_tag_is_dropped() {
        let rows: Vec<TaggedRow> =
            serde_json::from_str(r#"[{"tags":{"id":"1","name":"Vintage"}},{"tags":null},{}]"#)
                .unwrap();
        let tags: Vec<Tag> = rows.into_iter().filter_map(|r| r.tags).collect();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Vintage");
    }
}
