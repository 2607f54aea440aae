use serde::{Deserialize, Serialize};

/// Catalog page size, everywhere a list is paginated.
pub const PAGE_SIZE: usize = 20;

/// Fixed decade labels for the era dropdown and filter.
pub const ERAS: &[&str] = &[
    "1860s", "1870s", "1880s", "1890s", "1900s", "1910s", "1920s", "1930s", "1940s", "1950s",
    "1960s", "1970s", "1980s", "1990s", "2000s", "2010s", "2020s",
];

/// Fixed postcard type enumeration.
pub const TYPES: &[&str] = &[
    "RPPC",
    "Divided Back",
    "Undivided Back",
    "Linen",
    "Chrome",
    "Continental",
];

/// Moderation status. `Approved` and `Rejected` are terminal; no operation
/// moves a postcard out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostcardStatus {
    #[default]
    Draft,
    Staged,
    Approved,
    Rejected,
}

impl PostcardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostcardStatus::Draft => "draft",
            PostcardStatus::Staged => "staged",
            PostcardStatus::Approved => "approved",
            PostcardStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostcardStatus::Draft),
            "staged" => Some(PostcardStatus::Staged),
            "approved" => Some(PostcardStatus::Approved),
            "rejected" => Some(PostcardStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostcardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Postcard {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_posted: bool,
    #[serde(default)]
    pub is_written: bool,
    #[serde(default)]
    pub front_image_url: Option<String>,
    #[serde(default)]
    pub back_image_url: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub status: PostcardStatus,
    #[serde(default)]
    pub review_notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Insert payload; the id is generated by the caller at creation time.
#[derive(Debug, Clone, Serialize)]
pub struct NewPostcard {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub era: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_posted: bool,
    pub is_written: bool,
    pub front_image_url: Option<String>,
    pub back_image_url: Option<String>,
    pub user_id: String,
    pub status: PostcardStatus,
}

/// Whole-value overwrite of the editable fields.
#[derive(Debug, Clone, Serialize)]
pub struct PostcardUpdate {
    pub title: String,
    pub description: Option<String>,
    pub era: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_posted: bool,
    pub is_written: bool,
    pub front_image_url: Option<String>,
    pub back_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}
