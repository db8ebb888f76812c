use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Project categories mirrored from the hosted `projects.category` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Home,
    Beauty,
    Fitness,
    Style,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Before,
    Update,
    After,
}

/// A private transformation journal owned by exactly one account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
}

/// One photo/note step inside a project. `media_path` points into the
/// private bucket and is set at most once, at creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Entry {
    pub id: String,
    pub project_id: String,
    pub kind: EntryKind,
    pub note: Option<String>,
    pub media_path: Option<String>,
    pub taken_at: DateTime<Utc>,
}

/// A single-image public post. `media_path` points into the public bucket:
/// shared images are republished copies, never the private originals.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Share {
    pub id: String,
    pub user_id: String,
    pub slug: String,
    pub caption: Option<String>,
    pub media_path: String,
    pub is_public: bool,
    pub attribution_name: Option<String>,
    pub attribution_url: Option<String>,
    pub show_attribution: bool,
    pub created_at: DateTime<Utc>,
}

/// A public before/after post. Both paths point into the private bucket and
/// are rendered through signed URLs. The numeric id appears in `/p/:id`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pair {
    pub id: i64,
    pub user_id: String,
    pub caption: Option<String>,
    pub before_path: String,
    pub after_path: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

// ── Insert payloads (row ids and timestamps are minted by the store) ─────

#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub owner_id: String,
    pub title: String,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEntry {
    pub project_id: String,
    pub kind: EntryKind,
    pub note: Option<String>,
    pub media_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewShare {
    pub user_id: String,
    pub slug: String,
    pub caption: Option<String>,
    pub media_path: String,
    pub is_public: bool,
    pub attribution_name: Option<String>,
    pub attribution_url: Option<String>,
    pub show_attribution: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPair {
    pub user_id: String,
    pub caption: Option<String>,
    pub before_path: String,
    pub after_path: String,
    pub is_public: bool,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Home => "home",
            Category::Beauty => "beauty",
            Category::Fitness => "fitness",
            Category::Style => "style",
            Category::Other => "other",
        }
    }
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Before => "before",
            EntryKind::Update => "update",
            EntryKind::After => "after",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_lowercase() {
        let json = serde_json::to_string(&Category::Beauty).unwrap();
        assert_eq!(json, "\"beauty\"");
        let back: Category = serde_json::from_str("\"home\"").unwrap();
        assert_eq!(back, Category::Home);
    }

    #[test]
    fn entry_kind_matches_store_enum() {
        assert_eq!(EntryKind::Before.as_str(), "before");
        assert_eq!(
            serde_json::to_string(&EntryKind::Update).unwrap(),
            "\"update\""
        );
    }
}
