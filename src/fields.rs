use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Title/content/excerpt accept either a bare string or an object
/// carrying a `raw` property. The bare string wins; an object without
/// `raw` leaves the field effectively absent.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Object { raw: Option<String> },
}

impl TextField {
    pub fn raw(&self) -> Option<&str> {
        match self {
            TextField::Plain(s) => Some(s),
            TextField::Object { raw } => raw.as_deref(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Pending,
    Private,
    Publish,
    Future,
    Trash,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Publish => "publish",
            Self::Future => "future",
            Self::Trash => "trash",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpenClosed {
    Open,
    Closed,
}

impl OpenClosed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostFormat {
    Standard,
    Aside,
    Chat,
    Gallery,
    Link,
    Image,
    Quote,
    Status,
    Video,
    Audio,
}

impl PostFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Aside => "aside",
            Self::Chat => "chat",
            Self::Gallery => "gallery",
            Self::Link => "link",
            Self::Image => "image",
            Self::Quote => "quote",
            Self::Status => "status",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

// Distinguishes an absent field from an explicit null.
fn tri_state<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

/// The recognized patch payload for the update endpoint. Unknown
/// top-level fields are rejected outright; silent typos in client
/// integrations have bitten before.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub title: Option<TextField>,
    pub content: Option<TextField>,
    pub excerpt: Option<TextField>,
    pub status: Option<PostStatus>,
    #[serde(default, deserialize_with = "tri_state")]
    pub date: Option<Option<String>>,
    #[serde(default, deserialize_with = "tri_state")]
    pub date_gmt: Option<Option<String>>,
    pub slug: Option<String>,
    pub author: Option<u64>,
    pub password: Option<String>,
    pub featured_media: Option<u64>,
    pub sticky: Option<bool>,
    pub template: Option<String>,
    pub format: Option<PostFormat>,
    pub comment_status: Option<OpenClosed>,
    pub ping_status: Option<OpenClosed>,
    pub parent: Option<u64>,
    pub menu_order: Option<i32>,
    pub categories: Option<Vec<u64>>,
    pub tags: Option<Vec<u64>>,
    pub meta: Option<Map<String, Value>>,
}

impl UpdatePostRequest {
    /// Range checks beyond what the types encode. Runs before any
    /// database access; the first failure short-circuits the request.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.author == Some(0) {
            return Err(ApiError::invalid_param(
                "Invalid parameter(s): author must be a positive integer.",
            ));
        }
        for (field, ids) in [("categories", &self.categories), ("tags", &self.tags)] {
            if let Some(ids) = ids {
                if ids.contains(&0) {
                    return Err(ApiError::invalid_param(format!(
                        "Invalid parameter(s): {field} must contain positive integers.",
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> serde_json::Result<UpdatePostRequest> {
        serde_json::from_str(json)
    }

    #[test]
    fn title_accepts_string_or_raw_object() {
        let req = parse(r#"{"title": "Hello"}"#).unwrap();
        assert_eq!(req.title.unwrap().raw(), Some("Hello"));

        let req = parse(r#"{"title": {"raw": "Hello"}}"#).unwrap();
        assert_eq!(req.title.unwrap().raw(), Some("Hello"));

        let req = parse(r#"{"title": {}}"#).unwrap();
        assert_eq!(req.title.unwrap().raw(), None);
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        assert!(parse(r#"{"titel": "typo"}"#).is_err());
        assert!(parse(r#"{"title": "ok", "stickied": true}"#).is_err());
    }

    #[test]
    fn status_is_a_closed_enumeration() {
        assert!(parse(r#"{"status": "publish"}"#).is_ok());
        assert!(parse(r#"{"status": "bogus-value"}"#).is_err());
    }

    #[test]
    fn date_distinguishes_null_from_absent() {
        let req = parse(r#"{}"#).unwrap();
        assert_eq!(req.date, None);

        let req = parse(r#"{"date": null}"#).unwrap();
        assert_eq!(req.date, Some(None));

        let req = parse(r#"{"date": "2026-01-01T00:00:00"}"#).unwrap();
        assert_eq!(req.date, Some(Some("2026-01-01T00:00:00".into())));
    }

    #[test]
    fn author_zero_fails_validation() {
        let req = parse(r#"{"author": 1}"#).unwrap();
        assert!(req.validate().is_ok());
        let req = parse(r#"{"author": 0}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn negative_ids_fail_at_the_type_level() {
        assert!(parse(r#"{"featured_media": -1}"#).is_err());
        assert!(parse(r#"{"categories": [3, -2]}"#).is_err());
    }

    #[test]
    fn zero_term_ids_fail_validation() {
        let req = parse(r#"{"tags": [0]}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
