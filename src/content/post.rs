//! Render-ready records built from CMS entries

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::asset::Asset;
use super::rich_text::Node;
use crate::error::FetchError;
use crate::helpers::parse_date;
use crate::store::Entry;

pub const UNTITLED_POST: &str = "Untitled Post";
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A blog post with every field filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPost {
    pub id: String,
    pub title: String,
    /// ISO-8601 date as stored in the CMS
    pub date: String,
    pub author: String,
    pub tags: Vec<String>,
    /// Absolute thumbnail URL
    pub thumbnail: Option<String>,
    /// Raw Markdown
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct PostFields {
    title: Option<String>,
    date: Option<String>,
    author: Option<String>,
    tags: Option<Vec<String>>,
    thumbnail: Option<Value>,
    body: Option<String>,
}

impl NormalizedPost {
    /// Normalize a post entry, substituting fallbacks for missing fields.
    ///
    /// Empty strings count as missing. `fetched_at` stands in for a missing date.
    pub fn from_entry(entry: &Entry, fetched_at: DateTime<Utc>) -> Result<Self, FetchError> {
        let fields: PostFields = decode_fields(entry)?;

        let thumbnail = match fields.thumbnail {
            Some(ref value) => Asset::parse(value)
                .map_err(|e| {
                    FetchError::invalid(entry.id(), entry.content_type(), format!("thumbnail: {}", e))
                })?
                .map(|asset| asset.url),
            None => None,
        };

        Ok(Self {
            id: entry.id().to_string(),
            title: non_empty(fields.title).unwrap_or_else(|| UNTITLED_POST.to_string()),
            date: non_empty(fields.date)
                .unwrap_or_else(|| fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            author: non_empty(fields.author).unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            tags: fields.tags.unwrap_or_default(),
            thumbnail,
            body: fields.body.unwrap_or_default(),
        })
    }

    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        parse_date(&self.date)
    }
}

/// A single post with its body rendered to HTML.
///
/// Serializes as the raw entry fields plus `id` and `contentHtml`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub id: String,
    pub content_html: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    pub post: NormalizedPost,
}

impl PostDetail {
    pub fn new(entry: &Entry, post: NormalizedPost, content_html: String) -> Self {
        let mut fields = entry.fields.clone();
        fields.remove("id");
        fields.remove("contentHtml");
        Self {
            id: entry.id().to_string(),
            content_html,
            fields,
            post,
        }
    }
}

/// A standalone page addressed by slug
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: String,
    pub slug: String,
    pub title: Option<String>,
    /// Rich-text body
    pub body: Option<Node>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PageFields {
    slug: Option<String>,
    title: Option<String>,
    body: Option<Node>,
}

impl Page {
    pub fn from_entry(entry: &Entry) -> Result<Self, FetchError> {
        let fields: PageFields = decode_fields(entry)?;
        Ok(Self {
            id: entry.id().to_string(),
            slug: fields.slug.unwrap_or_default(),
            title: non_empty(fields.title),
            body: fields.body,
            fields: entry.fields.clone(),
        })
    }
}

/// The site homepage
#[derive(Debug, Clone, Serialize)]
pub struct Homepage {
    pub id: String,
    pub headline: Option<String>,
    pub subheadline: Option<String>,
    pub hero_image: Option<Asset>,
    pub body: Option<Node>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HomepageFields {
    headline: Option<String>,
    subheadline: Option<String>,
    hero_image: Option<Value>,
    body: Option<Node>,
}

impl Homepage {
    pub fn from_entry(entry: &Entry) -> Result<Self, FetchError> {
        let fields: HomepageFields = decode_fields(entry)?;

        let hero_image = match fields.hero_image {
            Some(ref value) => Asset::parse(value).map_err(|e| {
                FetchError::invalid(entry.id(), entry.content_type(), format!("heroImage: {}", e))
            })?,
            None => None,
        };

        Ok(Self {
            id: entry.id().to_string(),
            headline: non_empty(fields.headline),
            subheadline: non_empty(fields.subheadline),
            hero_image,
            body: fields.body,
            fields: entry.fields.clone(),
        })
    }
}

fn decode_fields<T: DeserializeOwned>(entry: &Entry) -> Result<T, FetchError> {
    serde_json::from_value(Value::Object(entry.fields.clone()))
        .map_err(|e| FetchError::invalid(entry.id(), entry.content_type(), e))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
