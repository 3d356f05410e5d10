//! Entries and queries as exposed by the content store

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single content record in the CMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub sys: Sys,

    /// Field name to value. Absent when the query selected only `sys` paths.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// System metadata attached to every entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sys {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A link to another CMS object (`{"sys": {"type": "Link", ...}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub sys: LinkSys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSys {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub link_type: String,
}

impl Entry {
    /// Create an entry with no fields
    pub fn new(id: &str, content_type: &str) -> Self {
        Self {
            sys: Sys {
                id: id.to_string(),
                kind: Some("Entry".to_string()),
                content_type: Some(Link {
                    sys: LinkSys {
                        id: content_type.to_string(),
                        kind: "Link".to_string(),
                        link_type: "ContentType".to_string(),
                    },
                }),
                created_at: None,
                updated_at: None,
            },
            fields: Map::new(),
        }
    }

    /// Builder helper to attach a field
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.sys.id
    }

    /// Content type id, or an empty string when the store did not report one
    pub fn content_type(&self) -> &str {
        self.sys
            .content_type
            .as_ref()
            .map(|link| link.sys.id.as_str())
            .unwrap_or("")
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a dotted path such as `sys.id` or `fields.slug`
    pub fn path(&self, path: &str) -> Option<Value> {
        let (root, rest) = path.split_once('.')?;
        match root {
            "sys" => match rest {
                "id" => Some(Value::String(self.sys.id.clone())),
                "contentType.sys.id" => Some(Value::String(self.content_type().to_string())),
                "createdAt" => self.sys.created_at.clone().map(Value::String),
                "updatedAt" => self.sys.updated_at.clone().map(Value::String),
                _ => None,
            },
            "fields" => {
                let mut parts = rest.split('.');
                let mut current = self.fields.get(parts.next()?)?;
                for part in parts {
                    current = current.get(part)?;
                }
                Some(current.clone())
            }
            _ => None,
        }
    }
}

/// Result of a store query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryCollection {
    #[serde(default)]
    pub items: Vec<Entry>,
    #[serde(default)]
    pub total: u64,
}

/// Ordering applied by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub path: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn asc(path: &str) -> Self {
        Self {
            path: path.to_string(),
            descending: false,
        }
    }

    pub fn desc(path: &str) -> Self {
        Self {
            path: path.to_string(),
            descending: true,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.path)
        } else {
            f.write_str(&self.path)
        }
    }
}

/// Shape of a store query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub content_type: Option<String>,
    /// Exact-match filters as (path, value) pairs, e.g. `("fields.slug", "about")`
    pub filters: Vec<(String, String)>,
    pub order: Option<SortSpec>,
    pub limit: Option<u32>,
    /// Paths to project, e.g. `sys.id`. Empty selects everything.
    pub select: Vec<String>,
}

impl Query {
    pub fn content_type(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            ..Self::default()
        }
    }

    pub fn filter(mut self, path: &str, value: &str) -> Self {
        self.filters.push((path.to_string(), value.to_string()));
        self
    }

    pub fn order(mut self, order: SortSpec) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select(mut self, path: &str) -> Self {
        self.select.push(path.to_string());
        self
    }

    /// Render as delivery API query parameters
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(ref content_type) = self.content_type {
            params.push(("content_type".to_string(), content_type.clone()));
        }
        for (path, value) in &self.filters {
            params.push((path.clone(), value.clone()));
        }
        if let Some(ref order) = self.order {
            params.push(("order".to_string(), order.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if !self.select.is_empty() {
            params.push(("select".to_string(), self.select.join(",")));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_delivery_entry() {
        let raw = json!({
            "sys": {
                "id": "5KsDBWseXY6QegucYAoacS",
                "type": "Entry",
                "createdAt": "2024-01-01T10:00:00.000Z",
                "contentType": {
                    "sys": { "type": "Link", "linkType": "ContentType", "id": "jamstackitBlog" }
                }
            },
            "fields": { "title": "Hello", "tags": ["rust"] }
        });
        let entry: Entry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.id(), "5KsDBWseXY6QegucYAoacS");
        assert_eq!(entry.content_type(), "jamstackitBlog");
        assert_eq!(entry.field("title"), Some(&json!("Hello")));
    }

    #[test]
    fn test_entry_without_fields() {
        let entry: Entry = serde_json::from_value(json!({ "sys": { "id": "a" } })).unwrap();
        assert!(entry.fields.is_empty());
        assert_eq!(entry.content_type(), "");
    }

    #[test]
    fn test_path_lookup() {
        let entry = Entry::new("a", "page")
            .with_field("slug", "about")
            .with_field("hero", json!({ "fields": { "title": "Hero" } }));
        assert_eq!(entry.path("sys.id"), Some(json!("a")));
        assert_eq!(entry.path("fields.slug"), Some(json!("about")));
        assert_eq!(entry.path("fields.hero.fields.title"), Some(json!("Hero")));
        assert_eq!(entry.path("fields.missing"), None);
        assert_eq!(entry.path("nope"), None);
    }

    #[test]
    fn test_query_params() {
        let query = Query::content_type("jamstackitBlog")
            .order(SortSpec::desc("fields.date"))
            .limit(100)
            .select("sys.id");
        assert_eq!(
            query.to_params(),
            vec![
                ("content_type".to_string(), "jamstackitBlog".to_string()),
                ("order".to_string(), "-fields.date".to_string()),
                ("limit".to_string(), "100".to_string()),
                ("select".to_string(), "sys.id".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_filter_params() {
        let query = Query::content_type("page").filter("fields.slug", "about");
        let params = query.to_params();
        assert!(params.contains(&("fields.slug".to_string(), "about".to_string())));
    }
}
