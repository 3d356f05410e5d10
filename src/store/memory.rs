//! In-memory content store with the delivery API's query semantics

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::{ContentStore, Entry, EntryCollection, Query};
use crate::error::StoreError;

/// Default page size of the delivery API
const DEFAULT_LIMIT: usize = 100;

/// A content store backed by a list of entries held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<Entry>,
}

impl MemoryStore {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Evaluate a query against the held entries
    pub fn run(&self, query: &Query) -> EntryCollection {
        let mut matches: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|entry| {
                query
                    .content_type
                    .as_deref()
                    .map(|ct| entry.content_type() == ct)
                    .unwrap_or(true)
            })
            .filter(|entry| {
                query
                    .filters
                    .iter()
                    .all(|(path, expected)| matches_filter(entry.path(path).as_ref(), expected))
            })
            .collect();

        if let Some(ref order) = query.order {
            matches.sort_by(|a, b| {
                let left = a.path(&order.path);
                let right = b.path(&order.path);
                match (left, right) {
                    (Some(l), Some(r)) => {
                        let ord = compare_values(&l, &r);
                        if order.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    }
                    // Entries without the sort field go last in either direction
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }

        let total = matches.len() as u64;
        let limit = query.limit.map(|l| l as usize).unwrap_or(DEFAULT_LIMIT);

        let items = matches
            .into_iter()
            .take(limit)
            .map(|entry| project(entry, &query.select))
            .collect();

        EntryCollection { items, total }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn query(&self, query: &Query) -> Result<EntryCollection, StoreError> {
        Ok(self.run(query))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self.entries.iter().find(|e| e.id() == id).cloned())
    }
}

/// Exact match on scalars, membership on arrays
fn matches_filter(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == expected,
        Some(Value::Array(items)) => items.iter().any(|v| matches_filter(Some(v), expected)),
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        _ => false,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Apply a `select` projection. `sys` is always kept.
fn project(entry: &Entry, select: &[String]) -> Entry {
    if select.is_empty() || select.iter().any(|s| s == "fields") {
        return entry.clone();
    }

    let fields: Map<String, Value> = select
        .iter()
        .filter_map(|path| path.strip_prefix("fields."))
        .filter_map(|name| {
            let name = name.split('.').next()?;
            entry
                .fields
                .get(name)
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect();

    Entry {
        sys: entry.sys.clone(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortSpec;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            Entry::new("p1", "post")
                .with_field("title", "First")
                .with_field("date", "2024-01-01")
                .with_field("tags", json!(["rust", "cms"])),
            Entry::new("p3", "post")
                .with_field("title", "Third")
                .with_field("date", "2024-03-01"),
            Entry::new("p2", "post")
                .with_field("title", "Second")
                .with_field("date", "2024-02-01")
                .with_field("tags", json!(["rust"])),
            Entry::new("p0", "post").with_field("title", "Undated"),
            Entry::new("about", "page").with_field("slug", "about"),
        ])
    }

    #[tokio::test]
    async fn test_filter_by_content_type() {
        let result = store().query(&Query::content_type("page")).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id(), "about");
    }

    #[test]
    fn test_order_descending_puts_missing_last() {
        let result = store().run(&Query::content_type("post").order(SortSpec::desc("fields.date")));
        let ids: Vec<_> = result.items.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["p3", "p2", "p1", "p0"]);
    }

    #[test]
    fn test_order_ascending() {
        let result = store().run(&Query::content_type("post").order(SortSpec::asc("fields.date")));
        let ids: Vec<_> = result.items.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3", "p0"]);
    }

    #[test]
    fn test_limit_keeps_total() {
        let result = store().run(&Query::content_type("post").limit(2));
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.total, 4);
    }

    #[test]
    fn test_array_membership_filter() {
        let result = store().run(&Query::content_type("post").filter("fields.tags", "cms"));
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id(), "p1");
    }

    #[test]
    fn test_select_sys_only() {
        let result = store().run(&Query::content_type("post").select("sys.id"));
        assert!(result.items.iter().all(|e| e.fields.is_empty()));
    }

    #[test]
    fn test_select_named_field() {
        let result = store().run(&Query::content_type("post").select("fields.title"));
        let first = &result.items[0];
        assert_eq!(first.fields.len(), 1);
        assert!(first.field("title").is_some());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let store = store();
        assert!(store.get_by_id("p2").await.unwrap().is_some());
        assert!(store.get_by_id("nope").await.unwrap().is_none());
    }
}
