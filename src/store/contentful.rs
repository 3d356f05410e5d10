//! Contentful Content Delivery API client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{ContentStore, Entry, EntryCollection, Query};
use crate::config::CmsConfig;
use crate::error::StoreError;

/// HTTP client for the delivery API of one space/environment
#[derive(Debug, Clone)]
pub struct ContentfulClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    include: u8,
}

#[derive(Debug, Deserialize)]
struct DeliveryResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(rename = "Asset", default)]
    assets: Vec<Value>,
    #[serde(rename = "Entry", default)]
    entries: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    sys: ErrorSys,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorSys {
    #[serde(default)]
    id: String,
}

impl ContentfulClient {
    /// Build a client from the CMS configuration
    pub fn new(config: &CmsConfig) -> Result<Self, StoreError> {
        if config.space_id.is_empty() {
            return Err(StoreError::MissingCredentials("space_id"));
        }
        if config.access_token.is_empty() {
            return Err(StoreError::MissingCredentials("access_token"));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("jamsite/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url(config),
            access_token: config.access_token.clone(),
            include: config.include,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, params: &[(String, String)]) -> Result<EntryCollection, StoreError> {
        let url = format!("{}/entries", self.base_url);
        tracing::debug!("GET {} {:?}", url, params);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        decode_collection(&body, self.include)
    }
}

#[async_trait]
impl ContentStore for ContentfulClient {
    async fn query(&self, query: &Query) -> Result<EntryCollection, StoreError> {
        let mut params = query.to_params();
        params.push(("include".to_string(), self.include.to_string()));
        self.fetch(&params).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Entry>, StoreError> {
        // Querying by sys.id instead of /entries/{id} so linked assets come back in `includes`
        let params = vec![
            ("sys.id".to_string(), id.to_string()),
            ("limit".to_string(), "1".to_string()),
            ("include".to_string(), self.include.to_string()),
        ];
        let collection = self.fetch(&params).await?;
        Ok(collection.items.into_iter().next())
    }
}

fn base_url(config: &CmsConfig) -> String {
    let host = config.host.trim_end_matches('/');
    let host = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    format!(
        "{}/spaces/{}/environments/{}",
        host, config.space_id, config.environment
    )
}

fn api_error(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => StoreError::Api {
            status,
            code: err.sys.id,
            message: err.message,
        },
        Err(_) => StoreError::Api {
            status,
            code: String::new(),
            message: body.chars().take(200).collect(),
        },
    }
}

/// Decode a delivery API collection and resolve links from `includes`
fn decode_collection(body: &str, depth: u8) -> Result<EntryCollection, StoreError> {
    let response: DeliveryResponse = serde_json::from_str(body)?;

    let mut index: HashMap<(String, String), Value> = HashMap::new();
    for asset in &response.includes.assets {
        if let Some(id) = sys_id(asset) {
            index.insert(("Asset".to_string(), id), asset.clone());
        }
    }
    for entry in response.includes.entries.iter().chain(response.items.iter()) {
        if let Some(id) = sys_id(entry) {
            index.insert(("Entry".to_string(), id), entry.clone());
        }
    }

    let mut items = Vec::with_capacity(response.items.len());
    for mut item in response.items {
        if let Some(fields) = item.get_mut("fields") {
            resolve_links(fields, &index, depth);
        }
        items.push(serde_json::from_value::<Entry>(item)?);
    }

    Ok(EntryCollection {
        items,
        total: response.total,
    })
}

fn sys_id(value: &Value) -> Option<String> {
    value
        .get("sys")?
        .get("id")?
        .as_str()
        .map(|s| s.to_string())
}

fn link_key(value: &Value) -> Option<(String, String)> {
    let sys = value.get("sys")?;
    if sys.get("type")?.as_str()? != "Link" {
        return None;
    }
    let link_type = sys.get("linkType")?.as_str()?;
    let id = sys.get("id")?.as_str()?;
    Some((link_type.to_string(), id.to_string()))
}

/// Replace link objects with the linked asset or entry, `depth` levels deep.
/// Unresolvable links are left in place.
fn resolve_links(value: &mut Value, index: &HashMap<(String, String), Value>, depth: u8) {
    if let Some(key) = link_key(value) {
        if depth == 0 {
            return;
        }
        if let Some(target) = index.get(&key) {
            let mut target = target.clone();
            if let Some(fields) = target.get_mut("fields") {
                resolve_links(fields, index, depth - 1);
            }
            *value = target;
        }
        return;
    }

    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                resolve_links(child, index, depth);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                resolve_links(child, index, depth);
            }
        }
        _ => {}
    }
}
