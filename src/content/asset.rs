//! Media assets referenced from entries

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resolved media asset, ready to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Absolute https URL
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AssetRecord {
    #[serde(default)]
    fields: Option<AssetFields>,
}

#[derive(Debug, Deserialize)]
struct AssetFields {
    title: Option<String>,
    description: Option<String>,
    file: Option<AssetFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetFile {
    url: Option<String>,
    content_type: Option<String>,
    details: Option<FileDetails>,
}

#[derive(Debug, Deserialize)]
struct FileDetails {
    image: Option<ImageDetails>,
}

#[derive(Debug, Deserialize)]
struct ImageDetails {
    width: u32,
    height: u32,
}

impl Asset {
    /// Parse a resolved asset object.
    ///
    /// Returns `Ok(None)` for an unresolved link or an asset without a file URL,
    /// and an error when present fields have the wrong shape.
    pub fn parse(value: &Value) -> Result<Option<Asset>, serde_json::Error> {
        let record = AssetRecord::deserialize(value)?;
        let Some(fields) = record.fields else {
            return Ok(None);
        };
        let Some(file) = fields.file else {
            return Ok(None);
        };
        let Some(url) = file.url.filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        let image = file.details.and_then(|d| d.image);

        Ok(Some(Asset {
            url: asset_url(&url),
            title: fields.title,
            description: fields.description,
            content_type: file.content_type,
            width: image.as_ref().map(|i| i.width),
            height: image.as_ref().map(|i| i.height),
        }))
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(self.width.is_some())
    }
}

/// Turn a protocol-relative CDN path into an https URL
pub fn asset_url(raw: &str) -> String {
    if raw.starts_with("//") {
        format!("https:{}", raw)
    } else {
        raw.to_string()
    }
}
