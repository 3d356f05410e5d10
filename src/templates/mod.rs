//! Built-in site templates using the Tera template engine
//!
//! Templates are embedded in the binary, so a site needs nothing but its
//! `_config.yml` and CMS credentials to build.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::{MenuItem, SiteConfig};
use crate::content::{rich_text, Homepage, NormalizedPost, Page};
use crate::helpers::{date_xml, display_date, full_url_for, post_path, tag_path, url_for};

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Bodies arrive as rendered HTML; text values are escaped in the templates
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("home.html", include_str!("site/home.html")),
            ("blog.html", include_str!("site/blog.html")),
            ("post.html", include_str!("site/post.html")),
            ("page.html", include_str!("site/page.html")),
            ("tag.html", include_str!("site/tag.html")),
            ("404.html", include_str!("site/404.html")),
        ])?;

        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("escape_attr", escape_attr_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(crate::helpers::strip_html(&s)))
}

/// Tera filter: escape a CMS value for an attribute, leaving `/` intact
fn escape_attr_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("escape_attr", "value", String, value);
    Ok(tera::Value::String(crate::helpers::escape_xml(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}{}",
            truncated.trim_end(),
            omission
        )))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub keywords: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
    pub feed_url: String,
}

impl ConfigData {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            keywords: config
                .keywords
                .as_ref()
                .map(|k| k.join(", "))
                .unwrap_or_default(),
            author: config.author.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: url_for(config, ""),
            feed_url: url_for(config, "atom.xml"),
        }
    }
}

/// Menu entries with the site root applied
pub fn menu_data(config: &SiteConfig) -> Vec<MenuItem> {
    config
        .menu
        .iter()
        .map(|item| {
            let path = if item.path.contains("://") {
                item.path.clone()
            } else {
                url_for(config, &item.path)
            };
            MenuItem::new(&item.name, &path)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub id: String,
    pub title: String,
    /// Display date in the configured format and timezone
    pub date: String,
    /// Machine-readable UTC date, or the raw value when it cannot be parsed
    pub date_iso: String,
    pub author: String,
    pub tags: Vec<TagLink>,
    pub thumbnail: Option<String>,
    pub path: String,
    pub permalink: String,
    /// Rendered HTML of the excerpt (or the whole body when there is no excerpt marker)
    pub excerpt_html: String,
}

impl PostData {
    pub fn new(config: &SiteConfig, post: &NormalizedPost, excerpt_html: String) -> Self {
        let path = post_path(config, &post.id);
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            date: display_date(&post.date, &config.date_format, &config.timezone),
            date_iso: post
                .parsed_date()
                .map(|d| date_xml(&d))
                .unwrap_or_else(|| post.date.clone()),
            author: post.author.clone(),
            tags: post
                .tags
                .iter()
                .map(|tag| TagLink {
                    name: tag.clone(),
                    path: url_for(config, &tag_path(config, tag)),
                })
                .collect(),
            thumbnail: post.thumbnail.clone(),
            permalink: full_url_for(config, &path),
            path: url_for(config, &path),
            excerpt_html,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

impl From<&PostData> for NavPost {
    fn from(post: &PostData) -> Self {
        Self {
            title: post.title.clone(),
            path: post.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeroData {
    pub url: String,
    pub alt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeData {
    pub headline: String,
    pub subheadline: Option<String>,
    pub hero: Option<HeroData>,
    pub body_html: String,
}

impl HomeData {
    pub fn new(config: &SiteConfig, home: &Homepage) -> Self {
        let headline = home.headline.clone().unwrap_or_else(|| config.title.clone());
        Self {
            hero: home.hero_image.as_ref().map(|asset| HeroData {
                url: asset.url.clone(),
                alt: asset
                    .description
                    .clone()
                    .or_else(|| asset.title.clone())
                    .unwrap_or_else(|| headline.clone()),
                width: asset.width,
                height: asset.height,
            }),
            headline,
            subheadline: home.subheadline.clone(),
            body_html: home.body.as_ref().map(rich_text::render).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub slug: String,
    pub body_html: String,
}

impl PageData {
    pub fn new(page: &Page) -> Self {
        Self {
            title: page.title.clone().unwrap_or_else(|| page.slug.clone()),
            slug: page.slug.clone(),
            body_html: page.body.as_ref().map(rich_text::render).unwrap_or_default(),
        }
    }
}
