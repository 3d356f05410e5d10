//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub keywords: Option<Vec<String>>,
    pub author: String,
    pub language: String,
    /// IANA timezone used when displaying dates (e.g. "Europe/Rome"). Empty keeps the entry offset.
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub blog_dir: String,
    pub tag_dir: String,

    // Date format (Moment.js style)
    pub date_format: String,

    // Feed
    pub feed_limit: usize,

    /// Seconds between regenerations in the dev server. 0 disables.
    pub revalidate: u64,

    // Navigation
    pub menu: Vec<MenuItem>,

    // Content source
    #[serde(default)]
    pub cms: CmsConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Jamstack.it".to_string(),
            subtitle: String::new(),
            description: String::new(),
            keywords: None,
            author: "Anonymous".to_string(),
            language: "en".to_string(),
            timezone: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            blog_dir: "blog".to_string(),
            tag_dir: "tags".to_string(),

            date_format: "MMMM DD, YYYY".to_string(),

            feed_limit: 20,
            revalidate: 60,

            menu: vec![MenuItem::new("Home", "/"), MenuItem::new("Blog", "/blog/")],

            cms: CmsConfig::default(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Override CMS settings from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Override CMS settings using the given variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // The NEXT_PUBLIC_ names are what existing Netlify deployments already define
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let var = |name: &str| set(name).or_else(|| set(&format!("NEXT_PUBLIC_{}", name)));

        if let Some(space_id) = var("CONTENTFUL_SPACE_ID") {
            self.cms.space_id = space_id;
        }
        if let Some(token) = var("CONTENTFUL_ACCESS_TOKEN") {
            self.cms.access_token = token;
        }
        if let Some(environment) = var("CONTENTFUL_ENVIRONMENT") {
            self.cms.environment = environment;
        }
        if let Some(host) = var("CONTENTFUL_HOST") {
            self.cms.host = host;
        }
    }
}

/// Navigation menu entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub path: String,
}

impl MenuItem {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
        }
    }
}

/// Headless CMS connection and content model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub space_id: String,
    pub access_token: String,
    pub environment: String,
    pub host: String,
    /// Link resolution depth requested from the delivery API
    pub include: u8,

    // Content type ids
    pub post_type: String,
    pub page_type: String,
    pub homepage_type: String,

    /// Maximum number of posts fetched per listing
    pub post_limit: u32,
    /// Post detail requests allowed in flight at once during generation
    pub fetch_concurrency: usize,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            space_id: String::new(),
            access_token: String::new(),
            environment: "master".to_string(),
            host: "cdn.contentful.com".to_string(),
            include: 2,

            post_type: "jamstackitBlog".to_string(),
            page_type: "page".to_string(),
            homepage_type: "homePage".to_string(),

            post_limit: 100,
            fetch_concurrency: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.public_dir, "public");
        assert_eq!(config.cms.post_type, "jamstackitBlog");
        assert_eq!(config.cms.post_limit, 100);
        assert_eq!(config.cms.fetch_concurrency, 8);
        assert_eq!(config.cms.environment, "master");
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Site
author: Test User
revalidate: 5
menu:
  - name: About
    path: /about/
cms:
  space_id: abc
  post_type: blogPost
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Site");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.revalidate, 5);
        assert_eq!(config.menu, vec![MenuItem::new("About", "/about/")]);
        assert_eq!(config.cms.space_id, "abc");
        assert_eq!(config.cms.post_type, "blogPost");
        // Untouched keys keep their defaults
        assert_eq!(config.cms.page_type, "page");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SiteConfig::default();
        config.cms.space_id = "from-file".to_string();
        config.apply_env_with(|key| match key {
            "CONTENTFUL_SPACE_ID" => Some("from-env".to_string()),
            "NEXT_PUBLIC_CONTENTFUL_ACCESS_TOKEN" => Some("secret".to_string()),
            "CONTENTFUL_ENVIRONMENT" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.cms.space_id, "from-env");
        assert_eq!(config.cms.access_token, "secret");
        assert_eq!(config.cms.environment, "master");
    }

    #[test]
    fn test_blank_env_falls_back_to_public_names() {
        let mut config = SiteConfig::default();
        config.apply_env_with(|key| match key {
            "CONTENTFUL_SPACE_ID" => Some(String::new()),
            "NEXT_PUBLIC_CONTENTFUL_SPACE_ID" => Some("space-from-netlify".to_string()),
            "CONTENTFUL_ACCESS_TOKEN" => Some(String::new()),
            "NEXT_PUBLIC_CONTENTFUL_ACCESS_TOKEN" => Some("token-from-netlify".to_string()),
            _ => None,
        });
        assert_eq!(config.cms.space_id, "space-from-netlify");
        assert_eq!(config.cms.access_token, "token-from-netlify");
    }
}
