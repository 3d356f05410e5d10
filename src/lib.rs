//! jamsite: a static site generator for a headless-CMS backed blog
//!
//! Posts, pages and the homepage are fetched from a content store (the
//! Contentful delivery API in production), normalized into render-ready
//! records and written out through embedded Tera templates.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod store;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use content::ContentFetcher;
use store::{ContentStore, ContentfulClient};

/// The main site handle
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Site {
    /// Load a site from a directory: `_config.yml` if present, then `.env.local`
    /// and `.env`, then the process environment
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        // dotenvy never overwrites a variable that is already set, so the
        // first file loaded wins
        for name in [".env.local", ".env"] {
            let path = base_dir.join(name);
            if path.exists() {
                dotenvy::from_path(&path)?;
                tracing::debug!("Loaded environment from {:?}", path);
            }
        }
        config.apply_env();

        let public_dir = base_dir.join(&config.public_dir);

        Ok(Self {
            config,
            base_dir,
            public_dir,
        })
    }

    /// Build the store client. Called once per process; the result is shared.
    pub fn connect(&self) -> Result<Arc<dyn ContentStore>> {
        Ok(Arc::new(ContentfulClient::new(&self.config.cms)?))
    }

    /// A fetcher over the given store
    pub fn fetcher(&self, store: Arc<dyn ContentStore>) -> ContentFetcher {
        ContentFetcher::new(store, &self.config.cms)
    }

    /// Initialize a new site
    pub fn init(&self) -> Result<()> {
        commands::init::run(self)
    }

    /// Generate the static site
    pub async fn generate(&self, fetcher: &ContentFetcher) -> Result<generator::GenerateReport> {
        commands::generate::run(self, fetcher).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
