//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::Site;

const DEFAULT_CONFIG: &str = r#"# Site
title: Jamstack.it
subtitle: ''
description: ''
keywords:
author: Anonymous
language: en
timezone: ''

# URL
url: http://example.com
root: /

# Directory
public_dir: public
blog_dir: blog
tag_dir: tags

# Date format (Moment.js style)
date_format: MMMM DD, YYYY

# Feed
feed_limit: 20

# Dev server: seconds between regenerations, 0 disables
revalidate: 60

menu:
  - name: Home
    path: /
  - name: Blog
    path: /blog/

# Content source. Credentials usually come from .env
cms:
  environment: master
  host: cdn.contentful.com
  include: 2
  post_type: jamstackitBlog
  page_type: page
  homepage_type: homePage
  post_limit: 100
  fetch_concurrency: 8
"#;

const ENV_EXAMPLE: &str = r#"CONTENTFUL_SPACE_ID=
CONTENTFUL_ACCESS_TOKEN=
# CONTENTFUL_ENVIRONMENT=master
"#;

/// Initialize a new site in the given directory. Existing files are left alone.
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir)?;

    write_if_missing(&target_dir.join("_config.yml"), DEFAULT_CONFIG)?;
    write_if_missing(&target_dir.join(".env.example"), ENV_EXAMPLE)?;
    write_if_missing(&target_dir.join(".gitignore"), "public/\n.env\n.env.local\n")?;

    Ok(())
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        tracing::warn!("Skipping existing {:?}", path);
        return Ok(());
    }
    fs::write(path, contents)?;
    tracing::info!("Created: {:?}", path);
    Ok(())
}

/// Run the init command with an existing site
pub fn run(site: &Site) -> Result<()> {
    init_site(&site.base_dir)
}
