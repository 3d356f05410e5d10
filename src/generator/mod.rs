//! Generator module - fetches CMS content and writes the static site using the built-in templates

use anyhow::Result;
use chrono::{Datelike, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tera::Context;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::content::{ContentFetcher, MarkdownRenderer, NormalizedPost, PostDetail};
use crate::error::FetchError;
use crate::helpers::{
    escape_xml, full_url_for, now_xml, post_path, strip_invalid_xml_chars, summarize, tag_path,
};
use crate::templates::{
    menu_data, ConfigData, HomeData, NavPost, PageData, PostData, TemplateRenderer,
};
use crate::Site;

/// What a generation run produced
#[derive(Debug, Default, Clone)]
pub struct GenerateReport {
    pub posts: usize,
    pub pages: usize,
    pub tags: usize,
    /// One line per content fetch that failed
    pub failures: Vec<String>,
}

impl GenerateReport {
    /// True when every fetch succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn failed(&mut self, what: &str, error: &FetchError) {
        self.failures.push(format!("{}: {}", what, error));
    }
}

/// How the blog index should read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Ok,
    Empty,
    Unavailable,
}

impl Listing {
    fn as_str(self) -> &'static str {
        match self {
            Listing::Ok => "ok",
            Listing::Empty => "empty",
            Listing::Unavailable => "unavailable",
        }
    }
}

/// Static site generator using Tera templates
pub struct Generator {
    site: Site,
    renderer: TemplateRenderer,
    /// Where a run writes before it replaces the public directory
    staging_dir: PathBuf,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site) -> Result<Self> {
        Ok(Self {
            site: site.clone(),
            renderer: TemplateRenderer::new()?,
            staging_dir: sibling_dir(&site.public_dir, "staging"),
        })
    }

    /// Fetch everything from the CMS and write the entire site.
    ///
    /// The site is built in a staging directory and swapped in whole, so
    /// content deleted from the CMS disappears from the output.
    /// Fetch failures are recorded in the report and rendered as placeholders;
    /// only template and filesystem errors abort the run.
    pub async fn generate(&self, fetcher: &ContentFetcher) -> Result<GenerateReport> {
        let mut report = GenerateReport::default();

        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir)?;
        }
        fs::create_dir_all(&self.staging_dir)?;

        self.generate_home(fetcher, &mut report).await?;

        let (posts, listing) = match fetcher.list_posts().await {
            Ok(posts) if posts.is_empty() => (Vec::new(), Listing::Empty),
            Ok(posts) => (posts, Listing::Ok),
            Err(e) => {
                report.failed("posts", &e);
                (Vec::new(), Listing::Unavailable)
            }
        };
        let post_data: Vec<PostData> = posts
            .iter()
            .map(|post| self.post_data(fetcher, post))
            .collect();

        self.generate_blog_index(&post_data, listing)?;
        self.generate_post_pages(fetcher, &post_data, &mut report)
            .await?;
        self.generate_pages(fetcher, &mut report).await?;
        report.tags = self.generate_tag_pages(&post_data)?;
        self.generate_atom_feed(&post_data)?;
        self.generate_blog_json(&posts)?;
        self.generate_not_found()?;

        self.publish()?;
        Ok(report)
    }

    /// Replace the public directory with the staged build
    fn publish(&self) -> Result<()> {
        let public_dir = &self.site.public_dir;
        if !public_dir.exists() {
            fs::rename(&self.staging_dir, public_dir)?;
            return Ok(());
        }

        let retired = sibling_dir(public_dir, "old");
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }
        fs::rename(public_dir, &retired)?;
        fs::rename(&self.staging_dir, public_dir)?;
        fs::remove_dir_all(&retired)?;
        tracing::debug!("Published {:?}", public_dir);
        Ok(())
    }

    fn post_data(&self, fetcher: &ContentFetcher, post: &NormalizedPost) -> PostData {
        let (excerpt, body) = MarkdownRenderer::split_excerpt(&post.body);
        let excerpt_html = fetcher.render_markdown(excerpt.as_deref().unwrap_or(&body));
        PostData::new(&self.site.config, post, excerpt_html)
    }

    /// Base context shared by every HTML page
    fn create_base_context(&self, current_path: &str) -> Context {
        let config = &self.site.config;
        let mut context = Context::new();
        context.insert("config", &ConfigData::new(config));
        context.insert("menu", &menu_data(config));
        context.insert("current_path", current_path);
        context.insert("current_year", &Utc::now().year());
        context.insert("description", &config.description);
        context
    }

    fn write_output(&self, relative: &str, contents: &str) -> Result<()> {
        let output_path = self.staging_dir.join(relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output_path, contents)?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(())
    }

    fn root_path(&self, relative: &str) -> String {
        crate::helpers::url_for(&self.site.config, relative)
    }

    /// Generate the homepage
    async fn generate_home(
        &self,
        fetcher: &ContentFetcher,
        report: &mut GenerateReport,
    ) -> Result<()> {
        let home = match fetcher.get_homepage().await {
            Ok(Some(home)) => Some(HomeData::new(&self.site.config, &home)),
            Ok(None) => {
                tracing::warn!("No homepage entry found");
                None
            }
            Err(e) => {
                report.failed("homepage", &e);
                None
            }
        };

        let mut context = self.create_base_context(&self.root_path(""));
        context.insert("home", &home);

        let html = self.renderer.render("home.html", &context)?;
        self.write_output("index.html", &html)
    }

    /// Generate the blog listing
    fn generate_blog_index(&self, posts: &[PostData], listing: Listing) -> Result<()> {
        let blog_dir = self.site.config.blog_dir.trim_matches('/');

        let mut context = self.create_base_context(&self.root_path(&format!("{}/", blog_dir)));
        context.insert("heading", "Blog");
        context.insert("listing", listing.as_str());
        context.insert("posts", posts);

        let html = self.renderer.render("blog.html", &context)?;
        self.write_output(&format!("{}/index.html", blog_dir), &html)
    }

    /// Fetch every post detail, at most `fetch_concurrency` at a time, and
    /// write its page and JSON payload
    async fn generate_post_pages(
        &self,
        fetcher: &ContentFetcher,
        listed: &[PostData],
        report: &mut GenerateReport,
    ) -> Result<()> {
        let ids = match fetcher.list_post_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                report.failed("post ids", &e);
                return Ok(());
            }
        };

        let permits = Arc::new(Semaphore::new(self.site.config.cms.fetch_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for id in ids {
            let permit = permits.clone().acquire_owned().await?;
            let fetcher = fetcher.clone();
            tasks.spawn(async move {
                let detail = fetcher.get_post_by_id(&id).await;
                drop(permit);
                (id, detail)
            });
        }

        let mut details = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (id, detail) = joined?;
            match detail {
                Ok(Some(detail)) => details.push(detail),
                Ok(None) => tracing::warn!("Post {} disappeared before it could be fetched", id),
                Err(e) => report.failed(&format!("post {}", id), &e),
            }
        }

        // Listing order drives prev/next navigation
        let positions: HashMap<&str, usize> = listed
            .iter()
            .enumerate()
            .map(|(i, post)| (post.id.as_str(), i))
            .collect();
        details.sort_by_key(|detail| {
            positions
                .get(detail.id.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });

        for detail in &details {
            let position = positions.get(detail.id.as_str()).copied();
            self.generate_post_page(detail, listed, position)?;
        }

        report.posts = details.len();
        tracing::info!("Generated {} post pages", details.len());
        Ok(())
    }

    fn generate_post_page(
        &self,
        detail: &PostDetail,
        listed: &[PostData],
        position: Option<usize>,
    ) -> Result<()> {
        let config = &self.site.config;
        let post = PostData::new(config, &detail.post, String::new());

        // Listing is newest first: the older post is "previous"
        let prev_post = position
            .and_then(|i| listed.get(i + 1))
            .map(NavPost::from);
        let next_post = position
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| listed.get(i))
            .map(NavPost::from);

        let mut context = self.create_base_context(&post.path);
        context.insert("description", &summarize(&detail.content_html, 160));
        context.insert("post", &post);
        context.insert("content_html", &detail.content_html);
        context.insert("prev_post", &prev_post);
        context.insert("next_post", &next_post);

        let html = self.renderer.render("post.html", &context)?;
        let relative = post_path(config, &detail.id);
        self.write_output(&format!("{}index.html", relative), &html)?;
        self.write_output(
            &format!("{}index.json", relative),
            &serde_json::to_string(detail)?,
        )
    }

    /// Generate one page per CMS page entry, at its slug
    async fn generate_pages(
        &self,
        fetcher: &ContentFetcher,
        report: &mut GenerateReport,
    ) -> Result<()> {
        let pages = match fetcher.list_pages().await {
            Ok(pages) => pages,
            Err(e) => {
                report.failed("pages", &e);
                return Ok(());
            }
        };

        for page in &pages {
            let Some(relative) = self.page_output_dir(&page.slug) else {
                tracing::warn!("Skipping page {} with unusable slug {:?}", page.id, page.slug);
                continue;
            };

            let data = PageData::new(page);
            let mut context = self.create_base_context(&self.root_path(&format!("{}/", data.slug)));
            context.insert("page", &data);
            if let Some(ref body) = page.body {
                context.insert("description", &summarize(&body.plain_text(), 160));
            }

            let html = self.renderer.render("page.html", &context)?;
            self.write_output(&relative.join("index.html").to_string_lossy(), &html)?;
            report.pages += 1;
        }

        Ok(())
    }

    /// Output directory of a page slug, or None when the slug is empty, escapes
    /// the output directory or collides with a generated section
    fn page_output_dir(&self, slug: &str) -> Option<PathBuf> {
        let slug = slug.trim_matches('/');
        if slug.is_empty() {
            return None;
        }

        let path = Path::new(slug);
        if !path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let config = &self.site.config;
        let first = slug.split('/').next().unwrap_or_default();
        let reserved = [
            config.blog_dir.trim_matches('/'),
            config.tag_dir.trim_matches('/'),
            "atom.xml",
            "404.html",
            "index.html",
        ];
        if reserved.contains(&first) {
            return None;
        }

        Some(path.to_path_buf())
    }

    /// Generate tag pages, returning how many were written
    fn generate_tag_pages(&self, posts: &[PostData]) -> Result<usize> {
        // Keyed by slug so "Web Dev" and "web-dev" share a page
        let mut tags_map: IndexMap<String, (String, Vec<&PostData>)> = IndexMap::new();

        for post in posts {
            for tag in &post.tags {
                if tag.name.trim().is_empty() {
                    continue;
                }
                let tag_slug = slug::slugify(&tag.name);
                if tag_slug.is_empty() {
                    continue;
                }
                tags_map
                    .entry(tag_slug)
                    .or_insert_with(|| (tag.name.clone(), Vec::new()))
                    .1
                    .push(post);
            }
        }

        for (name, tag_posts) in tags_map.values() {
            let relative = tag_path(&self.site.config, name);

            let mut context = self.create_base_context(&self.root_path(&relative));
            context.insert("tag_name", name);
            context.insert("posts", tag_posts);

            let html = self.renderer.render("tag.html", &context)?;
            self.write_output(&format!("{}index.html", relative), &html)?;
        }

        Ok(tags_map.len())
    }

    /// Generate the Atom feed of the newest posts
    fn generate_atom_feed(&self, posts: &[PostData]) -> Result<()> {
        let config = &self.site.config;
        let site_url = full_url_for(config, "");

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
        if !config.subtitle.is_empty() {
            feed.push_str(&format!(
                "  <subtitle>{}</subtitle>\n",
                escape_xml(&config.subtitle)
            ));
        }
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            full_url_for(config, "atom.xml")
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", site_url));
        feed.push_str(&format!("  <updated>{}</updated>\n", now_xml()));
        feed.push_str(&format!("  <id>{}</id>\n", site_url));
        feed.push_str(&format!(
            "  <author><name>{}</name></author>\n",
            escape_xml(&config.author)
        ));

        for post in posts.iter().take(config.feed_limit) {
            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
            let permalink = escape_xml(&post.permalink);
            let date = escape_xml(&post.date_iso);
            feed.push_str(&format!("    <link href=\"{}\"/>\n", permalink));
            feed.push_str(&format!("    <id>{}</id>\n", permalink));
            feed.push_str(&format!(
                "    <author><name>{}</name></author>\n",
                escape_xml(&post.author)
            ));
            feed.push_str(&format!("    <published>{}</published>\n", date));
            feed.push_str(&format!("    <updated>{}</updated>\n", date));
            for tag in &post.tags {
                feed.push_str(&format!(
                    "    <category term=\"{}\"/>\n",
                    escape_xml(&tag.name)
                ));
            }
            let content = convert_relative_urls_to_absolute(
                &post.excerpt_html,
                config.url.trim_end_matches('/'),
            );
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                strip_invalid_xml_chars(&content).replace("]]>", "]]]]><![CDATA[>")
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");

        self.write_output("atom.xml", &feed)?;
        tracing::info!("Generated atom.xml");
        Ok(())
    }

    /// Generate the JSON listing payload
    fn generate_blog_json(&self, posts: &[NormalizedPost]) -> Result<()> {
        let blog_dir = self.site.config.blog_dir.trim_matches('/');
        self.write_output(
            &format!("{}/index.json", blog_dir),
            &serde_json::to_string(posts)?,
        )
    }

    fn generate_not_found(&self) -> Result<()> {
        let context = self.create_base_context("");
        let html = self.renderer.render("404.html", &context)?;
        self.write_output("404.html", &html)
    }
}

/// `.<name>.<suffix>` next to `dir`
fn sibling_dir(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "public".to_string());
    dir.with_file_name(format!(".{}.{}", name, suffix))
}

/// Make root-relative links absolute so feed readers can follow them
fn convert_relative_urls_to_absolute(content: &str, base_url: &str) -> String {
    content
        .replace("href=\"/", &format!("href=\"{}/", base_url))
        .replace("src=\"/", &format!("src=\"{}/", base_url))
        .replace("href='/", &format!("href='{}/", base_url))
        .replace("src='/", &format!("src='{}/", base_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CmsConfig, SiteConfig};
    use crate::error::StoreError;
    use crate::store::{ContentStore, Entry, EntryCollection, MemoryStore, Query};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct DownStore;

    #[async_trait]
    impl ContentStore for DownStore {
        async fn query(&self, _query: &Query) -> Result<EntryCollection, StoreError> {
            Err(StoreError::MissingCredentials("access_token"))
        }

        async fn get_by_id(&self, _id: &str) -> Result<Option<Entry>, StoreError> {
            Err(StoreError::MissingCredentials("access_token"))
        }
    }

    /// Records how many detail fetches are in flight at once
    struct CountingStore {
        inner: MemoryStore,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ContentStore for CountingStore {
        async fn query(&self, query: &Query) -> Result<EntryCollection, StoreError> {
            self.inner.query(query).await
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<Entry>, StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }
    }

    fn site(dir: &TempDir) -> Site {
        let mut config = SiteConfig::default();
        config.url = "https://example.com".to_string();
        Site {
            public_dir: dir.path().join("public"),
            base_dir: dir.path().to_path_buf(),
            config,
        }
    }

    fn sample_entries() -> Vec<Entry> {
        vec![
            Entry::new("old", "jamstackitBlog")
                .with_field("title", "Old post")
                .with_field("date", "2024-01-01")
                .with_field("tags", json!(["Rust"]))
                .with_field("body", "Intro <!-- more --> rest"),
            Entry::new("new", "jamstackitBlog")
                .with_field("title", "New post")
                .with_field("date", "2024-03-01")
                .with_field("tags", json!(["Rust", "Web Dev"]))
                .with_field("body", "# Hi"),
            Entry::new("about", "page")
                .with_field("slug", "about")
                .with_field("title", "About us"),
            Entry::new("sneaky", "page").with_field("slug", "../outside"),
            Entry::new("home", "homePage").with_field("headline", "Welcome home"),
        ]
    }

    async fn run(site: &Site, store: Arc<dyn ContentStore>) -> GenerateReport {
        let fetcher = ContentFetcher::new(store, &CmsConfig::default());
        Generator::new(site)
            .unwrap()
            .generate(&fetcher)
            .await
            .unwrap()
    }

    fn read(site: &Site, relative: &str) -> String {
        fs::read_to_string(site.public_dir.join(relative)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_full_site() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir);
        let report = run(&site, Arc::new(MemoryStore::new(sample_entries()))).await;

        assert!(report.is_complete());
        assert_eq!(report.posts, 2);
        assert_eq!(report.pages, 1);
        assert_eq!(report.tags, 2);

        assert!(read(&site, "index.html").contains("Welcome home"));

        let blog = read(&site, "blog/index.html");
        let new_at = blog.find("New post").unwrap();
        let old_at = blog.find("Old post").unwrap();
        assert!(new_at < old_at);

        let post = read(&site, "blog/new/index.html");
        assert!(post.contains("<h1>Hi</h1>"));
        assert!(post.contains("Old post"));

        let payload: serde_json::Value =
            serde_json::from_str(&read(&site, "blog/new/index.json")).unwrap();
        assert_eq!(payload["id"], "new");
        assert!(payload["contentHtml"].as_str().unwrap().contains("<h1>Hi</h1>"));

        assert!(read(&site, "about/index.html").contains("About us"));
        assert!(!dir.path().join("outside").exists());
        assert!(read(&site, "tags/web-dev/index.html").contains("New post"));

        let feed = read(&site, "atom.xml");
        assert!(feed.contains("<link href=\"https://example.com/blog/new/\"/>"));
        assert!(feed.contains("Intro"));
        assert!(!feed.contains("rest"));

        assert!(site.public_dir.join("404.html").exists());
        assert!(site.public_dir.join("blog/index.json").exists());
    }

    #[tokio::test]
    async fn test_generate_empty_store() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir);
        let report = run(&site, Arc::new(MemoryStore::new(Vec::new()))).await;

        assert!(report.is_complete());
        assert_eq!(report.posts, 0);
        assert!(read(&site, "blog/index.html").contains("No blog posts found."));
        assert!(read(&site, "index.html").contains("Homepage content not found."));
        assert_eq!(read(&site, "blog/index.json"), "[]");
    }

    #[tokio::test]
    async fn test_generate_with_store_down() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir);
        let report = run(&site, Arc::new(DownStore)).await;

        assert!(!report.is_complete());
        assert!(report.failures.iter().any(|f| f.starts_with("posts:")));
        assert!(read(&site, "blog/index.html").contains("temporarily unavailable"));
        assert!(read(&site, "index.html").contains("Homepage content not found."));
    }

    #[tokio::test]
    async fn test_post_fetches_are_bounded() {
        let dir = TempDir::new().unwrap();
        let mut site = site(&dir);
        site.config.cms.fetch_concurrency = 4;

        let entries = (0..30)
            .map(|i| {
                Entry::new(&format!("p{}", i), "jamstackitBlog")
                    .with_field("title", format!("Post {}", i))
                    .with_field("date", format!("2024-01-{:02}", i % 28 + 1))
            })
            .collect();
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(entries),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });

        let report = run(&site, store.clone()).await;
        assert_eq!(report.posts, 30);
        let peak = store.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "{} fetches in flight", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_regenerate_drops_removed_content() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir);
        fs::create_dir_all(site.public_dir.join("blog/stale")).unwrap();
        fs::write(site.public_dir.join("blog/stale/index.html"), "gone").unwrap();

        run(&site, Arc::new(MemoryStore::new(sample_entries()))).await;
        assert!(!site.public_dir.join("blog/stale").exists());
        assert!(site.public_dir.join("blog/new/index.html").exists());

        // A second run replaces the first
        run(&site, Arc::new(MemoryStore::new(Vec::new()))).await;
        assert!(!site.public_dir.join("blog/new").exists());
        assert!(read(&site, "blog/index.html").contains("No blog posts found."));
        assert!(!sibling_dir(&site.public_dir, "staging").exists());
        assert!(!sibling_dir(&site.public_dir, "old").exists());
    }

    #[tokio::test]
    async fn test_feed_escapes_unparsed_dates() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir);
        let entry = Entry::new("odd", "jamstackitBlog")
            .with_field("title", "Odd date")
            .with_field("date", "soon</published><script>");
        run(&site, Arc::new(MemoryStore::new(vec![entry]))).await;

        let feed = read(&site, "atom.xml");
        assert!(!feed.contains("<script>"));
        assert!(feed.contains("<published>soon&lt;/published&gt;&lt;script&gt;</published>"));
    }

    #[test]
    fn test_page_output_dir() {
        let dir = TempDir::new().unwrap();
        let generator = Generator::new(&site(&dir)).unwrap();
        assert_eq!(
            generator.page_output_dir("about"),
            Some(PathBuf::from("about"))
        );
        assert_eq!(
            generator.page_output_dir("/legal/privacy/"),
            Some(PathBuf::from("legal/privacy"))
        );
        assert_eq!(generator.page_output_dir(""), None);
        assert_eq!(generator.page_output_dir("../etc"), None);
        assert_eq!(generator.page_output_dir("blog"), None);
    }

    #[test]
    fn test_convert_relative_urls() {
        assert_eq!(
            convert_relative_urls_to_absolute(r#"<a href="/x">x</a>"#, "https://e.com"),
            r#"<a href="https://e.com/x">x</a>"#
        );
    }
}
