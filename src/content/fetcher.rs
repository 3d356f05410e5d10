//! Content fetcher - queries the CMS and normalizes entries into records

use chrono::Utc;
use std::sync::Arc;

use super::{Homepage, MarkdownRenderer, NormalizedPost, Page, PostDetail};
use crate::config::CmsConfig;
use crate::error::FetchError;
use crate::store::{ContentStore, Query, SortSpec};

/// Fetches posts, pages and the homepage from a content store.
///
/// Cheap to clone; clones share the store client and the Markdown renderer.
#[derive(Clone)]
pub struct ContentFetcher {
    store: Arc<dyn ContentStore>,
    model: CmsConfig,
    renderer: Arc<MarkdownRenderer>,
}

impl ContentFetcher {
    pub fn new(store: Arc<dyn ContentStore>, model: &CmsConfig) -> Self {
        Self {
            store,
            model: model.clone(),
            renderer: Arc::new(MarkdownRenderer::new()),
        }
    }

    /// All posts, newest first, capped at the configured limit
    pub async fn list_posts(&self) -> Result<Vec<NormalizedPost>, FetchError> {
        self.list_posts_of(
            &self.model.post_type,
            SortSpec::desc("fields.date"),
            self.model.post_limit,
        )
        .await
    }

    /// Posts of `content_type` in the given order
    pub async fn list_posts_of(
        &self,
        content_type: &str,
        order: SortSpec,
        limit: u32,
    ) -> Result<Vec<NormalizedPost>, FetchError> {
        let query = Query::content_type(content_type).order(order).limit(limit);
        logged(
            &format!("fetching '{}' posts", content_type),
            self.query_posts(&query).await,
        )
    }

    /// Ids of all posts, for enumerating detail pages
    pub async fn list_post_ids(&self) -> Result<Vec<String>, FetchError> {
        self.list_post_ids_of(&self.model.post_type, self.model.post_limit)
            .await
    }

    pub async fn list_post_ids_of(
        &self,
        content_type: &str,
        limit: u32,
    ) -> Result<Vec<String>, FetchError> {
        let query = Query::content_type(content_type)
            .select("sys.id")
            .limit(limit);
        logged(
            &format!("fetching '{}' post ids", content_type),
            self.query_ids(&query).await,
        )
    }

    /// One post with its Markdown body rendered to HTML. `Ok(None)` when the id is unknown.
    pub async fn get_post_by_id(&self, id: &str) -> Result<Option<PostDetail>, FetchError> {
        logged(&format!("fetching post {}", id), self.post_detail(id).await)
    }

    /// The first page whose slug equals `slug`
    pub async fn list_pages_by_slug(&self, slug: &str) -> Result<Option<Page>, FetchError> {
        let query = Query::content_type(&self.model.page_type).filter("fields.slug", slug);
        let result = self.query_pages(&query).await.map(|pages| pages.into_iter().next());
        logged(&format!("fetching page '{}'", slug), result)
    }

    /// All page entries
    pub async fn list_pages(&self) -> Result<Vec<Page>, FetchError> {
        let query = Query::content_type(&self.model.page_type);
        logged("fetching pages", self.query_pages(&query).await)
    }

    /// The homepage entry, if one exists
    pub async fn get_homepage(&self) -> Result<Option<Homepage>, FetchError> {
        logged("fetching homepage", self.homepage().await)
    }

    /// Render Markdown with the same highlighter used for post bodies
    pub fn render_markdown(&self, markdown: &str) -> String {
        self.renderer.render(markdown)
    }

    async fn query_posts(&self, query: &Query) -> Result<Vec<NormalizedPost>, FetchError> {
        let collection = self.store.query(query).await?;
        if collection.items.is_empty() {
            tracing::warn!(
                "No '{}' entries found",
                query.content_type.as_deref().unwrap_or_default()
            );
            return Ok(Vec::new());
        }

        let fetched_at = Utc::now();
        collection
            .items
            .iter()
            .map(|entry| NormalizedPost::from_entry(entry, fetched_at))
            .collect()
    }

    async fn query_ids(&self, query: &Query) -> Result<Vec<String>, FetchError> {
        let collection = self.store.query(query).await?;
        Ok(collection
            .items
            .into_iter()
            .map(|entry| entry.sys.id)
            .collect())
    }

    async fn post_detail(&self, id: &str) -> Result<Option<PostDetail>, FetchError> {
        let Some(entry) = self.store.get_by_id(id).await? else {
            tracing::warn!("No post entry found with id {}", id);
            return Ok(None);
        };

        let post = NormalizedPost::from_entry(&entry, Utc::now())?;
        let content_html = self.renderer.render(&post.body);
        Ok(Some(PostDetail::new(&entry, post, content_html)))
    }

    async fn query_pages(&self, query: &Query) -> Result<Vec<Page>, FetchError> {
        let collection = self.store.query(query).await?;
        collection.items.iter().map(Page::from_entry).collect()
    }

    async fn homepage(&self) -> Result<Option<Homepage>, FetchError> {
        let query = Query::content_type(&self.model.homepage_type).limit(1);
        let collection = self.store.query(&query).await?;
        collection.items.first().map(Homepage::from_entry).transpose()
    }
}

fn logged<T>(what: &str, result: Result<T, FetchError>) -> Result<T, FetchError> {
    if let Err(ref e) = result {
        tracing::error!("Error {}: {}", what, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{Entry, EntryCollection, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;

    /// A store whose every call fails as if the network were down
    struct UnreachableStore;

    #[async_trait]
    impl ContentStore for UnreachableStore {
        async fn query(&self, _query: &Query) -> Result<EntryCollection, StoreError> {
            Err(StoreError::Api {
                status: 503,
                code: "ServiceUnavailable".to_string(),
                message: "unreachable".to_string(),
            })
        }

        async fn get_by_id(&self, _id: &str) -> Result<Option<Entry>, StoreError> {
            Err(StoreError::Api {
                status: 503,
                code: "ServiceUnavailable".to_string(),
                message: "unreachable".to_string(),
            })
        }
    }

    fn fetcher(entries: Vec<Entry>) -> ContentFetcher {
        ContentFetcher::new(Arc::new(MemoryStore::new(entries)), &CmsConfig::default())
    }

    fn post(id: &str, date: &str) -> Entry {
        Entry::new(id, "jamstackitBlog")
            .with_field("title", format!("Post {}", id))
            .with_field("date", date)
            .with_field("author", "Ada")
            .with_field("tags", json!(["rust"]))
            .with_field("body", "# Hi")
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let fetcher = fetcher(Vec::new());
        assert!(fetcher.list_posts().await.unwrap().is_empty());
        assert!(fetcher.list_post_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_posts_newest_first() {
        let fetcher = fetcher(vec![
            post("a", "2024-01-01"),
            post("b", "2024-03-01"),
            post("c", "2024-02-01"),
        ]);
        let dates: Vec<_> = fetcher
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.date)
            .collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-02-01", "2024-01-01"]);
    }

    #[tokio::test]
    async fn test_posts_capped_at_limit() {
        let entries = (0..120)
            .map(|i| post(&format!("p{}", i), &format!("2024-01-01T00:{:02}:00Z", i % 60)))
            .collect();
        let fetcher = fetcher(entries);
        assert_eq!(fetcher.list_posts().await.unwrap().len(), 100);
        assert_eq!(fetcher.list_post_ids().await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_only_post_content_type_listed() {
        let fetcher = fetcher(vec![
            post("a", "2024-01-01"),
            Entry::new("about", "page").with_field("slug", "about"),
        ]);
        let ids = fetcher.list_post_ids().await.unwrap();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_missing_fields_fall_back() {
        let entry = Entry::new("bare", "jamstackitBlog").with_field("title", "Only title");
        let posts = fetcher(vec![entry]).list_posts().await.unwrap();
        assert_eq!(posts[0].title, "Only title");
        assert_eq!(posts[0].author, "Anonymous");
        assert!(posts[0].tags.is_empty());
        assert!(!posts[0].date.is_empty());
    }

    #[tokio::test]
    async fn test_get_post_by_id_renders_markdown() {
        let fetcher = fetcher(vec![post("a", "2024-01-01")]);
        let detail = fetcher.get_post_by_id("a").await.unwrap().unwrap();
        assert_eq!(detail.id, "a");
        assert!(detail.content_html.contains("<h1>Hi</h1>"));
        assert_eq!(detail.post.title, "Post a");
        assert_eq!(detail.fields.get("author"), Some(&json!("Ada")));
    }

    #[tokio::test]
    async fn test_get_post_by_unknown_id_is_absent() {
        let fetcher = fetcher(vec![post("a", "2024-01-01")]);
        assert!(fetcher.get_post_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_by_slug() {
        let fetcher = fetcher(vec![
            Entry::new("p1", "page")
                .with_field("slug", "about")
                .with_field("title", "About"),
            Entry::new("p2", "page")
                .with_field("slug", "contact")
                .with_field("title", "Contact"),
        ]);
        let page = fetcher.list_pages_by_slug("about").await.unwrap().unwrap();
        assert_eq!(page.id, "p1");
        assert_eq!(page.slug, "about");
        assert!(fetcher.list_pages_by_slug("jobs").await.unwrap().is_none());
        assert_eq!(fetcher.list_pages().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_homepage() {
        let fetcher = fetcher(vec![Entry::new("home", "homePage").with_field("headline", "Hi")]);
        let home = fetcher.get_homepage().await.unwrap().unwrap();
        assert_eq!(home.headline.as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_missing_homepage_is_absent() {
        assert!(fetcher(Vec::new()).get_homepage().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error() {
        let fetcher = ContentFetcher::new(Arc::new(UnreachableStore), &CmsConfig::default());
        assert!(matches!(
            fetcher.list_posts().await,
            Err(FetchError::Store(_))
        ));
        assert!(fetcher.list_post_ids().await.is_err());
        assert!(fetcher.get_post_by_id("a").await.is_err());
        assert!(fetcher.list_pages_by_slug("about").await.is_err());
        assert!(fetcher.get_homepage().await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_post_fails_listing() {
        let bad = Entry::new("bad", "jamstackitBlog").with_field("tags", "not-a-list");
        let result = fetcher(vec![post("a", "2024-01-01"), bad]).list_posts().await;
        assert!(matches!(result, Err(FetchError::InvalidEntry { .. })));
    }
}
