//! Content module - fetches entries from the CMS and turns them into render-ready records

mod asset;
pub mod fetcher;
mod markdown;
mod post;
pub mod rich_text;

pub use asset::{asset_url, Asset};
pub use fetcher::ContentFetcher;
pub use markdown::MarkdownRenderer;
pub use post::{Homepage, NormalizedPost, Page, PostDetail, ANONYMOUS_AUTHOR, UNTITLED_POST};
