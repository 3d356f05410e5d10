//! List CMS content

use anyhow::Result;
use indexmap::IndexMap;

use crate::content::ContentFetcher;
use crate::helpers::display_date;
use crate::Site;

/// List CMS content by type
pub async fn run(site: &Site, fetcher: &ContentFetcher, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let posts = fetcher.list_posts().await?;
            println!("Posts ({}):", posts.len());
            for post in posts {
                println!(
                    "  {} - {} by {} [{}]",
                    display_date(&post.date, "YYYY-MM-DD", &site.config.timezone),
                    post.title,
                    post.author,
                    post.id
                );
            }
        }
        "id" | "ids" => {
            let ids = fetcher.list_post_ids().await?;
            println!("Post ids ({}):", ids.len());
            for id in ids {
                println!("  {}", id);
            }
        }
        "page" | "pages" => {
            let pages = fetcher.list_pages().await?;
            println!("Pages ({}):", pages.len());
            for page in pages {
                println!(
                    "  /{} - {} [{}]",
                    page.slug,
                    page.title.as_deref().unwrap_or("(untitled)"),
                    page.id
                );
            }
        }
        "home" | "homepage" => match fetcher.get_homepage().await? {
            Some(home) => println!(
                "Homepage [{}]: {}",
                home.id,
                home.headline.as_deref().unwrap_or("(no headline)")
            ),
            None => println!("No homepage entry"),
        },
        "tag" | "tags" => {
            let posts = fetcher.list_posts().await?;
            let tags = count_tags(posts.iter().flat_map(|p| p.tags.iter()));
            println!("Tags ({}):", tags.len());
            for (tag, count) in tags {
                println!("  {} ({})", tag, count);
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, id, page, home, tag",
                content_type
            );
        }
    }

    Ok(())
}

/// Tag counts, most used first; ties keep first-seen order
fn count_tags<'a>(tags: impl Iterator<Item = &'a String>) -> Vec<(String, usize)> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for tag in tags {
        *counts.entry(tag.clone()).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tags() {
        let tags = ["rust", "cms", "rust", "web"].map(String::from);
        let counts = count_tags(tags.iter());
        assert_eq!(
            counts,
            vec![
                ("rust".to_string(), 2),
                ("cms".to_string(), 1),
                ("web".to_string(), 1)
            ]
        );
    }
}
