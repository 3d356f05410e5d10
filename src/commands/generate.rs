//! Generate static files

use anyhow::Result;

use crate::content::ContentFetcher;
use crate::generator::{GenerateReport, Generator};
use crate::Site;

/// Generate the static site, tolerating fetch failures
pub async fn run(site: &Site, fetcher: &ContentFetcher) -> Result<GenerateReport> {
    run_with_options(site, fetcher, false).await
}

/// Generate with strict option: any failed fetch fails the run
pub async fn run_with_options(
    site: &Site,
    fetcher: &ContentFetcher,
    strict: bool,
) -> Result<GenerateReport> {
    let start = std::time::Instant::now();

    let generator = Generator::new(site)?;
    let report = generator.generate(fetcher).await?;

    tracing::info!(
        "Generated {} posts, {} pages and {} tags in {:.2}s",
        report.posts,
        report.pages,
        report.tags,
        start.elapsed().as_secs_f64()
    );

    if !report.is_complete() {
        for failure in &report.failures {
            tracing::warn!("Incomplete: {}", failure);
        }
        if strict {
            anyhow::bail!(
                "{} content fetch(es) failed; output in {:?} is incomplete",
                report.failures.len(),
                site.public_dir
            );
        }
    }

    Ok(report)
}
