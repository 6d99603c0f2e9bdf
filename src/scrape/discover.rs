use anyhow::Result;
use tracing::{info, warn};

use super::{fetch_page, resolve_url};
use crate::classify;
use crate::html;

/// Anchors in the bulletin root's `nav levelone` list whose text is a
/// known school name. Everything else in that nav (index pages, policies)
/// is noise.
pub fn school_links(page: &str) -> Vec<(String, String)> {
    let schools = classify::school_names();
    html::extract_list_anchors(page, "nav levelone")
        .into_iter()
        .filter(|a| schools.iter().any(|s| *s == a.text))
        .map(|a| (a.text, a.href))
        .collect()
}

/// Program links on a school page: every anchor inside the sitemap div,
/// resolved absolute.
pub fn program_links(page: &str) -> Vec<String> {
    let mut urls = Vec::new();
    html::for_each_block(page, "sitemap", |block| {
        urls.extend(
            html::extract_anchors(block)
                .into_iter()
                .filter(|a| !a.href.is_empty())
                .map(|a| resolve_url(&a.href)),
        );
    });
    urls
}

/// Course-page links on a catalog listing: anchors under the `/courses/`
/// path prefix, resolved absolute.
pub fn course_links(page: &str) -> Vec<String> {
    html::extract_anchors(page)
        .into_iter()
        .filter(|a| {
            a.href.starts_with("/courses/")
                || a.href.starts_with(&format!("{}/courses/", super::BULLETIN_ORIGIN))
        })
        .map(|a| resolve_url(&a.href))
        .collect()
}

/// Walk the bulletin root to its school pages and union their program
/// links. A school page that fails to fetch is skipped with a warning;
/// discovery is best-effort fan-out, not all-or-nothing.
pub async fn discover_programs(client: &reqwest::Client, root_url: &str) -> Result<Vec<String>> {
    let root = fetch_page(client, root_url).await?;
    let schools = school_links(&root);

    // A listing page handed to us directly (no school nav) still works.
    if schools.is_empty() {
        return Ok(program_links(&root));
    }

    let mut urls = Vec::new();
    for (school, href) in schools {
        let school_url = resolve_url(&href);
        match fetch_page(client, &school_url).await {
            Ok(page) => {
                let links = program_links(&page);
                info!("{}: {} program links", school, links.len());
                urls.extend(links);
            }
            Err(e) => warn!("skipping school page {}: {:#}", school_url, e),
        }
    }
    Ok(urls)
}

/// Course discovery: one listing page, one pass.
pub async fn discover_courses(client: &reqwest::Client, listing_url: &str) -> Result<Vec<String>> {
    let page = fetch_page(client, listing_url).await?;
    Ok(course_links(&page))
}

// ── Tests ──
