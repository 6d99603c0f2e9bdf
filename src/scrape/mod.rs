pub mod course;
pub mod discover;
pub mod program;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::jobs::JobError;

/// Fixed base origin for the bulletin site; relative discovery links
/// resolve against this.
pub const BULLETIN_ORIGIN: &str = "https://bulletins.nyu.edu";

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

pub fn client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent("albert-scraper/0.1")
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Fetch a page body, retrying 429/5xx with exponential backoff. A
/// non-success status after the retry budget is a classified network
/// error; anything else fatal bubbles up as-is.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    for attempt in 0..=MAX_RETRIES {
        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp.text().await?);
                }
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable || attempt == MAX_RETRIES {
                    anyhow::bail!(JobError::network(format!("GET {url} returned {status}")));
                }
                warn!("GET {} returned {} (attempt {}/{})", url, status, attempt + 1, MAX_RETRIES);
            }
            Err(e) => {
                if attempt == MAX_RETRIES {
                    return Err(e).context(format!("GET {url} failed"));
                }
                warn!("GET {} failed: {} (attempt {}/{})", url, e, attempt + 1, MAX_RETRIES);
            }
        }
        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        tokio::time::sleep(backoff).await;
    }
    anyhow::bail!(JobError::network(format!("retries exhausted for {url}")))
}

/// Resolve a possibly-relative bulletin link. A malformed href degrades to
/// the site root rather than erroring; scraping the root yields nothing
/// useful but keeps the job recoverable.
pub fn resolve_url(href: &str) -> String {
    let base = reqwest::Url::parse(BULLETIN_ORIGIN).expect("static origin parses");
    match base.join(href) {
        Ok(url) => url.to_string(),
        Err(_) => BULLETIN_ORIGIN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_and_absolute() {
        assert_eq!(
            resolve_url("/undergraduate/x/"),
            "https://bulletins.nyu.edu/undergraduate/x/"
        );
        assert_eq!(resolve_url("https://other.edu/p"), "https://other.edu/p");
    }

    #[test]
    fn resolve_malformed_degrades_to_origin() {
        assert_eq!(resolve_url("https://"), BULLETIN_ORIGIN.to_string());
    }
}
