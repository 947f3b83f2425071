use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;

use super::{FetchConfig, USER_AGENTS};

/// Seam for the page-fetch collaborator so the batch job can be driven
/// with scripted pages in tests.
#[async_trait]
pub trait PageFetch: Send + Sync {
    /// Fetch a product page and return its body text. Network errors,
    /// timeouts and non-2xx statuses all surface as errors; the caller
    /// treats them uniformly as a failed check.
    async fn fetch_page(&self, url: &str)
        -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    fn pick_user_agent(&self) -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }
}

#[async_trait]
impl PageFetch for PageFetcher {
    async fn fetch_page(
        &self,
        url: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.pick_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}
