use tracing::info;

use crate::cancel::CancelToken;
use crate::catalog::{CatalogTransport, parse_release_page};
use crate::config::RetryPolicy;
use crate::download::{Attempt, build_agent, classify_ureq_error, with_retries};
use crate::error::{Result, WineportError};
use crate::models::ReleaseRecord;

/// Release listing over the GitHub REST API (or any API serving the same shape)
pub struct GitHubTransport {
    agent: ureq::Agent,
    api_base: String,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl GitHubTransport {
    pub fn new(api_base: &str, policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            agent: build_agent(&policy),
            api_base: api_base.trim_end_matches('/').to_string(),
            policy,
            cancel,
        }
    }

    fn releases_url(&self, repo: &str) -> String {
        format!("{}/repos/{repo}/releases", self.api_base)
    }

    fn request_page(&self, url: &str, page: usize, per_page: usize) -> std::result::Result<String, Attempt> {
        let response = self
            .agent
            .get(url)
            .query("per_page", &per_page.to_string())
            .query("page", &page.to_string())
            .set("Accept", "application/vnd.github+json")
            .call()
            .map_err(classify_ureq_error)?;

        if response.status() != 200 {
            return Err(Attempt::Fatal(format!(
                "GitHub API request failed with status: {}",
                response.status()
            )));
        }

        response
            .into_string()
            .map_err(|e| Attempt::Retry(format!("failed to read response body: {e}")))
    }
}

impl CatalogTransport for GitHubTransport {
    fn fetch_page(&self, repo: &str, page: usize, per_page: usize) -> Result<Vec<ReleaseRecord>> {
        let url = self.releases_url(repo);
        info!("Fetching release info from: {url} (page {page})");

        let body = with_retries(&self.policy, &self.cancel, &url, || {
            self.request_page(&url, page, per_page)
        })
        .map_err(|attempt| match attempt {
            Attempt::Cancelled => WineportError::Cancelled,
            Attempt::Retry(reason) | Attempt::Fatal(reason) => WineportError::CatalogUnavailable {
                repo: repo.to_string(),
                reason,
            },
        })?;

        parse_release_page(repo, &body)
    }
}
