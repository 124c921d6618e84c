//! Native platform implementations
//!
//! Tokio timers and a `reqwest`-based document fetcher for running the
//! navigation lifecycle outside a browser.

use super::{DocumentFetcher, Sleeper};
use crate::document::{ensure_html, FetchedDocument, ACCEPT_HTML};
use crate::router::NavigationError;
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use reqwest::{header, Client};
use std::time::Duration;
use url::Url;

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}

/// Document fetcher using `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a connection timeout. The overall navigation
    /// deadline is enforced by the router, not here.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("waypoint/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, NavigationError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| NavigationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::Status(status.as_u16()));
        }
        ensure_html(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )?;

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| NavigationError::Decode(e.to_string()))?;

        tracing::debug!(url = %final_url, bytes = html.len(), "Fetched document");
        Ok(FetchedDocument::from_html(final_url, &html))
    }
}
