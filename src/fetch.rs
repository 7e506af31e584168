//! `reqwest`-backed [`DocumentFetcher`].

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::traits::{DocumentFetcher, FetchedDocument};

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cap-harvest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn raw_fetch(&self, url: &str, cookie: Option<&str>, timeout: Duration) -> Option<FetchedDocument> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(cookie) = cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url, error = %e, "raw fetch failed");
                return None;
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match response.bytes().await {
            Ok(body) => Some(FetchedDocument {
                url: url.to_string(),
                status,
                content_type,
                body: body.to_vec(),
            }),
            Err(e) => {
                debug!(url, error = %e, "raw fetch body read failed");
                None
            }
        }
    }
}
