//! Issues the configured request against the upstream API.

use std::collections::HashMap;

use pullsource_core::{Fetcher, Offset, RawResponse};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::{HttpSourceConfig, RequestConfig};
use crate::template::{render, render_url};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request: RequestConfig,
}

impl HttpFetcher {
    pub fn new(config: &HttpSourceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(HttpFetcher {
            client,
            request: config.request.clone(),
        })
    }

    async fn execute(&self, offset: &Offset) -> Result<RawResponse> {
        let url = render_url(&self.request.url, offset);
        let params: Vec<(&str, String)> = self
            .request
            .params
            .iter()
            .map(|(name, value)| (name.as_str(), render(value, offset)))
            .collect();
        info!(method = %self.request.method, %url, ?params, "Requesting upstream");

        let mut builder = self
            .client
            .request(self.request.method.clone(), &url)
            .query(&params);
        for (name, value) in &self.request.headers {
            builder = builder.header(name.as_str(), render(value, offset));
        }
        if let Some(body) = &self.request.body {
            builder = builder.body(render(body, offset));
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Upstream responded");

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, offset: &Offset) -> pullsource_core::Result<RawResponse> {
        Ok(self.execute(offset).await?)
    }
}
