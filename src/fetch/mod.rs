mod basic;
mod client;
pub mod auth;
#[cfg(test)]
pub(crate) mod testing;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::SourceError;
use async_trait::async_trait;
use reqwest::Url;

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for &C {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        (**self).execute(req).await
    }
}

/// GETs `url` and returns the body of a 2xx response.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>, SourceError> {
    let url = Url::parse(url).map_err(|e| SourceError::Url {
        url: url.to_string(),
        source: e,
    })?;
    fetch_url(client, url).await
}

/// GETs `base` with `params` appended to its query string.
pub async fn fetch_with_query<C: HttpClient>(
    client: &C,
    base: &str,
    params: &[(&str, &str)],
) -> Result<Vec<u8>, SourceError> {
    let url = Url::parse_with_params(base, params).map_err(|e| SourceError::Url {
        url: base.to_string(),
        source: e,
    })?;
    fetch_url(client, url).await
}

async fn fetch_url<C: HttpClient>(client: &C, url: Url) -> Result<Vec<u8>, SourceError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status(status));
    }
    Ok(resp.bytes().await?.to_vec())
}
