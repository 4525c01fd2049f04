use async_trait::async_trait;
use reqwest::{Request, Response};

/// The seam every outbound request goes through. Wrappers such as
/// [`UrlParam`](super::auth::UrlParam) decorate a request before delegating.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
