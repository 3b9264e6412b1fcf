use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes one HTTP request. Implementations may decorate the request
/// (credentials) before handing it on.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> anyhow::Result<Response>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Box<C> {
    async fn execute(&self, req: Request) -> anyhow::Result<Response> {
        (**self).execute(req).await
    }
}
