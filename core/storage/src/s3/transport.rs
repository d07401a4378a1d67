//! Request-sending seam between the S3 client and the network.

use async_trait::async_trait;
use reqwest::{Client, Request, Response};
use std::sync::Arc;

use objstore_common::{Error, Result};

/// Something that can send an HTTP request and return the response.
///
/// The plain implementation is a `reqwest::Client`. Request-signing layers
/// (SigV4 and similar) implement this trait by decorating another transport,
/// so the S3 client never needs to know whether its requests are signed.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the response, whatever its status.
    ///
    /// # Errors
    /// - Only failures to obtain a response; non-2xx statuses are not errors here
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl HttpTransport for Client {
    async fn send(&self, request: Request) -> Result<Response> {
        let method = request.method().clone();
        self.execute(request)
            .await
            .map_err(|e| Error::Network(format!("Failed to make {} request: {}", method, e)))
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}
