//! S3-compatible object store client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::StreamExt;
use md5::{Digest, Md5};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, Request, Response, StatusCode};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use objstore_common::{normalize_metadata, validate_key, Error, Metadata, Result};

use super::config::S3Config;
use super::transport::HttpTransport;
use super::xml::{self, DeleteResponse, ListBucketResult};
use crate::context::Context;
use crate::provider::{
    check_delete_batch, DeleteFailure, Listing, ObjectHead, ObjectSink, ObjectStore,
    ObjectSummary,
};

/// Header prefix carrying user metadata.
pub const META_PREFIX: &str = "x-amz-meta-";

/// Header carrying the base64 MD5 of a body.
const CONTENT_MD5: &str = "content-md5";

/// Per-key delete error code that only means the key was already gone.
const NO_SUCH_KEY: &str = "NoSuchKey";

/// Characters escaped in object paths: everything but RFC 3986 unreserved and `/`.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Characters escaped in query values: everything but RFC 3986 unreserved.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Object store speaking the S3 REST API against a single bucket.
///
/// Requests go through an [`HttpTransport`], which may sign them. Each
/// operation issues its requests sequentially on the calling task; nothing
/// is retried.
pub struct S3Store {
    transport: Arc<dyn HttpTransport>,
    bucket_url: Url,
    page_size: Option<u32>,
}

impl S3Store {
    /// Create a client for the bucket rooted at `bucket_url`.
    ///
    /// # Preconditions
    /// - `bucket_url` must be an absolute `http` or `https` URL
    /// - `bucket_url` must not carry a query or fragment
    ///
    /// # Postconditions
    /// - The stored bucket URL path ends with `/`
    ///
    /// # Errors
    /// - `InvalidInput` if the URL is unusable
    pub fn new(transport: Arc<dyn HttpTransport>, bucket_url: &str) -> Result<Self> {
        let mut url = Url::parse(bucket_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid bucket URL '{}': {}", bucket_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(format!(
                "Bucket URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.cannot_be_a_base() || url.host().is_none() {
            return Err(Error::InvalidInput(format!(
                "Bucket URL '{}' has no host",
                bucket_url
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(Error::InvalidInput(format!(
                "Bucket URL '{}' must not have a query or fragment",
                bucket_url
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            transport,
            bucket_url: url,
            page_size: None,
        })
    }

    /// Create a client from configuration, sending through a fresh `reqwest::Client`.
    pub fn from_config(config: &S3Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        let store = Self::new(Arc::new(client), &config.bucket_url)?;
        match config.page_size {
            Some(page_size) => store.with_page_size(page_size),
            None => Ok(store),
        }
    }

    /// Request at most `page_size` entries per list page.
    ///
    /// # Errors
    /// - `InvalidInput` if `page_size` is zero
    pub fn with_page_size(mut self, page_size: u32) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::InvalidInput("Page size must be positive".to_string()));
        }
        self.page_size = Some(page_size);
        Ok(self)
    }

    /// The normalized bucket root URL.
    pub fn bucket_url(&self) -> &Url {
        &self.bucket_url
    }

    /// URL of the object at `key`.
    fn object_url(&self, key: &str) -> Result<Url> {
        let raw = format!(
            "{}{}",
            self.bucket_url,
            utf8_percent_encode(key, KEY_ENCODE_SET)
        );
        Url::parse(&raw)
            .map_err(|e| Error::InvalidInput(format!("Cannot build URL for key '{}': {}", key, e)))
    }

    /// URL of a ListObjectsV2 page.
    fn list_url(&self, prefix: &str, delimiter: &str, token: Option<&str>) -> Url {
        let mut query = String::from("list-type=2");
        let mut push = |name: &str, value: &str| {
            query.push('&');
            query.push_str(name);
            query.push('=');
            query.extend(utf8_percent_encode(value, QUERY_ENCODE_SET));
        };

        if !prefix.is_empty() {
            push("prefix", prefix);
        }
        if !delimiter.is_empty() {
            push("delimiter", delimiter);
        }
        let page_size = self.page_size.map(|n| n.to_string());
        if let Some(page_size) = &page_size {
            push("max-keys", page_size);
        }
        if let Some(token) = token {
            push("continuation-token", token);
        }

        let mut url = self.bucket_url.clone();
        url.set_query(Some(&query));
        url
    }

    /// Send a request, abandoning it if the context ends first.
    async fn send(&self, ctx: &Context, request: Request) -> Result<Response> {
        ctx.run(self.transport.send(request)).await?
    }

    /// Read a response body as text under the context.
    async fn read_text(ctx: &Context, operation: &'static str, response: Response) -> Result<String> {
        ctx.run(response.text())
            .await?
            .map_err(|e| Error::Network(format!("Failed to read {} response body: {}", operation, e)))
    }

    /// Turn a non-success response into an error carrying its body.
    async fn status_error(ctx: &Context, operation: &'static str, response: Response) -> Error {
        let status = response.status().as_u16();
        match ctx.run(response.text()).await {
            Ok(body) => Error::Http {
                operation,
                status,
                body: body.unwrap_or_default(),
            },
            Err(e) => e,
        }
    }

    /// Shared GET/HEAD path.
    async fn read_object(
        &self,
        ctx: &Context,
        operation: &'static str,
        method: Method,
        key: &str,
        dst: Option<&mut ObjectSink<'_>>,
    ) -> Result<ObjectHead> {
        validate_key(key)?;
        ctx.check()?;

        let url = self.object_url(key)?;
        debug!(operation, key, "s3 request");
        let response = self.send(ctx, Request::new(method, url)).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::ObjectNotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(Self::status_error(ctx, operation, response).await);
        }

        let metadata = metadata_from_headers(response.headers());
        let size = declared_length(response.headers());

        if let Some(dst) = dst {
            let expected = response
                .headers()
                .get(CONTENT_MD5)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string());
            let mut hasher = expected.as_ref().map(|_| Md5::new());
            let mut stream = response.bytes_stream();

            ctx.run(async {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| {
                        Error::Network(format!("Failed to read {} response body: {}", operation, e))
                    })?;
                    if let Some(hasher) = hasher.as_mut() {
                        hasher.update(&chunk);
                    }
                    dst.write_all(&chunk).await?;
                }
                dst.flush().await?;
                Ok::<(), Error>(())
            })
            .await??;

            if let (Some(expected), Some(hasher)) = (expected, hasher) {
                let actual = STANDARD.encode(hasher.finalize());
                if expected != actual {
                    warn!(key, %expected, %actual, "content checksum mismatch");
                    return Err(Error::Integrity(format!(
                        "{}: Content-MD5 {} != {}",
                        key, expected, actual
                    )));
                }
            }
        }

        Ok(ObjectHead { size, metadata })
    }

    /// Fetch one ListObjectsV2 page.
    async fn list_page(
        &self,
        ctx: &Context,
        prefix: &str,
        delimiter: &str,
        token: Option<&str>,
    ) -> Result<ListBucketResult> {
        let url = self.list_url(prefix, delimiter, token);
        let response = self.send(ctx, Request::new(Method::GET, url)).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(ctx, "ListObjectsV2", response).await);
        }

        let body = Self::read_text(ctx, "ListObjectsV2", response).await?;
        xml::decode_list_page(&body)
    }

    /// Delete a single key with a plain DELETE.
    async fn delete_one(&self, ctx: &Context, key: &str) -> Result<()> {
        let url = self.object_url(key)?;
        debug!(key, "s3 delete");
        let response = self.send(ctx, Request::new(Method::DELETE, url)).await?;

        // Some providers (GCS among them) answer 404 for absent keys.
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::status_error(ctx, "DeleteObject", response).await)
    }

    /// Delete several keys with one quiet multi-object delete.
    async fn delete_batch(&self, ctx: &Context, keys: &[String]) -> Result<Vec<DeleteFailure>> {
        let body = xml::encode_delete_request(keys)?;

        let mut url = self.bucket_url.clone();
        url.set_query(Some("delete"));

        let mut request = Request::new(Method::POST, url);
        let headers = request.headers_mut();
        headers.insert(HeaderName::from_static(CONTENT_MD5), content_md5(body.as_bytes())?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
        *request.body_mut() = Some(Body::from(body));

        debug!(count = keys.len(), "s3 batch delete");
        let response = self.send(ctx, request).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(ctx, "DeleteObjects", response).await);
        }

        let text = Self::read_text(ctx, "DeleteObjects", response).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match xml::decode_delete_response(&text)? {
            DeleteResponse::Error(error) => Err(Error::Backend {
                code: error.code,
                message: error.message,
                request_id: error.request_id,
            }),
            DeleteResponse::Result(result) => {
                let failures: Vec<DeleteFailure> = result
                    .errors
                    .into_iter()
                    .filter(|e| e.code != NO_SUCH_KEY)
                    .map(|e| DeleteFailure {
                        key: e.key,
                        code: e.code,
                        message: e.message,
                    })
                    .collect();
                if !failures.is_empty() {
                    warn!(
                        failed = failures.len(),
                        requested = keys.len(),
                        "batch delete left keys in place"
                    );
                }
                Ok(failures)
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn get_object(
        &self,
        ctx: &Context,
        key: &str,
        dst: &mut ObjectSink<'_>,
    ) -> Result<Metadata> {
        let head = self
            .read_object(ctx, "GetObject", Method::GET, key, Some(dst))
            .await?;
        Ok(head.metadata)
    }

    async fn head_object(&self, ctx: &Context, key: &str) -> Result<ObjectHead> {
        self.read_object(ctx, "HeadObject", Method::HEAD, key, None)
            .await
    }

    async fn list_objects(&self, ctx: &Context, prefix: &str, delimiter: &str) -> Result<Listing> {
        ctx.check()?;

        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            pages += 1;
            debug!(prefix, delimiter, page = pages, "s3 list page");
            let page = self
                .list_page(ctx, prefix, delimiter, token.as_deref())
                .await?;

            objects.extend(page.contents.into_iter().map(|o| ObjectSummary {
                key: o.key,
                size: o.size,
            }));
            common_prefixes.extend(page.common_prefixes.into_iter().map(|p| p.prefix));

            if !page.is_truncated {
                break;
            }
            match page.next_continuation_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => {
                    return Err(Error::Serialization(
                        "Truncated list page carried no continuation token".to_string(),
                    ));
                }
            }
        }

        debug!(pages, objects = objects.len(), prefixes = common_prefixes.len(), "s3 list complete");
        Ok(Listing::from_parts(objects, common_prefixes))
    }

    async fn put_object(
        &self,
        ctx: &Context,
        key: &str,
        metadata: &Metadata,
        body: Bytes,
    ) -> Result<()> {
        validate_key(key)?;
        ctx.check()?;

        let mut request = Request::new(Method::PUT, self.object_url(key)?);
        let headers = request.headers_mut();
        headers.insert(HeaderName::from_static(CONTENT_MD5), content_md5(&body)?);
        for (name, value) in normalize_metadata(metadata) {
            let header = HeaderName::from_bytes(format!("{}{}", META_PREFIX, name).as_bytes())
                .map_err(|e| Error::InvalidInput(format!("Invalid metadata key '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(&value).map_err(|e| {
                Error::InvalidInput(format!("Invalid value for metadata key '{}': {}", name, e))
            })?;
            headers.insert(header, value);
        }

        debug!(key, size = body.len(), "s3 put");
        *request.body_mut() = Some(Body::from(body));

        let response = self.send(ctx, request).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(ctx, "PutObject", response).await);
        }
        Ok(())
    }

    async fn delete_objects(&self, ctx: &Context, keys: &[String]) -> Result<Vec<DeleteFailure>> {
        check_delete_batch(keys)?;
        ctx.check()?;

        match keys {
            [] => Ok(Vec::new()),
            [key] => {
                self.delete_one(ctx, key).await?;
                Ok(Vec::new())
            }
            _ => self.delete_batch(ctx, keys).await,
        }
    }
}

/// Base64 MD5 of `body`, as sent in `Content-MD5`.
fn content_md5(body: &[u8]) -> Result<HeaderValue> {
    let digest = STANDARD.encode(Md5::digest(body));
    HeaderValue::from_str(&digest)
        .map_err(|e| Error::InvalidInput(format!("Invalid Content-MD5 value: {}", e)))
}

/// User metadata carried in `x-amz-meta-*` headers, prefix stripped.
fn metadata_from_headers(headers: &HeaderMap) -> Metadata {
    let mut metadata = Metadata::new();
    for (name, value) in headers {
        // Header names are already lowercase.
        if let Some(key) = name.as_str().strip_prefix(META_PREFIX) {
            metadata
                .entry(key.to_string())
                .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
    }
    metadata
}

/// Body length declared by the response headers.
fn declared_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
