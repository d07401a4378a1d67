//! In-process S3 endpoint for tests.
//!
//! Serves a single bucket at [`FakeS3::BUCKET_URL`] from a sorted map and
//! records every request it sees. Knobs inject the failure modes real
//! endpoints exhibit.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use percent_encoding::percent_decode_str;
use quick_xml::escape::escape;
use reqwest::{Request, Response};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use objstore_common::{Metadata, Result};

use super::client::META_PREFIX;
use super::transport::HttpTransport;
use crate::provider::{place_key, Placement};

const BUCKET_PATH: &str = "/bucket/";

#[derive(Debug, Clone)]
pub(crate) struct FakeObject {
    pub body: Vec<u8>,
    pub metadata: Metadata,
    pub content_md5: String,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<String, FakeObject>,
    requests: Vec<String>,
    /// (requests until failure, status, body)
    failure: Option<(usize, u16, String)>,
    delete_errors: HashMap<String, String>,
    batch_error: Option<String>,
    send_checksums: bool,
    reverse_pages: bool,
    not_found_on_delete: bool,
    hang: bool,
}

#[derive(Deserialize)]
struct DeleteBody {
    #[serde(rename = "Quiet", default)]
    quiet: bool,
    #[serde(rename = "Object", default)]
    objects: Vec<DeleteBodyObject>,
}

#[derive(Deserialize)]
struct DeleteBodyObject {
    #[serde(rename = "Key")]
    key: String,
}

/// One listed entry, in key order.
enum Entry {
    Object(String, u64),
    Prefix(String),
}

pub(crate) struct FakeS3 {
    state: Mutex<FakeState>,
}

impl FakeS3 {
    pub const BUCKET_URL: &'static str = "http://fake.local/bucket/";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Requests seen so far, as `METHOD /path[?query]`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn object(&self, key: &str) -> Option<FakeObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    /// Flip the first byte of a stored body without touching its checksum.
    pub fn corrupt_object(&self, key: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(object) = state.objects.get_mut(key) {
            match object.body.first_mut() {
                Some(byte) => *byte ^= 0xff,
                None => object.body.push(0),
            }
        }
    }

    /// Answer the `nth` request from now (1-based) with `status` and `body`.
    pub fn fail_request(&self, nth: usize, status: u16, body: &str) {
        self.state.lock().unwrap().failure = Some((nth, status, body.to_string()));
    }

    /// Report `code` for `key` in batch deletes and leave it in place.
    pub fn deny_delete(&self, key: &str, code: &str) {
        self.state
            .lock()
            .unwrap()
            .delete_errors
            .insert(key.to_string(), code.to_string());
    }

    /// Answer batch deletes with a top-level `<Error>` document.
    pub fn set_batch_error(&self, code: &str) {
        self.state.lock().unwrap().batch_error = Some(code.to_string());
    }

    /// Include `Content-MD5` on GET responses.
    pub fn set_send_checksums(&self, enabled: bool) {
        self.state.lock().unwrap().send_checksums = enabled;
    }

    /// Emit each list page's entries in reverse order.
    pub fn set_reverse_pages(&self, enabled: bool) {
        self.state.lock().unwrap().reverse_pages = enabled;
    }

    /// Answer 404 to DELETE of an absent key, as GCS does.
    pub fn set_not_found_on_delete(&self, enabled: bool) {
        self.state.lock().unwrap().not_found_on_delete = enabled;
    }

    /// Never answer.
    pub fn set_hang(&self, enabled: bool) {
        self.state.lock().unwrap().hang = enabled;
    }

    fn handle(&self, request: &Request) -> Response {
        let mut state = self.state.lock().unwrap();

        let url = request.url();
        let line = match url.query() {
            Some(query) => format!("{} {}?{}", request.method(), url.path(), query),
            None => format!("{} {}", request.method(), url.path()),
        };
        state.requests.push(line);

        if let Some((remaining, status, body)) = state.failure.take() {
            if remaining <= 1 {
                return respond(status, &[], body.into_bytes());
            }
            state.failure = Some((remaining - 1, status, body));
        }

        let Some(raw_key) = url.path().strip_prefix(BUCKET_PATH) else {
            return error(404, "NoSuchBucket");
        };
        let key = match percent_decode_str(raw_key).decode_utf8() {
            Ok(key) => key.into_owned(),
            Err(_) => return error(400, "InvalidURI"),
        };
        let body = request.body().and_then(|b| b.as_bytes()).unwrap_or_default();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        match (request.method().as_str(), key.is_empty()) {
            ("GET", true) if query.get("list-type").map(String::as_str) == Some("2") => {
                list(&state, &query)
            }
            ("POST", true) if query.contains_key("delete") => {
                if header(request, "content-md5") != Some(md5_base64(body)) {
                    return error(400, "BadDigest");
                }
                batch_delete(&mut state, body)
            }
            ("GET", false) => match state.objects.get(&key) {
                Some(object) => {
                    let mut headers = object_headers(object);
                    if state.send_checksums {
                        headers.push(("content-md5".to_string(), object.content_md5.clone()));
                    }
                    respond(200, &headers, object.body.clone())
                }
                None => error(404, "NoSuchKey"),
            },
            ("HEAD", false) => match state.objects.get(&key) {
                Some(object) => respond(200, &object_headers(object), Vec::new()),
                None => respond(404, &[], Vec::new()),
            },
            ("PUT", false) => {
                let content_md5 = md5_base64(body);
                if header(request, "content-md5") != Some(content_md5.clone()) {
                    return error(400, "BadDigest");
                }
                let metadata = request
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        let name = name.as_str().strip_prefix(META_PREFIX)?;
                        Some((name.to_string(), value.to_str().ok()?.to_string()))
                    })
                    .collect();
                state.objects.insert(
                    key,
                    FakeObject {
                        body: body.to_vec(),
                        metadata,
                        content_md5,
                    },
                );
                respond(200, &[], Vec::new())
            }
            ("DELETE", false) => {
                let existed = state.objects.remove(&key).is_some();
                if !existed && state.not_found_on_delete {
                    error(404, "NoSuchKey")
                } else {
                    respond(204, &[], Vec::new())
                }
            }
            _ => error(405, "MethodNotAllowed"),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeS3 {
    async fn send(&self, request: Request) -> Result<Response> {
        let response = self.handle(&request);
        let hang = self.state.lock().unwrap().hang;
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(response)
    }
}

fn list(state: &FakeState, query: &HashMap<String, String>) -> Response {
    let prefix = query.get("prefix").map(String::as_str).unwrap_or("");
    let delimiter = query.get("delimiter").map(String::as_str).unwrap_or("");
    let max_keys: usize = query
        .get("max-keys")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);
    let start: usize = match query.get("continuation-token") {
        Some(token) => match token.strip_prefix("page:").and_then(|n| n.parse().ok()) {
            Some(start) => start,
            None => return error(400, "InvalidArgument"),
        },
        None => 0,
    };

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for (key, object) in &state.objects {
        match place_key(key, prefix, delimiter) {
            Placement::Excluded => {}
            Placement::Object => entries.push(Entry::Object(key.clone(), object.body.len() as u64)),
            Placement::CommonPrefix(p) => {
                if seen.insert(p.clone()) {
                    entries.push(Entry::Prefix(p));
                }
            }
        }
    }

    let end = (start + max_keys).min(entries.len());
    let mut page: Vec<&Entry> = entries[start.min(end)..end].iter().collect();
    if state.reverse_pages {
        page.reverse();
    }

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#);
    xml.push_str(&format!("<Name>bucket</Name><KeyCount>{}</KeyCount>", page.len()));
    xml.push_str(&format!("<IsTruncated>{}</IsTruncated>", end < entries.len()));
    for entry in page {
        match entry {
            Entry::Object(key, size) => xml.push_str(&format!(
                "<Contents><Key>{}</Key><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                escape(key),
                size
            )),
            Entry::Prefix(p) => xml.push_str(&format!(
                "<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>",
                escape(p)
            )),
        }
    }
    if end < entries.len() {
        xml.push_str(&format!(
            "<NextContinuationToken>page:{}</NextContinuationToken>",
            end
        ));
    }
    xml.push_str("</ListBucketResult>");

    respond(200, &[], xml.into_bytes())
}

fn batch_delete(state: &mut FakeState, body: &[u8]) -> Response {
    if let Some(code) = &state.batch_error {
        let xml = format!(
            "<Error><Code>{}</Code><Message>We encountered an internal error.</Message><RequestId>FAKE0001</RequestId></Error>",
            code
        );
        return respond(200, &[], xml.into_bytes());
    }

    let Ok(request) = std::str::from_utf8(body)
        .map_err(|_| ())
        .and_then(|text| quick_xml::de::from_str::<DeleteBody>(text).map_err(|_| ()))
    else {
        return error(400, "MalformedXML");
    };
    if request.objects.is_empty() || request.objects.len() > 1000 {
        return error(400, "MalformedXML");
    }

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#);
    for object in request.objects {
        if let Some(code) = state.delete_errors.get(&object.key) {
            let message = if code == "AccessDenied" {
                "Access Denied"
            } else {
                "Delete failed"
            };
            xml.push_str(&format!(
                "<Error><Key>{}</Key><Code>{}</Code><Message>{}</Message></Error>",
                escape(&object.key),
                code,
                message
            ));
            continue;
        }
        state.objects.remove(&object.key);
        if !request.quiet {
            xml.push_str(&format!("<Deleted><Key>{}</Key></Deleted>", escape(&object.key)));
        }
    }
    xml.push_str("</DeleteResult>");

    respond(200, &[], xml.into_bytes())
}

fn object_headers(object: &FakeObject) -> Vec<(String, String)> {
    let mut headers = vec![("content-length".to_string(), object.body.len().to_string())];
    for (name, value) in &object.metadata {
        headers.push((format!("{}{}", META_PREFIX, name), value.clone()));
    }
    headers
}

fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn md5_base64(body: &[u8]) -> String {
    STANDARD.encode(Md5::digest(body))
}

fn error(status: u16, code: &str) -> Response {
    let xml = format!(
        "<Error><Code>{}</Code><Message>{}</Message><RequestId>FAKE0000</RequestId></Error>",
        code, code
    );
    respond(status, &[], xml.into_bytes())
}

fn respond(status: u16, headers: &[(String, String)], body: Vec<u8>) -> Response {
    let mut builder = http::Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    Response::from(builder.body(body).unwrap())
}
