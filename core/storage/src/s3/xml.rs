//! XML documents exchanged with S3-compatible endpoints.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use objstore_common::{Error, Result};

/// Namespace of the S3 2006-03-01 API.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default, Deserialize)]
pub struct ListBucketResult {
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "NextContinuationToken", default)]
    pub next_continuation_token: Option<String>,
    #[serde(rename = "Contents", default)]
    pub contents: Vec<ListBucketObject>,
    #[serde(rename = "CommonPrefixes", default)]
    pub common_prefixes: Vec<ListBucketCommonPrefix>,
}

/// A `<Contents>` entry.
#[derive(Debug, Deserialize)]
pub struct ListBucketObject {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
}

/// A `<CommonPrefixes>` entry.
#[derive(Debug, Deserialize)]
pub struct ListBucketCommonPrefix {
    #[serde(rename = "Prefix")]
    pub prefix: String,
}

/// Body of a multi-object delete request.
#[derive(Debug, Serialize)]
#[serde(rename = "Delete")]
pub struct DeleteRequest<'a> {
    #[serde(rename = "@xmlns")]
    pub xmlns: &'static str,
    #[serde(rename = "Quiet")]
    pub quiet: bool,
    #[serde(rename = "Object")]
    pub objects: Vec<ObjectIdentifier<'a>>,
}

/// An `<Object>` entry of a delete request.
#[derive(Debug, Serialize)]
pub struct ObjectIdentifier<'a> {
    #[serde(rename = "Key")]
    pub key: &'a str,
}

/// Response to a multi-object delete request.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteResult {
    #[serde(rename = "Error", default)]
    pub errors: Vec<DeleteError>,
}

/// A per-key failure inside `<DeleteResult>`.
#[derive(Debug, Deserialize)]
pub struct DeleteError {
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "Code", default)]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// Generic S3 error document.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Code", default)]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
}

/// Outcome of parsing a multi-object delete response.
#[derive(Debug)]
pub enum DeleteResponse {
    /// The request was processed; per-key failures may be present.
    Result(DeleteResult),
    /// The whole request failed.
    Error(ErrorResponse),
}

/// Serialize a quiet multi-object delete request for `keys`.
pub fn encode_delete_request(keys: &[String]) -> Result<String> {
    let request = DeleteRequest {
        xmlns: S3_NAMESPACE,
        quiet: true,
        objects: keys
            .iter()
            .map(|key| ObjectIdentifier { key: key.as_str() })
            .collect(),
    };
    let body = quick_xml::se::to_string(&request)
        .map_err(|e| Error::Serialization(format!("Failed to encode delete request: {}", e)))?;
    Ok(format!(r#"<?xml version="1.0" encoding="UTF-8"?>{}"#, body))
}

/// Parse one ListObjectsV2 page.
pub fn decode_list_page(body: &str) -> Result<ListBucketResult> {
    quick_xml::de::from_str(body)
        .map_err(|e| Error::Serialization(format!("Failed to decode list objects response: {}", e)))
}

/// Parse a multi-object delete response, distinguishing whole-request errors.
pub fn decode_delete_response(body: &str) -> Result<DeleteResponse> {
    match root_element(body)?.as_str() {
        "Error" => quick_xml::de::from_str(body)
            .map(DeleteResponse::Error)
            .map_err(|e| Error::Serialization(format!("Failed to decode error response: {}", e))),
        "DeleteResult" => quick_xml::de::from_str(body)
            .map(DeleteResponse::Result)
            .map_err(|e| Error::Serialization(format!("Failed to decode delete response: {}", e))),
        other => Err(Error::Serialization(format!(
            "Unexpected delete response element <{}>",
            other
        ))),
    }
}

/// Local name of the document's root element.
fn root_element(body: &str) -> Result<String> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(Error::Serialization("Empty XML document".to_string()));
            }
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Serialization(format!("Malformed XML: {}", e)));
            }
        }
    }
}
