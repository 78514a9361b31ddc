//! Memento protocol rendering: response headers, TimeMap bodies in both
//! negotiated shapes, and the URI escaping they share.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use tailr_types::Timestamp;

use crate::error::ApiError;

pub const NQUADS: &str = "application/n-quads";
pub const LINK_FORMAT: &str = "application/link-format";

pub static MEMENTO_DATETIME: HeaderName = HeaderName::from_static("memento-datetime");
pub static ACCEPT_DATETIME: HeaderName = HeaderName::from_static("accept-datetime");

/// Escape set for keys embedded in memento URIs: everything but unreserved
/// characters.
const KEY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn escape_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ESCAPE).to_string()
}

/// The externally-visible repository URL, reconstructed from the `Host`
/// header. The repo URL doubles as the TimeGate.
pub fn repo_url(headers: &HeaderMap, username: &str, reponame: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}/{username}/{reponame}")
}

fn link_header(key: &str, base: &str) -> String {
    let pct = escape_key(key);
    format!(
        "<{key}>; rel=\"original\", \
         <{base}?key={pct}>; rel=\"timegate\", \
         <{base}?key={pct}&timemap=true>; rel=\"timemap\""
    )
}

/// The headers every Memento response carries, on 200 and on a tombstone's
/// 404 alike.
pub fn memento_headers(
    key: &str,
    base: &str,
    time: Timestamp,
) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(NQUADS));
    headers.insert(header::VARY, HeaderValue::from_static("accept-datetime"));
    headers.insert(
        MEMENTO_DATETIME.clone(),
        HeaderValue::from_str(&time.format_rfc1123()).map_err(ApiError::internal)?,
    );
    headers.insert(
        header::LINK,
        HeaderValue::from_str(&link_header(key, base)).map_err(|_| {
            ApiError::BadRequest("key not representable in a Link header".to_owned())
        })?,
    );
    Ok(headers)
}

// --- TimeMap bodies ---

/// `application/link-format`: the original relation first, then one memento
/// link per revision, newest first.
pub fn link_format_body(key: &str, base: &str, times: &[Timestamp]) -> String {
    let pct = escape_key(key);
    let mut body = format!("<{key}>; rel=\"original\"");
    for time in times {
        body.push_str(&format!(
            ",\n<{base}?key={pct}&datetime={qs}>\
             ; rel=\"memento\"\
             ; datetime=\"{rfc}\"\
             ; type=\"application/n-quads\"",
            qs = time.format_qs(),
            rfc = time.format_rfc1123(),
        ));
    }
    body
}

#[derive(Serialize)]
pub struct TimeMapJson {
    pub original_uri: String,
    pub mementos: MementoList,
}

#[derive(Serialize)]
pub struct MementoList {
    pub list: Vec<MementoEntry>,
}

#[derive(Serialize)]
pub struct MementoEntry {
    pub datetime: String,
    pub uri: String,
}

pub fn json_body(key: &str, base: &str, times: &[Timestamp]) -> TimeMapJson {
    let pct = escape_key(key);
    TimeMapJson {
        original_uri: key.to_owned(),
        mementos: MementoList {
            list: times
                .iter()
                .map(|time| MementoEntry {
                    datetime: time.format_iso8601(),
                    uri: format!("{base}?key={pct}&datetime={}", time.format_qs()),
                })
                .collect(),
        },
    }
}
