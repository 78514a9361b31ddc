//! Route bodies for the repository endpoint.
//!
//! One fixed route, `/{user}/{repo}`, carries the whole API: GET dispatches
//! on the query arguments (Memento, TimeMap or index), PUT pushes a new
//! revision, DELETE appends a tombstone. Each request acquires one pooled
//! database connection on entry and holds it until the response is built.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use sqlx::AnyConnection;

use tailr_rdf::MediaType;
use tailr_store::revision::{self, RevisionError};
use tailr_store::{accounts, cset, hmap};
use tailr_types::{KeySha, Timestamp};

use crate::auth;
use crate::error::ApiError;
use crate::memento::{self, ACCEPT_DATETIME, LINK_FORMAT};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RepoQuery {
    key: Option<String>,
    timemap: Option<String>,
    index: Option<String>,
    page: Option<u64>,
    datetime: Option<String>,
}

impl RepoQuery {
    fn timemap(&self) -> bool {
        self.timemap.as_deref() == Some("true")
    }

    fn index(&self) -> bool {
        self.index.as_deref() == Some("true")
    }

    /// The key argument, with the empty string treated as absent.
    fn key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// The `datetime` argument parsed up front so a malformed value is a 400
    /// regardless of which branch would use it.
    fn parsed_datetime(&self) -> Result<Option<Timestamp>, ApiError> {
        self.datetime
            .as_deref()
            .map(Timestamp::parse_qs)
            .transpose()
            .map_err(|err| ApiError::BadRequest(err.to_string()))
    }
}

fn validate_key(key: &str) -> Result<(), ApiError> {
    if key.len() > hmap::MAX_KEY_BYTES {
        return Err(ApiError::BadRequest(format!(
            "key exceeds {} bytes",
            hmap::MAX_KEY_BYTES
        )));
    }
    Ok(())
}

/// asOf for reads: `datetime` query argument, else `Accept-Datetime` header,
/// else now.
fn read_datetime(
    from_query: Option<Timestamp>,
    headers: &HeaderMap,
) -> Result<Timestamp, ApiError> {
    if let Some(ts) = from_query {
        return Ok(ts);
    }
    if let Some(value) = headers.get(&ACCEPT_DATETIME).and_then(|v| v.to_str().ok()) {
        return Timestamp::parse_rfc1123(value)
            .map_err(|err| ApiError::BadRequest(err.to_string()));
    }
    Ok(Timestamp::now())
}

// --- GET: Memento / TimeMap / index ---

pub async fn get_repo(
    State(state): State<AppState>,
    Path((username, reponame)): Path<(String, String)>,
    Query(query): Query<RepoQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let timemap = query.timemap();
    let index = query.index();
    let key = query.key();

    if (index && timemap) || (index && key.is_some()) || (timemap && key.is_none()) {
        return Err(ApiError::BadRequest(
            "conflicting query arguments".to_owned(),
        ));
    }
    if !index && key.is_none() {
        return Err(ApiError::BadRequest(
            "one of key=<uri>, timemap=true or index=true is required".to_owned(),
        ));
    }

    let from_query = query.parsed_datetime()?;

    let mut conn = state.pool.acquire().await?;
    let repo = accounts::find_repo(&mut conn, &username, &reponame)
        .await?
        .ok_or(ApiError::NotFound)?;
    let base = memento::repo_url(&headers, &username, &reponame);

    if let Some(key) = key {
        validate_key(key)?;
        if timemap {
            timemap_response(&mut conn, repo.id, key, &base, &headers).await
        } else {
            let as_of = read_datetime(from_query, &headers)?;
            memento_response(&mut conn, repo.id, key, &base, as_of).await
        }
    } else {
        let as_of = read_datetime(from_query, &headers)?;
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::BadRequest("page numbers start at 1".to_owned()));
        }
        index_response(&mut conn, repo.id, as_of, page).await
    }
}

async fn memento_response(
    conn: &mut AnyConnection,
    repo_id: i64,
    key: &str,
    base: &str,
    as_of: Timestamp,
) -> Result<Response, ApiError> {
    match revision::reconstruct(conn, repo_id, key, as_of).await {
        Ok(rev) => {
            let headers = memento::memento_headers(key, base, rev.time)?;
            Ok((StatusCode::OK, headers, rev.body).into_response())
        }
        Err(RevisionError::Gone { time }) => {
            // Tombstoned as of the bound: a 404 that still tells the client
            // when the resource last changed.
            let headers = memento::memento_headers(key, base, time)?;
            Ok((StatusCode::NOT_FOUND, headers, String::new()).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

async fn timemap_response(
    conn: &mut AnyConnection,
    repo_id: i64,
    key: &str,
    base: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let times = cset::time_map(conn, repo_id, &KeySha::of(key)).await?;
    if times.is_empty() {
        return Err(ApiError::NotFound);
    }

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept.contains("application/json") || accept.contains("*/*") {
        Ok(Json(memento::json_body(key, base, &times)).into_response())
    } else {
        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, LINK_FORMAT)],
            memento::link_format_body(key, base, &times),
        )
            .into_response())
    }
}

async fn index_response(
    conn: &mut AnyConnection,
    repo_id: i64,
    as_of: Timestamp,
    page: u64,
) -> Result<Response, ApiError> {
    let keys = cset::index_keys(conn, repo_id, as_of, page).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(header::VARY, HeaderValue::from_static("accept-datetime"));
    Ok((StatusCode::OK, headers, keys.join("\n")).into_response())
}

// --- PUT / DELETE ---

pub async fn put_resource(
    State(state): State<AppState>,
    Path((username, reponame)): Path<(String, String)>,
    Query(query): Query<RepoQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await?;
    auth::require_owner(&mut conn, &headers, &username).await?;

    let key = query
        .key()
        .ok_or_else(|| ApiError::BadRequest("key is required".to_owned()))?;
    validate_key(key)?;
    let ts = query.parsed_datetime()?.unwrap_or_else(Timestamp::now);

    let repo = accounts::find_repo(&mut conn, &username, &reponame)
        .await?
        .ok_or(ApiError::NotFound)?;

    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(MediaType::from_content_type)
        .unwrap_or_default();
    let stmts = tailr_rdf::parse(&body, media_type)?;

    // Both outcomes are a plain 200; an unchanged push writes nothing.
    revision::push(&mut conn, repo.id, key, ts, &stmts).await?;
    Ok(StatusCode::OK.into_response())
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Path((username, reponame)): Path<(String, String)>,
    Query(query): Query<RepoQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await?;
    auth::require_owner(&mut conn, &headers, &username).await?;

    let key = query
        .key()
        .ok_or_else(|| ApiError::BadRequest("key is required".to_owned()))?;
    validate_key(key)?;
    let ts = query.parsed_datetime()?.unwrap_or_else(Timestamp::now);

    let repo = accounts::find_repo(&mut conn, &username, &reponame)
        .await?
        .ok_or(ApiError::NotFound)?;

    revision::delete(&mut conn, repo.id, key, ts).await?;
    Ok(StatusCode::OK.into_response())
}
