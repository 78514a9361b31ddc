//! Bearer-token authentication for mutating verbs.
//!
//! The account service owns tokens; our contract is `token value -> user`.
//! No XSRF on the API surface.

use axum::http::{header, HeaderMap};
use sqlx::AnyConnection;

use tailr_store::accounts::{self, User};

use crate::error::ApiError;

/// Resolves `Authorization: token <value>` to a user, or `None` when the
/// header is absent, malformed, uses another scheme, or names no known token.
pub async fn authenticate(
    conn: &mut AnyConnection,
    headers: &HeaderMap,
) -> Result<Option<User>, ApiError> {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };

    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some("token"), Some(token)) if !token.is_empty() => {
            Ok(accounts::user_for_token(conn, token).await?)
        }
        _ => Ok(None),
    }
}

/// Authenticates the caller and requires them to own the `{user}` path
/// segment: 401 when anonymous, 403 when somebody else.
pub async fn require_owner(
    conn: &mut AnyConnection,
    headers: &HeaderMap,
    username: &str,
) -> Result<User, ApiError> {
    let user = authenticate(conn, headers)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if user.name != username {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}
