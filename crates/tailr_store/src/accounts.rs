//! The contract with the adjacent account service.
//!
//! User management, OAuth and token issuance live elsewhere; the store only
//! needs to answer "which user does this bearer token identify?" and "which
//! repo is `<user>/<repo>`?". The creation helpers exist for setup scripts
//! and tests.

use sqlx::AnyConnection;
use sqlx::Row as _;

use crate::StoreResult;

/// The calling principal, as far as the API surface cares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// A resolved repository namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Repo {
    pub id: i64,
}

/// Resolves a bearer token value to its user, if any.
pub async fn user_for_token(conn: &mut AnyConnection, token: &str) -> StoreResult<Option<User>> {
    let row = sqlx::query(
        "SELECT u.id, u.name FROM user u JOIN token t ON t.user_id = u.id WHERE t.`value` = ?",
    )
    .bind(token)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Ok(Some(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })),
        None => Ok(None),
    }
}

/// Resolves `(user.name, repo.name)` to a repository.
pub async fn find_repo(
    conn: &mut AnyConnection,
    username: &str,
    reponame: &str,
) -> StoreResult<Option<Repo>> {
    let row = sqlx::query(
        "SELECT r.id FROM repo r JOIN user u ON r.user_id = u.id \
         WHERE u.name = ? AND r.name = ?",
    )
    .bind(username)
    .bind(reponame)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Ok(Some(Repo {
            id: row.try_get("id")?,
        })),
        None => Ok(None),
    }
}

pub async fn create_user(conn: &mut AnyConnection, name: &str) -> StoreResult<User> {
    sqlx::query("INSERT INTO user (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    let row = sqlx::query("SELECT id FROM user WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(User {
        id: row.try_get("id")?,
        name: name.to_owned(),
    })
}

pub async fn create_token(
    conn: &mut AnyConnection,
    user_id: i64,
    value: &str,
    descr: &str,
) -> StoreResult<()> {
    sqlx::query("INSERT INTO token (`value`, user_id, descr) VALUES (?, ?, ?)")
        .bind(value)
        .bind(user_id)
        .bind(descr)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn create_repo(
    conn: &mut AnyConnection,
    user_id: i64,
    name: &str,
    descr: &str,
) -> StoreResult<Repo> {
    sqlx::query("INSERT INTO repo (user_id, name, descr) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(name)
        .bind(descr)
        .execute(&mut *conn)
        .await?;
    let row = sqlx::query("SELECT id FROM repo WHERE user_id = ? AND name = ?")
        .bind(user_id)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(Repo {
        id: row.try_get("id")?,
    })
}
