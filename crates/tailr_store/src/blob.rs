//! Compressed payload storage, addressed by `(repo, key-sha, time)`.
//!
//! Joins to `cset` by the same triple. Tombstones have no blob row.

use sqlx::AnyConnection;
use sqlx::Row as _;

use tailr_types::{KeySha, Timestamp};

use crate::StoreResult;

pub async fn put(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
    time: Timestamp,
    data: &[u8],
) -> StoreResult<()> {
    sqlx::query("INSERT INTO `blob` (repo_id, hkey_id, time, data) VALUES (?, ?, ?, ?)")
        .bind(repo_id)
        .bind(sha.as_bytes().to_vec())
        .bind(time.epoch_secs())
        .bind(data.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
    time: Timestamp,
) -> StoreResult<Option<Vec<u8>>> {
    let row = sqlx::query("SELECT data FROM `blob` WHERE repo_id = ? AND hkey_id = ? AND time = ?")
        .bind(repo_id)
        .bind(sha.as_bytes().to_vec())
        .bind(time.epoch_secs())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|row| Ok(row.try_get("data")?)).transpose()
}

/// Loads a whole chain's payloads in one query, ascending by time.
pub async fn get_many(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
    times: &[Timestamp],
) -> StoreResult<Vec<(Timestamp, Vec<u8>)>> {
    if times.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; times.len()].join(", ");
    let sql = format!(
        "SELECT time, data FROM `blob` \
         WHERE repo_id = ? AND hkey_id = ? AND time IN ({placeholders}) \
         ORDER BY time"
    );

    let mut query = sqlx::query(&sql)
        .bind(repo_id)
        .bind(sha.as_bytes().to_vec());
    for time in times {
        query = query.bind(time.epoch_secs());
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| {
            let time: i64 = row.try_get("time")?;
            let data: Vec<u8> = row.try_get("data")?;
            Ok((Timestamp::from_epoch_secs(time), data))
        })
        .collect()
}
