//! The append-only changeset log.
//!
//! One row per revision of a `(repo, key)` pair: `{time, type, len}`. The
//! chain of a pair is the maximal suffix starting at the most recent
//! non-delta row, so a reader only ever replays one snapshot plus the deltas
//! behind it (or stops at a lone tombstone).

use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use sqlx::Row as _;

use tailr_types::{ChangeKind, KeySha, Timestamp};

use crate::{StoreError, StoreResult};

/// Keys per index page.
pub const PAGE_SIZE: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsetRow {
    pub time: Timestamp,
    pub kind: ChangeKind,
    pub len: u64,
}

fn decode_row(row: &AnyRow) -> StoreResult<CsetRow> {
    let time: i64 = row.try_get("time")?;
    let kind: i64 = row.try_get("type")?;
    let len: i64 = row.try_get("len")?;
    Ok(CsetRow {
        time: Timestamp::from_epoch_secs(time),
        kind: ChangeKind::from_stored(kind).ok_or(StoreError::UnknownKind(kind))?,
        len: u64::try_from(len).unwrap_or(0),
    })
}

/// The chain for `(repo, sha)`, optionally bounded above by `at_or_before`,
/// ordered by time ascending.
///
/// The inner selection finds the most recent non-delta row within the bound
/// and coalesces to 0 when there is none, so an empty result means "resource
/// absent as of the bound".
pub async fn tail_chain(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
    at_or_before: Option<Timestamp>,
) -> StoreResult<Vec<CsetRow>> {
    let rows = match at_or_before {
        Some(bound) => {
            sqlx::query(
                "SELECT time, type, len FROM cset \
                 WHERE repo_id = ? AND hkey_id = ? AND time <= ? \
                   AND time >= COALESCE((SELECT time FROM cset \
                       WHERE repo_id = ? AND hkey_id = ? AND time <= ? AND type != ? \
                       ORDER BY time DESC LIMIT 1), 0) \
                 ORDER BY time",
            )
            .bind(repo_id)
            .bind(sha.as_bytes().to_vec())
            .bind(bound.epoch_secs())
            .bind(repo_id)
            .bind(sha.as_bytes().to_vec())
            .bind(bound.epoch_secs())
            .bind(ChangeKind::Delta.as_stored())
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT time, type, len FROM cset \
                 WHERE repo_id = ? AND hkey_id = ? \
                   AND time >= COALESCE((SELECT time FROM cset \
                       WHERE repo_id = ? AND hkey_id = ? AND type != ? \
                       ORDER BY time DESC LIMIT 1), 0) \
                 ORDER BY time",
            )
            .bind(repo_id)
            .bind(sha.as_bytes().to_vec())
            .bind(repo_id)
            .bind(sha.as_bytes().to_vec())
            .bind(ChangeKind::Delta.as_stored())
            .fetch_all(&mut *conn)
            .await?
        }
    };
    rows.iter().map(decode_row).collect()
}

/// The most recent row for `(repo, sha)`, used for monotonicity and
/// tombstone checks.
pub async fn last_entry(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
) -> StoreResult<Option<CsetRow>> {
    let row = sqlx::query(
        "SELECT time, type, len FROM cset WHERE repo_id = ? AND hkey_id = ? \
         ORDER BY time DESC LIMIT 1",
    )
    .bind(repo_id)
    .bind(sha.as_bytes().to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(decode_row).transpose()
}

/// Inserts exactly one row. A primary-key violation bubbles up as a database
/// error for the engine to classify (concurrent-push loser).
pub async fn append(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
    time: Timestamp,
    kind: ChangeKind,
    len: u64,
) -> StoreResult<()> {
    sqlx::query("INSERT INTO cset (repo_id, hkey_id, time, type, len) VALUES (?, ?, ?, ?, ?)")
        .bind(repo_id)
        .bind(sha.as_bytes().to_vec())
        .bind(time.epoch_secs())
        .bind(kind.as_stored())
        .bind(i64::try_from(len).unwrap_or(i64::MAX))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// All revision times for `(repo, sha)`, newest first.
pub async fn time_map(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
) -> StoreResult<Vec<Timestamp>> {
    let rows = sqlx::query(
        "SELECT time FROM cset WHERE repo_id = ? AND hkey_id = ? ORDER BY time DESC",
    )
    .bind(repo_id)
    .bind(sha.as_bytes().to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|row| Ok(Timestamp::from_epoch_secs(row.try_get("time")?)))
        .collect()
}

/// One page of resource keys live at `at_or_before`: keys whose most recent
/// changeset within the bound is not a tombstone. Ordered by hash for
/// deterministic pagination; `page` is 1-indexed.
pub async fn index_keys(
    conn: &mut AnyConnection,
    repo_id: i64,
    at_or_before: Timestamp,
    page: u64,
) -> StoreResult<Vec<String>> {
    let offset = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
    let rows = sqlx::query(
        "SELECT h.val FROM hmap h \
         JOIN (SELECT hkey_id, MAX(time) AS latest FROM cset \
               WHERE repo_id = ? AND time <= ? GROUP BY hkey_id) m \
           ON m.hkey_id = h.sha \
         JOIN cset c \
           ON c.repo_id = ? AND c.hkey_id = m.hkey_id AND c.time = m.latest \
         WHERE c.type != ? \
         ORDER BY h.sha \
         LIMIT ? OFFSET ?",
    )
    .bind(repo_id)
    .bind(at_or_before.epoch_secs())
    .bind(repo_id)
    .bind(ChangeKind::Delete.as_stored())
    .bind(i64::try_from(PAGE_SIZE).unwrap_or(i64::MAX))
    .bind(i64::try_from(offset).unwrap_or(i64::MAX))
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|row| Ok(row.try_get::<String, _>("val")?))
        .collect()
}
