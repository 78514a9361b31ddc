//! The revision engine: push, delete and point-in-time reconstruction.
//!
//! Every write appends one changeset row (and, except for tombstones, one
//! blob) to the chain of a `(repo, key)` pair. Reads walk the chain as of a
//! bound: decompress the base snapshot, apply the deltas behind it in time
//! order, join the surviving statements.

use sqlx::AnyConnection;
use sqlx::Connection as _;
use tracing::debug;

use tailr_types::{ChangeKind, KeySha, StatementSet, Timestamp};

use crate::cset::CsetRow;
use crate::error::is_unique_violation;
use crate::{blob, codec, cset, hmap, StoreError, StoreResult};

/// Snapshot factor.
///
/// For the latest snapshot `base` and subsequent deltas `d1 … dn`, a new
/// snapshot is forced once `SNAPF * len(base) <= len(d1) + … + len(dn)`.
/// Larger values mean longer delta chains: less storage, costlier
/// reconstruction. This bounds worst-case reconstruction work to a constant
/// multiple of the base snapshot's size.
pub const SNAPF: f64 = 10.0;

#[derive(thiserror::Error, Debug)]
pub enum RevisionError {
    /// No changeset exists at or before the requested time.
    #[error("no revision at or before the requested time")]
    NotFound,

    /// The resource was tombstoned as of the requested time.
    #[error("resource deleted as of {time}")]
    Gone { time: Timestamp },

    /// Delete requires a prior chain.
    #[error("cannot delete a resource that has no history")]
    NothingToDelete,

    /// Appended timestamps must be strictly increasing.
    #[error("timestamp {requested} must exceed the latest changeset at {latest}")]
    NonMonotonic {
        latest: Timestamp,
        requested: Timestamp,
    },

    /// A concurrent writer committed the same `(repo, key, time)` first.
    #[error("a changeset with the same timestamp was committed concurrently")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RevisionResult<T> = Result<T, RevisionError>;

/// A reconstructed resource state: the statement body plus the time of the
/// changeset that produced it (the Memento datetime).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub time: Timestamp,
    pub body: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// A new changeset row was appended, stored as the given kind.
    Written(ChangeKind),

    /// The pushed body parses to the current state; nothing was written.
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,

    /// The latest changeset already is a tombstone; nothing was written.
    AlreadyDeleted,
}

// --- Read path ---

/// Reconstructs the state of `key` as of `as_of`.
pub async fn reconstruct(
    conn: &mut AnyConnection,
    repo_id: i64,
    key: &str,
    as_of: Timestamp,
) -> RevisionResult<Revision> {
    let sha = KeySha::of(key);
    let chain = cset::tail_chain(conn, repo_id, &sha, Some(as_of)).await?;

    let Some((head, last)) = chain.first().zip(chain.last()) else {
        return Err(RevisionError::NotFound);
    };
    let (head, time) = (*head, last.time);

    if head.kind == ChangeKind::Delete {
        return Err(RevisionError::Gone { time });
    }

    if chain.len() == 1 {
        // The state is a single snapshot: return its payload verbatim.
        let data = blob::get(conn, repo_id, &sha, head.time)
            .await?
            .ok_or(StoreError::MissingBlob(head.time))?;
        let body = decode_text(&data)?;
        return Ok(Revision { time, body });
    }

    let stmts = replay(conn, repo_id, &sha, &chain).await?;
    debug!(
        kind = "reconstruct",
        key,
        as_of = %as_of,
        chain_len = chain.len(),
        statements = stmts.len(),
        "chain replayed"
    );
    Ok(Revision {
        time,
        body: stmts.to_body(),
    })
}

/// Replays a snapshot-headed chain into its statement set.
async fn replay(
    conn: &mut AnyConnection,
    repo_id: i64,
    sha: &KeySha,
    chain: &[CsetRow],
) -> StoreResult<StatementSet> {
    let times: Vec<Timestamp> = chain.iter().map(|row| row.time).collect();
    let blobs = blob::get_many(conn, repo_id, sha, &times).await?;

    if blobs.len() != times.len() {
        let missing = times
            .iter()
            .find(|t| !blobs.iter().any(|(bt, _)| bt == *t))
            .copied()
            .unwrap_or_else(|| Timestamp::from_epoch_secs(0));
        return Err(StoreError::MissingBlob(missing));
    }

    let mut stmts = StatementSet::default();
    for (i, (_, data)) in blobs.iter().enumerate() {
        let text = decode_text(data)?;
        if i == 0 {
            stmts = StatementSet::from_body(&text);
        } else {
            stmts.apply_patch(&text);
        }
    }
    Ok(stmts)
}

fn decode_text(data: &[u8]) -> StoreResult<String> {
    let bytes = codec::decompress(data).map_err(StoreError::Codec)?;
    String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8)
}

// --- Write path ---

/// Appends a new revision of `key` at `ts`, deciding between a full snapshot
/// and a forward delta against the current chain.
pub async fn push(
    conn: &mut AnyConnection,
    repo_id: i64,
    key: &str,
    ts: Timestamp,
    stmts: &StatementSet,
) -> RevisionResult<PushOutcome> {
    let sha = KeySha::of(key);
    let chain = cset::tail_chain(conn, repo_id, &sha, None).await?;

    if let Some(last) = chain.last() {
        if ts <= last.time {
            return Err(RevisionError::NonMonotonic {
                latest: last.time,
                requested: ts,
            });
        }
    }

    if chain.is_empty() {
        // First sight of this key anywhere: record the hash mapping.
        hmap::intern(conn, key).await?;
    }

    let snapshot = codec::compress(stmts.to_body().as_bytes()).map_err(StoreError::Codec)?;

    // A patch only exists against a live previous state. An empty chain or a
    // tombstoned head always stores a snapshot.
    let patch = match chain.first().map(|row| row.kind) {
        None | Some(ChangeKind::Delete) => None,
        _ => {
            let prev = replay(conn, repo_id, &sha, &chain).await?;
            if prev == *stmts {
                debug!(kind = "push", key, ts = %ts, "state unchanged, nothing written");
                return Ok(PushOutcome::Unchanged);
            }
            let diff = StatementSet::diff(&prev, stmts);
            Some(codec::compress(diff.as_bytes()).map_err(StoreError::Codec)?)
        }
    };

    let base_len = chain.first().map(|row| row.len).unwrap_or(0);
    let acc_len = chain.iter().skip(1).map(|row| row.len).sum::<u64>()
        + patch.as_ref().map(|p| p.len() as u64).unwrap_or(0);

    // Delta only when it is smaller than the snapshot and the chain has not
    // outgrown the base snapshot by the snapshot factor.
    let (change, payload) = match patch {
        Some(patch)
            if snapshot.len() > patch.len() && SNAPF * base_len as f64 > acc_len as f64 =>
        {
            (ChangeKind::Delta, patch)
        }
        _ => (ChangeKind::Snapshot, snapshot),
    };

    let len = payload.len() as u64;
    let mut tx = conn.begin().await.map_err(StoreError::Sql)?;
    blob::put(&mut tx, repo_id, &sha, ts, &payload).await?;
    match cset::append(&mut tx, repo_id, &sha, ts, change, len).await {
        Ok(()) => {}
        Err(StoreError::Sql(err)) if is_unique_violation(&err) => {
            return Err(RevisionError::Conflict);
        }
        Err(err) => return Err(err.into()),
    }
    tx.commit().await.map_err(StoreError::Sql)?;

    debug!(kind = "push", key, ts = %ts, change = ?change, len, "revision appended");
    Ok(PushOutcome::Written(change))
}

/// Appends a tombstone for `key` at `ts`.
pub async fn delete(
    conn: &mut AnyConnection,
    repo_id: i64,
    key: &str,
    ts: Timestamp,
) -> RevisionResult<DeleteOutcome> {
    let sha = KeySha::of(key);
    let Some(last) = cset::last_entry(conn, repo_id, &sha).await? else {
        return Err(RevisionError::NothingToDelete);
    };

    if ts <= last.time {
        return Err(RevisionError::NonMonotonic {
            latest: last.time,
            requested: ts,
        });
    }

    if last.kind == ChangeKind::Delete {
        return Ok(DeleteOutcome::AlreadyDeleted);
    }

    match cset::append(conn, repo_id, &sha, ts, ChangeKind::Delete, 0).await {
        Ok(()) => {}
        Err(StoreError::Sql(err)) if is_unique_violation(&err) => {
            return Err(RevisionError::Conflict);
        }
        Err(err) => return Err(err.into()),
    }

    debug!(kind = "delete", key, ts = %ts, "tombstone appended");
    Ok(DeleteOutcome::Deleted)
}
