//! The authoritative SHA-1 to key mapping.
//!
//! One row per distinct key ever pushed, across all repos. Interning is the
//! only write path; the index query joins against `hmap` to turn hashes back
//! into keys.

use sqlx::AnyConnection;
use sqlx::Row as _;

use tailr_types::KeySha;

use crate::error::is_unique_violation;
use crate::{StoreError, StoreResult};

/// Upper bound on key length, matching the `hmap.val` column.
pub const MAX_KEY_BYTES: usize = 2048;

/// Ensures the `sha -> key` mapping exists and returns the hash.
///
/// On a duplicate insert the stored value is re-read and compared: equal
/// means another writer got there first (fine), different means an actual
/// SHA-1 collision ([`StoreError::HashCollision`]).
pub async fn intern(conn: &mut AnyConnection, key: &str) -> StoreResult<KeySha> {
    let sha = KeySha::of(key);
    let inserted = sqlx::query("INSERT INTO hmap (sha, val) VALUES (?, ?)")
        .bind(sha.as_bytes().to_vec())
        .bind(key)
        .execute(&mut *conn)
        .await;

    match inserted {
        Ok(_) => Ok(sha),
        Err(err) if is_unique_violation(&err) => {
            let row = sqlx::query("SELECT val FROM hmap WHERE sha = ?")
                .bind(sha.as_bytes().to_vec())
                .fetch_optional(&mut *conn)
                .await?;
            let existing: String = match row {
                Some(row) => row.try_get("val")?,
                // The conflicting row vanished between the two statements;
                // report the original failure.
                None => return Err(StoreError::Sql(err)),
            };
            if existing == key {
                Ok(sha)
            } else {
                Err(StoreError::HashCollision {
                    sha,
                    existing,
                    candidate: key.to_owned(),
                })
            }
        }
        Err(err) => Err(err.into()),
    }
}
