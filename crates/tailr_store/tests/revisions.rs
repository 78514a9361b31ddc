//! End-to-end coverage of the revision engine over an in-memory SQLite
//! database: push/delete/reconstruct, the snapshot-vs-delta policy, and the
//! index query.

use sqlx::AnyPool;

use tailr_rdf::MediaType;
use tailr_store::revision::{self, DeleteOutcome, PushOutcome, RevisionError, SNAPF};
use tailr_store::{accounts, blob, codec, cset, schema, StoreError};
use tailr_types::{ChangeKind, KeySha, StatementSet, Timestamp};

const KEY: &str = "http://dbpedia.org/resource/Berlin";

async fn test_pool() -> anyhow::Result<AnyPool> {
    let pool = tailr_store::connect("sqlite::memory:", 1).await?;
    let mut conn = pool.acquire().await?;
    schema::create_tables(&mut conn).await?;
    Ok(pool)
}

async fn fixture_repo(pool: &AnyPool) -> anyhow::Result<accounts::Repo> {
    let mut conn = pool.acquire().await?;
    let user = accounts::create_user(&mut conn, "alice").await?;
    let repo = accounts::create_repo(&mut conn, user.id, "places", "test fixture").await?;
    Ok(repo)
}

fn ts(s: &str) -> Timestamp {
    Timestamp::parse_qs(s).expect("test timestamp")
}

fn stmts(lines: &[&str]) -> StatementSet {
    lines.iter().map(|s| (*s).to_owned()).collect()
}

// --- Push + reconstruct ---

#[tokio::test]
async fn fresh_push_stores_a_snapshot() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let t1 = ts("2015-05-11-16:56:21");
    let body = tailr_rdf::parse(b"<a><b><c> .", MediaType::NTriples)?;
    let outcome = revision::push(&mut conn, repo.id, KEY, t1, &body).await?;
    assert_eq!(outcome, PushOutcome::Written(ChangeKind::Snapshot));

    let sha = KeySha::of(KEY);
    let chain = cset::tail_chain(&mut conn, repo.id, &sha, None).await?;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].kind, ChangeKind::Snapshot);
    assert!(blob::get(&mut conn, repo.id, &sha, t1).await?.is_some());

    let rev = revision::reconstruct(&mut conn, repo.id, KEY, ts("2015-05-11-17:00:00")).await?;
    assert_eq!(rev.body, "<a> <b> <c> .");
    assert_eq!(rev.time, t1);
    Ok(())
}

#[tokio::test]
async fn second_push_stores_a_set_diff_delta() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let t1 = ts("2015-05-11-16:56:21");
    let t2 = ts("2015-05-11-16:57:21");
    revision::push(
        &mut conn,
        repo.id,
        KEY,
        t1,
        &tailr_rdf::parse(b"<a><b><c> .", MediaType::NTriples)?,
    )
    .await?;
    let outcome = revision::push(
        &mut conn,
        repo.id,
        KEY,
        t2,
        &tailr_rdf::parse(b"<a><b><c> .\n<x><y><z> .", MediaType::NTriples)?,
    )
    .await?;
    assert_eq!(outcome, PushOutcome::Written(ChangeKind::Delta));

    // The delta payload is exactly the set difference, line-tagged.
    let sha = KeySha::of(KEY);
    let raw = blob::get(&mut conn, repo.id, &sha, t2)
        .await?
        .expect("delta blob");
    assert_eq!(codec::decompress(&raw)?, b"A <x> <y> <z> .");

    // Latest state has both statements; a read between the pushes only one.
    let now = revision::reconstruct(&mut conn, repo.id, KEY, ts("2015-05-11-18:00:00")).await?;
    assert_eq!(now.body, "<a> <b> <c> .\n<x> <y> <z> .");
    assert_eq!(now.time, t2);

    let before = revision::reconstruct(&mut conn, repo.id, KEY, ts("2015-05-11-16:56:30")).await?;
    assert_eq!(before.body, "<a> <b> <c> .");
    assert_eq!(before.time, t1);
    Ok(())
}

#[tokio::test]
async fn every_push_reconstructs_exactly() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let states = [
        stmts(&["<a> <b> <c> ."]),
        stmts(&["<a> <b> <c> .", "<d> <e> <f> .", "<g> <h> <i> ."]),
        stmts(&["<d> <e> <f> .", "<j> <k> <l> ."]),
    ];
    let times = [
        ts("2015-05-11-16:00:00"),
        ts("2015-05-11-16:10:00"),
        ts("2015-05-11-16:20:00"),
    ];
    for (state, time) in states.iter().zip(times) {
        revision::push(&mut conn, repo.id, KEY, time, state).await?;
    }

    for (state, time) in states.iter().zip(times) {
        // Exactly at the push time and anywhere before the next one.
        for offset in [0, 30] {
            let as_of = Timestamp::from_epoch_secs(time.epoch_secs() + offset);
            let rev = revision::reconstruct(&mut conn, repo.id, KEY, as_of).await?;
            assert_eq!(StatementSet::from_body(&rev.body), *state);
            assert_eq!(rev.time, time);
        }
    }
    Ok(())
}

#[tokio::test]
async fn unknown_key_is_not_found() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let err = revision::reconstruct(&mut conn, repo.id, KEY, Timestamp::now())
        .await
        .expect_err("nothing was pushed");
    assert!(matches!(err, RevisionError::NotFound));
    Ok(())
}

#[tokio::test]
async fn unchanged_push_writes_no_rows() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let t1 = ts("2015-05-11-16:56:21");
    revision::push(
        &mut conn,
        repo.id,
        KEY,
        t1,
        &tailr_rdf::parse(b"<a> <b> <c> .\n<x> <y> <z> .", MediaType::NTriples)?,
    )
    .await?;

    // Same set, different serialization order.
    let outcome = revision::push(
        &mut conn,
        repo.id,
        KEY,
        ts("2015-05-11-16:57:21"),
        &tailr_rdf::parse(b"<x> <y> <z> .\n<a><b><c> .", MediaType::NTriples)?,
    )
    .await?;
    assert_eq!(outcome, PushOutcome::Unchanged);

    let sha = KeySha::of(KEY);
    assert_eq!(cset::time_map(&mut conn, repo.id, &sha).await?, vec![t1]);
    Ok(())
}

#[tokio::test]
async fn non_monotonic_pushes_are_rejected() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let t1 = ts("2015-05-11-16:56:21");
    revision::push(&mut conn, repo.id, KEY, t1, &stmts(&["<a> <b> <c> ."])).await?;

    for earlier in ["2015-05-11-16:56:20", "2015-05-11-16:56:21"] {
        let err = revision::push(
            &mut conn,
            repo.id,
            KEY,
            ts(earlier),
            &stmts(&["<x> <y> <z> ."]),
        )
        .await
        .expect_err("must reject non-increasing timestamps");
        assert!(matches!(err, RevisionError::NonMonotonic { .. }));
    }

    // The chain is unchanged.
    let sha = KeySha::of(KEY);
    assert_eq!(cset::time_map(&mut conn, repo.id, &sha).await?, vec![t1]);
    Ok(())
}

// --- Deletes ---

#[tokio::test]
async fn delete_tombstones_then_recreate_snapshots() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;
    let sha = KeySha::of(KEY);

    revision::push(
        &mut conn,
        repo.id,
        KEY,
        ts("2015-05-11-16:56:21"),
        &stmts(&["<a> <b> <c> ."]),
    )
    .await?;

    let t_del = ts("2015-05-11-16:58:00");
    let outcome = revision::delete(&mut conn, repo.id, KEY, t_del).await?;
    assert_eq!(outcome, DeleteOutcome::Deleted);

    // Tombstone row: type DELETE, len 0, no blob.
    let last = cset::last_entry(&mut conn, repo.id, &sha)
        .await?
        .expect("tombstone row");
    assert_eq!(last.kind, ChangeKind::Delete);
    assert_eq!(last.len, 0);
    assert!(blob::get(&mut conn, repo.id, &sha, t_del).await?.is_none());

    // Reads after the tombstone are gone, carrying the tombstone time.
    let err = revision::reconstruct(&mut conn, repo.id, KEY, ts("2015-05-11-16:58:30"))
        .await
        .expect_err("tombstoned");
    assert!(matches!(err, RevisionError::Gone { time } if time == t_del));

    // Reads before it still see the old state.
    let rev = revision::reconstruct(&mut conn, repo.id, KEY, ts("2015-05-11-16:57:00")).await?;
    assert_eq!(rev.body, "<a> <b> <c> .");

    // Re-creating after a tombstone is a fresh snapshot, never a delta.
    let outcome = revision::push(
        &mut conn,
        repo.id,
        KEY,
        ts("2015-05-11-16:59:00"),
        &stmts(&["<a> <b> <c> ."]),
    )
    .await?;
    assert_eq!(outcome, PushOutcome::Written(ChangeKind::Snapshot));
    Ok(())
}

#[tokio::test]
async fn delete_without_history_is_rejected() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    // The source contract reports 400 here, not 404.
    let err = revision::delete(&mut conn, repo.id, KEY, Timestamp::now())
        .await
        .expect_err("nothing to delete");
    assert!(matches!(err, RevisionError::NothingToDelete));
    Ok(())
}

#[tokio::test]
async fn second_delete_is_a_noop() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;
    let sha = KeySha::of(KEY);

    revision::push(
        &mut conn,
        repo.id,
        KEY,
        ts("2015-05-11-16:56:21"),
        &stmts(&["<a> <b> <c> ."]),
    )
    .await?;
    revision::delete(&mut conn, repo.id, KEY, ts("2015-05-11-16:58:00")).await?;

    let outcome = revision::delete(&mut conn, repo.id, KEY, ts("2015-05-11-16:59:00")).await?;
    assert_eq!(outcome, DeleteOutcome::AlreadyDeleted);

    // Only one tombstone was inserted.
    let times = cset::time_map(&mut conn, repo.id, &sha).await?;
    assert_eq!(times.len(), 2);
    Ok(())
}

// --- Snapshot policy ---

#[tokio::test]
async fn delta_growth_forces_a_snapshot() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;
    let sha = KeySha::of(KEY);

    let mut lines = vec!["<http://example.org/s> <http://example.org/p> \"base\" .".to_owned()];
    revision::push(
        &mut conn,
        repo.id,
        KEY,
        Timestamp::from_epoch_secs(1_000_000),
        &lines.iter().cloned().collect(),
    )
    .await?;

    let mut promoted = false;
    for i in 0..50 {
        // Capture the chain before the push so the policy inputs are known.
        let chain = cset::tail_chain(&mut conn, repo.id, &sha, None).await?;
        let base_len = chain[0].len;
        let stored_deltas: u64 = chain.iter().skip(1).map(|row| row.len).sum();

        // While deltas accumulate, they stay within the snapshot factor.
        assert!(
            (stored_deltas as f64) < SNAPF * base_len as f64,
            "stored deltas outgrew the factor without a snapshot"
        );

        lines.push(format!(
            "<http://example.org/s> <http://example.org/p> \
             \"a-reasonably-long-distinct-literal-padding-the-delta-{i:04}\" ."
        ));
        let outcome = revision::push(
            &mut conn,
            repo.id,
            KEY,
            Timestamp::from_epoch_secs(1_000_000 + 60 * (i + 1)),
            &lines.iter().cloned().collect(),
        )
        .await?;

        if outcome == PushOutcome::Written(ChangeKind::Snapshot) {
            promoted = true;
            break;
        }
        assert_eq!(outcome, PushOutcome::Written(ChangeKind::Delta));
    }
    assert!(promoted, "no snapshot within 50 growing deltas");

    // After promotion the chain restarts at the new snapshot.
    let chain = cset::tail_chain(&mut conn, repo.id, &sha, None).await?;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].kind, ChangeKind::Snapshot);
    Ok(())
}

#[tokio::test]
async fn chains_are_snapshot_headed() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;
    let sha = KeySha::of(KEY);

    let mut lines = vec!["<a> <b> <c> .".to_owned()];
    for i in 0..5 {
        lines.push(format!("<x{i}> <y{i}> <z{i}> ."));
        revision::push(
            &mut conn,
            repo.id,
            KEY,
            Timestamp::from_epoch_secs(2_000_000 + i),
            &lines.iter().cloned().collect(),
        )
        .await?;
    }

    let chain = cset::tail_chain(&mut conn, repo.id, &sha, None).await?;
    assert_eq!(chain[0].kind, ChangeKind::Snapshot);
    assert!(chain[1..].iter().all(|row| row.kind == ChangeKind::Delta));
    Ok(())
}

// --- Key map ---

#[tokio::test]
async fn forged_hash_mapping_is_a_collision() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    // Plant a row claiming this key's hash belongs to a different key.
    let sha = KeySha::of(KEY);
    sqlx::query("INSERT INTO hmap (sha, val) VALUES (?, ?)")
        .bind(sha.as_bytes().to_vec())
        .bind("http://somewhere.else/entirely")
        .execute(&mut *conn)
        .await?;

    let err = revision::push(
        &mut conn,
        repo.id,
        KEY,
        Timestamp::now(),
        &stmts(&["<a> <b> <c> ."]),
    )
    .await
    .expect_err("collision must not be admitted");
    assert!(matches!(
        err,
        RevisionError::Store(StoreError::HashCollision { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn duplicate_changeset_time_violates_the_primary_key() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;
    let sha = KeySha::of(KEY);

    let t = Timestamp::from_epoch_secs(3_000_000);
    cset::append(&mut conn, repo.id, &sha, t, ChangeKind::Snapshot, 10).await?;
    let err = cset::append(&mut conn, repo.id, &sha, t, ChangeKind::Snapshot, 10)
        .await
        .expect_err("the (repo, key, time) primary key must hold");
    assert!(matches!(err, StoreError::Sql(_)));
    Ok(())
}

// --- Index ---

#[tokio::test]
async fn index_lists_live_keys_and_paginates() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let total: usize = 2500;
    let t_push = Timestamp::from_epoch_secs(4_000_000);
    for i in 0..total {
        let key = format!("http://example.org/resource/{i:04}");
        revision::push(
            &mut conn,
            repo.id,
            &key,
            t_push,
            &stmts(&["<a> <b> <c> ."]),
        )
        .await?;
    }

    // Tombstone a couple of keys afterwards.
    let t_del = Timestamp::from_epoch_secs(4_000_100);
    for i in [7usize, 1700] {
        let key = format!("http://example.org/resource/{i:04}");
        revision::delete(&mut conn, repo.id, &key, t_del).await?;
    }

    let now = Timestamp::from_epoch_secs(4_000_200);
    let mut seen = std::collections::BTreeSet::new();
    let mut page_sizes = Vec::new();
    for page in 1..=4 {
        let keys = cset::index_keys(&mut conn, repo.id, now, page).await?;
        page_sizes.push(keys.len());
        seen.extend(keys);
    }
    assert_eq!(page_sizes, vec![1000, 1000, 498, 0]);
    assert_eq!(seen.len(), total - 2);
    assert!(!seen.contains("http://example.org/resource/0007"));
    assert!(!seen.contains("http://example.org/resource/1700"));

    // As of a time before the deletes, everything is live.
    let mut live_before = 0;
    for page in 1..=3 {
        live_before += cset::index_keys(&mut conn, repo.id, t_push, page)
            .await?
            .len();
    }
    assert_eq!(live_before, total);
    Ok(())
}

#[tokio::test]
async fn index_agrees_with_reconstruction() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = fixture_repo(&pool).await?;
    let mut conn = pool.acquire().await?;

    let keys = ["http://ex/a", "http://ex/b", "http://ex/c"];
    let t = Timestamp::from_epoch_secs(5_000_000);
    for key in keys {
        revision::push(&mut conn, repo.id, key, t, &stmts(&["<a> <b> <c> ."])).await?;
    }
    revision::delete(&mut conn, repo.id, "http://ex/b", Timestamp::from_epoch_secs(5_000_100))
        .await?;

    let as_of = Timestamp::from_epoch_secs(5_000_200);
    let listed = cset::index_keys(&mut conn, repo.id, as_of, 1).await?;

    for key in keys {
        let reconstructs = revision::reconstruct(&mut conn, repo.id, key, as_of)
            .await
            .is_ok();
        assert_eq!(
            listed.contains(&key.to_owned()),
            reconstructs,
            "index and reconstruction disagree on {key}"
        );
    }
    Ok(())
}
