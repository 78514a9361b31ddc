use tailr_types::KeySha;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Two distinct keys hashed to the same SHA-1. Not expected in practice,
    /// but the check is mandatory; surfaces as an internal server error.
    #[error("sha1 collision on {sha}: {existing:?} vs {candidate:?}")]
    HashCollision {
        sha: KeySha,
        existing: String,
        candidate: String,
    },

    #[error("corrupt blob payload: {0}")]
    Codec(#[source] std::io::Error),

    #[error("blob payload is not valid utf-8")]
    NotUtf8,

    #[error("no blob stored for the changeset at {0}")]
    MissingBlob(tailr_types::Timestamp),

    #[error("unknown changeset type {0} in cset row")]
    UnknownKind(i64),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// True when the error is the backend reporting a violated unique or
/// primary-key constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
