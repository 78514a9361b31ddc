/// What a changeset row records about a resource at its timestamp.
///
/// A chain is a snapshot followed by zero or more deltas, or a lone delete;
/// chain walks dispatch on this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChangeKind {
    /// A full compressed serialization of the statement set.
    Snapshot = 0,

    /// A compressed `A `/`D ` patch against the preceding state.
    Delta = 1,

    /// A tombstone: the resource no longer exists as of this time. Carries
    /// no blob.
    Delete = 2,
}

impl ChangeKind {
    /// The integer stored in the `cset.type` column.
    #[inline]
    pub fn as_stored(self) -> i64 {
        self as i64
    }

    pub fn from_stored(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Snapshot),
            1 => Some(Self::Delta),
            2 => Some(Self::Delete),
            _ => None,
        }
    }
}
