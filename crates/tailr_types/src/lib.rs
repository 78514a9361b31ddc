//! Shared vocabulary for the tailr versioned resource store.
//!
//! Everything downstream of the parser treats a resource state as an opaque
//! set of statement lines ([`StatementSet`]); the storage layer addresses
//! resources by the SHA-1 of their key ([`KeySha`]) and orders revisions by
//! second-resolution UTC timestamps ([`Timestamp`]).

mod change;
mod key;
mod statements;
mod timestamp;

pub use self::change::ChangeKind;
pub use self::key::KeySha;
pub use self::statements::StatementSet;
pub use self::timestamp::{Timestamp, TimestampParseError};
