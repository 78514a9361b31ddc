use sha1::{Digest as _, Sha1};

/// The 20-byte SHA-1 of a resource key's UTF-8 bytes.
///
/// Changesets and blobs are addressed by this hash; the authoritative
/// hash-to-key mapping lives in the `hmap` table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySha([u8; 20]);

impl KeySha {
    pub fn of(key: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        Self(hasher.finalize().into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Rebuilds a hash from its stored representation.
    ///
    /// Returns `None` unless `bytes` is exactly 20 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(bytes).ok().map(Self)
    }
}

impl std::fmt::Display for KeySha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for KeySha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySha({self})")
    }
}
