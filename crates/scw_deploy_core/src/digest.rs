use std::fmt;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a packaged archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveDigest(String);

impl ArchiveDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn digest(bytes: &[u8]) -> ArchiveDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ArchiveDigest(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_sha256_vector() {
        assert_eq!(
            digest(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn single_byte_change_changes_digest() {
        let original = digest(b"def handle(event, context):\n    return 1\n");
        let changed = digest(b"def handle(event, context):\n    return 2\n");

        assert_eq!(original.as_str().len(), 64);
        assert_ne!(original, changed);
        assert_eq!(
            original,
            digest(b"def handle(event, context):\n    return 1\n")
        );
    }
}
