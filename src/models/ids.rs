//! Deterministic dataset fingerprints using SHA256 hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content hash of an uploaded file, used to tell cached datasets apart.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetFingerprint(String);

impl DatasetFingerprint {
    /// Hash the raw upload bytes. Keeps the first 16 hex characters.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let result = hasher.finalize();
        let hash = hex::encode(result);
        Self(hash[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DatasetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatasetFingerprint({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = DatasetFingerprint::of_bytes(b"Periode,SLA KEUANGAN\n2024-01,14:02\n");
        let b = DatasetFingerprint::of_bytes(b"Periode,SLA KEUANGAN\n2024-01,14:02\n");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_fingerprint_differs() {
        let a = DatasetFingerprint::of_bytes(b"one");
        let b = DatasetFingerprint::of_bytes(b"two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_hex() {
        let id = DatasetFingerprint::of_bytes(b"");
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(format!("{}", id), id.as_str());
    }
}
