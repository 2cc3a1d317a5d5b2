use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

/// Checksummed wrapper for cached dashboard summaries.
///
/// Summary payloads sit in the moka cache between recomputations. Each entry
/// carries a SHA-256 checksum of its JSON body; a mismatch on read is treated
/// as a corrupted entry and forces a recompute instead of serving bad counts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SealedEntry {
    /// JSON body of the cached value.
    pub data: String,
    /// SHA-256 checksum of `data`, hex encoded.
    pub checksum: String,
}

impl SealedEntry {
    fn checksum_of(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Serialize a value into a sealed cache string.
    ///
    /// Returns None if the value cannot be serialized; callers then skip
    /// caching and serve the freshly computed value.
    pub fn seal<T: Serialize>(value: &T) -> Option<String> {
        let data = serde_json::to_string(value).ok()?;
        let entry = SealedEntry {
            checksum: Self::checksum_of(&data),
            data,
        };
        serde_json::to_string(&entry).ok()
    }

    /// Deserialize and verify a sealed cache string.
    ///
    /// Returns None when the entry is not valid JSON or its checksum does not
    /// match, in which case the caller recomputes from the database.
    pub fn open<T: DeserializeOwned>(sealed: &str) -> Option<T> {
        let entry: SealedEntry = serde_json::from_str(sealed).ok()?;
        if Self::checksum_of(&entry.data) != entry.checksum {
            tracing::warn!(
                "Summary cache checksum mismatch (expected {}, {} bytes); recomputing",
                entry.checksum,
                entry.data.len()
            );
            return None;
        }
        serde_json::from_str(&entry.data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LeadSummary;

    #[test]
    fn seal_then_open_round_trips() {
        let summary = LeadSummary {
            genuine: 7,
            duplicate: 2,
            matched: 1,
        };

        let sealed = SealedEntry::seal(&summary).expect("seal");
        let opened: LeadSummary = SealedEntry::open(&sealed).expect("open");

        assert_eq!(opened, summary);
    }

    #[test]
    fn tampered_entry_is_rejected() {
        let summary = LeadSummary {
            genuine: 7,
            duplicate: 2,
            matched: 1,
        };

        let sealed = SealedEntry::seal(&summary).expect("seal");
        let tampered = sealed.replace("\\\"genuine\\\":7", "\\\"genuine\\\":99");

        let opened: Option<LeadSummary> = SealedEntry::open(&tampered);
        assert!(opened.is_none());
    }

    #[test]
    fn garbage_entry_is_rejected() {
        let opened: Option<LeadSummary> = SealedEntry::open("not json at all");
        assert!(opened.is_none());
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = SealedEntry::checksum_of("counts");
        let b = SealedEntry::checksum_of("counts");
        assert_eq!(a, b);
    }
}
