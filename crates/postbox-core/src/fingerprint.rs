//! Content fingerprints used to de-duplicate attachments.

use xxhash_rust::xxh64::xxh64;

/// Maps file content to a stable textual identifier.
pub trait Fingerprint: Send + Sync {
    fn fingerprint(&self, content: &[u8]) -> String;
}

/// 64-bit xxHash rendered as 16 lowercase hex characters (big-endian)
#[derive(Debug, Clone, Copy, Default)]
pub struct XxHash64Fingerprint {
    seed: u64,
}

impl XxHash64Fingerprint {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl Fingerprint for XxHash64Fingerprint {
    fn fingerprint(&self, content: &[u8]) -> String {
        hex::encode(xxh64(content, self.seed).to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest_of_empty_input() {
        let fp = XxHash64Fingerprint::default();
        assert_eq!(fp.fingerprint(b""), "ef46db3751d8e999");
    }

    #[test]
    fn test_same_content_same_fingerprint() {
        let fp = XxHash64Fingerprint::default();
        let a = fp.fingerprint(b"invoice-2024.pdf contents");
        let b = fp.fingerprint(b"invoice-2024.pdf contents");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_different_content_different_fingerprint() {
        let fp = XxHash64Fingerprint::default();
        assert_ne!(fp.fingerprint(b"alpha"), fp.fingerprint(b"beta"));
    }

    #[test]
    fn test_seed_changes_fingerprint() {
        let default = XxHash64Fingerprint::default();
        let seeded = XxHash64Fingerprint::with_seed(42);
        assert_ne!(default.fingerprint(b"alpha"), seeded.fingerprint(b"alpha"));
    }
}
