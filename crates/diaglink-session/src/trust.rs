//! Companion trust verification.
//!
//! The companion is trusted when the SHA-1 fingerprint of its signing
//! credential is in a known-good list. Any failure to obtain or hash the
//! credential simply means "not available".

use std::{collections::HashSet, io::ErrorKind, path::PathBuf, sync::Arc};

use diaglink_core::{CredentialError, CredentialSource};
use sha1::{Digest, Sha1};

/// Fingerprints of the official companion builds.
pub const COMPANION_FINGERPRINTS: &[&str] = &[
    "c1f285f69cc02a397135ed182aa79af53d5d20a1",
    "234eff4a1600a7aa78bf68adfbb15786e886ae1a",
];

/// Checks the installed companion against an allow-list.
pub struct TrustVerifier {
    source: Arc<dyn CredentialSource>,
    allowed: HashSet<String>,
}

impl TrustVerifier {
    /// Create a verifier with an explicit allow-list.
    #[must_use]
    pub fn new<I>(source: Arc<dyn CredentialSource>, fingerprints: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            source,
            allowed: fingerprints
                .into_iter()
                .map(|f| f.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Create a verifier trusting the official companion builds.
    #[must_use]
    pub fn with_builtin(source: Arc<dyn CredentialSource>) -> Self {
        Self::new(source, COMPANION_FINGERPRINTS)
    }

    /// Lowercase hex SHA-1 of `credential`.
    #[must_use]
    pub fn fingerprint(credential: &[u8]) -> String {
        hex::encode(Sha1::digest(credential))
    }

    /// Whether a trusted companion is installed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        let credential = match self.source.companion_credential() {
            Ok(credential) => credential,
            Err(CredentialError::NotInstalled) => {
                tracing::debug!("Companion is not installed");
                return false;
            }
            Err(e) => {
                tracing::warn!("Failed to read companion credential: {e}");
                return false;
            }
        };

        let fingerprint = Self::fingerprint(&credential);
        let trusted = self.allowed.contains(&fingerprint);
        if !trusted {
            tracing::debug!(%fingerprint, "Companion credential is not trusted");
        }
        trusted
    }
}

/// Reads the companion credential from a file.
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    path: PathBuf,
}

impl FileCredentialSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialSource for FileCredentialSource {
    fn companion_credential(&self) -> Result<Vec<u8>, CredentialError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Err(CredentialError::Unreadable(format!(
                "{} is empty",
                self.path.display()
            ))),
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CredentialError::NotInstalled),
            Err(e) => Err(CredentialError::Unreadable(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCredentials;

    #[test]
    fn test_fingerprint_is_sha1_hex() {
        assert_eq!(
            TrustVerifier::fingerprint(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_allow_list_membership() {
        let trusted = TrustVerifier::new(
            FakeCredentials::with(b"abc"),
            ["A9993E364706816ABA3E25717850C26C9CD0D89D"],
        );
        assert!(trusted.is_available());

        let untrusted = TrustVerifier::with_builtin(FakeCredentials::with(b"abc"));
        assert!(!untrusted.is_available());
    }

    #[test]
    fn test_missing_or_unreadable_credential_is_unavailable() {
        let missing = TrustVerifier::new(FakeCredentials::missing(), ["anything"]);
        assert!(!missing.is_available());

        let unreadable = TrustVerifier::new(FakeCredentials::unreadable(), ["anything"]);
        assert!(!unreadable.is_available());
    }

    #[test]
    fn test_file_credential_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.cred");

        let source = FileCredentialSource::new(&path);
        assert!(matches!(
            source.companion_credential(),
            Err(CredentialError::NotInstalled)
        ));

        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            source.companion_credential(),
            Err(CredentialError::Unreadable(_))
        ));

        std::fs::write(&path, b"abc").unwrap();
        let verifier = TrustVerifier::new(
            Arc::new(source),
            ["a9993e364706816aba3e25717850c26c9cd0d89d"],
        );
        assert!(verifier.is_available());
    }
}
