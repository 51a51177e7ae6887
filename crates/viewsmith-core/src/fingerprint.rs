//! Artifact fingerprints: staleness detection for cached render output.
//!
//! A fingerprint is the exact size/mtime tuple of every constituent artifact
//! plus a flag for server-script presence. Two fingerprints are equal iff
//! every constituent matches exactly; there is no tolerance window.

use sha2::{Digest, Sha256};

use crate::manifest::{ArtifactDescriptor, ViewArtifacts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    client: (u64, u64),
    stylesheet: Option<(u64, u64)>,
    server: Option<(u64, u64)>,
    has_server: bool,
}

fn constituent(descriptor: &ArtifactDescriptor) -> (u64, u64) {
    (descriptor.len, descriptor.mtime_ms)
}

impl Fingerprint {
    pub fn of(artifacts: &ViewArtifacts) -> Self {
        Self {
            client: constituent(&artifacts.client),
            stylesheet: artifacts.stylesheet.as_ref().map(constituent),
            server: artifacts.server.as_ref().map(constituent),
            has_server: artifacts.server.is_some(),
        }
    }

    /// Short hex digest for log lines and cache diagnostics.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        let mut feed = |tuple: Option<(u64, u64)>| {
            match tuple {
                Some((len, mtime)) => {
                    hasher.update([1u8]);
                    hasher.update(len.to_le_bytes());
                    hasher.update(mtime.to_le_bytes());
                }
                None => hasher.update([0u8]),
            };
        };
        feed(Some(self.client));
        feed(self.stylesheet);
        feed(self.server);
        hasher.update([self.has_server as u8]);
        hex::encode(&hasher.finalize()[..8])
    }
}
