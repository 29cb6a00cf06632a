//! Hashing helpers for file digests, manifest rows and build
//! fingerprints.

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Hex SHA256 digest of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA256 digest in the urlsafe-base64-without-padding form archive
/// manifests use.
pub fn record_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Rolls structured fields into one short digest.
///
/// Field values are marked and separated so that adjacent fields
/// cannot collide (`"ab" + "c"` hashes differently from `"a" + "bc"`).
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mix in a string field.
    pub fn update_str(&mut self, s: &str) {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
    }

    /// Mix in a sequence of string fields.
    pub fn update_strs(&mut self, strs: &[String]) {
        for s in strs {
            self.update_str(s);
        }
    }

    /// Mix in an optional field, distinguishing `None` from `Some("")`.
    pub fn update_opt(&mut self, opt: Option<&str>) {
        self.hasher.update([opt.is_some() as u8]);
        if let Some(s) = opt {
            self.update_str(s);
        }
    }

    /// Mix in a boolean field.
    pub fn update_bool(&mut self, b: bool) {
        self.hasher.update([b as u8]);
    }

    /// Finalize to a short (16 hex char) digest.
    pub fn finish_short(self) -> String {
        let mut hex = hex::encode(self.hasher.finalize());
        hex.truncate(16);
        hex
    }
}
