//! # Remote Scheme Manifest
//!
//! The manifest is a single JSON document listing every published primer
//! scheme: canonical name, aliases, latest version, and per-version download
//! URLs plus SHA-256 checksums. It is fetched fresh on every resolution that
//! needs the network and never cached across runs, so a republished scheme
//! is picked up immediately.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{RarticError, Result};

/// Well-known manifest location.
pub const MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/artic-network/primer-schemes/master/schemes_manifest.json";

/// Top-level manifest document
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub schemes: HashMap<String, SchemeEntry>,
}

/// One published scheme's metadata
#[derive(Debug, Clone, Deserialize)]
pub struct SchemeEntry {
    #[serde(default)]
    pub aliases: Vec<String>,
    pub latest_version: String,
    pub primer_urls: HashMap<String, String>,
    pub reference_urls: HashMap<String, String>,
    pub primer_sha256_checksums: HashMap<String, String>,
    pub reference_sha256_checksums: HashMap<String, String>,
}

/// Download URLs and checksums for one concrete scheme version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionArtifacts {
    pub primer_url: String,
    pub reference_url: String,
    pub primer_sha256: String,
    pub reference_sha256: String,
}

impl Manifest {
    /// Fetch and parse the manifest. Any request or decode failure is fatal;
    /// there is no retry.
    pub fn fetch(url: &str) -> Result<Self> {
        let response = reqwest::blocking::get(url)
            .map_err(|e| RarticError::manifest(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(RarticError::manifest(format!(
                "HTTP {} fetching {url}",
                response.status()
            )));
        }
        response
            .json::<Manifest>()
            .map_err(|e| RarticError::manifest(format!("unparseable manifest: {e}")))
    }

    /// Match a scheme name case-insensitively against manifest keys and
    /// alias sets. Returns the canonical key and its entry.
    pub fn find(&self, name: &str) -> Option<(&str, &SchemeEntry)> {
        let wanted = name.to_lowercase();
        self.schemes
            .iter()
            .find(|(key, entry)| {
                key.to_lowercase() == wanted
                    || entry.aliases.iter().any(|a| a.to_lowercase() == wanted)
            })
            .map(|(key, entry)| (key.as_str(), entry))
    }
}

impl SchemeEntry {
    /// Whether `version` is a published version of this scheme.
    pub fn has_version(&self, version: &str) -> bool {
        self.primer_urls.contains_key(version)
    }

    /// Resolve a version to its URLs and checksums. A version key must be
    /// present in all four per-version maps; a manifest violating that is
    /// reported as unusable rather than partially applied.
    pub fn artifacts(&self, version: &str) -> Result<VersionArtifacts> {
        let lookup = |map: &HashMap<String, String>, field: &str| -> Result<String> {
            map.get(version).cloned().ok_or_else(|| {
                RarticError::manifest(format!("version {version} missing from {field}"))
            })
        };
        Ok(VersionArtifacts {
            primer_url: lookup(&self.primer_urls, "primer_urls")?,
            reference_url: lookup(&self.reference_urls, "reference_urls")?,
            primer_sha256: lookup(&self.primer_sha256_checksums, "primer_sha256_checksums")?,
            reference_sha256: lookup(
                &self.reference_sha256_checksums,
                "reference_sha256_checksums",
            )?,
        })
    }
}
