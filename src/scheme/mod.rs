//! # Primer Scheme Acquisition
//!
//! Resolves a named, versioned primer scheme to local files: the region list
//! (`<name>.primer.bed`) and the reference sequence
//! (`<name>.reference.fasta`). Resolution is local-first: a scheme already
//! present in the cache directory is trusted unconditionally and returned
//! without touching the network. Otherwise the remote manifest is consulted,
//! both files are downloaded, and their SHA-256 digests are verified against
//! the manifest before the scheme is handed to callers.

pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{RarticError, Result};
use self::manifest::Manifest;

/// Version sentinel requesting the newest published version.
pub const LATEST: &str = "0";

/// A resolved primer scheme. Both paths exist at construction time;
/// the value is immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeRef {
    pub name: String,
    pub version: String,
    pub bed: PathBuf,
    pub reference: PathBuf,
}

/// Resolve `name` (optionally version-qualified as `<name>/V<version>`) to a
/// local scheme, downloading and verifying it on first use.
pub fn resolve(name: &str, directory: &Path, version: &str) -> Result<SchemeRef> {
    // A version embedded in the name takes priority over the flag.
    let (name, mut version) = match name.split_once("/V") {
        Some((base, embedded)) => (base.to_string(), embedded.to_string()),
        None => (name.to_string(), version.to_string()),
    };

    let (bed, reference) = scheme_paths(directory, &name, &version);
    if bed.exists() && reference.exists() {
        debug!(scheme = %name, version = %version, "using cached primer scheme");
        return Ok(SchemeRef {
            name,
            version,
            bed,
            reference,
        });
    }

    warn!("could not find primer scheme and reference sequence, downloading");
    let manifest = Manifest::fetch(manifest::MANIFEST_URL)?;
    let (key, entry) = manifest
        .find(&name)
        .ok_or_else(|| RarticError::SchemeNotFound {
            scheme: name.clone(),
        })?;
    info!(scheme = key, requested = %name, "found requested scheme");

    if version == LATEST {
        info!(
            scheme = key,
            latest = %entry.latest_version,
            "resolving latest version"
        );
        version = entry.latest_version.clone();
    } else if !entry.has_version(&version) {
        warn!(
            requested = %version,
            latest = %entry.latest_version,
            "requested scheme version not found; using latest version"
        );
        version = entry.latest_version.clone();
    }

    let (bed, reference) = scheme_paths(directory, &name, &version);
    let artifacts = entry.artifacts(&version)?;
    download(&artifacts.primer_url, &bed)?;
    download(&artifacts.reference_url, &reference)?;
    verify_sha256(&bed, &artifacts.primer_sha256)?;
    verify_sha256(&reference, &artifacts.reference_sha256)?;

    Ok(SchemeRef {
        name,
        version,
        bed,
        reference,
    })
}

/// Cache locations for one scheme version:
/// `<directory>/<name>/V<version>/<name>.primer.bed` and
/// `<directory>/<name>/V<version>/<name>.reference.fasta`.
fn scheme_paths(directory: &Path, name: &str, version: &str) -> (PathBuf, PathBuf) {
    let dir = directory.join(name).join(format!("V{version}"));
    (
        dir.join(format!("{name}.primer.bed")),
        dir.join(format!("{name}.reference.fasta")),
    )
}

fn download(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let failed = |message: String| RarticError::Download {
        url: url.to_string(),
        message,
    };
    let response = reqwest::blocking::get(url).map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    let body = response.text().map_err(|e| failed(e.to_string()))?;
    fs::write(dest, body)?;
    debug!(url, dest = %dest.display(), "downloaded scheme file");
    Ok(())
}

fn sha256_hex(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Compare a downloaded file against its manifest digest. On mismatch the
/// file is removed so a later run cannot pick it up as a trusted cache hit.
fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_hex(path)?;
    if actual != expected {
        let _ = fs::remove_file(path);
        return Err(RarticError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
