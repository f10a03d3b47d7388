//! # Primer Region List Access
//!
//! Only the pool column is read here; primer geometry, normalisation, and
//! trimming semantics belong to the external tools that consume the BED
//! directly. The pool set always derives from the untrimmed region list.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{RarticError, Result};

/// Zero-based column of the pool name in a primer scheme BED row
/// (chrom, start, end, primer id, pool).
const POOL_COLUMN: usize = 4;

/// Collect the distinct primer pool names. A `BTreeSet` gives the stable
/// sorted enumeration the per-pool fan-out relies on for reproducible step
/// ordering.
pub fn primer_pools(path: &Path) -> Result<BTreeSet<String>> {
    let text = fs::read_to_string(path)?;
    let mut pools = BTreeSet::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let pool = line.split('\t').nth(POOL_COLUMN).ok_or_else(|| {
            RarticError::parse(
                idx + 1,
                format!(
                    "expected at least {} tab-separated fields in region list",
                    POOL_COLUMN + 1
                ),
            )
        })?;
        pools.insert(pool.to_string());
    }

    Ok(pools)
}
