//! # Reference FASTA Inspection
//!
//! Uses the `bio` crate for FASTA parsing.

use std::fs::File;
use std::path::Path;

use bio::io::fasta;

use crate::error::{RarticError, Result};

/// Check that the reference contains exactly one sequence and derive its
/// coordinate span in the `"<id>:1-<length+1>"` form nanopolish takes as a
/// calling window. An ambiguous (multi-record) reference is never tolerated.
pub fn reference_span(path: &Path) -> Result<String> {
    let reader = fasta::Reader::new(File::open(path)?);
    let mut records = reader.records();

    let first = match records.next() {
        Some(record) => record?,
        None => {
            return Err(RarticError::reference(format!(
                "{} contains no sequence records",
                path.display()
            )))
        }
    };
    if records.next().is_some() {
        return Err(RarticError::reference(format!(
            "{} contains more than one sequence",
            path.display()
        )));
    }

    Ok(format!("{}:1-{}", first.id(), first.seq().len() + 1))
}
