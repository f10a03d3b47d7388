//! # rartic Library Root
//!
//! Rust reimplementation of the ARTIC MinION amplicon consensus workflow:
//! resolve a versioned primer scheme, build the ordered analysis pipeline
//! from the run configuration, and execute it against the external
//! bioinformatics toolchain.
//!
//! ## Module Structure
//! ```text
//! rartic
//! ├── config     # CLI options and cross-field validation
//! ├── error      # Unified error type and exit-code mapping
//! ├── io         # Reference FASTA and region-list inspection
//! ├── pipelines  # Step model, pipeline builder, sequential executor
//! └── scheme     # Primer scheme acquisition and verification
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pipelines;
pub mod scheme;

pub use config::{Aligner, Config, Workflow};
pub use error::{RarticError, Result};
pub use pipelines::MinionPipeline;
