//! # Configuration Logic
//!
//! CLI argument parsing and validation.
//!
//! The full set of recognized workflow options lives in one `clap`-derived
//! struct. Cross-field invariants (a medaka run carries a model, a nanopolish
//! run carries its signal-level inputs, the read file exists) are enforced by
//! `validate` before any scheme resolution or step execution happens, so a
//! bad invocation never touches the network or spawns a process.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::{RarticError, Result};

/// Variant-calling workflow selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// Signal-level calling from FAST5 data
    Nanopolish,
    /// Neural-network calling from basecalled reads
    Medaka,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Workflow::Nanopolish => "nanopolish",
            Workflow::Medaka => "medaka",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read aligner selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aligner {
    Minimap2,
    Bwa,
}

impl Aligner {
    pub fn as_str(self) -> &'static str {
        match self {
            Aligner::Minimap2 => "minimap2",
            Aligner::Bwa => "bwa",
        }
    }
}

impl fmt::Display for Aligner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run configuration for the consensus pipeline
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rartic",
    about = "Amplicon consensus pipeline for nanopore sequencing",
    version
)]
pub struct Config {
    /// Primer scheme name, optionally version-qualified (e.g. nCoV-2019/V3)
    pub scheme: String,

    /// Sample name; prefixes every output file
    pub sample: String,

    /// Directory holding (or receiving) primer schemes
    #[arg(long, default_value = "primer-schemes")]
    pub scheme_directory: PathBuf,

    /// Primer scheme version ("0" selects the latest manifest version)
    #[arg(long, default_value = "1")]
    pub scheme_version: String,

    /// Basecalled read file [default: <sample>.fasta]
    #[arg(long)]
    pub read_file: Option<PathBuf>,

    /// Variant-calling workflow
    #[arg(long, value_enum, default_value_t = Workflow::Nanopolish)]
    pub workflow: Workflow,

    /// Medaka model name (required with the medaka workflow)
    #[arg(long)]
    pub medaka_model: Option<String>,

    /// Skip the nanopolish indexing pass
    #[arg(long)]
    pub skip_nanopolish: bool,

    /// FAST5 directory for nanopolish
    #[arg(long)]
    pub fast5_directory: Option<PathBuf>,

    /// Sequencing summary for nanopolish
    #[arg(long)]
    pub sequencing_summary: Option<PathBuf>,

    /// Derive a pseudo reference first for samples highly divergent
    /// from the scheme reference
    #[arg(long)]
    pub divergent: bool,

    /// Apply strict primer-site and overlap filtering, and emit a QC report
    #[arg(long)]
    pub strict: bool,

    /// Restrict calling to SNPs
    #[arg(long)]
    pub no_indels: bool,

    /// Drop frameshift-introducing indels from the PASS set
    #[arg(long)]
    pub no_frameshifts: bool,

    /// Skip longshot refinement of the merged calls (medaka workflow)
    #[arg(long)]
    pub no_longshot: bool,

    /// Normalise coverage to this depth during primer trimming
    #[arg(long)]
    pub normalise: Option<u32>,

    /// Read aligner
    #[arg(long, value_enum, default_value_t = Aligner::Minimap2)]
    pub aligner: Aligner,

    /// Threads handed to external tools
    #[arg(long, default_value_t = 8)]
    pub threads: u32,

    /// Maximum haplotypes considered by nanopolish
    #[arg(long, default_value_t = 1_000_000)]
    pub max_haplotypes: u32,

    /// Print and log the commands without executing them
    #[arg(long)]
    pub dry_run: bool,
}

impl Config {
    /// Parse the command line and apply cross-field validation.
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// The read file in effect: the explicit `--read-file`, or `<sample>.fasta`.
    pub fn reads(&self) -> PathBuf {
        self.read_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.fasta", self.sample)))
    }

    /// Enforce the option combinations the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.workflow == Workflow::Medaka && self.medaka_model.is_none() {
            return Err(RarticError::config(
                "Must specify --medaka-model with the medaka workflow",
            ));
        }
        if self.workflow == Workflow::Nanopolish
            && !self.skip_nanopolish
            && (self.fast5_directory.is_none() || self.sequencing_summary.is_none())
        {
            return Err(RarticError::config(
                "Must specify --fast5-directory and --sequencing-summary for the \
                 nanopolish workflow",
            ));
        }
        if self.normalise == Some(0) {
            return Err(RarticError::config("--normalise must be positive"));
        }
        if self.threads == 0 {
            return Err(RarticError::config("--threads must be positive"));
        }
        let reads = self.reads();
        if !reads.exists() {
            return Err(RarticError::config(format!(
                "failed to find read-file: {}",
                reads.display()
            )));
        }
        Ok(())
    }
}
