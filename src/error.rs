//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.
//!
//! Every failure class here is fatal: the pipeline favors fail-fast over
//! partial output, because downstream steps consume upstream files by name
//! convention and a half-written intermediate is worse than none. Process
//! exit codes are mapped in exactly one place (`exit_code`) and applied only
//! at the outermost boundary in `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rartic operations
#[derive(Error, Debug)]
pub enum RarticError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (invalid CLI argument combinations)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The remote scheme manifest could not be fetched or parsed
    #[error("Manifest error: {message}")]
    ManifestUnavailable { message: String },

    /// The requested scheme matches no manifest key or alias
    #[error("Requested scheme {scheme} could not be found")]
    SchemeNotFound { scheme: String },

    /// A downloaded scheme file failed SHA-256 verification
    #[error("sha256 hash for {path} does not match manifest")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A scheme file download failed
    #[error("Download failed for {url}: {message}")]
    Download { url: String, message: String },

    /// The reference FASTA had zero or multiple sequence records
    #[error("Invalid reference: {message}")]
    InvalidReference { message: String },

    /// Region-list parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An external pipeline step reported failure
    #[error("Command failed at step {position}: {step}")]
    StepFailed { position: usize, step: String },
}

/// Type alias for Results using RarticError
pub type Result<T> = std::result::Result<T, RarticError>;

impl RarticError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a manifest error
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::ManifestUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid-reference error
    pub fn reference(message: impl Into<String>) -> Self {
        Self::InvalidReference {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Process exit code reported for this error at the binary boundary.
    ///
    /// 1 = configuration/validation, 2 = remote scheme acquisition,
    /// 20 = external step failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ManifestUnavailable { .. } | Self::Download { .. } => 2,
            Self::StepFailed { .. } => 20,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_failure_class() {
        assert_eq!(RarticError::config("x").exit_code(), 1);
        assert_eq!(RarticError::manifest("down").exit_code(), 2);
        assert_eq!(
            RarticError::Download {
                url: "http://example/ref.fasta".into(),
                message: "timeout".into(),
            }
            .exit_code(),
            2
        );
        assert_eq!(
            RarticError::StepFailed {
                position: 3,
                step: "samtools index s.bam".into(),
            }
            .exit_code(),
            20
        );
        assert_eq!(
            RarticError::SchemeNotFound {
                scheme: "nCoV-2019".into()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn step_failure_reports_position_and_step() {
        let err = RarticError::StepFailed {
            position: 3,
            step: "samtools index s.bam".into(),
        };
        let text = err.to_string();
        assert!(text.contains("step 3"), "unexpected message: {text}");
        assert!(text.contains("samtools index"), "unexpected message: {text}");
    }
}
