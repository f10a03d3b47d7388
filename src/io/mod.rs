//! # Input Inspection
//!
//! Lightweight readers for the two scheme files the builder needs to look
//! inside: the reference FASTA (single-record check, coordinate span) and
//! the primer region list (pool names only). Everything else about these
//! formats belongs to the external tools.

pub mod bed;
pub mod fasta;
