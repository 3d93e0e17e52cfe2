//! Document identifiers and sharded-path utilities.
//!
//! Every patient, medicine and prescription in the dispensary is identified by a UUID held in a
//! *canonical* representation: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`DocumentId`], a wrapper that guarantees the canonical format once constructed.
//! - Sharding logic used by the file-backed record store to derive a document's directory.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (CLI arguments, REST path
//! segments). Uppercase, hyphenated, wrong-length or non-hex input is rejected.
//!
//! ## Sharded directory layout
//! For a canonical id `u`, documents live under `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`, e.g.
//! `patient_data/patients/55/0e/550e8400e29b41d4a716446655440000/`.

mod id;

pub use id::{DocumentId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
