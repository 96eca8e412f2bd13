//! Error and diagnostic reporting.
//!
//! Fatal conditions (violated preconditions, a missing `DeviceOp`, a failed
//! ELF emission) are surfaced as `AirbinError` and abort the translation.
//! Non-fatal conditions (an A/B length mismatch, a missing core executable)
//! are pushed onto the `Translator`'s diagnostics list and translation
//! continues, matching spec.md §7's propagation policy.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal error conditions for one translation.
#[derive(Debug, Error)]
pub enum AirbinError {
    /// A `DeviceOp` was not found in the input module.
    #[error("no DeviceOp found in the input module")]
    MissingDeviceOp,

    /// An unrecoverable I/O failure: reading/writing the AIRBIN output, or a
    /// core ELF that is required but malformed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A malformed core executable that could not be parsed as ELF at all
    /// (distinct from "file missing", which is a non-fatal diagnostic).
    #[error("failed to parse ELF for tile {tile_label}: {source}")]
    MalformedElf {
        tile_label: String,
        #[source]
        source: goblin::error::Error,
    },

    /// A precondition violation: a bit-exact encoding invariant that must
    /// never be silently relaxed (e.g. a write to column 0, a misaligned
    /// `clear_range`, an unknown `WireBundle`, an out-of-range shim-mux
    /// index, or simultaneous A-side and B-side lock controls).
    #[error("precondition violated: {0}")]
    Precondition(String),
}

/// Severity of a non-fatal `Diagnostic`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Translation continues, using a documented fallback.
    Warning,
}

/// A non-fatal observation made during one translation: an A/B mismatch, a
/// core executable that could not be opened, etc. Collected on the
/// `Translator` (see `translator::Translator::diagnostics`) rather than
/// printed directly, so callers can inspect or format them as they choose.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into() }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Context for an I/O failure that names the file involved, used when
/// reporting a missing or unreadable core executable as a non-fatal
/// diagnostic rather than aborting the translation.
pub fn missing_elf_diagnostic(tile_label: &str, path: &PathBuf, source: &std::io::Error) -> Diagnostic {
    Diagnostic::warning(format!(
        "tile {tile_label}: could not load core executable {}: {source}",
        path.display()
    ))
}
