//! Result types produced by a signing run.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

/// Prefix added to every signed document's file name.
pub const OUTPUT_PREFIX: &str = "signed_";

/// Output file name for a source document: `signed_<name>`.
pub fn output_name(source_name: &str) -> String {
    format!("{OUTPUT_PREFIX}{source_name}")
}

/// One successfully signed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocument {
    /// Output file name (`signed_<original name>`).
    pub name: String,

    /// The signed PDF.
    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// 1-indexed pages that received the signature, ascending.
    pub pages_stamped: Vec<u32>,

    /// Page count of the source document.
    pub total_pages: u32,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub signed_documents: usize,
    pub failed_documents: usize,
    /// Sum of stamped pages over all signed documents.
    pub pages_stamped: usize,
    pub total_duration_ms: u64,
}

/// Everything a run produced: signed documents plus per-document failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub documents: Vec<SignedDocument>,
    pub failures: Vec<DocumentError>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// True when at least one document was signed.
    pub fn has_output(&self) -> bool {
        !self.documents.is_empty()
    }
}
