//! Batch signing entry points.
//!
//! A batch builds the overlay once, then stamps each document in turn
//! against its own page count. A document that fails is recorded in
//! [`BatchOutput::failures`] and the batch moves on. Only a batch in which
//! nothing could be signed is an error.

use crate::config::{PageSelectionMode, SignatureConfig};
use crate::error::PdfSignError;
use crate::output::{BatchOutput, BatchStats};
use crate::package;
use crate::pipeline::input::SourceDocument;
use crate::pipeline::overlay::SignatureOverlay;
use crate::pipeline::{select, stamp};
use crate::progress::ProgressCallback;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Sign every document in `sources` with the same overlay.
///
/// # Returns
/// `Ok(BatchOutput)` when at least one document was signed, even if others
/// failed (check `output.failures`).
///
/// # Errors
/// - [`PdfSignError::NoDocuments`] for an empty batch
/// - [`PdfSignError::InvalidSignatureImage`] / [`PdfSignError::OverlayFailed`]
///   when the overlay cannot be built
/// - [`PdfSignError::AllDocumentsFailed`] when no document was signed
pub fn sign_documents(
    sources: &[SourceDocument],
    config: &SignatureConfig,
    signature_image: &[u8],
    progress: Option<&ProgressCallback>,
) -> Result<BatchOutput, PdfSignError> {
    let total_start = Instant::now();
    if sources.is_empty() {
        return Err(PdfSignError::NoDocuments);
    }
    info!("Signing {} document(s), {}", sources.len(), config.pages);

    // ── Step 1: Build the overlay once ───────────────────────────────────
    let overlay = SignatureOverlay::build(config, signature_image)?;

    if let Some(cb) = progress {
        cb.on_batch_start(sources.len());
    }

    // ── Step 2: Stamp each document ──────────────────────────────────────
    let total = sources.len();
    let mut output = BatchOutput::default();
    for (index, source) in sources.iter().enumerate() {
        if let Some(cb) = progress {
            cb.on_document_start(index, total, &source.name);
        }
        match stamp::stamp_document(source, &overlay, &config.pages) {
            Ok(signed) => {
                if let Some(cb) = progress {
                    cb.on_document_complete(index, total, &source.name, signed.pages_stamped.len());
                }
                output.documents.push(signed);
            }
            Err(e) => {
                warn!("{}", e);
                if let Some(cb) = progress {
                    cb.on_document_error(index, total, &source.name, &e.to_string());
                }
                output.failures.push(e);
            }
        }
    }

    if let Some(cb) = progress {
        cb.on_batch_complete(total, output.documents.len());
    }

    // ── Step 3: Stats ────────────────────────────────────────────────────
    if output.documents.is_empty() {
        let first_error = output
            .failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(PdfSignError::AllDocumentsFailed { total, first_error });
    }

    output.stats = BatchStats {
        total_documents: total,
        signed_documents: output.documents.len(),
        failed_documents: output.failures.len(),
        pages_stamped: output.documents.iter().map(|d| d.pages_stamped.len()).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} document(s), {} page(s) stamped, {}ms",
        output.stats.signed_documents,
        total,
        output.stats.pages_stamped,
        output.stats.total_duration_ms
    );

    Ok(output)
}

/// Sign a batch and write the packaged artifact into `out_dir`.
pub fn sign_to_dir(
    sources: &[SourceDocument],
    config: &SignatureConfig,
    signature_image: &[u8],
    out_dir: impl AsRef<Path>,
    progress: Option<&ProgressCallback>,
) -> Result<(BatchOutput, PathBuf), PdfSignError> {
    let output = sign_documents(sources, config, signature_image, progress)?;
    let artifact = package::package(&output.documents)?;
    let path = artifact.write_to_dir(out_dir)?;
    Ok((output, path))
}

/// What a signing run would do to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub file_size: usize,
    pub pdf_version: String,
    pub total_pages: u32,
    /// Pages the selection resolves to for this document.
    pub selected_pages: Vec<u32>,
    pub selection: String,
    pub preview: String,
}

/// Inspect a document without modifying it. Does not require pdfium.
pub fn inspect(source: &SourceDocument, mode: &PageSelectionMode) -> Result<DocumentInfo, PdfSignError> {
    let total_pages = stamp::page_count(source)?;
    Ok(DocumentInfo {
        name: source.name.clone(),
        file_size: source.bytes.len(),
        pdf_version: pdf_version(&source.bytes),
        total_pages,
        selected_pages: select::resolve_pages(Some(mode), total_pages),
        selection: select::describe_selection(Some(mode), total_pages),
        preview: select::describe_preview(Some(mode), total_pages),
    })
}

/// Version from the `%PDF-x.y` header line.
fn pdf_version(bytes: &[u8]) -> String {
    bytes
        .get(5..8)
        .and_then(|v| std::str::from_utf8(v).ok())
        .filter(|v| v.chars().all(|c| c.is_ascii_digit() || c == '.'))
        .unwrap_or("unknown")
        .to_string()
}
