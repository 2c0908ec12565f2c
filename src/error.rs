//! Error types for the edgequake-pdfsign library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfSignError`]: **Action-level**: the requested action (sign a batch,
//!   render a preview, save a profile) is rejected as a whole. Either the user
//!   must correct the input (no signature image, blank signer name, empty page
//!   list) or a persistence step failed. No partial work is kept.
//!
//! * [`DocumentError`]: **Per-document**: one document in a batch could not
//!   be signed (corrupt, encrypted, no pages selected). It is stored inside
//!   [`crate::output::BatchOutput`] and the remaining documents continue.
//!
//! No error in this crate is fatal to the process; every failure can be fixed
//! by the user and retried.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that reject a whole action.
///
/// Per-document failures use [`DocumentError`] and are collected in
/// [`crate::output::BatchOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PdfSignError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── User-input errors (action rejected, nothing processed) ───────────
    /// Neither an uploaded image nor a profile image is available.
    #[error("No signature image available.\nPass --signature <IMAGE> or load a profile that stores one.")]
    MissingSignatureImage,

    /// The signer name is blank.
    #[error("Signer name is required.\nPass --name \"First Last\" or load a profile that stores one.")]
    MissingSignerName,

    /// The batch contains no documents.
    #[error("No PDF documents selected.")]
    NoDocuments,

    /// Custom page mode was chosen but the page list is blank.
    #[error("Custom page selection is empty.\nSpecify the pages to sign, e.g. 1,3,5 or 1-3.")]
    EmptyPageSpec,

    /// The signature image could not be decoded.
    #[error("Signature image is not a readable PNG or JPEG: {detail}")]
    InvalidSignatureImage { detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { name: String, detail: String },

    /// PDF is encrypted; stamping and previewing need an unprotected file.
    #[error("PDF '{name}' is password-protected.\nRemove the protection and try again.")]
    PasswordProtected { name: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Building the signature overlay failed.
    #[error("Failed to build the signature overlay: {0}")]
    OverlayFailed(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Every document in the batch failed; there is nothing to deliver.
    #[error("All {total} documents failed.\nFirst error: {first_error}")]
    AllDocumentsFailed { total: usize, first_error: String },

    /// [`crate::session::SigningSession::artifact`] was called before a run produced any output.
    #[error("No signed documents to deliver. Run the batch first.")]
    NothingToDeliver,

    // ── Profile errors ────────────────────────────────────────────────────
    /// A profile name is required but was blank.
    #[error("Profile name is required.")]
    ProfileNameEmpty,

    /// No profile with the given name exists.
    #[error("Profile '{name}' not found.\nRun `pdfsign profile list` to see saved profiles.")]
    ProfileNotFound { name: String },

    /// The profile store could not be read or parsed.
    #[error("Failed to load profiles from '{path}': {detail}")]
    ProfileLoadFailed { path: PathBuf, detail: String },

    /// The profile store (or a profile image) could not be written.
    #[error("Failed to save profiles to '{path}': {detail}")]
    ProfileSaveFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the ZIP archive failed.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Previews need the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the pdfsign executable.\n\
  • Install pdfium system-wide (https://github.com/bblanchon/pdfium-binaries).\n\
Signing does not need pdfium; only previews do.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document in a batch.
///
/// The batch records it, skips the document, and carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The document could not be parsed.
    #[error("{name}: unreadable PDF: {detail}")]
    Unreadable { name: String, detail: String },

    /// The document is encrypted.
    #[error("{name}: document is password-protected")]
    Encrypted { name: String },

    /// The page selection resolved to no page of this document.
    #[error("{name}: no valid page selected (document has {total} pages)")]
    NoPagesSelected { name: String, total: u32 },

    /// Compositing the overlay onto a page failed.
    #[error("{name}: failed to stamp page {page}: {detail}")]
    StampFailed {
        name: String,
        page: u32,
        detail: String,
    },

    /// Serialising the stamped document failed.
    #[error("{name}: failed to write signed PDF: {detail}")]
    SaveFailed { name: String, detail: String },
}

impl DocumentError {
    /// Name of the document this error refers to.
    pub fn document_name(&self) -> &str {
        match self {
            DocumentError::Unreadable { name, .. }
            | DocumentError::Encrypted { name }
            | DocumentError::NoPagesSelected { name, .. }
            | DocumentError::StampFailed { name, .. }
            | DocumentError::SaveFailed { name, .. } => name,
        }
    }
}
