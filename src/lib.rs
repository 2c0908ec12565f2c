//! # edgequake-pdfsign
//!
//! Stamp a signature image, the signer's name and the signing date onto
//! selected pages of one or more PDF documents.
//!
//! ## Why this crate?
//!
//! Signing a stack of contracts by hand means opening each one, finding the
//! right page and dragging an image into place. This crate does the
//! placement once: choose the position, size and pages, check a rendered
//! preview, then apply the same overlay to every document in a batch. Named
//! profiles remember the setup for next time.
//!
//! This is a visual stamp only. There are no certificates and no
//! tamper-evidence.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes + signature image + SignatureConfig
//!  │
//!  ├─ 1. Select   resolve the page selection per document
//!  ├─ 2. Overlay  image + name/date text as one Form XObject (built once)
//!  ├─ 3. Stamp    draw the form on each selected page (lopdf)
//!  ├─ 4. Package  one PDF, or a ZIP for several
//!  └─ (Preview)   rasterise one page via pdfium and draw the placement
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsign::{load_document, sign_documents, package, SignatureConfig, PageSelectionMode};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SignatureConfig::builder()
//!         .signer_name("Ada Lovelace")
//!         .pages(PageSelectionMode::LastOnly)
//!         .build()?;
//!     let docs = vec![load_document("contract.pdf")?];
//!     let signature = std::fs::read("signature.png")?;
//!
//!     let output = sign_documents(&docs, &config, &signature, None)?;
//!     let artifact = package(&output.documents)?;
//!     artifact.write_to_dir(".")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsign` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfsign = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Only previews need the pdfium shared library; it is bound at runtime.
//! Signing, inspecting and profile management work without it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod session;
pub mod sign;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageSelectionMode, PlacementRect, SignatureConfig, SignatureConfigBuilder, TextOptions};
pub use error::{DocumentError, PdfSignError};
pub use output::{output_name, BatchOutput, BatchStats, SignedDocument};
pub use package::{package, Artifact};
pub use pipeline::coords::{to_pdf_rect, to_raster_rect, RasterPlacement, RasterRect, ScaleFactors};
pub use pipeline::input::{load_document, load_signature_image, SourceDocument};
pub use pipeline::overlay::SignatureOverlay;
pub use pipeline::preview::{preview_document, PreviewOutput};
pub use pipeline::render::bind_pdfium;
pub use pipeline::select::{preview_page_index, resolve_custom_pages, resolve_pages};
pub use pipeline::stamp::stamp_document;
pub use profile::{ProfileStore, SignatureProfile};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{SignatureImage, SignatureOrigin, SigningSession};
pub use sign::{inspect, sign_documents, sign_to_dir, DocumentInfo};
