//! Input loading: read documents and signature images from disk.
//!
//! Everything downstream works on in-memory bytes. lopdf parses from a
//! slice and pdfium can load from one, so a document is read exactly once
//! and shared by preview and stamping. The `%PDF` header is checked here so
//! a wrong file is reported with its path instead of as a parser error.

use crate::error::PdfSignError;
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An input PDF: display name plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name shown to the user and used to derive the output name.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// True when the buffer starts with the `%PDF` magic.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Read a PDF from disk, validating existence, permissions and magic bytes.
pub fn load_document(path: impl AsRef<Path>) -> Result<SourceDocument, PdfSignError> {
    let path = path.as_ref();
    let bytes = read_file(path)?;

    if !has_pdf_magic(&bytes) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PdfSignError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    debug!("Loaded PDF {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceDocument::new(name, bytes))
}

/// Read a signature image from disk and check it is a PNG or JPEG.
pub fn load_signature_image(path: impl AsRef<Path>) -> Result<Vec<u8>, PdfSignError> {
    let path = path.as_ref();
    let bytes = read_file(path)?;
    check_signature_image(&bytes)?;
    debug!("Loaded signature image {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Accept only PNG and JPEG, the formats the overlay can decode.
pub fn check_signature_image(bytes: &[u8]) -> Result<(), PdfSignError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) | Ok(ImageFormat::Jpeg) => Ok(()),
        Ok(other) => Err(PdfSignError::InvalidSignatureImage {
            detail: format!("unsupported format {other:?}"),
        }),
        Err(e) => Err(PdfSignError::InvalidSignatureImage {
            detail: e.to_string(),
        }),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, PdfSignError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => PdfSignError::PermissionDenied {
            path: PathBuf::from(path),
        },
        _ => PdfSignError::FileNotFound {
            path: PathBuf::from(path),
        },
    })
}
