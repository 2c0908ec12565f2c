//! Delivery packaging: one PDF as-is, several as a ZIP archive.

use crate::error::PdfSignError;
use crate::output::SignedDocument;
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PDF_MIME: &str = "application/pdf";
pub const ZIP_MIME: &str = "application/zip";

/// A file ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl Artifact {
    pub fn is_archive(&self) -> bool {
        self.mime == ZIP_MIME
    }

    /// Write the artifact into `dir`, returning the full path.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, PdfSignError> {
        let path = dir.as_ref().join(&self.file_name);
        write_atomic(&path, &self.bytes).map_err(|source| PdfSignError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;
        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// `signed_pdfs_YYYYMMDD_HHMMSS.zip`
pub fn archive_name(at: NaiveDateTime) -> String {
    format!("signed_pdfs_{}.zip", at.format("%Y%m%d_%H%M%S"))
}

/// Package signed documents, naming any archive after the current local time.
pub fn package(documents: &[SignedDocument]) -> Result<Artifact, PdfSignError> {
    package_at(documents, Local::now().naive_local())
}

/// Package signed documents: one document is delivered directly, several
/// are bundled into a Deflate-compressed ZIP.
pub fn package_at(documents: &[SignedDocument], at: NaiveDateTime) -> Result<Artifact, PdfSignError> {
    match documents {
        [] => Err(PdfSignError::NothingToDeliver),
        [single] => Ok(Artifact {
            file_name: single.name.clone(),
            bytes: single.bytes.clone(),
            mime: PDF_MIME,
        }),
        many => Ok(Artifact {
            file_name: archive_name(at),
            bytes: build_zip(many)?,
            mime: ZIP_MIME,
        }),
    }
}

fn build_zip(documents: &[SignedDocument]) -> Result<Vec<u8>, PdfSignError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut used = HashSet::new();

    for doc in documents {
        let entry = unique_entry_name(&doc.name, &mut used);
        writer
            .start_file(entry.as_str(), options)
            .map_err(|e| PdfSignError::ArchiveFailed(e.to_string()))?;
        writer
            .write_all(&doc.bytes)
            .map_err(|e| PdfSignError::ArchiveFailed(e.to_string()))?;
        debug!("Archived {} ({} bytes)", entry, doc.bytes.len());
    }

    let cursor = writer
        .finish()
        .map_err(|e| PdfSignError::ArchiveFailed(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Two inputs with the same file name must not collide inside the archive.
fn unique_entry_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write via a temp file in the same directory, then rename into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
