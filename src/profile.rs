//! Named signature profiles persisted as one JSON file.
//!
//! ```text
//! ~/.pdfsign/
//! ├── signature_profiles.json     { "<name>": SignatureProfile, ... }
//! └── signature_<name>.png        optional image owned by a profile
//! ```
//!
//! The store is a plain read-modify-write of the whole file. Writes go to a
//! temp file in the same directory and are renamed into place, so a reader
//! never sees a half-written store. Concurrent writers are not coordinated.

use crate::config::{PageSelectionMode, PlacementRect, SignatureConfig, SignatureConfigBuilder};
use crate::error::PdfSignError;
use crate::package::write_atomic;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the profile store inside the profile directory.
pub const PROFILES_FILE: &str = "signature_profiles.json";

/// Directory under the home directory used when none is given.
pub const DEFAULT_DIR_NAME: &str = ".pdfsign";

/// A saved set of signing parameters.
///
/// Missing fields in the stored JSON take their default values, and an
/// unknown `page_option` means the first page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureProfile {
    pub x_position: f64,
    pub y_position: f64,
    pub signature_width: f64,
    pub signature_height: f64,
    pub text_offset_y: i32,
    pub text_size: u32,
    /// `first`, `last`, `all` or `custom`.
    pub page_option: String,
    /// Page spec, only meaningful when `page_option` is `custom`.
    pub custom_pages: String,
    pub include_date: bool,
    pub signer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_image_path: Option<PathBuf>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Default for SignatureProfile {
    fn default() -> Self {
        Self::from_config(&SignatureConfig::default())
    }
}

impl SignatureProfile {
    /// Capture the persistent parts of a config. No image, timestamps now.
    pub fn from_config(config: &SignatureConfig) -> Self {
        let now = Local::now();
        Self {
            x_position: config.placement.x,
            y_position: config.placement.y,
            signature_width: config.placement.width,
            signature_height: config.placement.height,
            text_offset_y: config.text.text_offset_y,
            text_size: config.text.text_size,
            page_option: config.pages.tag().to_string(),
            custom_pages: config.pages.custom_spec().to_string(),
            include_date: config.text.include_date,
            signer_name: config.text.signer_name.clone(),
            signature_image_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn page_mode(&self) -> PageSelectionMode {
        PageSelectionMode::from_parts(&self.page_option, &self.custom_pages)
    }

    /// A builder preloaded with this profile's values, ready for overrides.
    pub fn to_builder(&self) -> SignatureConfigBuilder {
        SignatureConfig::builder()
            .placement(PlacementRect::new(
                self.x_position,
                self.y_position,
                self.signature_width,
                self.signature_height,
            ))
            .text_offset_y(self.text_offset_y)
            .text_size(self.text_size)
            .include_date(self.include_date)
            .signer_name(self.signer_name.clone())
            .pages(self.page_mode())
    }

    pub fn has_image(&self) -> bool {
        self.signature_image_path.is_some()
    }
}

/// File-backed profile store.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Store rooted at `dir`. Nothing is created until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in `~/.pdfsign`, or `./.pdfsign` when no home directory is known.
    pub fn open_default() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(DEFAULT_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.join(PROFILES_FILE)
    }

    /// Path of the image file owned by profile `name`.
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("signature_{}.png", sanitise(name)))
    }

    /// Every stored profile, sorted by name. A missing store is empty.
    pub fn load_all(&self) -> Result<BTreeMap<String, SignatureProfile>, PdfSignError> {
        let path = self.store_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(PdfSignError::ProfileLoadFailed {
                    path,
                    detail: e.to_string(),
                })
            }
        };
        let profiles: BTreeMap<String, SignatureProfile> =
            serde_json::from_str(&raw).map_err(|e| PdfSignError::ProfileLoadFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        debug!("Loaded {} profile(s) from {}", profiles.len(), path.display());
        Ok(profiles)
    }

    pub fn get(&self, name: &str) -> Result<SignatureProfile, PdfSignError> {
        self.load_all()?
            .remove(name)
            .ok_or_else(|| PdfSignError::ProfileNotFound {
                name: name.to_string(),
            })
    }

    /// Save `profile` under `name`, replacing any existing record.
    ///
    /// When `new_image` is given it is stored as this profile's PNG and
    /// replaces `profile.signature_image_path`. Otherwise the path already
    /// on `profile` is kept. Both timestamps are set to now.
    pub fn save(
        &self,
        name: &str,
        mut profile: SignatureProfile,
        new_image: Option<&[u8]>,
    ) -> Result<SignatureProfile, PdfSignError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PdfSignError::ProfileNameEmpty);
        }

        let mut profiles = self.load_all()?;

        if let Some(bytes) = new_image {
            let path = self.image_path(name);
            self.write_png(&path, bytes)?;
            profile.signature_image_path = Some(path);
        }

        let now = Local::now();
        profile.created_at = now;
        profile.updated_at = now;

        profiles.insert(name.to_string(), profile.clone());
        self.write_all(&profiles)?;
        info!("Saved profile '{}'", name);
        Ok(profile)
    }

    /// Remove profile `name`; its image file is removed on a best-effort basis.
    pub fn delete(&self, name: &str) -> Result<(), PdfSignError> {
        let mut profiles = self.load_all()?;
        let removed = profiles
            .remove(name)
            .ok_or_else(|| PdfSignError::ProfileNotFound {
                name: name.to_string(),
            })?;
        self.write_all(&profiles)?;
        if let Some(path) = &removed.signature_image_path {
            let shared = profiles
                .values()
                .any(|p| p.signature_image_path.as_ref() == Some(path));
            if shared {
                debug!("Keeping {}: still used by another profile", path.display());
            } else {
                remove_quietly(path);
            }
        }
        info!("Deleted profile '{}'", name);
        Ok(())
    }

    /// Remove every profile and owned image. Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize, PdfSignError> {
        let profiles = self.load_all()?;
        let path = self.store_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PdfSignError::ProfileSaveFailed {
                    path,
                    detail: e.to_string(),
                })
            }
        }
        for image in profiles.values().filter_map(|p| p.signature_image_path.as_ref()) {
            remove_quietly(image);
        }
        info!("Cleared {} profile(s)", profiles.len());
        Ok(profiles.len())
    }

    /// Bytes of the profile's stored image, if it has one that still exists.
    pub fn load_image(&self, profile: &SignatureProfile) -> Option<Vec<u8>> {
        let path = profile.signature_image_path.as_ref()?;
        match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Profile image {} unavailable: {}", path.display(), e);
                None
            }
        }
    }

    fn write_all(&self, profiles: &BTreeMap<String, SignatureProfile>) -> Result<(), PdfSignError> {
        let path = self.store_path();
        let json = serde_json::to_string_pretty(profiles).map_err(|e| {
            PdfSignError::ProfileSaveFailed {
                path: path.clone(),
                detail: e.to_string(),
            }
        })?;
        write_atomic(&path, json.as_bytes()).map_err(|e| PdfSignError::ProfileSaveFailed {
            path,
            detail: e.to_string(),
        })
    }

    /// Re-encode the uploaded image as PNG so the file matches its extension.
    fn write_png(&self, path: &Path, bytes: &[u8]) -> Result<(), PdfSignError> {
        let img = image::load_from_memory(bytes).map_err(|e| PdfSignError::InvalidSignatureImage {
            detail: e.to_string(),
        })?;
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| PdfSignError::ProfileSaveFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        write_atomic(path, png.get_ref()).map_err(|e| PdfSignError::ProfileSaveFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

/// Profile names become part of a file name. Letters, digits and `-` are
/// kept; every other byte becomes `_xx` (hex), so distinct names never share
/// a file.
fn sanitise(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() || c == '-' {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("_{b:02x}"));
            }
        }
    }
    out
}
