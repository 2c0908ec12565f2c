//! Explicit session state for an interactive signing run.
//!
//! A [`SigningSession`] holds what the user has chosen so far: a loaded
//! profile, an uploaded signature, and the results of the last run. Every
//! action that needs this state takes the session as an argument.

use crate::config::{PageSelectionMode, SignatureConfig, SignatureConfigBuilder};
use crate::error::PdfSignError;
use crate::output::BatchOutput;
use crate::package::{self, Artifact};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::preview::{self, PreviewOutput};
use crate::profile::{ProfileStore, SignatureProfile};
use crate::progress::ProgressCallback;
use crate::sign;
use pdfium_render::prelude::Pdfium;
use tracing::{debug, info};

/// Where the active signature image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOrigin {
    Uploaded,
    /// Stored with the named profile.
    Profile(String),
}

/// The signature image a run will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureImage<'a> {
    pub bytes: &'a [u8],
    pub origin: &'a SignatureOrigin,
}

#[derive(Debug)]
pub struct SigningSession {
    store: ProfileStore,
    current_profile: Option<(String, SignatureProfile)>,
    profile_image: Option<(Vec<u8>, SignatureOrigin)>,
    uploaded: Option<(Vec<u8>, SignatureOrigin)>,
    results: Option<BatchOutput>,
}

impl SigningSession {
    pub fn new(store: ProfileStore) -> Self {
        Self {
            store,
            current_profile: None,
            profile_image: None,
            uploaded: None,
            results: None,
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    // ── Profile ──────────────────────────────────────────────────────────

    /// Load a stored profile and its image, if any.
    pub fn load_profile(&mut self, name: &str) -> Result<&SignatureProfile, PdfSignError> {
        let profile = self.store.get(name)?;
        self.profile_image = self
            .store
            .load_image(&profile)
            .map(|bytes| (bytes, SignatureOrigin::Profile(name.to_string())));
        info!(
            "Loaded profile '{}'{}",
            name,
            if self.profile_image.is_some() { " with signature image" } else { "" }
        );
        let (_, profile) = self.current_profile.insert((name.to_string(), profile));
        Ok(profile)
    }

    /// Forget the loaded profile and its image.
    pub fn clear_profile(&mut self) {
        self.current_profile = None;
        self.profile_image = None;
    }

    pub fn current_profile_name(&self) -> Option<&str> {
        self.current_profile.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn current_profile(&self) -> Option<&SignatureProfile> {
        self.current_profile.as_ref().map(|(_, p)| p)
    }

    /// Builder starting from the loaded profile, or from the defaults.
    pub fn config_builder(&self) -> SignatureConfigBuilder {
        match self.current_profile() {
            Some(profile) => profile.to_builder(),
            None => SignatureConfig::builder(),
        }
    }

    /// Save `config` as profile `name`, replacing any profile of that name.
    ///
    /// An uploaded signature is stored with the profile. Without one, the
    /// loaded profile's image is kept. The saved profile becomes current.
    pub fn save_profile(&mut self, name: &str, config: &SignatureConfig) -> Result<&SignatureProfile, PdfSignError> {
        let mut profile = SignatureProfile::from_config(config);
        let upload = self.uploaded.as_ref().map(|(bytes, _)| bytes.as_slice());
        if upload.is_none() && self.profile_image.is_some() {
            profile.signature_image_path = self
                .current_profile()
                .and_then(|p| p.signature_image_path.clone());
        }

        let saved = self.store.save(name, profile, upload)?;
        let name = name.trim().to_string();
        if let Some(bytes) = self.store.load_image(&saved) {
            self.profile_image = Some((bytes, SignatureOrigin::Profile(name.clone())));
        }
        let (_, profile) = self.current_profile.insert((name, saved));
        Ok(profile)
    }

    // ── Signature image ──────────────────────────────────────────────────

    /// Use `bytes` as the signature; takes priority over a profile image.
    pub fn set_uploaded_signature(&mut self, bytes: Vec<u8>) -> Result<(), PdfSignError> {
        input::check_signature_image(&bytes)?;
        debug!("Uploaded signature image ({} bytes)", bytes.len());
        self.uploaded = Some((bytes, SignatureOrigin::Uploaded));
        Ok(())
    }

    pub fn clear_uploaded_signature(&mut self) {
        self.uploaded = None;
    }

    /// The uploaded image if there is one, else the loaded profile's image.
    pub fn active_signature(&self) -> Option<SignatureImage<'_>> {
        self.uploaded
            .as_ref()
            .or(self.profile_image.as_ref())
            .map(|(bytes, origin)| SignatureImage { bytes, origin })
    }

    // ── Run ──────────────────────────────────────────────────────────────

    /// Check that a run can start. Nothing is processed on failure.
    pub fn validate(&self, documents: &[SourceDocument], config: &SignatureConfig) -> Result<(), PdfSignError> {
        if self.active_signature().is_none() {
            return Err(PdfSignError::MissingSignatureImage);
        }
        if config.text.signer_name.trim().is_empty() {
            return Err(PdfSignError::MissingSignerName);
        }
        if documents.is_empty() {
            return Err(PdfSignError::NoDocuments);
        }
        if let PageSelectionMode::Custom(spec) = &config.pages {
            if spec.trim().is_empty() {
                return Err(PdfSignError::EmptyPageSpec);
            }
        }
        Ok(())
    }

    /// Validate, then sign every document. Results replace the previous run's;
    /// after a failed run there are none.
    pub fn process(
        &mut self,
        documents: &[SourceDocument],
        config: &SignatureConfig,
        progress: Option<&ProgressCallback>,
    ) -> Result<&BatchOutput, PdfSignError> {
        self.results = None;
        self.validate(documents, config)?;
        let image = self
            .active_signature()
            .ok_or(PdfSignError::MissingSignatureImage)?
            .bytes;
        let output = sign::sign_documents(documents, config, image, progress)?;
        Ok(self.results.insert(output))
    }

    /// Preview `source` with the active signature, if any.
    pub fn preview(
        &self,
        pdfium: &Pdfium,
        source: &SourceDocument,
        config: &SignatureConfig,
    ) -> Result<PreviewOutput, PdfSignError> {
        let image = self.active_signature().map(|s| s.bytes);
        preview::preview_document(pdfium, source, config, image)
    }

    pub fn results(&self) -> Option<&BatchOutput> {
        self.results.as_ref()
    }

    pub fn processing_complete(&self) -> bool {
        self.results.as_ref().is_some_and(BatchOutput::has_output)
    }

    /// Package the last run's documents for delivery.
    pub fn artifact(&self) -> Result<Artifact, PdfSignError> {
        match &self.results {
            Some(output) if output.has_output() => package::package(&output.documents),
            _ => Err(PdfSignError::NothingToDeliver),
        }
    }

    /// Start a new run: drop the previous results, keep profile and signature.
    pub fn reset(&mut self) {
        self.results = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::overlay::tests::sample_png;

    fn session() -> (tempfile::TempDir, SigningSession) {
        let dir = tempfile::tempdir().unwrap();
        let s = SigningSession::new(ProfileStore::new(dir.path()));
        (dir, s)
    }

    fn named() -> SignatureConfig {
        SignatureConfig::builder().signer_name("Ada").build().unwrap()
    }

    fn doc() -> Vec<SourceDocument> {
        vec![SourceDocument::new("a.pdf", b"%PDF-1.4".to_vec())]
    }

    #[test]
    fn validation_order() {
        let (_dir, mut s) = session();
        assert!(matches!(
            s.validate(&doc(), &named()),
            Err(PdfSignError::MissingSignatureImage)
        ));

        s.set_uploaded_signature(sample_png()).unwrap();
        assert!(matches!(
            s.validate(&doc(), &SignatureConfig::default()),
            Err(PdfSignError::MissingSignerName)
        ));
        assert!(matches!(s.validate(&[], &named()), Err(PdfSignError::NoDocuments)));

        let blank_custom = named()
            .to_builder()
            .pages(PageSelectionMode::Custom("  ".into()))
            .build()
            .unwrap();
        assert!(matches!(
            s.validate(&doc(), &blank_custom),
            Err(PdfSignError::EmptyPageSpec)
        ));
        assert!(s.validate(&doc(), &named()).is_ok());
    }

    #[test]
    fn upload_rejects_non_images() {
        let (_dir, mut s) = session();
        assert!(s.set_uploaded_signature(b"text".to_vec()).is_err());
        assert!(s.active_signature().is_none());
    }

    #[test]
    fn profile_image_is_used_and_upload_wins() {
        let (_dir, mut s) = session();
        s.set_uploaded_signature(sample_png()).unwrap();
        s.save_profile("office", &named()).unwrap();
        s.clear_uploaded_signature();
        s.clear_profile();
        assert!(s.active_signature().is_none());

        s.load_profile("office").unwrap();
        assert_eq!(
            s.active_signature().unwrap().origin,
            &SignatureOrigin::Profile("office".into())
        );

        s.set_uploaded_signature(sample_png()).unwrap();
        assert_eq!(s.active_signature().unwrap().origin, &SignatureOrigin::Uploaded);
    }

    #[test]
    fn saving_without_upload_keeps_profile_image() {
        let (_dir, mut s) = session();
        s.set_uploaded_signature(sample_png()).unwrap();
        let first = s.save_profile("office", &named()).unwrap().clone();
        s.clear_uploaded_signature();

        let moved = named().to_builder().x(10.0).build().unwrap();
        let second = s.save_profile("office", &moved).unwrap().clone();
        assert_eq!(second.signature_image_path, first.signature_image_path);
        assert_eq!(second.x_position, 10.0);
        assert_eq!(s.current_profile_name(), Some("office"));
    }

    #[test]
    fn config_builder_starts_from_profile() {
        let (_dir, mut s) = session();
        let cfg = named().to_builder().text_size(12).build().unwrap();
        s.save_profile("big", &cfg).unwrap();
        s.clear_profile();
        assert_eq!(s.config_builder().build().unwrap().text.text_size, 8);
        s.load_profile("big").unwrap();
        assert_eq!(s.config_builder().build().unwrap().text.text_size, 12);
    }

    #[test]
    fn failed_run_drops_previous_results() {
        let (_dir, mut s) = session();
        s.set_uploaded_signature(sample_png()).unwrap();
        let good = vec![SourceDocument::new("old.pdf", crate::pipeline::stamp::tests::sample_pdf(1))];
        s.process(&good, &named(), None).unwrap();
        assert_eq!(s.artifact().unwrap().file_name, "signed_old.pdf");

        let junk = vec![SourceDocument::new("junk.pdf", b"%PDF-junk".to_vec())];
        assert!(matches!(
            s.process(&junk, &named(), None),
            Err(PdfSignError::AllDocumentsFailed { .. })
        ));
        assert!(s.results().is_none());
        assert!(matches!(s.artifact(), Err(PdfSignError::NothingToDeliver)));

        s.process(&good, &named(), None).unwrap();
        assert!(matches!(s.process(&[], &named(), None), Err(PdfSignError::NoDocuments)));
        assert!(!s.processing_complete());
    }

    #[test]
    fn nothing_to_deliver_before_a_run() {
        let (_dir, mut s) = session();
        assert!(!s.processing_complete());
        assert!(matches!(s.artifact(), Err(PdfSignError::NothingToDeliver)));
        s.reset();
        assert!(s.results().is_none());
    }
}
