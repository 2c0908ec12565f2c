//! Configuration types for signature placement.
//!
//! Every knob that influences where and how the signature lands on a page is
//! collected in [`SignatureConfig`], built via [`SignatureConfigBuilder`].
//! Ranges are validated once, in [`SignatureConfigBuilder::build`]; the rest
//! of the crate trusts a built config without re-checking it.
//!
//! All geometry is in PDF points (1/72 inch) with the origin at the
//! bottom-left corner of the page.

use crate::error::PdfSignError;
use crate::pipeline::select;
use chrono::format::StrftimeItems;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Date format used when none is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

// ── Valid ranges ─────────────────────────────────────────────────────────

/// Horizontal position range, in points.
pub const X_RANGE: RangeInclusive<f64> = 0.0..=500.0;
/// Vertical position range, in points.
pub const Y_RANGE: RangeInclusive<f64> = 0.0..=700.0;
/// Signature width range, in points.
pub const WIDTH_RANGE: RangeInclusive<f64> = 50.0..=200.0;
/// Signature height range, in points.
pub const HEIGHT_RANGE: RangeInclusive<f64> = 30.0..=150.0;
/// Vertical text offset range relative to the signature, in points.
pub const TEXT_OFFSET_RANGE: RangeInclusive<i32> = -50..=50;
/// Font size range for the name and date lines.
pub const TEXT_SIZE_RANGE: RangeInclusive<u32> = 6..=14;

/// Position and size of the signature image, in PDF points.
///
/// Origin is the bottom-left corner of the page; `y` is the bottom edge of
/// the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacementRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for PlacementRect {
    fn default() -> Self {
        Self::new(400.0, 100.0, 120.0, 60.0)
    }
}

/// Signer text drawn below the signature image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    /// Signer display name. The name line is omitted when blank.
    pub signer_name: String,

    /// Baseline of the name line relative to the bottom of the image. Default: -20.
    pub text_offset_y: i32,

    /// Font size of the name line. The date line uses one point less (min 6). Default: 8.
    pub text_size: u32,

    /// Draw a date line under the name. Default: true.
    pub include_date: bool,

    /// Date printed on the date line. Default: today (local time).
    pub signing_date: NaiveDate,

    /// Prefix of the name line. Default: "Signed by".
    pub signed_by_label: String,

    /// Prefix of the date line. Default: "Date".
    pub date_label: String,

    /// `strftime` format of the signing date. Default: `%d/%m/%Y`.
    pub date_format: String,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            signer_name: String::new(),
            text_offset_y: -20,
            text_size: 8,
            include_date: true,
            signing_date: Local::now().date_naive(),
            signed_by_label: "Signed by".to_string(),
            date_label: "Date".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl TextOptions {
    /// The "Signed by: Name" line, or `None` when no name is set.
    pub fn name_line(&self) -> Option<String> {
        let name = self.signer_name.trim();
        if name.is_empty() {
            None
        } else {
            Some(format!("{}: {}", self.signed_by_label, name))
        }
    }

    /// The "Date: dd/mm/yyyy" line, or `None` when the date is excluded.
    pub fn date_line(&self) -> Option<String> {
        if self.include_date {
            let mut date = String::new();
            let items = StrftimeItems::new(&self.date_format);
            if write!(date, "{}", self.signing_date.format_with_items(items)).is_err() {
                date.clear();
                let _ = write!(date, "{}", self.signing_date.format(DEFAULT_DATE_FORMAT));
            }
            Some(format!("{}: {}", self.date_label, date))
        } else {
            None
        }
    }

    /// Font size of the date line.
    pub fn date_text_size(&self) -> u32 {
        self.text_size.saturating_sub(1).max(6)
    }
}

/// Configuration for stamping a signature onto PDF pages.
///
/// # Example
/// ```rust
/// use edgequake_pdfsign::{PageSelectionMode, SignatureConfig};
///
/// let config = SignatureConfig::builder()
///     .position(380.0, 80.0)
///     .size(140.0, 60.0)
///     .signer_name("Ada Lovelace")
///     .pages(PageSelectionMode::Custom("1,3-5".into()))
///     .build()
///     .unwrap();
/// assert_eq!(config.pages.resolve(6), vec![1, 3, 4, 5]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureConfig {
    /// Where the signature image goes, in PDF points.
    pub placement: PlacementRect,

    /// Name and date lines.
    pub text: TextOptions,

    /// Which pages receive the signature. Default: first page only.
    pub pages: PageSelectionMode,
}

impl SignatureConfig {
    /// Create a new builder for `SignatureConfig`.
    pub fn builder() -> SignatureConfigBuilder {
        SignatureConfigBuilder {
            config: Self::default(),
        }
    }

    /// Start a builder from this config, e.g. to override a few profile values.
    pub fn to_builder(&self) -> SignatureConfigBuilder {
        SignatureConfigBuilder {
            config: self.clone(),
        }
    }
}

/// Builder for [`SignatureConfig`].
#[derive(Debug, Clone)]
pub struct SignatureConfigBuilder {
    config: SignatureConfig,
}

impl SignatureConfigBuilder {
    pub fn x(mut self, x: f64) -> Self {
        self.config.placement.x = x;
        self
    }

    pub fn y(mut self, y: f64) -> Self {
        self.config.placement.y = y;
        self
    }

    pub fn position(self, x: f64, y: f64) -> Self {
        self.x(x).y(y)
    }

    pub fn width(mut self, width: f64) -> Self {
        self.config.placement.width = width;
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.config.placement.height = height;
        self
    }

    pub fn size(self, width: f64, height: f64) -> Self {
        self.width(width).height(height)
    }

    pub fn placement(mut self, rect: PlacementRect) -> Self {
        self.config.placement = rect;
        self
    }

    pub fn signer_name(mut self, name: impl Into<String>) -> Self {
        self.config.text.signer_name = name.into();
        self
    }

    pub fn text_offset_y(mut self, offset: i32) -> Self {
        self.config.text.text_offset_y = offset;
        self
    }

    pub fn text_size(mut self, size: u32) -> Self {
        self.config.text.text_size = size;
        self
    }

    pub fn include_date(mut self, v: bool) -> Self {
        self.config.text.include_date = v;
        self
    }

    pub fn signing_date(mut self, date: NaiveDate) -> Self {
        self.config.text.signing_date = date;
        self
    }

    pub fn signed_by_label(mut self, label: impl Into<String>) -> Self {
        self.config.text.signed_by_label = label.into();
        self
    }

    pub fn date_label(mut self, label: impl Into<String>) -> Self {
        self.config.text.date_label = label.into();
        self
    }

    pub fn date_format(mut self, fmt: impl Into<String>) -> Self {
        self.config.text.date_format = fmt.into();
        self
    }

    pub fn pages(mut self, mode: PageSelectionMode) -> Self {
        self.config.pages = mode;
        self
    }

    /// Build the configuration, validating every range.
    pub fn build(self) -> Result<SignatureConfig, PdfSignError> {
        let p = &self.config.placement;
        check_range("x", p.x, &X_RANGE)?;
        check_range("y", p.y, &Y_RANGE)?;
        check_range("width", p.width, &WIDTH_RANGE)?;
        check_range("height", p.height, &HEIGHT_RANGE)?;

        let t = &self.config.text;
        if !TEXT_OFFSET_RANGE.contains(&t.text_offset_y) {
            return Err(PdfSignError::InvalidConfig(format!(
                "text offset must be {}–{}, got {}",
                TEXT_OFFSET_RANGE.start(),
                TEXT_OFFSET_RANGE.end(),
                t.text_offset_y
            )));
        }
        if !TEXT_SIZE_RANGE.contains(&t.text_size) {
            return Err(PdfSignError::InvalidConfig(format!(
                "text size must be {}–{}, got {}",
                TEXT_SIZE_RANGE.start(),
                TEXT_SIZE_RANGE.end(),
                t.text_size
            )));
        }
        // Unknown items, and time or zone fields a date does not carry, fail
        // only when the date is formatted.
        let items = StrftimeItems::new(&t.date_format);
        if write!(String::new(), "{}", t.signing_date.format_with_items(items)).is_err() {
            return Err(PdfSignError::InvalidConfig(format!(
                "invalid date format '{}'",
                t.date_format
            )));
        }
        Ok(self.config)
    }
}

fn check_range(field: &str, value: f64, range: &RangeInclusive<f64>) -> Result<(), PdfSignError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(PdfSignError::InvalidConfig(format!(
            "{field} must be {}–{} pt, got {value}",
            range.start(),
            range.end()
        )))
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Which pages of each document receive the signature.
///
/// Resolution happens per document, against that document's own page count,
/// so one mode can be applied to a batch of documents of different lengths.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSelectionMode {
    /// First page only (default).
    #[default]
    FirstOnly,
    /// Last page only.
    LastOnly,
    /// Every page.
    All,
    /// Comma-separated pages and inclusive ranges, e.g. `1,3-5,7`.
    Custom(String),
}

impl PageSelectionMode {
    /// Resolve to an ascending, duplicate-free list of 1-based page numbers.
    pub fn resolve(&self, total_pages: u32) -> Vec<u32> {
        select::resolve_pages(Some(self), total_pages)
    }

    /// Short tag used in profiles and on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            PageSelectionMode::FirstOnly => "first",
            PageSelectionMode::LastOnly => "last",
            PageSelectionMode::All => "all",
            PageSelectionMode::Custom(_) => "custom",
        }
    }

    /// The custom page spec, or `""` for the fixed modes.
    pub fn custom_spec(&self) -> &str {
        match self {
            PageSelectionMode::Custom(spec) => spec,
            _ => "",
        }
    }

    /// Rebuild a mode from its stored tag and custom spec.
    ///
    /// Also accepts the French labels written by earlier profile files.
    /// Unknown tags fall back to [`PageSelectionMode::FirstOnly`].
    pub fn from_parts(tag: &str, custom_pages: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "last" | "dernière page uniquement" => PageSelectionMode::LastOnly,
            "all" | "toutes les pages" => PageSelectionMode::All,
            "custom" | "pages personnalisées" => PageSelectionMode::Custom(custom_pages.to_string()),
            _ => PageSelectionMode::FirstOnly,
        }
    }
}

impl fmt::Display for PageSelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelectionMode::FirstOnly => f.write_str("first page only"),
            PageSelectionMode::LastOnly => f.write_str("last page only"),
            PageSelectionMode::All => f.write_str("all pages"),
            PageSelectionMode::Custom(spec) => write!(f, "custom pages ({spec})"),
        }
    }
}

/// Parses `first`, `last`, `all`, or anything else as a custom page spec.
impl FromStr for PageSelectionMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "first" => PageSelectionMode::FirstOnly,
            "last" => PageSelectionMode::LastOnly,
            "all" => PageSelectionMode::All,
            _ => PageSelectionMode::Custom(s.trim().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_form_defaults() {
        let c = SignatureConfig::default();
        assert_eq!(c.placement, PlacementRect::new(400.0, 100.0, 120.0, 60.0));
        assert_eq!(c.text.text_offset_y, -20);
        assert_eq!(c.text.text_size, 8);
        assert!(c.text.include_date);
        assert_eq!(c.pages, PageSelectionMode::FirstOnly);
    }

    #[test]
    fn default_config_builds() {
        assert!(SignatureConfig::builder().build().is_ok());
    }

    #[test]
    fn build_rejects_out_of_range_width() {
        let err = SignatureConfig::builder().width(20.0).build().unwrap_err();
        assert!(err.to_string().contains("width"), "got: {err}");
    }

    #[test]
    fn build_rejects_nan_position() {
        assert!(SignatureConfig::builder().x(f64::NAN).build().is_err());
    }

    #[test]
    fn build_accepts_range_edges() {
        let c = SignatureConfig::builder()
            .position(0.0, 700.0)
            .size(200.0, 30.0)
            .text_offset_y(50)
            .text_size(6)
            .build();
        assert!(c.is_ok());
    }

    #[test]
    fn build_rejects_text_size() {
        assert!(SignatureConfig::builder().text_size(15).build().is_err());
        assert!(SignatureConfig::builder().text_offset_y(-51).build().is_err());
    }

    #[test]
    fn build_rejects_bad_date_format() {
        assert!(SignatureConfig::builder()
            .date_format("%Q")
            .build()
            .is_err());
    }

    #[test]
    fn build_rejects_time_only_format() {
        for fmt in ["%H:%M", "%d/%m/%Y %S", "%Z", "%z"] {
            let err = SignatureConfig::builder().date_format(fmt).build();
            assert!(
                matches!(err, Err(PdfSignError::InvalidConfig(_))),
                "{fmt} should be rejected"
            );
        }
    }

    #[test]
    fn date_line_survives_unbuildable_format() {
        let mut t = TextOptions {
            signing_date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            ..TextOptions::default()
        };
        t.date_format = "%H:%M".into();
        assert_eq!(t.date_line().as_deref(), Some("Date: 09/03/2026"));
    }

    #[test]
    fn text_lines() {
        let c = SignatureConfig::builder()
            .signer_name("  Ada Lovelace ")
            .signing_date(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap())
            .build()
            .unwrap();
        assert_eq!(c.text.name_line().as_deref(), Some("Signed by: Ada Lovelace"));
        assert_eq!(c.text.date_line().as_deref(), Some("Date: 09/03/2026"));

        let no_date = c.to_builder().include_date(false).build().unwrap();
        assert_eq!(no_date.text.date_line(), None);

        let blank = c.to_builder().signer_name("  ").build().unwrap();
        assert_eq!(blank.text.name_line(), None);
    }

    #[test]
    fn date_text_size_has_floor() {
        let mut t = TextOptions::default();
        t.text_size = 6;
        assert_eq!(t.date_text_size(), 6);
        t.text_size = 12;
        assert_eq!(t.date_text_size(), 11);
    }

    #[test]
    fn mode_tags_round_trip() {
        for mode in [
            PageSelectionMode::FirstOnly,
            PageSelectionMode::LastOnly,
            PageSelectionMode::All,
            PageSelectionMode::Custom("2-4".into()),
        ] {
            assert_eq!(
                PageSelectionMode::from_parts(mode.tag(), mode.custom_spec()),
                mode
            );
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_first() {
        assert_eq!(
            PageSelectionMode::from_parts("every other page", "1,2"),
            PageSelectionMode::FirstOnly
        );
    }

    #[test]
    fn french_labels_map_to_modes() {
        assert_eq!(
            PageSelectionMode::from_parts("Première page uniquement", ""),
            PageSelectionMode::FirstOnly
        );
        assert_eq!(
            PageSelectionMode::from_parts("Dernière page uniquement", ""),
            PageSelectionMode::LastOnly
        );
        assert_eq!(PageSelectionMode::from_parts("Toutes les pages", ""), PageSelectionMode::All);
        assert_eq!(
            PageSelectionMode::from_parts("Pages personnalisées", "1,3"),
            PageSelectionMode::Custom("1,3".into())
        );
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("ALL".parse::<PageSelectionMode>().unwrap(), PageSelectionMode::All);
        assert_eq!(
            " 1,3 ".parse::<PageSelectionMode>().unwrap(),
            PageSelectionMode::Custom("1,3".into())
        );
    }
}
