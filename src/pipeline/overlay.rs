//! Signature overlay: the image plus the name and date lines, as PDF objects.
//!
//! The overlay is built once per run and installed into each output document
//! as a single Form XObject. Every stamped page of that document draws the
//! same object, so the image data is stored once per file no matter how many
//! pages are signed.
//!
//! ## Why a Form XObject instead of merging a page?
//!
//! Merging an overlay page would mean rewriting resource names on both sides.
//! A form carries its own `/Resources`, so the only name the target page has
//! to know is the form's own, and that one is picked to avoid collisions.
//!
//! ## Transparency
//!
//! The decoded image is split into an RGB image and an 8-bit DeviceGray soft
//! mask, so transparent PNG backgrounds stay transparent on the page.

use crate::config::{PlacementRect, SignatureConfig};
use crate::error::PdfSignError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;
use tracing::debug;

/// US-Letter page size used for the standalone overlay export.
pub const LETTER_SIZE_PTS: (f64, f64) = (612.0, 792.0);

/// Distance between the name and date baselines, in points.
pub const DATE_LINE_GAP_PTS: f64 = 12.0;

const IMAGE_RESOURCE: &str = "SigImg";
const FONT_RESOURCE: &str = "SigFont";

/// One line of text drawn by the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayText {
    pub text: String,
    pub x: f64,
    /// Baseline, in PDF points.
    pub y: f64,
    pub size: f64,
}

/// A ready-to-install signature overlay.
#[derive(Debug, Clone)]
pub struct SignatureOverlay {
    placement: PlacementRect,
    lines: Vec<OverlayText>,
    image_width: u32,
    image_height: u32,
    /// Flate-compressed RGB samples.
    rgb: Vec<u8>,
    /// Flate-compressed alpha samples.
    alpha: Vec<u8>,
    content: Vec<u8>,
    bbox: [f64; 4],
}

impl SignatureOverlay {
    /// Decode the signature image and lay out the overlay for `config`.
    pub fn build(config: &SignatureConfig, signature_image: &[u8]) -> Result<Self, PdfSignError> {
        let img = image::load_from_memory(signature_image)
            .map_err(|e| PdfSignError::InvalidSignatureImage {
                detail: e.to_string(),
            })?
            .to_rgba8();
        let (image_width, image_height) = img.dimensions();
        if image_width == 0 || image_height == 0 {
            return Err(PdfSignError::InvalidSignatureImage {
                detail: "image has no pixels".into(),
            });
        }

        let pixels = (image_width * image_height) as usize;
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for pixel in img.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let placement = config.placement;
        let lines = layout_text(config);
        let content = form_content(&placement, &lines)?;
        let bbox = bounding_box(&placement, &lines);

        debug!(
            "Built overlay: image {}x{} px, {} text line(s)",
            image_width,
            image_height,
            lines.len()
        );

        Ok(Self {
            placement,
            lines,
            image_width,
            image_height,
            rgb: deflate(&rgb)?,
            alpha: deflate(&alpha)?,
            content,
            bbox,
        })
    }

    /// Where the image is drawn, in PDF points.
    pub fn placement(&self) -> &PlacementRect {
        &self.placement
    }

    /// Text lines in drawing order (name first, then date).
    pub fn lines(&self) -> &[OverlayText] {
        &self.lines
    }

    /// Size of the embedded image in pixels.
    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    /// Copy the overlay into `doc` as one Form XObject and return its id.
    pub fn install(&self, doc: &mut Document) -> ObjectId {
        let image_dict = |color_space: &str| {
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(self.image_width),
                "Height" => i64::from(self.image_height),
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            }
        };

        let smask_id = doc.add_object(Stream::new(image_dict("DeviceGray"), self.alpha.clone()));

        let mut rgb_dict = image_dict("DeviceRGB");
        rgb_dict.set("SMask", smask_id);
        let image_id = doc.add_object(Stream::new(rgb_dict, self.rgb.clone()));

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let form = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => self.bbox.iter().map(|v| real(*v)).collect::<Vec<_>>(),
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
                "Font" => dictionary! { FONT_RESOURCE => font_id },
            },
        };
        doc.add_object(Stream::new(form, self.content.clone()))
    }

    /// Export the overlay alone on a transparent US-Letter page.
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, PdfSignError> {
        let mut doc = Document::with_version("1.7");
        let form_id = self.install(&mut doc);
        let pages_id = doc.new_object_id();

        let draw = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("Do", vec![Object::Name(b"Overlay".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = draw
            .encode()
            .map_err(|e| PdfSignError::OverlayFailed(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let (w, h) = LETTER_SIZE_PTS;
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(w), real(h)],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Overlay" => form_id },
            },
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| PdfSignError::OverlayFailed(e.to_string()))?;
        Ok(out)
    }
}

fn layout_text(config: &SignatureConfig) -> Vec<OverlayText> {
    let text = &config.text;
    let p = &config.placement;
    let name_y = p.y + f64::from(text.text_offset_y);
    let mut lines = Vec::with_capacity(2);

    if let Some(name) = text.name_line() {
        lines.push(OverlayText {
            text: name,
            x: p.x,
            y: name_y,
            size: f64::from(text.text_size),
        });
    }
    if let Some(date) = text.date_line() {
        lines.push(OverlayText {
            text: date,
            x: p.x,
            y: name_y - DATE_LINE_GAP_PTS,
            size: f64::from(text.date_text_size()),
        });
    }
    lines
}

fn form_content(placement: &PlacementRect, lines: &[OverlayText]) -> Result<Vec<u8>, PdfSignError> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(placement.width),
                0.into(),
                0.into(),
                real(placement.height),
                real(placement.x),
                real(placement.y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ];

    for line in lines {
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("g", vec![0.into()]),
            Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), real(line.size)],
            ),
            Operation::new("Td", vec![real(line.x), real(line.y)]),
            Operation::new(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(&line.text),
                    StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    Content { operations: ops }
        .encode()
        .map_err(|e| PdfSignError::OverlayFailed(e.to_string()))
}

/// Union of the letter page and everything the overlay draws.
///
/// Text width is estimated generously at one em per character.
fn bounding_box(placement: &PlacementRect, lines: &[OverlayText]) -> [f64; 4] {
    let (page_w, page_h) = LETTER_SIZE_PTS;
    let mut bbox = [
        placement.x.min(0.0),
        placement.y.min(0.0),
        (placement.x + placement.width).max(page_w),
        (placement.y + placement.height).max(page_h),
    ];
    for line in lines {
        let width = line.text.chars().count() as f64 * line.size;
        bbox[0] = bbox[0].min(line.x);
        bbox[1] = bbox[1].min(line.y - line.size);
        bbox[2] = bbox[2].max(line.x + width);
        bbox[3] = bbox[3].max(line.y + line.size);
    }
    bbox
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfSignError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfSignError::OverlayFailed(format!("compression failed: {e}")))
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Encode text for a standard font with `/WinAnsiEncoding`.
///
/// Characters the encoding cannot represent become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => win_ansi_special(c).unwrap_or(b'?'),
        })
        .collect()
}

fn win_ansi_special(c: char) -> Option<u8> {
    Some(match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    /// A small half-transparent PNG.
    pub(crate) fn sample_png() -> Vec<u8> {
        let img = ImageBuffer::from_fn(8, 4, |x, _| {
            if x < 4 {
                Rgba([0u8, 0, 128, 255])
            } else {
                Rgba([255u8, 255, 255, 0])
            }
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn config() -> SignatureConfig {
        SignatureConfig::builder()
            .signer_name("Zoë Müller")
            .signing_date(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn lines_follow_offset_and_gap() {
        let overlay = SignatureOverlay::build(&config(), &sample_png()).unwrap();
        let lines = overlay.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Signed by: Zoë Müller");
        assert_eq!((lines[0].x, lines[0].y, lines[0].size), (400.0, 80.0, 8.0));
        assert_eq!(lines[1].text, "Date: 16/10/2026");
        assert_eq!((lines[1].y, lines[1].size), (68.0, 7.0));
        assert_eq!(overlay.image_size(), (8, 4));
    }

    #[test]
    fn no_lines_without_name_or_date() {
        let cfg = config()
            .to_builder()
            .signer_name("")
            .include_date(false)
            .build()
            .unwrap();
        let overlay = SignatureOverlay::build(&cfg, &sample_png()).unwrap();
        assert!(overlay.lines().is_empty());
    }

    #[test]
    fn rejects_garbage_image() {
        let err = SignatureOverlay::build(&config(), b"not a png").unwrap_err();
        assert!(matches!(err, PdfSignError::InvalidSignatureImage { .. }));
    }

    #[test]
    fn install_adds_form_with_image_and_font() {
        let overlay = SignatureOverlay::build(&config(), &sample_png()).unwrap();
        let mut doc = Document::with_version("1.7");
        let form_id = overlay.install(&mut doc);

        let form = doc.get_object(form_id).unwrap().as_stream().unwrap();
        assert_eq!(form.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");
        let resources = form.dict.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(b"SigImg").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert!(image.dict.get(b"SMask").is_ok());
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 8);

        let content = String::from_utf8_lossy(&form.content);
        assert!(content.contains("/SigImg Do"), "content: {content}");
        assert!(content.contains("Tj"));
    }

    #[test]
    fn bbox_covers_text_below_page_origin() {
        let cfg = config()
            .to_builder()
            .position(0.0, 0.0)
            .text_offset_y(-50)
            .build()
            .unwrap();
        let overlay = SignatureOverlay::build(&cfg, &sample_png()).unwrap();
        assert!(overlay.bbox[1] < -62.0);
        assert_eq!(overlay.bbox[3], 792.0);
    }

    #[test]
    fn standalone_export_is_one_letter_page() {
        let overlay = SignatureOverlay::build(&config(), &sample_png()).unwrap();
        let bytes = overlay.to_pdf_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn win_ansi_encoding() {
        assert_eq!(encode_win_ansi("Zoë"), vec![b'Z', b'o', 0xEB]);
        assert_eq!(encode_win_ansi("€ – ok"), vec![0x80, b' ', 0x96, b' ', b'o', b'k']);
        assert_eq!(encode_win_ansi("李"), b"?".to_vec());
        assert_eq!(encode_win_ansi("a\tb"), b"a?b".to_vec());
    }
}
