//! Preview composition: show where the signature will land.
//!
//! The rendered page gets the signature image pasted into the placement
//! rectangle, a translucent red fill over it, a red outline, and short red
//! bars where the name and date lines start. Text is not typeset in the
//! preview; the bar length is estimated from the line length.

use crate::config::SignatureConfig;
use crate::error::PdfSignError;
use crate::pipeline::coords::{self, RasterPlacement, RasterRect, TextAnchor};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::render::{self, RenderedPage, PREVIEW_ZOOM};
use crate::pipeline::select;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use pdfium_render::prelude::Pdfium;
use std::io::Cursor;
use tracing::warn;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const FILL_ALPHA: u8 = 50;
const OUTLINE_PX: i64 = 3;
const MARKER_PX: i64 = 2;

/// A composed preview of one page.
pub struct PreviewOutput {
    pub image: RgbaImage,
    /// 1-indexed page shown.
    pub page_number: u32,
    pub total_pages: u32,
    /// e.g. "Page 3 (first of selected pages: 3, 5)".
    pub info: String,
    /// `None` when the page had degenerate dimensions.
    pub placement: Option<RasterPlacement>,
}

impl PreviewOutput {
    /// Encode the preview as PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PdfSignError> {
        let mut out = Cursor::new(Vec::new());
        self.image
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| PdfSignError::Internal(format!("PNG encoding failed: {e}")))?;
        Ok(out.into_inner())
    }
}

/// Render the preview page of `source` and draw the placement on it.
pub fn preview_document(
    pdfium: &Pdfium,
    source: &SourceDocument,
    config: &SignatureConfig,
    signature_image: Option<&[u8]>,
) -> Result<PreviewOutput, PdfSignError> {
    let signature = signature_image
        .map(|bytes| {
            image::load_from_memory(bytes).map_err(|e| PdfSignError::InvalidSignatureImage {
                detail: e.to_string(),
            })
        })
        .transpose()?;

    let rendered = render::render_page_with(pdfium, source, PREVIEW_ZOOM, |total| {
        select::preview_page_index(Some(&config.pages), total)
    })?;

    let (image, placement) = compose_preview(&rendered, config, signature.as_ref());
    if placement.is_none() {
        warn!(
            "{}: page {} has no usable size; preview shows no placement",
            source.name,
            rendered.page_index + 1
        );
    }

    Ok(PreviewOutput {
        image,
        page_number: rendered.page_index as u32 + 1,
        total_pages: rendered.total_pages,
        info: select::describe_preview(Some(&config.pages), rendered.total_pages),
        placement,
    })
}

/// Draw the placement onto a rendered page.
pub fn compose_preview(
    rendered: &RenderedPage,
    config: &SignatureConfig,
    signature: Option<&DynamicImage>,
) -> (RgbaImage, Option<RasterPlacement>) {
    let mut canvas = rendered.image.to_rgba8();
    let placement = coords::to_raster_rect(
        &config.placement,
        config.text.text_offset_y,
        rendered.page_width_pts,
        rendered.page_height_pts,
        canvas.width(),
        canvas.height(),
    );

    let Some(p) = placement else {
        return (canvas, None);
    };
    let rect = p.rect;

    if let (Some(sig), true) = (signature, rect.width > 0 && rect.height > 0) {
        let scaled = imageops::resize(
            &sig.to_rgba8(),
            rect.width as u32,
            rect.height as u32,
            FilterType::Triangle,
        );
        imageops::overlay(&mut canvas, &scaled, rect.x, rect.y);
    }

    blend_rect(&mut canvas, &rect, RED, FILL_ALPHA);
    stroke_rect(&mut canvas, &rect, OUTLINE_PX, RED);

    let px_per_char = f64::from(config.text.text_size) * p.scale.x * 0.5;
    if let Some(line) = config.text.name_line() {
        marker(&mut canvas, p.name_anchor, line.chars().count(), px_per_char);
    }
    if let Some(line) = config.text.date_line() {
        marker(&mut canvas, p.date_anchor, line.chars().count(), px_per_char);
    }

    (canvas, placement)
}

fn marker(canvas: &mut RgbaImage, anchor: TextAnchor, chars: usize, px_per_char: f64) {
    let width = (chars as f64 * px_per_char).round() as i64;
    let bar = RasterRect {
        x: anchor.x,
        y: anchor.y - MARKER_PX,
        width: width.max(1),
        height: MARKER_PX,
    };
    fill_rect(canvas, &bar, RED);
}

/// Pixel bounds of `rect` clipped to the canvas, as half-open ranges.
fn clip(canvas: &RgbaImage, rect: &RasterRect) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.width).min(i64::from(canvas.width()));
    let y1 = (rect.y + rect.height).min(i64::from(canvas.height()));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

fn fill_rect(canvas: &mut RgbaImage, rect: &RasterRect, color: Rgba<u8>) {
    if let Some((x0, y0, x1, y1)) = clip(canvas, rect) {
        for y in y0..y1 {
            for x in x0..x1 {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

fn blend_rect(canvas: &mut RgbaImage, rect: &RasterRect, color: Rgba<u8>, alpha: u8) {
    let Some((x0, y0, x1, y1)) = clip(canvas, rect) else {
        return;
    };
    let a = u32::from(alpha);
    for y in y0..y1 {
        for x in x0..x1 {
            let px = canvas.get_pixel_mut(x, y);
            for c in 0..3 {
                let mixed = (u32::from(px.0[c]) * (255 - a) + u32::from(color.0[c]) * a) / 255;
                px.0[c] = mixed as u8;
            }
        }
    }
}

fn stroke_rect(canvas: &mut RgbaImage, rect: &RasterRect, thickness: i64, color: Rgba<u8>) {
    let t = thickness.min(rect.width).min(rect.height);
    let edges = [
        RasterRect { height: t, ..*rect },
        RasterRect {
            y: rect.y + rect.height - t,
            height: t,
            ..*rect
        },
        RasterRect { width: t, ..*rect },
        RasterRect {
            x: rect.x + rect.width - t,
            width: t,
            ..*rect
        },
    ];
    for edge in &edges {
        fill_rect(canvas, edge, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementRect;
    use image::Rgb;

    /// A blank US-Letter page rendered at unit scale.
    fn blank_page() -> RenderedPage {
        RenderedPage {
            image: DynamicImage::ImageRgb8(image::ImageBuffer::from_pixel(
                612,
                792,
                Rgb([255, 255, 255]),
            )),
            page_index: 0,
            total_pages: 1,
            page_width_pts: 612.0,
            page_height_pts: 792.0,
        }
    }

    fn config() -> SignatureConfig {
        SignatureConfig::builder()
            .placement(PlacementRect::new(100.0, 100.0, 100.0, 50.0))
            .signer_name("Ada")
            .build()
            .unwrap()
    }

    #[test]
    fn outline_and_fill_are_drawn() {
        let (img, placement) = compose_preview(&blank_page(), &config(), None);
        let rect = placement.unwrap().rect;
        assert_eq!(rect, RasterRect { x: 100, y: 642, width: 100, height: 50 });

        // Outline pixel.
        assert_eq!(*img.get_pixel(100, 642), RED);
        // Interior: white blended with red at alpha 50.
        let inner = img.get_pixel(150, 667);
        assert_eq!(inner.0[0], 255);
        assert_eq!(inner.0[1], 205);
        // Outside is untouched.
        assert_eq!(*img.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn markers_at_text_anchors() {
        let (img, placement) = compose_preview(&blank_page(), &config(), None);
        let p = placement.unwrap();
        let name_y = (p.name_anchor.y - 1) as u32;
        let date_y = (p.date_anchor.y - 1) as u32;
        assert_eq!(*img.get_pixel(p.name_anchor.x as u32, name_y), RED);
        assert_eq!(*img.get_pixel(p.date_anchor.x as u32, date_y), RED);
    }

    #[test]
    fn signature_is_pasted() {
        let sig = DynamicImage::ImageRgba8(image::ImageBuffer::from_pixel(
            10,
            5,
            Rgba([0, 0, 255, 255]),
        ));
        let (img, _) = compose_preview(&blank_page(), &config(), Some(&sig));
        let inner = img.get_pixel(150, 667);
        // Blue signature under a translucent red fill.
        assert!(inner.0[2] > 150, "{inner:?}");
        assert!(inner.0[1] < 10, "{inner:?}");
    }

    #[test]
    fn degenerate_page_yields_no_placement() {
        let mut page = blank_page();
        page.page_width_pts = 0.0;
        let (img, placement) = compose_preview(&page, &config(), None);
        assert!(placement.is_none());
        assert_eq!(img.dimensions(), (612, 792));
    }

    #[test]
    fn drawing_is_clipped_to_canvas() {
        let cfg = SignatureConfig::builder()
            .placement(PlacementRect::new(500.0, 700.0, 200.0, 150.0))
            .build()
            .unwrap();
        let (_, placement) = compose_preview(&blank_page(), &cfg, None);
        assert!(placement.unwrap().rect.y < 0);
    }

    #[test]
    fn png_encoding() {
        let out = PreviewOutput {
            image: RgbaImage::new(4, 4),
            page_number: 1,
            total_pages: 1,
            info: "Page 1".into(),
            placement: None,
        };
        assert!(out.to_png_bytes().unwrap().starts_with(b"\x89PNG"));
    }
}
