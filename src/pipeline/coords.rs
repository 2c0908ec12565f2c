//! Coordinate mapping between PDF points and preview pixels.
//!
//! PDF space has its origin at the bottom-left and counts in points; raster
//! space has its origin at the top-left and counts in pixels. The mapping is
//! only used to draw the preview. Stamping always works in PDF points.

use crate::config::PlacementRect;
use serde::Serialize;

/// Pixels between the name anchor and the date anchor in the preview.
pub const DATE_LINE_SPACING_PX: i64 = 15;

/// Pixels per point along each axis for one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    /// `None` when either page dimension is zero, negative or not finite.
    pub fn new(pdf_width: f64, pdf_height: f64, raster_width: u32, raster_height: u32) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(pdf_width) || !valid(pdf_height) {
            return None;
        }
        Some(Self {
            x: f64::from(raster_width) / pdf_width,
            y: f64::from(raster_height) / pdf_height,
        })
    }
}

/// Rectangle in raster pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RasterRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Where a text line starts in the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextAnchor {
    pub x: i64,
    pub y: i64,
}

/// The placement mapped onto one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterPlacement {
    pub rect: RasterRect,
    pub name_anchor: TextAnchor,
    pub date_anchor: TextAnchor,
    pub scale: ScaleFactors,
}

/// Map a PDF placement onto a rendered page of `raster_width × raster_height` pixels.
pub fn to_raster_rect(
    rect: &PlacementRect,
    text_offset_y: i32,
    pdf_width: f64,
    pdf_height: f64,
    raster_width: u32,
    raster_height: u32,
) -> Option<RasterPlacement> {
    let scale = ScaleFactors::new(pdf_width, pdf_height, raster_width, raster_height)?;

    let x = (rect.x * scale.x).round() as i64;
    let y = (f64::from(raster_height) - (rect.y + rect.height) * scale.y).round() as i64;
    let width = (rect.width * scale.x).round() as i64;
    let height = (rect.height * scale.y).round() as i64;

    let text_y = y + height + (f64::from(text_offset_y.unsigned_abs()) * scale.y).round() as i64;

    Some(RasterPlacement {
        rect: RasterRect {
            x,
            y,
            width,
            height,
        },
        name_anchor: TextAnchor { x, y: text_y },
        date_anchor: TextAnchor {
            x,
            y: text_y + DATE_LINE_SPACING_PX,
        },
        scale,
    })
}

/// Inverse of [`to_raster_rect`] for the rectangle itself.
pub fn to_pdf_rect(rect: &RasterRect, scale: ScaleFactors, raster_height: u32) -> PlacementRect {
    let height = rect.height as f64 / scale.y;
    PlacementRect {
        x: rect.x as f64 / scale.x,
        y: (f64::from(raster_height) - rect.y as f64) / scale.y - height,
        width: rect.width as f64 / scale.x,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER_W: f64 = 612.0;
    const LETTER_H: f64 = 792.0;

    #[test]
    fn unit_scale_flips_y() {
        let rect = PlacementRect::new(400.0, 100.0, 120.0, 60.0);
        let p = to_raster_rect(&rect, -20, LETTER_W, LETTER_H, 612, 792).unwrap();
        assert_eq!(
            p.rect,
            RasterRect {
                x: 400,
                y: 792 - 160,
                width: 120,
                height: 60
            }
        );
        assert_eq!(p.name_anchor, TextAnchor { x: 400, y: 632 + 60 + 20 });
        assert_eq!(p.date_anchor.y, p.name_anchor.y + DATE_LINE_SPACING_PX);
    }

    #[test]
    fn preview_zoom_scales_both_axes() {
        let rect = PlacementRect::new(100.0, 200.0, 50.0, 30.0);
        let p = to_raster_rect(&rect, 10, LETTER_W, LETTER_H, 918, 1188).unwrap();
        assert!((p.scale.x - 1.5).abs() < 1e-9);
        assert_eq!(p.rect.x, 150);
        assert_eq!(p.rect.y, 1188 - 345);
        assert_eq!(p.rect.width, 75);
        assert_eq!(p.rect.height, 45);
        // Offset sign is ignored in raster space.
        assert_eq!(p.name_anchor.y, p.rect.y + 45 + 15);
    }

    #[test]
    fn degenerate_page_has_no_placement() {
        let rect = PlacementRect::default();
        assert!(to_raster_rect(&rect, 0, 0.0, LETTER_H, 10, 10).is_none());
        assert!(to_raster_rect(&rect, 0, LETTER_W, -1.0, 10, 10).is_none());
        assert!(to_raster_rect(&rect, 0, f64::NAN, LETTER_H, 10, 10).is_none());
    }

    #[test]
    fn round_trip_at_unit_scale() {
        let rect = PlacementRect::new(37.0, 512.0, 88.0, 41.0);
        let p = to_raster_rect(&rect, 0, LETTER_W, LETTER_H, 612, 792).unwrap();
        let back = to_pdf_rect(&p.rect, p.scale, 792);
        assert_eq!(back, rect);
    }

    #[test]
    fn round_trip_within_tolerance_at_zoom() {
        let rect = PlacementRect::new(123.4, 456.7, 150.2, 75.9);
        let p = to_raster_rect(&rect, 0, 595.0, 842.0, 893, 1263).unwrap();
        let back = to_pdf_rect(&p.rect, p.scale, 1263);
        let tol = 1.0;
        assert!((back.x - rect.x).abs() < tol);
        assert!((back.y - rect.y).abs() < tol);
        assert!((back.width - rect.width).abs() < tol);
        assert!((back.height - rect.height).abs() < tol);
    }
}
