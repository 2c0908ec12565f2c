//! Pipeline stages for signing PDF documents.
//!
//! Each submodule implements exactly one step. Stages share plain data types
//! and never reach into each other's internals, so each one is testable on
//! its own.
//!
//! ## Data Flow
//!
//! ```text
//!               ┌──▶ select ──▶ stamp ──▶ signed PDF bytes
//! input ──▶ overlay ┤
//! (bytes)       └──▶ render ──▶ coords ──▶ preview image
//! ```
//!
//! 1. [`input`]: read a document from disk and check the `%PDF` header
//! 2. [`select`]: resolve the page selection against a page count
//! 3. [`overlay`]: build the signature overlay once per run (lopdf objects)
//! 4. [`stamp`]: composite the overlay onto the selected pages of one document
//! 5. [`render`]: rasterise one page through pdfium (previews only)
//! 6. [`coords`]: map PDF points to raster pixels and back
//! 7. [`preview`]: draw the placement over the rendered page

pub mod coords;
pub mod input;
pub mod overlay;
pub mod preview;
pub mod render;
pub mod select;
pub mod stamp;
