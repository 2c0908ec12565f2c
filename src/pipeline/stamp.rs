//! Page compositing: draw the installed overlay on the selected pages.
//!
//! Each target page gets:
//!
//! * an inline copy of its effective `/Resources` (own, referenced, or
//!   inherited from a `/Pages` ancestor), so shared resource objects and
//!   sibling pages are never modified;
//! * a collision-free XObject name pointing at the overlay form;
//! * its existing content wrapped in `q … Q`, followed by `q /Name Do Q`.
//!
//! Pages outside the selection are not touched at all.

use crate::config::PageSelectionMode;
use crate::error::{DocumentError, PdfSignError};
use crate::output::{output_name, SignedDocument};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::overlay::SignatureOverlay;
use crate::pipeline::select;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use tracing::{debug, info};

const OVERLAY_NAME: &str = "SigOverlay";

/// Stamp `overlay` onto the pages of `source` selected by `mode`.
pub fn stamp_document(
    source: &SourceDocument,
    overlay: &SignatureOverlay,
    mode: &PageSelectionMode,
) -> Result<SignedDocument, DocumentError> {
    let name = source.name.clone();

    let mut doc = Document::load_mem(&source.bytes).map_err(|e| {
        let detail = e.to_string();
        if detail.to_lowercase().contains("encrypt") {
            DocumentError::Encrypted { name: name.clone() }
        } else {
            DocumentError::Unreadable {
                name: name.clone(),
                detail,
            }
        }
    })?;
    if doc.is_encrypted() {
        return Err(DocumentError::Encrypted { name });
    }

    let pages = doc.get_pages();
    let total_pages = pages.len() as u32;
    let targets = select::resolve_pages(Some(mode), total_pages);
    if targets.is_empty() {
        return Err(DocumentError::NoPagesSelected {
            name,
            total: total_pages,
        });
    }

    let form_id = overlay.install(&mut doc);
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut close_ids: HashMap<Vec<u8>, ObjectId> = HashMap::new();

    for &page in &targets {
        let Some(&page_id) = pages.get(&page) else {
            return Err(stamp_failed(&name, page, "page object missing"));
        };

        let mut resources = effective_resources(&doc, page_id);
        let mut xobjects = resolve_dict(&doc, resources.get(b"XObject").ok());
        let overlay_name = unique_name(&xobjects, OVERLAY_NAME);
        xobjects.set(overlay_name.clone(), form_id);
        resources.set("XObject", xobjects);

        let close_id = *close_ids.entry(overlay_name.clone()).or_insert_with(|| {
            let mut ops = b"\nQ\nq /".to_vec();
            ops.extend_from_slice(&overlay_name);
            ops.extend_from_slice(b" Do Q\n");
            doc.add_object(Stream::new(Dictionary::new(), ops))
        });

        let mut contents = vec![Object::Reference(open_id)];
        let existing = existing_contents(&doc, page_id).map_err(|e| stamp_failed(&name, page, e))?;
        contents.extend(existing);
        contents.push(Object::Reference(close_id));

        let page_dict = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| stamp_failed(&name, page, e))?;

        page_dict.set("Resources", resources);
        page_dict.set("Contents", contents);
        debug!(
            "{}: stamped page {} as /{}",
            name,
            page,
            String::from_utf8_lossy(&overlay_name)
        );
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| DocumentError::SaveFailed {
        name: name.clone(),
        detail: e.to_string(),
    })?;

    info!(
        "{}: signed {} of {} page(s)",
        name,
        targets.len(),
        total_pages
    );

    Ok(SignedDocument {
        name: output_name(&name),
        bytes,
        pages_stamped: targets,
        total_pages,
    })
}

/// The page's content streams as a flat list of objects. `/Contents` may be
/// a stream reference, an array, or a reference to an array.
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, String> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| e.to_string())?;
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        Ok(Object::Array(items)) => Ok(items.clone()),
        Ok(_) => Err("unsupported /Contents entry".to_string()),
        Err(_) => Ok(Vec::new()),
    }
}

/// Page count of a document, without modifying it.
pub fn page_count(source: &SourceDocument) -> Result<u32, PdfSignError> {
    let doc = Document::load_mem(&source.bytes).map_err(|e| PdfSignError::CorruptPdf {
        name: source.name.clone(),
        detail: e.to_string(),
    })?;
    if doc.is_encrypted() {
        return Err(PdfSignError::PasswordProtected {
            name: source.name.clone(),
        });
    }
    Ok(doc.get_pages().len() as u32)
}

fn stamp_failed(name: &str, page: u32, detail: impl ToString) -> DocumentError {
    DocumentError::StampFailed {
        name: name.to_string(),
        page,
        detail: detail.to_string(),
    }
}

/// Owned copy of the page's own or nearest inherited `/Resources`.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    // Bounded walk: malformed trees can contain /Parent cycles.
    for _ in 0..64 {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(doc, Some(resources));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

/// Clone a dictionary that may be inline or behind a reference.
fn resolve_dict(doc: &Document, obj: Option<&Object>) -> Dictionary {
    match obj {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc
            .get_object(*id)
            .and_then(Object::as_dict)
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

fn unique_name(existing: &Dictionary, base: &str) -> Vec<u8> {
    let mut candidate = base.as_bytes().to_vec();
    let mut n = 1;
    while existing.has(&candidate) {
        candidate = format!("{base}{n}").into_bytes();
        n += 1;
    }
    candidate
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SignatureConfig;
    use crate::pipeline::overlay::tests::sample_png;
    use lopdf::dictionary;

    /// `n` pages, each with its own content stream; pages share one
    /// inherited resource dictionary on the `/Pages` node.
    pub(crate) fn sample_pdf(n: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "SigOverlay" => font_id },
        });
        let kids: Vec<Object> = (1..=n)
            .map(|i| {
                let content = format!("BT /F1 12 Tf 72 720 Td (Page {i}) Tj ET").into_bytes();
                let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => content_id,
                }))
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => n as i64,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn overlay() -> SignatureOverlay {
        let config = SignatureConfig::builder()
            .signer_name("Ada Lovelace")
            .build()
            .unwrap();
        SignatureOverlay::build(&config, &sample_png()).unwrap()
    }

    #[test]
    fn stamps_only_selected_pages() {
        let source = SourceDocument::new("contract.pdf", sample_pdf(3));
        let mode = PageSelectionMode::Custom("1,3".into());
        let signed = stamp_document(&source, &overlay(), &mode).unwrap();

        assert_eq!(signed.name, "signed_contract.pdf");
        assert_eq!(signed.pages_stamped, vec![1, 3]);
        assert_eq!(signed.total_pages, 3);

        let before = Document::load_mem(&source.bytes).unwrap();
        let after = Document::load_mem(&signed.bytes).unwrap();
        let before_pages = before.get_pages();
        let after_pages = after.get_pages();

        assert_eq!(
            before.get_page_content(before_pages[&2]).unwrap(),
            after.get_page_content(after_pages[&2]).unwrap()
        );
        for page in [1, 3] {
            let content = after.get_page_content(after_pages[&page]).unwrap();
            let text = String::from_utf8_lossy(&content);
            assert!(text.starts_with("q\n"), "page {page}: {text}");
            assert!(text.contains(&format!("(Page {page}) Tj")));
            // The inherited dictionary already uses /SigOverlay.
            assert!(text.trim_end().ends_with("q /SigOverlay1 Do Q"), "page {page}: {text}");
        }
    }

    #[test]
    fn referenced_contents_array_is_kept() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let stroke_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()));
        let array_id = doc.add_object(Object::Array(vec![stroke_id.into()]));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => array_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let source = SourceDocument::new("array.pdf", bytes);
        let signed = stamp_document(&source, &overlay(), &PageSelectionMode::FirstOnly).unwrap();

        let after = Document::load_mem(&signed.bytes).unwrap();
        let content = after.get_page_content(after.get_pages()[&1]).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("0 0 m 10 10 l S"), "original drawing lost: {text}");
        assert!(text.trim_end().ends_with("q /SigOverlay Do Q"), "{text}");
    }

    #[test]
    fn shared_resources_are_not_mutated() {
        let source = SourceDocument::new("a.pdf", sample_pdf(2));
        let signed = stamp_document(&source, &overlay(), &PageSelectionMode::FirstOnly).unwrap();
        let after = Document::load_mem(&signed.bytes).unwrap();
        let pages = after.get_pages();

        let page1 = after.get_object(pages[&1]).unwrap().as_dict().unwrap();
        let res1 = page1.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(res1.get(b"Font").unwrap().as_dict().unwrap().has(b"F1"));
        assert!(res1.get(b"XObject").unwrap().as_dict().unwrap().has(b"SigOverlay1"));

        let page2 = after.get_object(pages[&2]).unwrap().as_dict().unwrap();
        assert!(page2.get(b"Resources").is_err(), "page 2 still inherits");
    }

    #[test]
    fn all_pages_share_one_form() {
        let source = SourceDocument::new("a.pdf", sample_pdf(4));
        let signed = stamp_document(&source, &overlay(), &PageSelectionMode::All).unwrap();
        let after = Document::load_mem(&signed.bytes).unwrap();
        let forms = after
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Form".as_slice()))
            .count();
        assert_eq!(forms, 1);
        assert_eq!(signed.pages_stamped, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_selection_is_reported() {
        let source = SourceDocument::new("short.pdf", sample_pdf(2));
        let err = stamp_document(&source, &overlay(), &PageSelectionMode::Custom("5-9".into()))
            .unwrap_err();
        assert_eq!(
            err,
            DocumentError::NoPagesSelected {
                name: "short.pdf".into(),
                total: 2
            }
        );
    }

    #[test]
    fn garbage_is_unreadable() {
        let source = SourceDocument::new("junk.pdf", b"%PDF-1.4 garbage".to_vec());
        let err = stamp_document(&source, &overlay(), &PageSelectionMode::FirstOnly).unwrap_err();
        assert!(matches!(err, DocumentError::Unreadable { .. }), "{err:?}");
    }

    #[test]
    fn unique_name_skips_taken() {
        let mut dict = Dictionary::new();
        assert_eq!(unique_name(&dict, "X"), b"X".to_vec());
        dict.set("X", 1);
        dict.set("X1", 1);
        assert_eq!(unique_name(&dict, "X"), b"X2".to_vec());
    }

    #[test]
    fn counts_pages() {
        let five = SourceDocument::new("five.pdf", sample_pdf(5));
        assert_eq!(page_count(&five).unwrap(), 5);
        let junk = SourceDocument::new("junk.pdf", b"nope".to_vec());
        assert!(matches!(
            page_count(&junk),
            Err(PdfSignError::CorruptPdf { .. })
        ));
    }
}
