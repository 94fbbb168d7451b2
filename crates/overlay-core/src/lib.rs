//! PDF overlay engine
//!
//! This crate replays a list of overlay elements (text and signatures) onto
//! an uploaded PDF using lopdf. The processed PDF is always regenerated from
//! the original upload, so the element list is the single source of truth.
//!
//! - `elements`: persisted element schema and the ordered `ElementLog`
//! - `coords`: UI coordinate normalization (ratios, percentages, points)
//! - `render`: regeneration of the processed PDF
//! - `signature`: SVG preview generation for typed signatures

pub mod coords;
pub mod elements;
pub mod error;
pub mod fonts;
pub mod image;
pub mod render;
pub mod signature;

pub use coords::{clamp_page, normalize_coords, PageBox};
pub use elements::{ElementId, ElementLog, OverlayElement};
pub use error::OverlayError;
pub use render::{apply_elements, apply_log};
pub use signature::SignaturePreview;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, OverlayError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| OverlayError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse PDF bytes and return the media box of every page, in page order
pub fn get_page_boxes(bytes: &[u8]) -> Result<Vec<PageBox>, OverlayError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| OverlayError::ParseError(e.to_string()))?;
    Ok(doc
        .get_pages()
        .into_values()
        .map(|page_id| render::page_box(&doc, page_id))
        .collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::{dictionary, Document, Object};

    /// Build a minimal PDF with one empty page per media box.
    pub fn create_test_pdf(media_boxes: &[[i64; 4]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();

        for mb in media_boxes {
            let content_id = doc.add_object(lopdf::Stream::new(
                dictionary! {},
                b"BT /F1 10 Tf 20 20 Td (Original) Tj ET".to_vec(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => mb.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => dictionary! {
                    "Font" => dictionary! {
                        "F1" => dictionary! {
                            "Type" => "Font",
                            "Subtype" => "Type1",
                            "BaseFont" => "Courier",
                        },
                    },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub fn letter_pdf() -> Vec<u8> {
        create_test_pdf(&[[0, 0, 612, 792]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_pdf;

    #[test]
    fn test_page_count() {
        let pdf = create_test_pdf(&[[0, 0, 612, 792], [0, 0, 595, 842]]);
        assert_eq!(get_page_count(&pdf).unwrap(), 2);
    }

    #[test]
    fn test_page_boxes_in_page_order() {
        let pdf = create_test_pdf(&[[0, 0, 612, 792], [0, 0, 595, 842]]);
        let boxes = get_page_boxes(&pdf).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].width, 612.0);
        assert_eq!(boxes[1].height, 842.0);
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        let err = get_page_count(b"not a pdf").unwrap_err();
        assert!(matches!(err, OverlayError::ParseError(_)));
    }

    #[test]
    fn test_element_deserializes_text() {
        let json = r#"{"type":"text","x":10,"y":20,"content":"Hello"}"#;
        let element: OverlayElement = serde_json::from_str(json).unwrap();
        assert!(matches!(element, OverlayElement::Text { .. }));
        assert_eq!(element.page(), 0);
    }

    #[test]
    fn test_element_deserializes_signature() {
        let json = r#"{"type":"signature","x":0.5,"y":0.5,"page":2,"content":"J. Doe","font":"Great Vibes"}"#;
        let element: OverlayElement = serde_json::from_str(json).unwrap();
        assert!(matches!(element, OverlayElement::Signature { .. }));
        assert_eq!(element.page(), 2);
    }
}
