//! Regenerate the processed PDF from overlay elements

use std::collections::{BTreeMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use crate::coords::{clamp_page, normalize_coords, PageBox};
use crate::elements::{ElementLog, OverlayElement, SIGNATURE_PLACEHOLDER};
use crate::error::OverlayError;
use crate::fonts::{encode_win_ansi, standard_font, text_width, uses_win_ansi};
use crate::image::SignatureImage;

pub const TEXT_FONT_SIZE: f64 = 12.0;
pub const SIGNATURE_FONT_SIZE: f64 = 16.0;
pub const SIGNATURE_IMAGE_WIDTH: f64 = 150.0;
pub const SIGNATURE_IMAGE_HEIGHT: f64 = 50.0;

/// Background box padding as a fraction of the font size
const TEXT_PADDING_RATIO: f64 = 0.3;
const SIGNATURE_PADDING_RATIO: f64 = 0.5;
/// Fill alpha of the white box behind overlay text
const BACKGROUND_OPACITY: f32 = 0.65;

/// Page tree depth limit when resolving inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Apply every element of the log to the original PDF
pub fn apply_log(pdf_bytes: &[u8], log: &ElementLog) -> Result<Vec<u8>, OverlayError> {
    apply_elements(pdf_bytes, log.elements())
}

/// Replay `elements` in order onto `pdf_bytes` and return the new PDF.
///
/// The source bytes are never modified; an empty element list returns them
/// unchanged.
pub fn apply_elements(
    pdf_bytes: &[u8],
    elements: &[OverlayElement],
) -> Result<Vec<u8>, OverlayError> {
    if elements.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| OverlayError::ParseError(e.to_string()))?;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(OverlayError::NoPages);
    }

    let mut canvases: BTreeMap<usize, PageCanvas> = BTreeMap::new();

    for (index, element) in elements.iter().enumerate() {
        element.validate()?;

        let page_index = clamp_page(element.page(), pages.len());
        let page_id = pages[page_index];
        let page_box = page_box(&doc, page_id);
        let (x, y) = element.position();
        let (x_pt, y_pt) = normalize_coords(x, y, &page_box);

        debug!(
            element = index + 1,
            kind = element.kind(),
            page = page_index,
            x,
            y,
            x_pt,
            y_pt,
            page_width = page_box.width,
            page_height = page_box.height,
            "Converted overlay coordinates"
        );

        if !canvases.contains_key(&page_index) {
            let taken = resource_names(&doc, page_id);
            canvases.insert(page_index, PageCanvas::new(taken));
        }
        if let Some(canvas) = canvases.get_mut(&page_index) {
            draw_element(&mut doc, canvas, element, x_pt, y_pt)?;
        }
    }

    for (page_index, canvas) in canvases {
        canvas.attach(&mut doc, pages[page_index])?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| OverlayError::OperationError(e.to_string()))?;

    Ok(output)
}

fn draw_element(
    doc: &mut Document,
    canvas: &mut PageCanvas,
    element: &OverlayElement,
    x: f64,
    y: f64,
) -> Result<(), OverlayError> {
    match element {
        OverlayElement::Text {
            content,
            font,
            font_size,
            ..
        } => {
            let font = standard_font(font.as_deref(), false, false);
            let size = font_size.unwrap_or(TEXT_FONT_SIZE);
            canvas.draw_text_with_background(content, font, size, TEXT_PADDING_RATIO, x, y);
        }
        OverlayElement::Signature {
            content,
            font,
            signature_data,
            ..
        } => {
            let inline_image = content.as_deref().filter(|c| is_data_url(c));
            let image_data = signature_data
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .or(inline_image);
            if let Some(data) = image_data {
                match embed_signature_image(doc, data) {
                    Ok(image_id) => {
                        let name = canvas.image(image_id);
                        canvas.draw_image(
                            &name,
                            x,
                            y,
                            SIGNATURE_IMAGE_WIDTH,
                            SIGNATURE_IMAGE_HEIGHT,
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "Signature image unusable, drawing signature text instead");
                    }
                }
            }

            let text = content
                .as_deref()
                .filter(|c| !c.trim().is_empty() && !is_data_url(c))
                .unwrap_or(SIGNATURE_PLACEHOLDER);
            let font = standard_font(font.as_deref(), false, false);
            canvas.draw_text_with_background(
                text,
                font,
                SIGNATURE_FONT_SIZE,
                SIGNATURE_PADDING_RATIO,
                x,
                y,
            );
        }
    }
    Ok(())
}

fn is_data_url(value: &str) -> bool {
    value.trim_start().starts_with("data:")
}

/// Add the image (and its soft mask) to the document, returning the image id
fn embed_signature_image(doc: &mut Document, data_url: &str) -> Result<ObjectId, OverlayError> {
    let image = SignatureImage::from_data_url(data_url)?;
    let (mut stream, mask) = image.to_streams()?;
    if let Some(mask) = mask {
        let mask_id = doc.add_object(mask);
        stream.dict.set("SMask", Object::Reference(mask_id));
    }
    Ok(doc.add_object(stream))
}

/// Overlay operations and resources collected for one page
struct PageCanvas {
    operations: Vec<Operation>,
    fonts: BTreeMap<&'static str, String>,
    images: Vec<(String, ObjectId)>,
    translucent: Option<String>,
    taken: HashSet<Vec<u8>>,
    counter: usize,
}

impl PageCanvas {
    fn new(taken: HashSet<Vec<u8>>) -> Self {
        Self {
            operations: Vec::new(),
            fonts: BTreeMap::new(),
            images: Vec::new(),
            translucent: None,
            taken,
            counter: 0,
        }
    }

    fn unique_name(&mut self, kind: &str) -> String {
        loop {
            self.counter += 1;
            let name = format!("Ov{}{}", kind, self.counter);
            if self.taken.insert(name.clone().into_bytes()) {
                return name;
            }
        }
    }

    fn font(&mut self, base_font: &'static str) -> String {
        if let Some(name) = self.fonts.get(base_font) {
            return name.clone();
        }
        let name = self.unique_name("F");
        self.fonts.insert(base_font, name.clone());
        name
    }

    fn translucent_state(&mut self) -> String {
        if let Some(name) = &self.translucent {
            return name.clone();
        }
        let name = self.unique_name("GS");
        self.translucent = Some(name.clone());
        name
    }

    fn image(&mut self, image_id: ObjectId) -> String {
        let name = self.unique_name("Im");
        self.images.push((name.clone(), image_id));
        name
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    /// Text at `(x, y)` on a translucent white box padded by
    /// `padding_ratio * size` on every side
    fn draw_text_with_background(
        &mut self,
        text: &str,
        font: &'static str,
        size: f64,
        padding_ratio: f64,
        x: f64,
        y: f64,
    ) {
        let padding = size * padding_ratio;
        let width = text_width(font, text, size);
        let font_name = self.font(font);
        let gs_name = self.translucent_state();
        let encoded = if uses_win_ansi(font) {
            encode_win_ansi(text)
        } else {
            text.bytes().filter(u8::is_ascii).collect()
        };

        self.push("q", vec![]);

        self.push("q", vec![]);
        self.push("gs", vec![Object::Name(gs_name.into_bytes())]);
        self.push("rg", vec![real(1.0), real(1.0), real(1.0)]);
        self.push(
            "re",
            vec![
                real(x - padding),
                real(y - padding),
                real(width + padding * 2.0),
                real(size + padding * 2.0),
            ],
        );
        self.push("f", vec![]);
        self.push("Q", vec![]);

        self.push("rg", vec![real(0.0), real(0.0), real(0.0)]);
        self.push("BT", vec![]);
        self.push("Tf", vec![Object::Name(font_name.into_bytes()), real(size)]);
        self.push("Td", vec![real(x), real(y)]);
        self.push("Tj", vec![Object::String(encoded, StringFormat::Literal)]);
        self.push("ET", vec![]);

        self.push("Q", vec![]);
    }

    fn draw_image(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) {
        self.push("q", vec![]);
        self.push(
            "cm",
            vec![
                real(width),
                real(0.0),
                real(0.0),
                real(height),
                real(x),
                real(y),
            ],
        );
        self.push("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.push("Q", vec![]);
    }

    /// Wrap the existing page content in `q`/`Q`, append the overlay stream
    /// and register the overlay resources on the page.
    fn attach(self, doc: &mut Document, page_id: ObjectId) -> Result<(), OverlayError> {
        let mut resources = page_resources(doc, page_id);

        merge_resources(
            &mut resources,
            b"Font",
            self.fonts
                .iter()
                .map(|(base, name)| (name.clone(), Object::Dictionary(font_dict(*base))))
                .collect(),
        );
        merge_resources(
            &mut resources,
            b"XObject",
            self.images
                .iter()
                .map(|(name, id)| (name.clone(), Object::Reference(*id)))
                .collect(),
        );
        if let Some(name) = &self.translucent {
            merge_resources(
                &mut resources,
                b"ExtGState",
                vec![(
                    name.clone(),
                    Object::Dictionary(dictionary! {
                        "Type" => "ExtGState",
                        "ca" => Object::Real(BACKGROUND_OPACITY),
                    }),
                )],
            );
        }

        // Existing streams may not end with whitespace
        let mut overlay = b"\nQ\n".to_vec();
        overlay.extend(
            Content {
                operations: self.operations,
            }
            .encode()?,
        );

        let mut contents = vec![Object::Reference(
            doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec())),
        )];
        contents.extend(existing_contents(doc, page_id));
        contents.push(Object::Reference(
            doc.add_object(Stream::new(dictionary! {}, overlay)),
        ));

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));

        Ok(())
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn font_dict(base_font: &'static str) -> Dictionary {
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
    };
    if uses_win_ansi(base_font) {
        font.set("Encoding", "WinAnsiEncoding");
    }
    font
}

fn merge_resources(resources: &mut Dictionary, key: &[u8], entries: Vec<(String, Object)>) {
    if entries.is_empty() {
        return;
    }
    let mut category = match resources.get(key) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    for (name, object) in entries {
        category.set(name, object);
    }
    resources.set(key.to_vec(), Object::Dictionary(category));
}

fn resolve_dict(doc: &Document, object: &Object) -> Option<Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// Look up a page attribute, following `Parent` links for inheritable keys
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page's effective resources as an owned dictionary with the
/// categories overlays write to resolved inline
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_else(Dictionary::new);

    for key in [b"Font".as_slice(), b"XObject", b"ExtGState"] {
        let resolved = resources
            .get(key)
            .ok()
            .and_then(|obj| resolve_dict(doc, obj));
        if let Some(dict) = resolved {
            resources.set(key.to_vec(), Object::Dictionary(dict));
        }
    }

    resources
}

fn resource_names(doc: &Document, page_id: ObjectId) -> HashSet<Vec<u8>> {
    let resources = page_resources(doc, page_id);
    let mut names = HashSet::new();
    for key in [b"Font".as_slice(), b"XObject", b"ExtGState"] {
        if let Ok(Object::Dictionary(category)) = resources.get(key) {
            names.extend(category.iter().map(|(name, _)| name.clone()));
        }
    }
    names
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let contents = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok());

    match contents {
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(streams)) => streams.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Some(Object::Array(streams)) => streams.clone(),
        _ => Vec::new(),
    }
}

fn as_number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}

/// Media box of a page, falling back to US Letter
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let rect = inherited_attribute(doc, page_id, b"MediaBox").and_then(|obj| match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    });

    let numbers: Option<Vec<f64>> = match rect {
        Some(Object::Array(values)) if values.len() == 4 => values.iter().map(as_number).collect(),
        _ => None,
    };

    match numbers {
        Some(v) => {
            let page = PageBox::from_rect([v[0], v[1], v[2], v[3]]);
            if page.width > 0.0 && page.height > 0.0 {
                page
            } else {
                PageBox::default()
            }
        }
        None => PageBox::default(),
    }
}
