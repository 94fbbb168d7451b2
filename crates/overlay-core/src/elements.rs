//! Overlay element log
//!
//! Elements are the persisted description of every annotation a user placed
//! on a document. The processed PDF is a pure function of the original upload
//! and this list.

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;

pub type ElementId = u64;

/// Text drawn when a signature has neither usable image data nor content
pub const SIGNATURE_PLACEHOLDER: &str = "[SIGNATURE]";

/// Font used for typed signatures when the client does not pick one
pub const DEFAULT_SIGNATURE_FONT: &str = "Dancing Script";

/// Largest accepted coordinate or font size magnitude. Content streams
/// carry 32-bit reals, so values must stay well inside `f32` range.
pub const MAX_MAGNITUDE: f64 = 1.0e6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayElement {
    Text {
        #[serde(default)]
        id: ElementId,
        x: f64,
        y: f64,
        #[serde(default)]
        page: u32,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_size: Option<f64>,
    },
    Signature {
        #[serde(default)]
        id: ElementId,
        x: f64,
        y: f64,
        #[serde(default)]
        page: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font: Option<String>,
        /// `data:image/png;base64,...` URL of a hand-drawn signature
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature_data: Option<String>,
    },
}

impl OverlayElement {
    pub fn text(x: f64, y: f64, page: u32, content: impl Into<String>) -> Self {
        OverlayElement::Text {
            id: 0,
            x,
            y,
            page,
            content: content.into(),
            font: None,
            font_size: None,
        }
    }

    pub fn typed_signature(
        x: f64,
        y: f64,
        page: u32,
        content: impl Into<String>,
        font: Option<String>,
    ) -> Self {
        OverlayElement::Signature {
            id: 0,
            x,
            y,
            page,
            content: Some(content.into()),
            font,
            signature_data: None,
        }
    }

    pub fn drawn_signature(x: f64, y: f64, page: u32, data_url: impl Into<String>) -> Self {
        OverlayElement::Signature {
            id: 0,
            x,
            y,
            page,
            content: None,
            font: None,
            signature_data: Some(data_url.into()),
        }
    }

    pub fn id(&self) -> ElementId {
        match self {
            OverlayElement::Text { id, .. } => *id,
            OverlayElement::Signature { id, .. } => *id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            OverlayElement::Text { page, .. } => *page,
            OverlayElement::Signature { page, .. } => *page,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        match self {
            OverlayElement::Text { x, y, .. } => (*x, *y),
            OverlayElement::Signature { x, y, .. } => (*x, *y),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OverlayElement::Text { .. } => "text",
            OverlayElement::Signature { .. } => "signature",
        }
    }

    fn set_id(&mut self, new_id: ElementId) {
        match self {
            OverlayElement::Text { id, .. } => *id = new_id,
            OverlayElement::Signature { id, .. } => *id = new_id,
        }
    }

    /// Reject elements that would render nothing or cannot be placed.
    pub fn validate(&self) -> Result<(), OverlayError> {
        let (x, y) = self.position();
        if !x.is_finite() || !y.is_finite() {
            return Err(OverlayError::InvalidElement(format!(
                "Coordinates must be finite numbers, got ({}, {})",
                x, y
            )));
        }
        if x.abs() > MAX_MAGNITUDE || y.abs() > MAX_MAGNITUDE {
            return Err(OverlayError::InvalidElement(format!(
                "Coordinates out of range, got ({}, {})",
                x, y
            )));
        }

        match self {
            OverlayElement::Text {
                content, font_size, ..
            } => {
                if is_blank(Some(content)) {
                    return Err(OverlayError::InvalidElement(
                        "Text cannot be blank".to_string(),
                    ));
                }
                if let Some(size) = font_size {
                    if !size.is_finite() || *size <= 0.0 {
                        return Err(OverlayError::InvalidElement(format!(
                            "Font size must be positive, got {}",
                            size
                        )));
                    }
                    if *size > MAX_MAGNITUDE {
                        return Err(OverlayError::InvalidElement(format!(
                            "Font size out of range, got {}",
                            size
                        )));
                    }
                }
            }
            OverlayElement::Signature {
                content,
                signature_data,
                ..
            } => {
                if is_blank(content.as_deref()) && is_blank(signature_data.as_deref()) {
                    return Err(OverlayError::InvalidElement(
                        "Signature content cannot be blank".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementLog {
    next_id: ElementId,
    elements: Vec<OverlayElement>,
}

impl ElementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut element: OverlayElement) -> ElementId {
        let id = self.next_id;
        self.next_id += 1;
        element.set_id(id);
        self.elements.push(element);
        id
    }

    pub fn extend<I>(&mut self, elements: I) -> Vec<ElementId>
    where
        I: IntoIterator<Item = OverlayElement>,
    {
        elements.into_iter().map(|e| self.add(e)).collect()
    }

    /// Replace every element. Ids keep increasing so stale client ids never
    /// address a new element.
    pub fn replace<I>(&mut self, elements: I) -> Vec<ElementId>
    where
        I: IntoIterator<Item = OverlayElement>,
    {
        self.elements.clear();
        self.extend(elements)
    }

    pub fn remove(&mut self, id: ElementId) -> bool {
        if let Some(pos) = self.elements.iter().position(|e| e.id() == id) {
            self.elements.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: ElementId) -> Option<&OverlayElement> {
        self.elements.iter().find(|e| e.id() == id)
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn elements_for_page(&self, page: u32) -> Vec<&OverlayElement> {
        self.elements.iter().filter(|e| e.page() == page).collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn to_json(&self) -> Result<String, OverlayError> {
        serde_json::to_string(self).map_err(|e| OverlayError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, OverlayError> {
        serde_json::from_str(json).map_err(|e| OverlayError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_element_log_new_is_empty() {
        let log = ElementLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut log = ElementLog::new();
        let first = log.add(OverlayElement::text(10.0, 10.0, 0, "A"));
        let second = log.add(OverlayElement::typed_signature(20.0, 20.0, 0, "B", None));
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(log.elements()[1].id(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut log = ElementLog::new();
        let a = log.add(OverlayElement::text(10.0, 10.0, 0, "A"));
        assert!(log.remove(a));
        let b = log.add(OverlayElement::text(10.0, 10.0, 0, "B"));
        assert_ne!(a, b);
        assert!(!log.remove(a));
    }

    #[test]
    fn test_replace_clears_and_renumbers() {
        let mut log = ElementLog::new();
        log.extend(vec![
            OverlayElement::text(1.0, 1.0, 0, "A"),
            OverlayElement::text(2.0, 2.0, 0, "B"),
        ]);
        let ids = log.replace(vec![OverlayElement::text(3.0, 3.0, 0, "C")]);
        assert_eq!(ids, vec![2]);
        assert_eq!(log.len(), 1);
        assert!(log.get(0).is_none());
    }

    #[test]
    fn test_elements_for_page() {
        let mut log = ElementLog::new();
        log.add(OverlayElement::text(1.0, 1.0, 0, "Page 1"));
        log.add(OverlayElement::text(1.0, 1.0, 1, "Page 2"));
        log.add(OverlayElement::typed_signature(1.0, 1.0, 0, "Sig", None));
        assert_eq!(log.elements_for_page(0).len(), 2);
        assert_eq!(log.elements_for_page(1).len(), 1);
        assert_eq!(log.elements_for_page(5).len(), 0);
    }

    #[test]
    fn test_json_keeps_next_id() {
        let mut log = ElementLog::new();
        let id = log.add(OverlayElement::text(50.0, 50.0, 0, "Hello"));
        log.remove(id);

        let mut restored = ElementLog::from_json(&log.to_json().unwrap()).unwrap();
        assert_eq!(restored.add(OverlayElement::text(1.0, 1.0, 0, "x")), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let mut log = ElementLog::new();
        log.add(OverlayElement::typed_signature(
            0.25,
            0.5,
            0,
            "Jane",
            Some("Allura".to_string()),
        ));
        let value = serde_json::to_value(&log.elements()[0]).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "signature",
                "id": 0,
                "x": 0.25,
                "y": 0.5,
                "page": 0,
                "content": "Jane",
                "font": "Allura",
            })
        );
    }

    #[test]
    fn test_validate_blank_text() {
        let err = OverlayElement::text(1.0, 1.0, 0, "   ").validate().unwrap_err();
        assert_eq!(err.to_string(), "Text cannot be blank");
    }

    #[test]
    fn test_validate_blank_signature() {
        let element = OverlayElement::Signature {
            id: 0,
            x: 1.0,
            y: 1.0,
            page: 0,
            content: Some(String::new()),
            font: None,
            signature_data: None,
        };
        let err = element.validate().unwrap_err();
        assert_eq!(err.to_string(), "Signature content cannot be blank");
    }

    #[test]
    fn test_validate_drawn_signature_without_content() {
        let element = OverlayElement::drawn_signature(1.0, 1.0, 0, "data:image/png;base64,AAAA");
        assert!(element.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan() {
        assert!(OverlayElement::text(f64::NAN, 1.0, 0, "x")
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_values_beyond_pdf_reals() {
        assert!(OverlayElement::text(1e300, 500.0, 0, "Hi").validate().is_err());
        assert!(OverlayElement::text(1.0, -1e39, 0, "Hi").validate().is_err());
        assert!(OverlayElement::text(MAX_MAGNITUDE, -MAX_MAGNITUDE, 0, "Hi")
            .validate()
            .is_ok());

        let element = OverlayElement::Text {
            id: 0,
            x: 1.0,
            y: 1.0,
            page: 0,
            content: "x".to_string(),
            font: None,
            font_size: Some(1e40),
        };
        assert!(element.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_font_size() {
        let element = OverlayElement::Text {
            id: 0,
            x: 1.0,
            y: 1.0,
            page: 0,
            content: "x".to_string(),
            font: None,
            font_size: Some(0.0),
        };
        assert!(element.validate().is_err());
    }
}
