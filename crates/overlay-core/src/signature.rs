//! Typed signature previews rendered as SVG data URLs

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::elements::DEFAULT_SIGNATURE_FONT;
use crate::error::OverlayError;
use crate::fonts::is_script_family;

const PREVIEW_WIDTH: u32 = 400;
const PREVIEW_HEIGHT: u32 = 150;
pub const DEFAULT_PREVIEW_SIZE: u32 = 40;
pub const DEFAULT_PREVIEW_COLOR: &str = "000000";

/// Builder for a typed signature preview image
#[derive(Debug, Clone)]
pub struct SignaturePreview {
    content: String,
    font: String,
    size: u32,
    color: String,
}

impl SignaturePreview {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            font: DEFAULT_SIGNATURE_FONT.to_string(),
            size: DEFAULT_PREVIEW_SIZE,
            color: DEFAULT_PREVIEW_COLOR.to_string(),
        }
    }

    pub fn font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Hex colour with or without a leading `#`
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into().trim_start_matches('#').to_string();
        self
    }

    /// CSS font family used in the SVG
    pub fn css_family(&self) -> &'static str {
        if is_script_family(&self.font.to_lowercase()) {
            "cursive"
        } else {
            "Arial, sans-serif"
        }
    }

    pub fn to_svg(&self) -> Result<String, OverlayError> {
        if self.content.trim().is_empty() {
            return Err(OverlayError::InvalidElement(
                "Content cannot be blank".to_string(),
            ));
        }
        if self.size == 0 {
            return Err(OverlayError::InvalidElement(
                "Size must be positive".to_string(),
            ));
        }
        let is_hex = matches!(self.color.len(), 3 | 6)
            && self.color.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex {
            return Err(OverlayError::InvalidElement(format!(
                "Invalid color '{}'",
                self.color
            )));
        }

        Ok(format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#,
                r#"<style>.signature {{ font-family: {family}; font-size: {size}px; fill: #{color}; }}</style>"#,
                r#"<text x="50%" y="50%" text-anchor="middle" dominant-baseline="middle" class="signature">{text}</text>"#,
                "</svg>"
            ),
            width = PREVIEW_WIDTH,
            height = PREVIEW_HEIGHT,
            family = self.css_family(),
            size = self.size,
            color = self.color,
            text = escape_xml(&self.content),
        ))
    }

    /// Render as a `data:image/svg+xml;base64,...` URL
    pub fn render(&self) -> Result<String, OverlayError> {
        let svg = self.to_svg()?;
        Ok(format!("data:image/svg+xml;base64,{}", BASE64.encode(svg)))
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::parse_data_url;

    #[test]
    fn test_defaults() {
        let svg = SignaturePreview::new("Jane Doe").to_svg().unwrap();
        assert!(svg.contains(r#"width="400" height="150""#));
        assert!(svg.contains("font-family: cursive"));
        assert!(svg.contains("font-size: 40px"));
        assert!(svg.contains("fill: #000000"));
        assert!(svg.contains(">Jane Doe</text>"));
    }

    #[test]
    fn test_render_is_svg_data_url() {
        let url = SignaturePreview::new("Jane").render().unwrap();
        let (mime, bytes) = parse_data_url(&url).unwrap();
        assert_eq!(mime, "image/svg+xml");
        assert!(String::from_utf8(bytes).unwrap().starts_with("<svg"));
    }

    #[test]
    fn test_non_script_font_uses_sans_serif() {
        let preview = SignaturePreview::new("Jane").font("Helvetica");
        assert_eq!(preview.css_family(), "Arial, sans-serif");
        assert_eq!(SignaturePreview::new("x").font("Great Vibes").css_family(), "cursive");
    }

    #[test]
    fn test_size_and_color() {
        let svg = SignaturePreview::new("Jane")
            .size(24)
            .color("#1a2b3c")
            .to_svg()
            .unwrap();
        assert!(svg.contains("font-size: 24px"));
        assert!(svg.contains("fill: #1a2b3c"));
    }

    #[test]
    fn test_content_is_escaped() {
        let svg = SignaturePreview::new("<b>Tom & \"Jerry\"</b>").to_svg().unwrap();
        assert!(svg.contains("&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"));
        assert!(!svg.contains("<b>"));
    }

    #[test]
    fn test_blank_content_rejected() {
        let err = SignaturePreview::new("  ").render().unwrap_err();
        assert_eq!(err.to_string(), "Content cannot be blank");
    }

    #[test]
    fn test_bad_color_rejected() {
        assert!(SignaturePreview::new("Jane").color("red;}").render().is_err());
        assert!(SignaturePreview::new("Jane").size(0).render().is_err());
    }
}
