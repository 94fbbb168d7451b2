//! Coordinate normalization between the editor UI and PDF user space
//!
//! The editor reports positions with a top-left origin, either as ratios
//! (0..1), percentages (0..100) or absolute points. PDF user space has a
//! bottom-left origin.

use serde::{Deserialize, Serialize};

/// US Letter, used when a page has no usable MediaBox
pub const DEFAULT_PAGE_WIDTH: f64 = 612.0;
pub const DEFAULT_PAGE_HEIGHT: f64 = 792.0;

/// A page's media box as origin plus size, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for PageBox {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: DEFAULT_PAGE_WIDTH,
            height: DEFAULT_PAGE_HEIGHT,
        }
    }
}

impl PageBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// Build from a PDF rectangle `[llx lly urx ury]`. Corners may come in
    /// any order.
    pub fn from_rect(rect: [f64; 4]) -> Self {
        let [x1, y1, x2, y2] = rect;
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

/// How a UI coordinate pair was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateUnit {
    Ratio,
    Percent,
    Points,
}

impl CoordinateUnit {
    /// Both coordinates must fall in the same range for the pair to be read
    /// as relative.
    pub fn detect(x: f64, y: f64) -> Self {
        if x <= 1.0 && y <= 1.0 {
            CoordinateUnit::Ratio
        } else if x <= 100.0 && y <= 100.0 {
            CoordinateUnit::Percent
        } else {
            CoordinateUnit::Points
        }
    }
}

/// Convert UI coordinates (top-left origin) to PDF points (bottom-left origin)
pub fn normalize_coords(x: f64, y: f64, page: &PageBox) -> (f64, f64) {
    let (x_pt, y_pt) = match CoordinateUnit::detect(x, y) {
        CoordinateUnit::Ratio => (page.width * x, page.height * (1.0 - y)),
        CoordinateUnit::Percent => (
            page.width * (x / 100.0),
            page.height * (1.0 - (y / 100.0)),
        ),
        CoordinateUnit::Points => (x, page.height - y),
    };

    (page.x + x_pt, page.y + y_pt)
}

/// Map a requested zero-based page index onto an existing page.
/// Indices past the end land on the last page.
pub fn clamp_page(page: u32, page_count: usize) -> usize {
    (page as usize).min(page_count.saturating_sub(1))
}

/// Convert DOM coordinates (top-left origin, pixels) to PDF coordinates (bottom-left origin, points)
pub fn dom_to_pdf(
    dom_x: f64,
    dom_y: f64,
    container_width: f64,
    container_height: f64,
    page: &PageBox,
) -> (f64, f64) {
    let x_pct = dom_x / container_width;
    let y_pct = dom_y / container_height;

    let pdf_x = page.x + (x_pct * page.width);
    let pdf_y = page.y + (page.height - (y_pct * page.height));

    (pdf_x, pdf_y)
}

/// Convert PDF coordinates to DOM coordinates
pub fn pdf_to_dom(
    pdf_x: f64,
    pdf_y: f64,
    container_width: f64,
    container_height: f64,
    page: &PageBox,
) -> (f64, f64) {
    let x_pct = (pdf_x - page.x) / page.width;
    let y_pct = 1.0 - ((pdf_y - page.y) / page.height);

    (x_pct * container_width, y_pct * container_height)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimension() -> impl Strategy<Value = f64> {
        1.0f64..2000.0
    }

    fn fraction() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    proptest! {
        /// Relative coordinates always land inside the page
        #[test]
        fn ratios_stay_on_page(w in dimension(), h in dimension(), x in fraction(), y in fraction()) {
            let page = PageBox::new(w, h);
            let (px, py) = normalize_coords(x, y, &page);
            prop_assert!(px >= 0.0 && px <= w + 1e-9);
            prop_assert!(py >= -1e-9 && py <= h + 1e-9);
        }

        /// A ratio and the equivalent percentage agree whenever the percentage
        /// pair is not itself within the ratio range
        #[test]
        fn percent_matches_ratio(w in dimension(), h in dimension(), x in 0.02f64..=1.0, y in 0.02f64..=1.0) {
            let page = PageBox::new(w, h);
            let (rx, ry) = normalize_coords(x, y, &page);
            let (px, py) = normalize_coords(x * 100.0, y * 100.0, &page);
            prop_assert!((rx - px).abs() < 1e-6);
            prop_assert!((ry - py).abs() < 1e-6);
        }

        /// Absolute points only flip the vertical axis
        #[test]
        fn points_preserve_x(h in dimension(), x in 100.5f64..5000.0, y in 0.0f64..5000.0) {
            let page = PageBox::new(612.0, h);
            let (px, py) = normalize_coords(x, y, &page);
            prop_assert_eq!(px, x);
            prop_assert!((py - (h - y)).abs() < 1e-9);
        }

        /// DOM->PDF->DOM roundtrip returns original coordinates
        #[test]
        fn roundtrip_dom_to_pdf_to_dom(
            container_w in dimension(),
            container_h in dimension(),
            pdf_w in dimension(),
            pdf_h in dimension(),
            x_pct in fraction(),
            y_pct in fraction(),
        ) {
            let page = PageBox::new(pdf_w, pdf_h);
            let dom_x = x_pct * container_w;
            let dom_y = y_pct * container_h;

            let (pdf_x, pdf_y) = dom_to_pdf(dom_x, dom_y, container_w, container_h, &page);
            let (back_x, back_y) = pdf_to_dom(pdf_x, pdf_y, container_w, container_h, &page);

            prop_assert!((back_x - dom_x).abs() < 1e-4);
            prop_assert!((back_y - dom_y).abs() < 1e-4);
        }
    }
}
