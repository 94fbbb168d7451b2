//! Standard 14 font selection and metrics
//!
//! Overlays only use the PDF standard fonts, so nothing has to be embedded.
//! Widths come from the Adobe AFM files and are in 1/1000 em.

/// Widths of ASCII 32..=126 for Helvetica (also used for its Bold/Oblique variants)
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // {..~
];

/// Widths of ASCII 32..=126 for Times-Roman (also used for its variants)
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // ' '../
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, // 0..9
    278, 278, 564, 564, 564, 444, 921, // :..@
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, // A..M
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, // N..Z
    333, 278, 333, 469, 500, 333, // [..`
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, // a..m
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, // n..z
    480, 200, 480, 541, // {..~
];

const COURIER_WIDTH: u16 = 600;

/// Names of typed-signature families offered by the editor
const SCRIPT_FAMILIES: [&str; 5] = [
    "dancing script",
    "great vibes",
    "allura",
    "cursive",
    "brush script",
];

/// Map a font name plus style flags to a PDF standard 14 font name.
///
/// Names that already carry a style ("Arial-BoldMT", "Times-Italic") keep
/// it; otherwise the flags pick the variant of the matched family.
pub fn standard_font(name: Option<&str>, bold: bool, italic: bool) -> &'static str {
    let base_font = match name {
        Some(name) => {
            let lower = name.to_lowercase();
            if is_script_family(&lower) {
                return "Times-Italic";
            }
            if lower.contains("italic") || lower.contains("bold") || lower.contains("oblique") {
                return map_to_standard_font(name);
            }
            map_font_family_to_base(name)
        }
        None => "Helvetica",
    };

    match base_font {
        "Times-Roman" => match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        },
        "Helvetica" => match (bold, italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        },
        "Courier" => match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        },
        _ => base_font,
    }
}

pub(crate) fn is_script_family(lower: &str) -> bool {
    SCRIPT_FAMILIES.iter().any(|family| lower.contains(family))
}

/// Map font family name to base PDF font (without style variants)
fn map_font_family_to_base(name: &str) -> &'static str {
    let lower = name.to_lowercase();

    match lower.as_str() {
        "serif" => return "Times-Roman",
        "sans-serif" => return "Helvetica",
        "monospace" => return "Courier",
        "fantasy" => return "Helvetica",
        _ => {}
    }

    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        return "Times-Roman";
    }

    if lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
    {
        return "Courier";
    }

    if lower.contains("symbol") {
        return "Symbol";
    }
    if lower.contains("zapf") || lower.contains("dingbat") {
        return "ZapfDingbats";
    }

    "Helvetica"
}

/// Map a styled font name ("Arial-BoldMT", "Times-Italic") to a standard 14 font
fn map_to_standard_font(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    let bold = lower.contains("bold");
    let italic = lower.contains("italic") || lower.contains("oblique");

    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        return match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        };
    }

    if lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
    {
        return match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        };
    }

    match (bold, italic) {
        (true, true) => "Helvetica-BoldOblique",
        (true, false) => "Helvetica-Bold",
        (false, true) => "Helvetica-Oblique",
        (false, false) => "Helvetica",
    }
}

/// Symbol and ZapfDingbats use their own built-in encodings
pub fn uses_win_ansi(font: &str) -> bool {
    !matches!(font, "Symbol" | "ZapfDingbats")
}

fn glyph_width(font: &str, c: char) -> u16 {
    if font.starts_with("Courier") {
        return COURIER_WIDTH;
    }
    let table = if font.starts_with("Times") {
        &TIMES_WIDTHS
    } else {
        &HELVETICA_WIDTHS
    };
    match c as u32 {
        code @ 32..=126 => table[(code - 32) as usize],
        // Latin-1 letters are close to the average lowercase width
        _ => table[(b'n' - 32) as usize],
    }
}

/// Advance width of `text` set in `font` at `size` points
pub fn text_width(font: &str, text: &str, size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| glyph_width(font, c) as u32).sum();
    units as f64 * size / 1000.0
}

/// Encode text for a standard font with WinAnsiEncoding.
/// Characters outside the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E => code as u8,
            code @ 0xA0..=0xFF => code as u8,
            _ => match c {
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '\u{2013}' => 0x96,
                '\u{2014}' => 0x97,
                '\u{20AC}' => 0x80,
                _ => b'?',
            },
        })
        .collect()
}
