use std::collections::HashMap;
use std::sync::Mutex;

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use ttf_parser::Face;

/// Fallback advance when no face resolves (headless CI), as a fraction of
/// the font size. Monospace glyphs are close to 0.6 em.
const FALLBACK_EM: f32 = 0.6;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Width of a single line of text in the given family, in user units.
/// Always returns a usable value; falls back to a fixed per-character
/// estimate when no matching font face can be loaded.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> f32 {
    if text.is_empty() || font_size <= 0.0 {
        return 0.0;
    }
    let estimate = text.chars().count() as f32 * font_size * FALLBACK_EM;
    let Ok(mut guard) = TEXT_MEASURER.lock() else {
        return estimate;
    };
    guard
        .measure(text, font_size, font_family)
        .unwrap_or(estimate)
}

/// Bounding box of a multi-line text block: widest line by height of all
/// lines at the given line-height multiple.
pub fn measure_lines(
    lines: &[String],
    font_size: f32,
    line_height: f32,
    font_family: &str,
) -> (f32, f32) {
    let mut width = 0.0f32;
    for line in lines {
        width = width.max(measure_text_width(line, font_size, font_family));
    }
    let height = lines.len() as f32 * font_size * line_height;
    (width, height)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<LoadedFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.load_face(font_family);
            self.faces.insert(key.clone(), face);
        }
        let face = self.faces.get_mut(&key)?.as_mut()?;
        face.measure_width(text, font_size)
    }

    fn load_face(&mut self, font_family: &str) -> Option<LoadedFace> {
        let mut names: Vec<String> = Vec::new();
        let mut generics: Vec<Family<'static>> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "monospace" | "ui-monospace" => generics.push(Family::Monospace),
                "serif" => generics.push(Family::Serif),
                "sans-serif" | "system-ui" | "-apple-system" => generics.push(Family::SansSerif),
                _ => names.push(raw.to_string()),
            }
        }

        let mut families: Vec<Family<'_>> = names.iter().map(|n| Family::Name(n.as_str())).collect();
        families.extend(generics);
        if families.is_empty() {
            families.push(Family::Monospace);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            loaded = LoadedFace::parse(data.to_vec(), index);
        });
        loaded
    }
}

struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
}

impl LoadedFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * FALLBACK_EM;

        if text.is_ascii() {
            let mut width = 0.0f32;
            for byte in text.as_bytes() {
                match *byte {
                    b'\n' => continue,
                    b'\t' => {
                        width += 4.0 * fallback;
                        continue;
                    }
                    _ => {}
                }
                let advance = self.ascii_advances[*byte as usize];
                width += if advance == 0 {
                    fallback
                } else {
                    advance as f32 * scale
                };
            }
            return Some(width.max(0.0));
        }

        let face = Face::parse(&self.data, self.index).ok()?;
        let mut width = 0.0f32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            match face.glyph_index(ch) {
                Some(glyph) => {
                    let advance = face.glyph_hor_advance(glyph).unwrap_or(0);
                    width += if advance == 0 {
                        fallback
                    } else {
                        advance as f32 * scale
                    };
                }
                None => width += fallback,
            }
        }
        Some(width.max(0.0))
    }
}

fn family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "monospace".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_width() {
        assert_eq!(measure_text_width("", 12.0, "monospace"), 0.0);
    }

    #[test]
    fn wider_text_measures_wider() {
        let short = measure_text_width("add", 12.0, "monospace");
        let long = measure_text_width("loadelement", 12.0, "monospace");
        assert!(long > short);
    }

    #[test]
    fn measure_lines_uses_widest() {
        let lines = vec!["a".to_string(), "constant 0x1234".to_string()];
        let (width, height) = measure_lines(&lines, 12.0, 1.25, "monospace");
        assert_eq!(width, measure_text_width("constant 0x1234", 12.0, "monospace"));
        assert_eq!(height, 2.0 * 12.0 * 1.25);
    }
}
