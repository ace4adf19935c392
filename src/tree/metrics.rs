use std::cell::RefCell;
use std::collections::HashMap;

use font_kit::family_name::FamilyName;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use fontdue::{Font, FontSettings};
use log::warn;

/// Labels are measured at this size and divided back down, so unit widths
/// keep the precision of a large rendering.
pub const REFERENCE_FONT_SIZE: f32 = 100.0;

/// Text measurement collaborator.
///
/// `ascent` and `descent` are reported at unit font size; `descent` is a
/// positive distance below the baseline.
pub trait TextMetrics {
    fn measure_width(&self, text: &str, font_size: f32) -> f32;
    fn ascent(&self) -> f32;
    fn descent(&self) -> f32;

    /// Width of `text` at unit font size.
    fn unit_width(&self, text: &str) -> f32 {
        self.measure_width(text, REFERENCE_FONT_SIZE) / REFERENCE_FONT_SIZE
    }
}

/// Deterministic metrics: every character advances by the same fraction of an em.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvanceMetrics {
    pub advance: f32,
    pub ascent: f32,
    pub descent: f32,
}

impl Default for FixedAdvanceMetrics {
    fn default() -> Self {
        Self {
            advance: 0.56,
            ascent: 0.8,
            descent: 0.2,
        }
    }
}

impl TextMetrics for FixedAdvanceMetrics {
    fn measure_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * self.advance * font_size
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn descent(&self) -> f32 {
        self.descent
    }
}

/// Metrics backed by a real font face, with glyph advances memoized per
/// (size, codepoint).
pub struct FontMetrics {
    font: Font,
    ascent: f32,
    descent: f32,
    advances: RefCell<HashMap<(u32, char), f32>>,
}

impl FontMetrics {
    pub fn from_font(font: Font) -> Self {
        let (ascent, descent) = font
            .horizontal_line_metrics(REFERENCE_FONT_SIZE)
            .map(|line| (line.ascent / REFERENCE_FONT_SIZE, -line.descent / REFERENCE_FONT_SIZE))
            .unwrap_or((0.8, 0.2));
        Self {
            font,
            ascent,
            descent,
            advances: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        Font::from_bytes(bytes, FontSettings::default())
            .ok()
            .map(Self::from_font)
    }

    /// Best sans-serif face installed on this machine.
    pub fn system_sans() -> Option<Self> {
        let source = SystemSource::new();
        let handle = source
            .select_best_match(&[FamilyName::SansSerif], &Properties::new())
            .ok()?;
        let font = handle.load().ok()?;
        let font_data = font.copy_font_data()?;
        Self::from_bytes(font_data.as_ref().clone())
    }

    pub fn cached_glyphs(&self) -> usize {
        self.advances.borrow().len()
    }

    fn advance(&self, c: char, font_size: f32) -> f32 {
        let key = (font_size.to_bits(), c);
        if let Some(&width) = self.advances.borrow().get(&key) {
            return width;
        }
        let width = self.font.metrics(c, font_size).advance_width;
        self.advances.borrow_mut().insert(key, width);
        width
    }
}

impl TextMetrics for FontMetrics {
    fn measure_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(|c| self.advance(c, font_size)).sum()
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }

    fn descent(&self) -> f32 {
        self.descent
    }
}

/// System font metrics when available, fixed-advance metrics otherwise.
pub fn default_metrics() -> Box<dyn TextMetrics> {
    match FontMetrics::system_sans() {
        Some(metrics) => Box::new(metrics),
        None => {
            warn!("No system sans-serif font found; using fixed-advance text metrics.");
            Box::new(FixedAdvanceMetrics::default())
        }
    }
}
