use std::collections::HashMap;

#[macro_use]
extern crate serde_derive;

use colors_transform::Color;

/// Reserved palette index for cells the template leaves untouched.
pub const TRANSPARENT_PIXEL: u8 = 255;

/// One palette entry as served by the canvas API: a display name and
/// a hex RGB string such as "FF4500".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaletteColor {
    pub name: String,
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("could not parse palette color {name:?} from {value:?}")]
    BadColor { name: String, value: String },
    #[error("palette has {0} colors but index 255 is reserved for transparency")]
    TooManyColors(usize),
}

/// An ordered palette with an RGB-to-index lookup. Immutable for the
/// lifetime of any design hashed against it.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<(String, [u8; 3])>,
    index_by_rgb: HashMap<[u8; 3], u8>,
}

impl Palette {
    pub fn from_colors(entries: &[PaletteColor]) -> Result<Self, PaletteError> {
        if entries.len() > usize::from(TRANSPARENT_PIXEL) {
            return Err(PaletteError::TooManyColors(entries.len()));
        }

        let mut colors = Vec::with_capacity(entries.len());
        let mut index_by_rgb = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            let parsed = colors_transform::Rgb::from_hex_str(entry.value.trim_start_matches('#'))
                .map_err(|_| PaletteError::BadColor {
                    name: entry.name.clone(),
                    value: entry.value.clone(),
                })?;

            let rgb = [
                parsed.get_red() as u8,
                parsed.get_green() as u8,
                parsed.get_blue() as u8,
            ];

            colors.push((entry.name.clone(), rgb));
            // ties between duplicate colors keep the lowest index
            index_by_rgb.entry(rgb).or_insert(index as u8);
        }

        Ok(Palette {
            colors,
            index_by_rgb,
        })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn index_of(&self, rgb: [u8; 3]) -> Option<u8> {
        self.index_by_rgb.get(&rgb).copied()
    }

    pub fn rgb_of(&self, index: u8) -> Option<[u8; 3]> {
        self.colors.get(usize::from(index)).map(|(_, rgb)| *rgb)
    }

    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.colors.get(usize::from(index)).map(|(name, _)| name.as_str())
    }
}

/// A single pixel change on the shared canvas, in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PixelEvent {
    pub x: i64,
    pub y: i64,
    pub color: u8,
    pub old_color: u8,
}

impl PixelEvent {
    /// The color transition, stripped of its position.
    pub fn change(&self) -> PixelChange {
        PixelChange {
            color: self.color,
            old_color: self.old_color,
        }
    }
}

/// A pixel change already translated to a template-local index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PixelChange {
    pub color: u8,
    pub old_color: u8,
}

/// Persisted activity histograms: three equal-length bucket arrays
/// anchored to the wall-clock time they were captured at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActivitySnapshot {
    pub positive: Vec<u32>,
    pub neutral: Vec<u32>,
    pub negative: Vec<u32>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Everything needed to resume tracking a template across restarts.
/// The design itself lives in a separate PNG keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersistedTemplate {
    pub x: i64,
    pub y: i64,
    /// Milliseconds since the Unix epoch.
    pub started: i64,
    pub progress: Option<u64>,
    pub history: Option<ActivitySnapshot>,
}
