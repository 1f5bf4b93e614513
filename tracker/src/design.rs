use std::path::Path;

use sha2::{Digest, Sha256};
use structures::Palette;

use crate::constants::TRANSPARENT_PIXEL;
use crate::errors::{Result, TemplateError};
use crate::quantizer::{self, QuantizeOptions, BYTES_PER_PIXEL};

/// Canonical, placement-independent quantized target image. Immutable
/// once constructed; shared by any number of placements.
#[derive(Debug, Clone)]
pub struct TemplateDesign {
    width: u32,
    height: u32,
    data: Vec<u8>,
    size: usize,
    hash: String,
}

impl TemplateDesign {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(TemplateError::SizeMismatch {
                width,
                height,
                len: data.len(),
            });
        }

        let size = data.iter().filter(|&&cell| cell != TRANSPARENT_PIXEL).count();
        let hash = hex::encode(Sha256::digest(&data));

        Ok(TemplateDesign {
            width,
            height,
            data,
            size,
            hash,
        })
    }

    /// Decode a downloaded template image. `logical_width`, when
    /// given, declares how many cells the image is supposed to span;
    /// the implied scale must be an exact integer.
    pub fn decode(
        rgba: &[u8],
        width: u32,
        height: u32,
        logical_width: Option<u32>,
        ignore_scale_marker: bool,
        palette: &Palette,
    ) -> Result<Self> {
        let scale = match logical_width {
            Some(logical) if logical > 0 => quantizer::scale_between(width, logical)?,
            _ => 1,
        };

        let options = QuantizeOptions {
            scale,
            ignore_scale_marker,
        };

        let data = quantizer::quantize(rgba, width, height, &options, palette)?;
        TemplateDesign::new(width / scale, height / scale, data)
    }

    /// Load a saved design by re-quantizing its PNG at scale 1.
    pub fn load(path: &Path, palette: &Palette) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();

        let options = QuantizeOptions {
            scale: 1,
            // saved designs are fully opaque or fully transparent
            ignore_scale_marker: false,
        };

        let data = quantizer::quantize(image.as_raw(), width, height, &options, palette)?;
        TemplateDesign::new(width, height, data)
    }

    /// Write the design as a lossless RGBA PNG, every pixel the exact
    /// palette color of its index.
    pub fn save(&self, path: &Path, palette: &Palette) -> Result<()> {
        let rgba = self.to_rgba(palette);
        let image = image::RgbaImage::from_raw(self.width, self.height, rgba).ok_or(
            TemplateError::SizeMismatch {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            },
        )?;

        image.save(path)?;
        Ok(())
    }

    pub fn to_rgba(&self, palette: &Palette) -> Vec<u8> {
        let mut rgba = vec![0u8; self.data.len() * BYTES_PER_PIXEL];

        for (cell, out) in self.data.iter().zip(rgba.chunks_exact_mut(BYTES_PER_PIXEL)) {
            if let Some([r, g, b]) = palette.rgb_of(*cell) {
                out.copy_from_slice(&[r, g, b, 255]);
            }
        }

        rgba
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Count of non-transparent cells.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Lowercase sha-256 hex digest of the index buffer; the design's
    /// identity and its filename on disk.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn file_name(&self) -> String {
        format!("{}.png", self.hash)
    }

    pub fn at(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(TRANSPARENT_PIXEL)
    }
}

impl PartialEq for TemplateDesign {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for TemplateDesign {}

#[cfg(test)]
mod tests {
    use structures::PaletteColor;

    use super::*;

    fn test_palette() -> Palette {
        Palette::from_colors(&[
            PaletteColor {
                name: "red".to_string(),
                value: "FF0000".to_string(),
            },
            PaletteColor {
                name: "blue".to_string(),
                value: "0000FF".to_string(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn validates_dimensions() {
        assert!(matches!(
            TemplateDesign::new(2, 2, vec![0; 3]),
            Err(TemplateError::SizeMismatch { len: 3, .. })
        ));
    }

    #[test]
    fn size_counts_only_painted_cells() {
        let design = TemplateDesign::new(2, 2, vec![0, 1, TRANSPARENT_PIXEL, 0]).unwrap();
        assert_eq!(design.size(), 3);
    }

    #[test]
    fn equality_is_by_content_hash() {
        let a = TemplateDesign::new(2, 1, vec![0, 1]).unwrap();
        let b = TemplateDesign::new(2, 1, vec![0, 1]).unwrap();
        let c = TemplateDesign::new(2, 1, vec![1, 0]).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a, c);
    }

    #[test]
    fn out_of_range_lookups_read_transparent() {
        let design = TemplateDesign::new(1, 1, vec![0]).unwrap();
        assert_eq!(design.at(0), 0);
        assert_eq!(design.at(5), TRANSPARENT_PIXEL);
    }

    #[test]
    fn saves_and_reloads_losslessly() {
        let palette = test_palette();
        let design =
            TemplateDesign::new(2, 2, vec![0, 1, TRANSPARENT_PIXEL, 1]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(design.file_name());

        design.save(&path, &palette).unwrap();
        let reloaded = TemplateDesign::load(&path, &palette).unwrap();

        assert_eq!(reloaded.data(), design.data());
        assert_eq!(reloaded.hash(), design.hash());
        assert_eq!(reloaded, design);
    }
}
