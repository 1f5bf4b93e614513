use rayon::prelude::*;

use structures::Palette;

use crate::constants::{SCALE_MARKER_MAX_ALPHA, TRANSPARENT_PIXEL};
use crate::errors::{Result, TemplateError};

pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizeOptions {
    /// Integer block scale between the source image and the logical design.
    pub scale: u32,
    /// Skip the first sub-pixel of the first cell when its alpha is
    /// below [`SCALE_MARKER_MAX_ALPHA`]. pxlsFiddle-style templates
    /// stash a scale marker there.
    pub ignore_scale_marker: bool,
}

impl Default for QuantizeOptions {
    fn default() -> Self {
        QuantizeOptions {
            scale: 1,
            ignore_scale_marker: true,
        }
    }
}

/// Integer scale between a physical pixel span and the logical cell
/// count it claims to cover. Checked before any decode work.
pub fn scale_between(physical: u32, logical: u32) -> Result<u32> {
    if logical == 0 || physical % logical != 0 {
        return Err(TemplateError::MalformedTemplate(format!(
            "{} pixels do not divide into {} cells",
            physical, logical
        )));
    }

    Ok(physical / logical)
}

/// Reduce an RGBA image to a buffer of palette indices, one per
/// `scale`x`scale` block. Each opaque sub-pixel whose RGB exactly
/// matches a palette entry votes for that entry; the block becomes the
/// index with the most votes, ties keeping the lowest index, and no
/// votes at all becoming transparent.
pub fn quantize(
    rgba: &[u8],
    width: u32,
    height: u32,
    options: &QuantizeOptions,
    palette: &Palette,
) -> Result<Vec<u8>> {
    let scale = options.scale;

    if scale == 0 || width % scale != 0 || height % scale != 0 {
        return Err(TemplateError::MalformedTemplate(format!(
            "{}x{} image does not divide into {}x{} blocks",
            width, height, scale, scale
        )));
    }

    if rgba.len() != width as usize * height as usize * BYTES_PER_PIXEL {
        return Err(TemplateError::SizeMismatch {
            width,
            height,
            len: rgba.len(),
        });
    }

    let logical_width = (width / scale) as usize;
    let line = width as usize;
    let scale = scale as usize;

    let skip_marker = options.ignore_scale_marker
        && rgba
            .get(3)
            .is_some_and(|&alpha| alpha < SCALE_MARKER_MAX_ALPHA);

    let mut out = vec![TRANSPARENT_PIXEL; logical_width * (height as usize / scale)];

    out.par_chunks_mut(logical_width)
        .enumerate()
        .for_each(|(cell_y, row)| {
            for (cell_x, cell) in row.iter_mut().enumerate() {
                let skip_first = skip_marker && cell_x == 0 && cell_y == 0;
                *cell = reduce_block(rgba, line, scale, cell_x, cell_y, palette, skip_first);
            }
        });

    Ok(out)
}

fn reduce_block(
    rgba: &[u8],
    line: usize,
    scale: usize,
    cell_x: usize,
    cell_y: usize,
    palette: &Palette,
    skip_first: bool,
) -> u8 {
    let mut votes = vec![0u32; palette.len()];

    let origin_x = cell_x * scale;
    let origin_y = cell_y * scale;

    for y in 0..scale {
        for x in 0..scale {
            if skip_first && x == 0 && y == 0 {
                continue;
            }

            let offset = ((origin_y + y) * line + origin_x + x) * BYTES_PER_PIXEL;

            if rgba[offset + 3] == 0 {
                continue;
            }

            let rgb = [rgba[offset], rgba[offset + 1], rgba[offset + 2]];
            if let Some(index) = palette.index_of(rgb) {
                votes[usize::from(index)] += 1;
            }
        }
    }

    // strict comparison keeps the lowest index on ties
    let mut best = 0;
    for (index, &count) in votes.iter().enumerate().skip(1) {
        if count > votes[best] {
            best = index;
        }
    }

    if votes.get(best).copied().unwrap_or(0) > 0 {
        best as u8
    } else {
        TRANSPARENT_PIXEL
    }
}
