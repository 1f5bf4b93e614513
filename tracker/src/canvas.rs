use crate::errors::{Result, TemplateError};

/// An owned 2D byte buffer in palette space: the live canvas state or
/// the placeability map, both shared with the tracking core read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn filled(width: u32, height: u32, fill: u8) -> Self {
        PixelBuffer {
            width,
            height,
            data: vec![fill; width as usize * height as usize],
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(TemplateError::SizeMismatch {
                width,
                height,
                len: data.len(),
            });
        }

        Ok(PixelBuffer {
            width,
            height,
            data,
        })
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

    pub fn get(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }

        Some(self.data[y as usize * self.width as usize + x as usize])
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let index = y as usize * self.width as usize + x as usize;
        self.data[index] = value;
    }

    /// Crop a `width`x`height` window at `(x, y)`, row by row. Regions
    /// outside the buffer come back as `fill`; the offsets may be
    /// negative or past the far edge.
    pub fn crop(&self, x: i64, y: i64, width: u32, height: u32, fill: u8) -> Vec<u8> {
        let out_width = width as usize;
        let out_height = height as usize;
        let mut out = vec![fill; out_width * out_height];

        // negative offsets shift where rows land in the output
        let put_x = usize::try_from(-x).unwrap_or(0);
        let put_y = usize::try_from(-y).unwrap_or(0);
        // positive offsets shift where rows are taken from
        let take_x = usize::try_from(x).unwrap_or(0);
        let take_y = usize::try_from(y).unwrap_or(0);

        if take_x >= self.width as usize || take_y >= self.height as usize {
            return out;
        }

        let available_width = self.width as usize - take_x;
        let available_height = self.height as usize - take_y;

        let copy_width = out_width.saturating_sub(put_x).min(available_width);
        let copy_height = out_height.saturating_sub(put_y).min(available_height);

        // the window can clear the buffer on the put side too
        if copy_width == 0 {
            return out;
        }

        for row in 0..copy_height {
            let take = (row + take_y) * self.width as usize + take_x;
            let put = (row + put_y) * out_width + put_x;
            out[put..put + copy_width].copy_from_slice(&self.data[take..take + copy_width]);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> PixelBuffer {
        let data = (0..width * height).map(|i| i as u8).collect();
        PixelBuffer::from_raw(width, height, data).unwrap()
    }

    #[test]
    fn from_raw_validates_length() {
        assert!(matches!(
            PixelBuffer::from_raw(3, 3, vec![0; 8]),
            Err(TemplateError::SizeMismatch { len: 8, .. })
        ));
    }

    #[test]
    fn crops_an_interior_window() {
        let buffer = numbered(4, 4);
        assert_eq!(buffer.crop(1, 1, 2, 2, 99), vec![5, 6, 9, 10]);
    }

    #[test]
    fn fills_regions_above_and_left_of_the_buffer() {
        let buffer = numbered(3, 3);
        let cropped = buffer.crop(-1, -1, 3, 3, 9);
        assert_eq!(cropped, vec![9, 9, 9, 9, 0, 1, 9, 3, 4]);
    }

    #[test]
    fn fills_regions_past_the_far_edge() {
        let buffer = numbered(3, 3);
        let cropped = buffer.crop(2, 2, 2, 2, 7);
        assert_eq!(cropped, vec![8, 7, 7, 7]);
    }

    #[test]
    fn fully_outside_crop_is_all_fill() {
        let buffer = numbered(2, 2);
        assert_eq!(buffer.crop(10, 10, 2, 2, 5), vec![5; 4]);
        assert_eq!(buffer.crop(-10, 0, 2, 2, 5), vec![5; 4]);
    }

    #[test]
    fn get_is_none_outside_bounds() {
        let buffer = numbered(2, 2);
        assert_eq!(buffer.get(0, 1), Some(2));
        assert_eq!(buffer.get(-1, 0), None);
        assert_eq!(buffer.get(2, 0), None);
    }
}
