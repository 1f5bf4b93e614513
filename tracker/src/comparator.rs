use std::sync::Arc;

use crate::canvas::PixelBuffer;
use crate::constants::{PLACEABLE, TRANSPARENT_PIXEL, UNPLACEABLE};
use crate::design::TemplateDesign;

/// A design pinned to a canvas position. Carries no mutable state.
#[derive(Debug, Clone)]
pub struct Template {
    pub design: Arc<TemplateDesign>,
    pub x: i64,
    pub y: i64,
}

impl Template {
    pub fn new(design: Arc<TemplateDesign>, x: i64, y: i64) -> Self {
        Template { design, x, y }
    }

    pub fn width(&self) -> u32 {
        self.design.width()
    }

    pub fn height(&self) -> u32 {
        self.design.height()
    }

    pub fn bounds(&self, x: i64, y: i64) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + i64::from(self.width())
            && y < self.y + i64::from(self.height())
    }

    /// Translate global canvas coordinates into a design index; `None`
    /// outside the bounding box. The event-feed consumer uses this to
    /// discard irrelevant pixel events before syncing.
    pub fn local_index(&self, x: i64, y: i64) -> Option<usize> {
        if !self.bounds(x, y) {
            return None;
        }

        Some((x - self.x) as usize + (y - self.y) as usize * self.width() as usize)
    }

    /// Design index at global coordinates, transparent outside.
    pub fn at(&self, x: i64, y: i64) -> u8 {
        match self.local_index(x, y) {
            Some(index) => self.design.at(index),
            None => TRANSPARENT_PIXEL,
        }
    }
}

/// Measures per-pixel agreement between a template and the live
/// canvas. The difference set is cached between syncs; placeability is
/// read once at construction since the placemap changes rarely.
#[derive(Debug)]
pub struct Comparator {
    template: Template,
    placeable_size: usize,
    differences: Option<Vec<usize>>,
}

impl Comparator {
    pub fn new(template: Template, placemap: &PixelBuffer) -> Self {
        let placeable_shadow = placemap.crop(
            template.x,
            template.y,
            template.width(),
            template.height(),
            UNPLACEABLE,
        );

        let placeable_size = template
            .design
            .data()
            .iter()
            .zip(&placeable_shadow)
            .filter(|&(&cell, &placeable)| cell != TRANSPARENT_PIXEL && placeable == PLACEABLE)
            .count();

        Comparator {
            template,
            placeable_size,
            differences: None,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Count of painted cells the canvas currently permits placing.
    pub fn placeable_size(&self) -> usize {
        self.placeable_size
    }

    /// The live canvas cropped to the template's bounding box.
    pub fn shadow(&self, canvas: &PixelBuffer) -> Vec<u8> {
        canvas.crop(
            self.template.x,
            self.template.y,
            self.template.width(),
            self.template.height(),
            TRANSPARENT_PIXEL,
        )
    }

    /// Drop the cached difference set. Must be called whenever the
    /// canvas may have changed; every tracker sync does.
    pub fn invalidate(&mut self) {
        self.differences = None;
    }

    /// Indices of painted cells the canvas currently disagrees with.
    pub fn differences(&mut self, canvas: &PixelBuffer) -> &[usize] {
        if self.differences.is_none() {
            let shadow = self.shadow(canvas);

            let differences = self
                .template
                .design
                .data()
                .iter()
                .zip(&shadow)
                .enumerate()
                .filter(|&(_, (&cell, &actual))| cell != TRANSPARENT_PIXEL && cell != actual)
                .map(|(index, _)| index)
                .collect();

            self.differences = Some(differences);
        }

        self.differences.as_deref().unwrap_or(&[])
    }

    /// Incorrect cells as `(x, y, expected index)` in global
    /// coordinates, for reporting.
    pub fn incorrect_pixels(&mut self, canvas: &PixelBuffer) -> Vec<(i64, i64, u8)> {
        let width = self.template.width() as usize;
        let (x, y) = (self.template.x, self.template.y);
        let design = self.template.design.clone();

        self.differences(canvas)
            .iter()
            .map(|&index| {
                (
                    x + (index % width) as i64,
                    y + (index / width) as i64,
                    design.at(index),
                )
            })
            .collect()
    }

    pub fn progress(&mut self, canvas: &PixelBuffer) -> usize {
        self.template.design.size() - self.differences(canvas).len()
    }

    pub fn complete(&mut self, canvas: &PixelBuffer) -> bool {
        self.progress(canvas) == self.template.design.size()
    }
}
