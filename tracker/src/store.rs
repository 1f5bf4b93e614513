use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::warn;
use structures::{Palette, PersistedTemplate};

use crate::design::TemplateDesign;
use crate::errors::Result;

/// Content-addressed registry of decoded designs. Two templates with
/// identical pixel content share one design; an `Arc` with no
/// placements left is garbage.
#[derive(Debug, Default)]
pub struct DesignStore {
    designs: HashMap<String, Arc<TemplateDesign>>,
}

impl DesignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a design, deduplicating by content hash. Returns the
    /// shared handle, which may be an existing one.
    pub fn insert(&mut self, design: TemplateDesign) -> Arc<TemplateDesign> {
        self.designs
            .entry(design.hash().to_string())
            .or_insert_with(|| Arc::new(design))
            .clone()
    }

    pub fn get(&self, hash: &str) -> Option<Arc<TemplateDesign>> {
        self.designs.get(hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }

    /// Drop designs no template references anymore. Returns the hashes
    /// removed so callers can delete the matching files.
    pub fn prune(&mut self) -> Vec<String> {
        let unused: Vec<String> = self
            .designs
            .iter()
            .filter(|(_, design)| Arc::strong_count(design) == 1)
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &unused {
            self.designs.remove(hash);
        }

        unused
    }

    /// Write every stored design under `dir` as `<hash>.png`.
    pub fn save_all(&self, dir: &Path, palette: &Palette) -> Result<()> {
        fs::create_dir_all(dir)?;

        for design in self.designs.values() {
            design.save(&dir.join(design.file_name()), palette)?;
        }

        Ok(())
    }

    /// Load every readable PNG under `dir`. Files that fail to decode
    /// are skipped with a warning; their templates will re-download.
    pub fn load_dir(&mut self, dir: &Path, palette: &Palette) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "png") {
                continue;
            }

            match TemplateDesign::load(&path, palette) {
                Ok(design) => {
                    self.insert(design);
                }
                Err(error) => {
                    warn!("skipping unreadable design {}: {}", path.display(), error);
                }
            }
        }

        Ok(())
    }

    /// Delete PNGs under `dir` whose name is not a stored hash,
    /// leaving the directory an exact mirror of the store.
    pub fn clean_directory(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "png") {
                continue;
            }

            let known = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map_or(false, |stem| self.designs.contains_key(stem));

            if !known {
                warn!("removing stray design file {}", path.display());
                fs::remove_file(&path)?;
            }
        }

        Ok(())
    }
}

pub fn write_persisted(path: &Path, record: &PersistedTemplate) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec(record)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a persisted template record, treating anything unreadable as
/// absent. A lost record only costs history; the tracker rebuilds the
/// rest from the canvas.
pub fn read_persisted(path: &Path) -> Option<PersistedTemplate> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!("could not read {}: {}", path.display(), error);
            }
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(record) => Some(record),
        Err(error) => {
            warn!("discarding corrupt record {}: {}", path.display(), error);
            None
        }
    }
}
