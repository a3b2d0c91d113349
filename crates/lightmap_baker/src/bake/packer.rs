//! Lightmap atlas packing
//!
//! Radiance maps are grouped greedily, largest first, into working sets that
//! fit a fixed-size atlas together. Every map is blitted with a border of
//! replicated edge texels so bilinear filtering at chart edges never reads a
//! neighbor's texels.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::bake::mesh::BakeMeshId;
use crate::bake::radiance_map::{quantize_color, RadianceMap};
use crate::bake::skyline;
use crate::core::config::GlowSettings;
use crate::foundation::math::Vec4;

/// Atlas output errors
#[derive(thiserror::Error, Debug)]
pub enum LightmapError {
    /// Output directory could not be created
    #[error("Failed to create {path}: {source}")]
    Io {
        /// Directory path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Image could not be encoded or written
    #[error("Failed to write {path}: {source}")]
    Image {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: image::ImageError,
    },
}

/// Where one mesh's radiance map landed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasAssignment {
    /// Mesh the map belongs to
    pub mesh: BakeMeshId,
    /// Atlas id
    pub lightmap_index: u32,
    /// `(scale_x, scale_y, offset_x, offset_y)` in atlas-normalized units
    pub tiling_offset: Vec4,
}

/// Placed rectangle of a map inside its atlas, padding excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRect {
    /// Left edge of the map texels
    pub x: u32,
    /// Top edge of the map texels
    pub y: u32,
    /// Map width
    pub width: u32,
    /// Map height
    pub height: u32,
}

/// One finished atlas image
#[derive(Debug, Clone)]
pub struct LightmapAtlas {
    /// Atlas id, stamped onto the instances it serves
    pub id: u32,
    /// Pixels
    pub image: RgbImage,
    /// Maps placed in this atlas
    pub placements: Vec<(BakeMeshId, AtlasRect)>,
}

/// Greedy multi-atlas packer
#[derive(Debug)]
pub struct LightmapPacker {
    atlas_size: u32,
    padding: u32,
    clear_color: Rgb<u8>,
    box_filter: bool,
    candidates: Vec<RadianceMap>,
    atlases: Vec<LightmapAtlas>,
}

impl LightmapPacker {
    /// Packer configured from the bake settings
    pub fn new(settings: &GlowSettings) -> Self {
        Self {
            atlas_size: settings.lightmap_atlas_size,
            padding: settings.atlas_padding,
            clear_color: quantize_color(settings.atlas_clear_color),
            box_filter: settings.atlas_box_filter,
            candidates: Vec::new(),
            atlases: Vec::new(),
        }
    }

    /// Register a map for placement
    pub fn add_radiance_map(&mut self, map: RadianceMap) {
        self.candidates.push(map);
    }

    /// Every map handed to the packer
    pub fn radiance_maps(&self) -> &[RadianceMap] {
        &self.candidates
    }

    /// Atlases emitted so far
    pub fn atlases(&self) -> &[LightmapAtlas] {
        &self.atlases
    }

    /// Atlas edge
    pub const fn atlas_size(&self) -> u32 {
        self.atlas_size
    }

    fn padded_size(&self, map: &RadianceMap) -> (u32, u32) {
        (map.width() + 2 * self.padding, map.height() + 2 * self.padding)
    }

    fn is_oversized(&self, map: &RadianceMap) -> bool {
        let (w, h) = self.padded_size(map);
        map.width() >= self.atlas_size || map.height() >= self.atlas_size || w > self.atlas_size || h > self.atlas_size
    }

    /// Place every map not yet packed
    ///
    /// Atlas ids continue from the last call. Maps the final placement pass
    /// cannot fit are logged and left without an assignment.
    pub fn pack(&mut self) -> Vec<AtlasAssignment> {
        let mut pending: Vec<usize> = (0..self.candidates.len()).filter(|&i| !self.candidates[i].packed).collect();
        pending.sort_by_key(|&i| Reverse(self.candidates[i].width() + self.candidates[i].height()));

        let mut assignments = Vec::new();
        while !pending.is_empty() {
            let first = pending.remove(0);

            if self.is_oversized(&self.candidates[first]) {
                assignments.push(self.emit_dedicated(first));
                continue;
            }

            let mut working_set = vec![first];
            let mut sizes = vec![self.padded_size(&self.candidates[first])];
            let mut i = 0;
            while i < pending.len() {
                let candidate = &self.candidates[pending[i]];
                if self.is_oversized(candidate) {
                    i += 1;
                    continue;
                }

                sizes.push(self.padded_size(candidate));
                if skyline::fits(self.atlas_size, self.atlas_size, &sizes) {
                    working_set.push(pending.remove(i));
                } else {
                    sizes.pop();
                    i += 1;
                }
            }

            assignments.extend(self.emit_atlas(&working_set));
        }

        log::info!(
            "Packed {} lightmaps into {} atlases",
            assignments.len(),
            self.atlases.len()
        );
        assignments
    }

    /// A map too large to share gets an atlas of its own size
    fn emit_dedicated(&mut self, index: usize) -> AtlasAssignment {
        let id = self.atlases.len() as u32;
        let map = &mut self.candidates[index];
        map.packed = true;

        log::debug!("Lightmap {}: dedicated {}x{} atlas", id, map.width(), map.height());
        self.atlases.push(LightmapAtlas {
            id,
            image: map.image.clone(),
            placements: vec![(
                map.mesh,
                AtlasRect {
                    x: 0,
                    y: 0,
                    width: map.width(),
                    height: map.height(),
                },
            )],
        });

        AtlasAssignment {
            mesh: map.mesh,
            lightmap_index: id,
            tiling_offset: Vec4::new(1.0, 1.0, 0.0, 0.0),
        }
    }

    fn emit_atlas(&mut self, working_set: &[usize]) -> Vec<AtlasAssignment> {
        let id = self.atlases.len() as u32;
        let size = self.atlas_size;
        let padding = self.padding;
        let extent = size as f32;

        let sizes: Vec<(u32, u32)> = working_set.iter().map(|&i| self.padded_size(&self.candidates[i])).collect();
        let placements = skyline::pack_all(size, size, &sizes);
        if placements.iter().any(Option::is_none) {
            log::error!("Lightmap {}: not all maps packed", id);
        }

        let mut image = RgbImage::from_pixel(size, size, self.clear_color);
        let mut atlas_placements = Vec::new();
        let mut assignments = Vec::new();

        for (&index, placement) in working_set.iter().zip(placements) {
            let map = &mut self.candidates[index];
            map.packed = true;

            let Some((x, y)) = placement else {
                log::error!("Lightmap {}: skipping unpacked map of mesh {:?}", id, map.mesh);
                continue;
            };

            blit_padded(&mut image, &map.image, x, y, padding);
            let rect = AtlasRect {
                x: x + padding,
                y: y + padding,
                width: map.width(),
                height: map.height(),
            };
            atlas_placements.push((map.mesh, rect));
            assignments.push(AtlasAssignment {
                mesh: map.mesh,
                lightmap_index: id,
                tiling_offset: Vec4::new(
                    rect.width as f32 / extent,
                    rect.height as f32 / extent,
                    rect.x as f32 / extent,
                    rect.y as f32 / extent,
                ),
            });
        }

        if self.box_filter {
            image = box_filter(&image);
        }

        log::debug!("Lightmap {}: {} maps", id, atlas_placements.len());
        self.atlases.push(LightmapAtlas {
            id,
            image,
            placements: atlas_placements,
        });
        assignments
    }

    /// Write every atlas as `{prefix}{id}.png` into `dir`
    pub fn save_lightmaps(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<PathBuf>, LightmapError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| LightmapError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut written = Vec::with_capacity(self.atlases.len());
        for atlas in &self.atlases {
            let path = dir.join(format!("{}{}.png", prefix, atlas.id));
            atlas.image.save(&path).map_err(|source| LightmapError::Image {
                path: path.display().to_string(),
                source,
            })?;
            log::info!("Saved lightmap {:?}", path);
            written.push(path);
        }
        Ok(written)
    }
}

/// Copy `src` to `(x + padding, y + padding)`, replicating its edges into the border
fn blit_padded(dest: &mut RgbImage, src: &RgbImage, x: u32, y: u32, padding: u32) {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    for py in 0..h + 2 * padding {
        for px in 0..w + 2 * padding {
            let sx = px.saturating_sub(padding).min(w - 1);
            let sy = py.saturating_sub(padding).min(h - 1);
            let (dx, dy) = (x + px, y + py);
            if dx < dest.width() && dy < dest.height() {
                dest.put_pixel(dx, dy, *src.get_pixel(sx, sy));
            }
        }
    }
}

/// Separable 3x3 box filter with clamped edges
fn box_filter(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let pass = |src: &RgbImage, horizontal: bool| {
        RgbImage::from_fn(w, h, |x, y| {
            let mut sum = [0u32; 3];
            for offset in [-1i64, 0, 1] {
                let (sx, sy) = if horizontal {
                    ((i64::from(x) + offset).clamp(0, i64::from(w) - 1) as u32, y)
                } else {
                    (x, (i64::from(y) + offset).clamp(0, i64::from(h) - 1) as u32)
                };
                let pixel = src.get_pixel(sx, sy);
                for (channel, value) in sum.iter_mut().zip(pixel.0) {
                    *channel += u32::from(value);
                }
            }
            Rgb(sum.map(|c| ((c + 1) / 3) as u8))
        })
    };
    let horizontal = pass(image, true);
    pass(&horizontal, false)
}
