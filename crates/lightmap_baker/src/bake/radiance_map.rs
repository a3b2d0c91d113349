//! Raw texel grids and the post-processing that turns them into images
//!
//! A [`RadianceGrid`] is what lighting writes into: one optional color and
//! one optional source triangle per texel. Once lighting is complete the grid
//! runs through clamp, seam dilation, ambient fill, same-triangle blur and an
//! optional downsample, and is quantized into a [`RadianceMap`].

use image::{Rgb, RgbImage};

use crate::bake::mesh::BakeMeshId;
use crate::core::config::GlowSettings;
use crate::foundation::math::Color;

/// Per-texel radiance accumulated during lighting
#[derive(Debug, Clone, PartialEq)]
pub struct RadianceGrid {
    width: u32,
    height: u32,
    radiance: Vec<Option<Color>>,
    triangles: Vec<Option<u32>>,
}

impl RadianceGrid {
    /// Grid with every texel invalid
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            radiance: vec![None; len],
            triangles: vec![None; len],
        }
    }

    /// Width in texels
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Radiance of a texel, `None` when it is invalid or out of range
    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        self.index(x, y).and_then(|i| self.radiance[i])
    }

    /// Source triangle of a texel
    pub fn triangle(&self, x: u32, y: u32) -> Option<u32> {
        self.index(x, y).and_then(|i| self.triangles[i])
    }

    /// Whether the texel has been seeded or filled
    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.get(x, y).is_some()
    }

    /// Mark a texel as visited by `triangle` with zero radiance
    ///
    /// Returns `false` if the texel was already seeded.
    pub fn seed(&mut self, x: u32, y: u32, triangle: u32) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        if self.triangles[i].is_some() {
            return false;
        }
        self.triangles[i] = Some(triangle);
        self.radiance[i] = Some(Color::zeros());
        true
    }

    /// Add radiance to a texel; an invalid texel takes the color as is
    pub fn contribute(&mut self, x: u32, y: u32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.radiance[i] = Some(self.radiance[i].map_or(color, |sum| sum + color));
        }
    }

    /// Overwrite a texel
    pub fn set(&mut self, x: u32, y: u32, color: Color, triangle: Option<u32>) {
        if let Some(i) = self.index(x, y) {
            self.radiance[i] = Some(color);
            self.triangles[i] = triangle;
        }
    }

    /// Number of valid texels
    pub fn valid_count(&self) -> usize {
        self.radiance.iter().filter(|r| r.is_some()).count()
    }

    /// Number of invalid texels
    pub fn invalid_count(&self) -> usize {
        self.radiance.len() - self.valid_count()
    }

    /// Iterate `(x, y, radiance, triangle)` over valid texels
    pub fn valid_texels(&self) -> impl Iterator<Item = (u32, u32, Color, Option<u32>)> + '_ {
        let width = self.width.max(1);
        self.radiance
            .iter()
            .zip(&self.triangles)
            .enumerate()
            .filter_map(move |(i, (radiance, triangle))| {
                radiance.map(|r| ((i as u32) % width, (i as u32) / width, r, *triangle))
            })
    }

    /// Scale every valid texel whose magnitude exceeds `ceiling` down to it
    pub fn clamp_magnitude(&mut self, ceiling: f32) {
        for color in self.radiance.iter_mut().flatten() {
            let magnitude = color.magnitude();
            if magnitude > ceiling && magnitude > 0.0 {
                *color *= ceiling / magnitude;
            }
        }
    }

    /// Seam dilation over increasing search distances
    ///
    /// Each pass looks at the four axis neighbors at distance `d` of every
    /// invalid texel and copies the first valid one, including its source
    /// triangle. A cycle over `1..=max_distance` repeats while it fills
    /// anything. Returns the number of texels filled.
    pub fn dilate(&mut self, max_distance: u32) -> usize {
        // Validity at the start of the current pass, reused across passes
        let mut snapshot = Vec::with_capacity(self.radiance.len());
        let mut total = 0;
        loop {
            let mut filled = 0;
            for distance in 1..=max_distance.max(1) {
                filled += self.dilate_pass(distance, &mut snapshot);
            }
            if filled == 0 {
                break;
            }
            total += filled;
        }
        total
    }

    /// One dilation pass; texels filled during the pass do not act as donors
    ///
    /// Donor colors are read from `self` directly: a texel valid in the
    /// snapshot is never written by the pass.
    fn dilate_pass(&mut self, distance: u32, snapshot: &mut Vec<bool>) -> usize {
        snapshot.clear();
        snapshot.extend(self.radiance.iter().map(Option::is_some));
        if snapshot.iter().all(|&valid| valid) || !snapshot.contains(&true) {
            return 0;
        }

        let (width, height) = (i64::from(self.width), i64::from(self.height));
        let d = i64::from(distance);
        let mut filled = 0;

        for i in 0..snapshot.len() {
            if snapshot[i] {
                continue;
            }
            let (x, y) = (i as i64 % width, i as i64 / width);
            for (dx, dy) in [(d, 0), (-d, 0), (0, d), (0, -d)] {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width || ny >= height {
                    continue;
                }
                let n = (ny * width + nx) as usize;
                if snapshot[n] {
                    self.radiance[i] = self.radiance[n];
                    self.triangles[i] = self.triangles[n];
                    filled += 1;
                    break;
                }
            }
        }
        filled
    }

    /// Give every remaining invalid texel `color`
    pub fn fill_invalid(&mut self, color: Color) -> usize {
        let mut filled = 0;
        for radiance in &mut self.radiance {
            if radiance.is_none() {
                *radiance = Some(color);
                filled += 1;
            }
        }
        filled
    }

    /// 3x3 box blur that only averages texels from the same source triangle
    pub fn blur_same_triangle(&mut self) {
        let source = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let (Some(center), Some(triangle)) = (source.get(x, y), source.triangle(x, y)) else {
                    continue;
                };

                let mut sum = Color::zeros();
                let mut count = 0u32;
                for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(self.width - 1) {
                        if source.triangle(nx, ny) != Some(triangle) {
                            continue;
                        }
                        if let Some(color) = source.get(nx, ny) {
                            sum += color;
                            count += 1;
                        }
                    }
                }

                let blurred = if count > 0 { sum / count as f32 } else { center };
                self.set(x, y, blurred, Some(triangle));
            }
        }
    }

    /// Half-resolution grid; each texel averages the valid texels of its 2x2 block
    ///
    /// Odd sizes round up, so blocks on the last row or column average the
    /// texels they cover.
    pub fn downsample(&self) -> Self {
        let width = self.width.div_ceil(2).max(1);
        let height = self.height.div_ceil(2).max(1);
        let mut out = Self::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let mut sum = Color::zeros();
                let mut count = 0u32;
                let mut triangle = None;
                for (sx, sy) in [(2 * x, 2 * y), (2 * x + 1, 2 * y), (2 * x, 2 * y + 1), (2 * x + 1, 2 * y + 1)] {
                    if let Some(color) = self.get(sx, sy) {
                        sum += color;
                        count += 1;
                        triangle = triangle.or_else(|| self.triangle(sx, sy));
                    }
                }
                if count > 0 {
                    out.set(x, y, sum / count as f32, triangle);
                }
            }
        }
        out
    }
}

/// Post-processed lightmap of one mesh, ready for packing
#[derive(Debug, Clone)]
pub struct RadianceMap {
    /// Mesh the map belongs to
    pub mesh: BakeMeshId,
    /// 8-bit RGB pixels
    pub image: RgbImage,
    /// Set once the packer has handled this map
    pub packed: bool,
}

impl RadianceMap {
    /// Run the post-processing pipeline over a lit grid
    ///
    /// `ambient` fills texels that dilation could not reach, which only
    /// happens when the grid has no valid texel at all.
    pub fn from_grid(mesh: BakeMeshId, mut grid: RadianceGrid, settings: &GlowSettings, ambient: Color) -> Self {
        grid.clamp_magnitude(settings.radiance_ceiling);

        let dilated = grid.dilate(settings.dilation_max_distance);
        let ambient_filled = grid.fill_invalid(ambient);
        if ambient_filled > 0 {
            log::debug!("Filled {} unreachable texels with ambient", ambient_filled);
        }
        log::trace!("Dilation filled {} texels", dilated);

        if settings.blur {
            grid.blur_same_triangle();
        }
        if settings.downsample {
            grid = grid.downsample();
        }

        Self {
            mesh,
            image: quantize(&grid),
            packed: false,
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Convert linear radiance to 8-bit, clamping each channel to `[0, 1]`
pub fn quantize_color(color: Color) -> Rgb<u8> {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(color.x), channel(color.y), channel(color.z)])
}

fn quantize(grid: &RadianceGrid) -> RgbImage {
    RgbImage::from_fn(grid.width(), grid.height(), |x, y| {
        quantize_color(grid.get(x, y).unwrap_or_else(Color::zeros))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single_texel_grid(size: u32, x: u32, y: u32, color: Color) -> RadianceGrid {
        let mut grid = RadianceGrid::new(size, size);
        grid.seed(x, y, 0);
        grid.contribute(x, y, color);
        grid
    }

    #[test]
    fn test_seed_and_contribute() {
        let mut grid = RadianceGrid::new(4, 4);
        assert!(!grid.is_valid(1, 1));

        assert!(grid.seed(1, 1, 7));
        assert!(!grid.seed(1, 1, 8));
        assert_relative_eq!(grid.get(1, 1).unwrap(), Color::zeros());
        assert_eq!(grid.triangle(1, 1), Some(7));

        grid.contribute(1, 1, Color::new(0.5, 0.0, 0.0));
        grid.contribute(1, 1, Color::new(0.25, 0.5, 0.0));
        assert_relative_eq!(grid.get(1, 1).unwrap(), Color::new(0.75, 0.5, 0.0));

        // Out of range writes are ignored
        grid.contribute(9, 9, Color::new(1.0, 1.0, 1.0));
        assert_eq!(grid.valid_count(), 1);
    }

    #[test]
    fn test_clamp_magnitude() {
        let mut grid = single_texel_grid(2, 0, 0, Color::new(6.0, 0.0, 8.0));
        grid.clamp_magnitude(3.0);
        let clamped = grid.get(0, 0).unwrap();
        assert_relative_eq!(clamped.magnitude(), 3.0, epsilon = 1e-5);
        assert_relative_eq!(clamped, Color::new(1.8, 0.0, 2.4), epsilon = 1e-5);
    }

    #[test]
    fn test_dilation_fills_every_texel() {
        for size in [2u32, 3, 16, 33] {
            let mut grid = single_texel_grid(size, size - 1, 0, Color::new(0.2, 0.4, 0.6));
            let filled = grid.dilate(7);
            assert_eq!(filled, (size * size - 1) as usize);
            assert_eq!(grid.invalid_count(), 0);
            for (_, _, color, triangle) in grid.valid_texels() {
                assert_relative_eq!(color, Color::new(0.2, 0.4, 0.6));
                assert_eq!(triangle, Some(0));
            }
        }
    }

    #[test]
    fn test_dilation_is_idempotent_after_convergence() {
        let mut grid = single_texel_grid(8, 3, 5, Color::new(1.0, 0.5, 0.0));
        grid.dilate(7);
        let converged = grid.clone();

        assert_eq!(grid.dilate(7), 0);
        assert_eq!(grid, converged);
    }

    #[test]
    fn test_dilation_of_empty_grid_terminates() {
        let mut grid = RadianceGrid::new(4, 4);
        assert_eq!(grid.dilate(7), 0);
        assert_eq!(grid.invalid_count(), 16);

        assert_eq!(grid.fill_invalid(Color::repeat(0.1)), 16);
        assert_eq!(grid.invalid_count(), 0);
    }

    #[test]
    fn test_blur_stays_within_triangle() {
        let mut grid = RadianceGrid::new(4, 1);
        for x in 0..4 {
            grid.seed(x, 0, if x < 2 { 0 } else { 1 });
        }
        grid.contribute(0, 0, Color::repeat(1.0));
        grid.contribute(1, 0, Color::repeat(0.0));
        grid.contribute(2, 0, Color::repeat(1.0));
        grid.contribute(3, 0, Color::repeat(1.0));

        grid.blur_same_triangle();
        assert_relative_eq!(grid.get(0, 0).unwrap(), Color::repeat(0.5));
        assert_relative_eq!(grid.get(1, 0).unwrap(), Color::repeat(0.5));
        // Triangle 1 never sees the dark texel of triangle 0
        assert_relative_eq!(grid.get(2, 0).unwrap(), Color::repeat(1.0));
        assert_relative_eq!(grid.get(3, 0).unwrap(), Color::repeat(1.0));
    }

    #[test]
    fn test_downsample_skips_invalid() {
        let mut grid = RadianceGrid::new(4, 4);
        grid.seed(0, 0, 0);
        grid.contribute(0, 0, Color::repeat(0.8));
        grid.seed(1, 1, 0);
        grid.contribute(1, 1, Color::repeat(0.4));

        let half = grid.downsample();
        assert_eq!((half.width(), half.height()), (2, 2));
        assert_relative_eq!(half.get(0, 0).unwrap(), Color::repeat(0.6), epsilon = 1e-6);
        assert!(!half.is_valid(1, 1));
    }

    #[test]
    fn test_dilation_pass_uses_start_of_pass_donors() {
        let mut grid = RadianceGrid::new(5, 1);
        grid.seed(0, 0, 1);
        grid.contribute(0, 0, Color::repeat(0.2));
        grid.seed(4, 0, 2);
        grid.contribute(4, 0, Color::repeat(0.8));

        let mut snapshot = Vec::new();
        assert_eq!(grid.dilate_pass(1, &mut snapshot), 2);
        assert_relative_eq!(grid.get(1, 0).unwrap(), Color::repeat(0.2));
        assert_eq!(grid.triangle(1, 0), Some(1));
        assert_relative_eq!(grid.get(3, 0).unwrap(), Color::repeat(0.8));
        assert_eq!(grid.triangle(3, 0), Some(2));
        // Neighbors filled in this pass are not donors yet
        assert!(!grid.is_valid(2, 0));

        assert_eq!(grid.dilate_pass(2, &mut snapshot), 1);
        assert_relative_eq!(grid.get(2, 0).unwrap(), Color::repeat(0.8));
        assert_eq!(grid.dilate_pass(1, &mut snapshot), 0);
    }

    #[test]
    fn test_downsample_keeps_odd_edge() {
        let mut grid = RadianceGrid::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                grid.seed(x, y, 0);
            }
        }
        grid.contribute(2, 2, Color::repeat(0.9));
        grid.contribute(2, 0, Color::repeat(0.4));
        grid.contribute(2, 1, Color::repeat(0.2));

        let half = grid.downsample();
        assert_eq!((half.width(), half.height()), (2, 2));
        assert_relative_eq!(half.get(1, 1).unwrap(), Color::repeat(0.9));
        assert_relative_eq!(half.get(1, 0).unwrap(), Color::repeat(0.3), epsilon = 1e-6);
        assert_relative_eq!(half.get(0, 0).unwrap(), Color::zeros());
    }

    #[test]
    fn test_radiance_map_pipeline() {
        let grid = single_texel_grid(8, 4, 4, Color::new(2.0, 1.0, 0.5));
        let settings = GlowSettings::default().with_downsample(true);
        let map = RadianceMap::from_grid(BakeMeshId::default(), grid, &settings, Color::zeros());

        assert_eq!((map.width(), map.height()), (4, 4));
        assert!(!map.packed);
        // Channels clamp to [0, 1] at quantization
        for pixel in map.image.pixels() {
            assert_eq!(*pixel, Rgb([255, 255, 128]));
        }
    }

    #[test]
    fn test_quantize_color() {
        assert_eq!(quantize_color(Color::new(-1.0, 0.5, 3.0)), Rgb([0, 128, 255]));
    }
}
