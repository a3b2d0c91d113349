//! Skyline bottom-left rectangle packer
//!
//! The skyline is a list of horizontal segments tracking the lowest free row
//! across the bin. A rectangle goes where its top edge ends up lowest, ties
//! broken by the leftmost position.

/// One horizontal segment of the skyline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SkylineNode {
    x: u32,
    y: u32,
    width: u32,
}

/// Incremental packer for a fixed-size bin
#[derive(Debug, Clone)]
pub struct SkylinePacker {
    width: u32,
    height: u32,
    nodes: Vec<SkylineNode>,
}

impl SkylinePacker {
    /// Empty bin
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            nodes: vec![SkylineNode { x: 0, y: 0, width }],
        }
    }

    /// Bin width
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Bin height
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Place a rectangle; returns its top-left corner
    pub fn insert(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        let mut best: Option<(usize, u32)> = None;
        for index in 0..self.nodes.len() {
            let Some(y) = self.fit(index, width, height) else {
                continue;
            };
            if best.map_or(true, |(_, best_y)| y < best_y) {
                best = Some((index, y));
            }
        }

        let (index, y) = best?;
        let x = self.nodes[index].x;
        self.add_level(index, x, y, width, height);
        Some((x, y))
    }

    /// Lowest `y` at which a rectangle starting on node `index` fits
    fn fit(&self, index: usize, width: u32, height: u32) -> Option<u32> {
        let x = self.nodes[index].x;
        if x + width > self.width {
            return None;
        }

        let mut y = 0;
        let mut covered = 0;
        for node in &self.nodes[index..] {
            if covered >= width {
                break;
            }
            y = y.max(node.y);
            if y + height > self.height {
                return None;
            }
            covered += node.width;
        }
        (covered >= width).then_some(y)
    }

    fn add_level(&mut self, index: usize, x: u32, y: u32, width: u32, height: u32) {
        self.nodes.insert(index, SkylineNode { x, y: y + height, width });

        // Trim the segments now underneath the new one
        let right = x + width;
        let next = index + 1;
        while next < self.nodes.len() && self.nodes[next].x < right {
            let node = &mut self.nodes[next];
            let overlap = right - node.x;
            if node.width <= overlap {
                self.nodes.remove(next);
            } else {
                node.x += overlap;
                node.width -= overlap;
                break;
            }
        }

        // Merge neighbors at the same height
        let mut i = 0;
        while i + 1 < self.nodes.len() {
            if self.nodes[i].y == self.nodes[i + 1].y {
                self.nodes[i].width += self.nodes[i + 1].width;
                self.nodes.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}

/// Pack every rectangle into one bin, tallest first
///
/// Results are in input order; `None` marks a rectangle that did not fit.
pub fn pack_all(width: u32, height: u32, sizes: &[(u32, u32)]) -> Vec<Option<(u32, u32)>> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let (wa, ha) = sizes[a];
        let (wb, hb) = sizes[b];
        hb.cmp(&ha).then(wb.cmp(&wa))
    });

    let mut packer = SkylinePacker::new(width, height);
    let mut placements = vec![None; sizes.len()];
    for index in order {
        let (w, h) = sizes[index];
        placements[index] = packer.insert(w, h);
    }
    placements
}

/// Whether every rectangle fits in one bin
pub fn fits(width: u32, height: u32, sizes: &[(u32, u32)]) -> bool {
    pack_all(width, height, sizes).iter().all(Option::is_some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
    }

    #[test]
    fn test_fills_row_then_stacks() {
        let mut packer = SkylinePacker::new(100, 100);
        assert_eq!(packer.insert(50, 20), Some((0, 0)));
        assert_eq!(packer.insert(50, 30), Some((50, 0)));
        // Lowest free row is on the left
        assert_eq!(packer.insert(40, 10), Some((0, 20)));
        // Spanning both segments rests on the higher one
        assert_eq!(packer.insert(60, 10), Some((0, 30)));
        assert_eq!(packer.insert(101, 1), None);
    }

    #[test]
    fn test_exact_fill() {
        let sizes = vec![(50, 50); 4];
        let placements = pack_all(100, 100, &sizes);
        assert!(placements.iter().all(Option::is_some));
        assert!(!fits(100, 100, &vec![(50, 50); 5]));
    }

    #[test]
    fn test_placements_stay_in_bounds_without_overlap() {
        let sizes: Vec<(u32, u32)> = (0..40).map(|i| (8 + (i * 7) % 45, 6 + (i * 11) % 37)).collect();
        let placements = pack_all(256, 256, &sizes);

        let rects: Vec<_> = placements
            .iter()
            .zip(&sizes)
            .filter_map(|(p, &(w, h))| p.map(|(x, y)| (x, y, w, h)))
            .collect();
        assert!(!rects.is_empty());

        for (i, a) in rects.iter().enumerate() {
            assert!(a.0 + a.2 <= 256 && a.1 + a.3 <= 256);
            for b in &rects[i + 1..] {
                assert!(!overlaps(*a, *b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_padded_lightmaps_in_default_atlas() {
        // 600 and 400 maps with 2 texels of padding share a row
        assert!(fits(1024, 1024, &[(604, 604), (404, 404)]));
        // 600 and 500 do not fit side by side or stacked
        assert!(!fits(1024, 1024, &[(604, 604), (504, 504)]));
        assert!(!fits(1024, 1024, &[(604, 604), (516, 516)]));
    }
}
