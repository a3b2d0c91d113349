//! UV-space triangle rasterizer
//!
//! Enumerates the lightmap texels covered by a triangle given in pixel-space
//! lightmap coordinates. A texel is covered when its center `(x + 0.5, y + 0.5)`
//! lies inside the triangle. With [`FillRule::TopLeft`] centers exactly on a
//! shared edge belong to one triangle only, so a closed UV chart visits each
//! texel once.

use crate::foundation::math::{Vec2, Vec3};

/// Edge ownership for texel centers exactly on an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    /// Half-open: only top and left edges own their centers
    #[default]
    TopLeft,
    /// Every edge owns its centers; shared edges are visited twice
    Inclusive,
}

/// One covered texel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterFragment {
    /// Texel column
    pub x: u32,
    /// Texel row
    pub y: u32,
    /// Weights of the three input vertices, in input order
    pub barycentric: Vec3,
    /// Change of the weights per texel step in x
    pub d_bary_dx: Vec3,
    /// Change of the weights per texel step in y
    pub d_bary_dy: Vec3,
    /// Fraction of the texel covered; a single center sample gives 1
    pub coverage: f32,
}

/// Fragment counts of one triangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    /// Texels covered
    pub covered: u32,
    /// Texels the callback accepted
    pub accepted: u32,
}

/// Rasterize one triangle over a `extents.x` by `extents.y` texel grid
///
/// `flip_winding` states that the input is wound clockwise; input of either
/// winding is normalised before edge tests, so the flag only saves the
/// orientation check. A callback returning `false` rejects that texel and
/// rasterization carries on.
pub fn draw_triangle<F>(
    flip_winding: bool,
    extents: Vec2,
    fill_rule: FillRule,
    uv: [Vec2; 3],
    mut callback: F,
) -> RasterStats
where
    F: FnMut(&RasterFragment) -> bool,
{
    let mut stats = RasterStats::default();

    // Vertex order used for edge tests, mapped back to input order on output
    let mut order = if flip_winding { [0, 2, 1] } else { [0, 1, 2] };
    let mut p = order.map(|i| uv[i]);
    let mut area = orient(p[0], p[1], p[2]);
    if area < 0.0 {
        order.swap(1, 2);
        p.swap(1, 2);
        area = -area;
    }
    if !area.is_finite() || area <= f32::EPSILON {
        return stats;
    }

    let width = extents.x.max(0.0).floor();
    let height = extents.y.max(0.0).floor();
    if width < 1.0 || height < 1.0 {
        return stats;
    }

    let min = p[0].inf(&p[1]).inf(&p[2]);
    let max = p[0].sup(&p[1]).sup(&p[2]);
    // Texel x is covered only if x + 0.5 lies in [min.x, max.x]
    let x0 = (min.x - 0.5).ceil().max(0.0);
    let y0 = (min.y - 0.5).ceil().max(0.0);
    let x1 = (max.x - 0.5).floor().min(width - 1.0);
    let y1 = (max.y - 0.5).floor().min(height - 1.0);
    if x0 > x1 || y0 > y1 {
        return stats;
    }

    // Edge i is opposite vertex i
    let edges = [(p[1], p[2]), (p[2], p[0]), (p[0], p[1])];
    let owns_edge = edges.map(|(a, b)| match fill_rule {
        FillRule::TopLeft => is_top_left(a, b),
        FillRule::Inclusive => true,
    });

    let inv_area = 1.0 / area;
    // Weight gradients in edge-test order
    let gradient = edges.map(|(a, b)| Vec2::new(a.y - b.y, b.x - a.x) * inv_area);
    let to_input = |w: [f32; 3]| {
        let mut out = [0.0; 3];
        for (slot, &input_index) in order.iter().enumerate() {
            out[input_index] = w[slot];
        }
        Vec3::from(out)
    };
    let d_bary_dx = to_input(gradient.map(|g| g.x));
    let d_bary_dy = to_input(gradient.map(|g| g.y));

    let mut y = y0;
    while y <= y1 {
        let mut x = x0;
        while x <= x1 {
            let center = Vec2::new(x + 0.5, y + 0.5);
            let w = [
                orient(edges[0].0, edges[0].1, center),
                orient(edges[1].0, edges[1].1, center),
                orient(edges[2].0, edges[2].1, center),
            ];

            let inside = w
                .iter()
                .zip(owns_edge.iter())
                .all(|(&wi, &owned)| wi > 0.0 || (wi == 0.0 && owned));

            if inside {
                stats.covered += 1;
                let fragment = RasterFragment {
                    x: x as u32,
                    y: y as u32,
                    barycentric: to_input(w.map(|wi| wi * inv_area)),
                    d_bary_dx,
                    d_bary_dy,
                    coverage: 1.0,
                };
                if callback(&fragment) {
                    stats.accepted += 1;
                }
            }
            x += 1.0;
        }
        y += 1.0;
    }

    stats
}

/// Twice the signed area of `(a, b, c)`; positive when `c` is on the inner side of `a -> b`
fn orient(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Top edge: horizontal with the interior below. Left edge: interior to its right.
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    let d = b - a;
    (d.y == 0.0 && d.x > 0.0) || d.y < 0.0
}
