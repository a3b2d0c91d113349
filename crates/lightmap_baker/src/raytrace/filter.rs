//! Occlusion filters: per-geometry callbacks that can veto a ray hit

use std::fmt::Debug;
use std::sync::Arc;

use crate::assets::BakeMaterial;
use crate::foundation::math::Vec2;

/// Decides whether a hit on a registered mesh blocks the ray
pub trait OcclusionFilter: Send + Sync + Debug {
    /// `primitive` is the triangle index within its mesh; `u` and `v` weight
    /// its second and third vertex
    fn blocks(&self, primitive: u32, u: f32, v: f32) -> bool;
}

/// Lets rays pass through texels whose diffuse alpha is below the material threshold
#[derive(Debug, Clone)]
pub struct AlphaCutoutFilter {
    triangles: Vec<[u32; 3]>,
    triangle_materials: Vec<usize>,
    uv0: Vec<Vec2>,
    materials: Vec<Arc<BakeMaterial>>,
}

impl AlphaCutoutFilter {
    /// Build a filter for one mesh
    ///
    /// `triangles` and `triangle_materials` run in parallel; material indices
    /// point into `materials`.
    pub fn new(
        triangles: Vec<[u32; 3]>,
        triangle_materials: Vec<usize>,
        uv0: Vec<Vec2>,
        materials: Vec<Arc<BakeMaterial>>,
    ) -> Self {
        Self {
            triangles,
            triangle_materials,
            uv0,
            materials,
        }
    }

    /// Whether any material of the mesh can produce a cutout
    pub fn is_needed(materials: &[Arc<BakeMaterial>]) -> bool {
        materials.iter().any(|m| m.has_cutout())
    }
}

impl OcclusionFilter for AlphaCutoutFilter {
    fn blocks(&self, primitive: u32, u: f32, v: f32) -> bool {
        let primitive = primitive as usize;
        let (Some(tri), Some(&material_index)) = (
            self.triangles.get(primitive),
            self.triangle_materials.get(primitive),
        ) else {
            return true;
        };
        let Some(material) = self.materials.get(material_index) else {
            return true;
        };
        let Some(texture) = material.diffuse_texture.as_ref() else {
            return true;
        };

        let [Some(uv_a), Some(uv_b), Some(uv_c)] = tri.map(|i| self.uv0.get(i as usize)) else {
            return true;
        };

        let w = 1.0 - u - v;
        let uv = uv_a * w + uv_b * u + uv_c * v;
        texture.sample_alpha(uv) >= material.alpha_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Texture;

    fn half_transparent_material() -> Arc<BakeMaterial> {
        // Left half of the texture is fully transparent
        let data = vec![
            0, 0, 0, 0, 255, 255, 255, 255,
            0, 0, 0, 0, 255, 255, 255, 255,
        ];
        Arc::new(BakeMaterial {
            name: "fence".to_string(),
            diffuse_texture: Texture::from_rgba(2, 2, data).map(Arc::new),
            ..BakeMaterial::default()
        })
    }

    #[test]
    fn test_cutout_by_uv() {
        let filter = AlphaCutoutFilter::new(
            vec![[0, 1, 2]],
            vec![0],
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            vec![half_transparent_material()],
        );

        // Near vertex 0 (u ~ 0) the texture is transparent
        assert!(!filter.blocks(0, 0.1, 0.1));
        // Near vertex 1 (u ~ 1) the texture is opaque
        assert!(filter.blocks(0, 0.8, 0.1));
    }

    #[test]
    fn test_untextured_material_blocks() {
        let filter = AlphaCutoutFilter::new(
            vec![[0, 1, 2]],
            vec![0],
            vec![Vec2::zeros(); 3],
            vec![Arc::new(BakeMaterial::default())],
        );
        assert!(filter.blocks(0, 0.3, 0.3));
        assert!(!AlphaCutoutFilter::is_needed(&[Arc::new(BakeMaterial::default())]));
        assert!(AlphaCutoutFilter::is_needed(&[half_transparent_material()]));
    }
}
