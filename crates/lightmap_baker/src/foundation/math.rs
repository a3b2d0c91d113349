//! Math utilities and types
//!
//! Provides the fundamental math types used by the baker.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Linear RGB color. Radiance is unbounded until quantization.
pub type Color = Vec3;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a transform from position, euler angles in degrees (x, y, z) and scale
    pub fn from_euler_degrees(position: Vec3, euler_degrees: Vec3, scale: Vec3) -> Self {
        let euler = euler_degrees * constants::DEG_TO_RAD;
        Self {
            position,
            rotation: Quat::from_euler_angles(euler.x, euler.y, euler.z),
            scale,
        }
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * self.scale.component_mul(&point)
    }

    /// Rotate a normal into world space
    ///
    /// Only the rotation is applied; the result is renormalized.
    pub fn transform_normal(&self, normal: Vec3) -> Vec3 {
        (self.rotation * normal)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros)
    }

    /// World-space forward axis (+Z rotated)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::z()
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{Vec2, Vec3};

    /// Interpolate three vertex attributes with barycentric weights
    pub fn barycentric3(weights: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
        a * weights.x + b * weights.y + c * weights.z
    }

    /// Interpolate three 2D vertex attributes with barycentric weights
    pub fn barycentric2(weights: Vec3, a: Vec2, b: Vec2, c: Vec2) -> Vec2 {
        a * weights.x + b * weights.y + c * weights.z
    }

    /// Whether `value` is a power of two (zero is not)
    pub const fn is_power_of_two(value: u32) -> bool {
        value != 0 && value & (value - 1) == 0
    }
}
