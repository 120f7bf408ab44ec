// 2D transform component
//
// Linear part is built as R(θ) · S(sx, sy): the scale is applied first, then
// the rotation. Translation stays a separate offset, so there is no shear.

use glam::{Mat2, Vec2};
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2d {
    pub translation: Vec2,
    pub scale: Vec2,
    /// Radians
    pub rotation: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2d {
    /// Composed 2x2 linear map (column-major, as the shader expects)
    pub fn mat2(&self) -> Mat2 {
        let (s, c) = self.rotation.sin_cos();
        let rotation = Mat2::from_cols(Vec2::new(c, s), Vec2::new(-s, c));
        let scale = Mat2::from_diagonal(self.scale);
        rotation * scale
    }

    /// Advance the rotation, keeping it inside [0, 2π)
    pub fn rotate_wrapped(&mut self, delta: f32) {
        self.rotation = wrap_angle(self.rotation + delta);
    }

    /// Apply the full affine transform to a point
    pub fn apply(&self, point: Vec2) -> Vec2 {
        self.mat2() * point + self.translation
    }
}

/// Wrap an angle into [0, 2π).
///
/// `rem_euclid` can round up to exactly 2π for tiny negative inputs, which is
/// folded back to zero.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn unit_scale_zero_rotation_is_identity() {
        let transform = Transform2d {
            translation: Vec2::new(0.25, -0.75),
            ..Default::default()
        };

        assert_eq!(transform.mat2(), Mat2::IDENTITY);
        assert_eq!(
            transform.apply(Vec2::new(1.0, 2.0)),
            Vec2::new(1.25, 1.25)
        );
    }

    #[test]
    fn scale_is_applied_before_rotation() {
        let transform = Transform2d {
            scale: Vec2::new(2.0, 1.0),
            rotation: FRAC_PI_2,
            ..Default::default()
        };

        // x axis is stretched to length 2, then turned onto +y
        let p = transform.mat2() * Vec2::X;
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-6);

        // y axis keeps length 1 and ends up on -x
        let q = transform.mat2() * Vec2::Y;
        assert_relative_eq!(q.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(q.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn wrapped_rotation_stays_in_range() {
        let mut transform = Transform2d {
            rotation: 6.28,
            ..Default::default()
        };

        for _ in 0..100_000 {
            transform.rotate_wrapped(0.37);
            assert!(transform.rotation >= 0.0 && transform.rotation < TAU);
        }
    }

    #[test]
    fn wrap_handles_large_and_negative_angles() {
        assert_relative_eq!(wrap_angle(5.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-FRAC_PI_2), 3.0 * FRAC_PI_2, epsilon = 1e-5);
        assert!(wrap_angle(-1e-9) < TAU);
        assert!(wrap_angle(f32::MAX) < TAU);
    }
}
