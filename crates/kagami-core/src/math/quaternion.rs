// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides a unit quaternion type for joint rotations.

use super::{Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg};

/// A rotation in 3D space stored as `(x, y, z, w)`, the order glTF uses.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// The x component of the vector part.
    pub x: f32,
    /// The y component of the vector part.
    pub y: f32,
    /// The z component of the vector part.
    pub z: f32,
    /// The scalar part.
    pub w: f32,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Creates a new quaternion from raw components. The result is not normalized.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a quaternion from a `[x, y, z, w]` array.
    #[inline]
    pub const fn from_array(a: [f32; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    /// Creates a rotation of `angle_radians` around `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_radians: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_radians * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Calculates the squared magnitude of the quaternion.
    #[inline]
    pub fn magnitude_squared(&self) -> f32 {
        self.dot(*self)
    }

    /// Returns a unit-length copy. Degenerate inputs collapse to identity.
    pub fn normalize(&self) -> Self {
        let mag_sq = self.magnitude_squared();
        if mag_sq > EPSILON * EPSILON && mag_sq.is_finite() {
            let inv = 1.0 / mag_sq.sqrt();
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// Returns the conjugate, which is the inverse for unit quaternions.
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Calculates the 4D dot product.
    #[inline]
    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Rotates a vector by this quaternion.
    pub fn rotate_vec3(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let s: f32 = self.w;
        2.0 * u.dot(v) * u + (s * s - u.dot(u)) * v + 2.0 * s * u.cross(v)
    }

    /// Spherical interpolation along the shortest arc. `t` is clamped to `[0, 1]`.
    pub fn slerp(start: Self, end: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut cos_theta = start.dot(end);
        let mut end = end;

        if cos_theta < 0.0 {
            cos_theta = -cos_theta;
            end = -end;
        }

        if cos_theta > 1.0 - EPSILON {
            ((start * (1.0 - t)) + (end * t)).normalize()
        } else {
            let angle = cos_theta.acos();
            let sin_inv = 1.0 / angle.sin();
            let a = ((1.0 - t) * angle).sin() * sin_inv;
            let b = (t * angle).sin() * sin_inv;
            (start * a) + (end * b)
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Self;
    /// Hamilton product: `self * rhs` applies `rhs` first.
    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

impl Mul<f32> for Quaternion {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs, self.w * rhs)
    }
}

impl Add for Quaternion {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }
}

impl Neg for Quaternion {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

impl approx::AbsDiffEq for Quaternion {
    type Epsilon = f32;

    fn default_epsilon() -> Self::Epsilon {
        EPSILON
    }

    /// Treats `q` and `-q` as equal since both encode the same rotation.
    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        let same = |a: &Self, b: &Self| {
            f32::abs_diff_eq(&a.x, &b.x, epsilon)
                && f32::abs_diff_eq(&a.y, &b.y, epsilon)
                && f32::abs_diff_eq(&a.z, &b.z, epsilon)
                && f32::abs_diff_eq(&a.w, &b.w, epsilon)
        };
        same(self, other) || same(self, &-*other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_2;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rotate_quarter_turn_about_y() {
        let q = Quaternion::from_axis_angle(Vec3::Y, FRAC_PI_2);
        assert_abs_diff_eq!(q.rotate_vec3(Vec3::Z), Vec3::X, epsilon = 1e-5);
    }

    #[test]
    fn test_product_composes_rotations() {
        let a = Quaternion::from_axis_angle(Vec3::Y, FRAC_PI_2);
        let full = a * a;
        assert_abs_diff_eq!(full.rotate_vec3(Vec3::Z), -Vec3::Z, epsilon = 1e-5);
    }

    #[test]
    fn test_slerp_endpoints_and_midpoint() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_axis_angle(Vec3::X, FRAC_PI_2);
        assert_abs_diff_eq!(Quaternion::slerp(a, b, 0.0), a, epsilon = 1e-5);
        assert_abs_diff_eq!(Quaternion::slerp(a, b, 1.0), b, epsilon = 1e-5);
        let mid = Quaternion::slerp(a, b, 0.5);
        let expected = Quaternion::from_axis_angle(Vec3::X, FRAC_PI_2 * 0.5);
        assert_abs_diff_eq!(mid, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_normalize_degenerate_is_identity() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalize(), Quaternion::IDENTITY);
        assert_eq!(
            Quaternion::new(f32::NAN, 0.0, 0.0, 1.0).normalize(),
            Quaternion::IDENTITY
        );
    }
}
