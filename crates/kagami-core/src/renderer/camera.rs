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

//! Camera framing targets and the live camera state.

use crate::math::{degrees_to_radians, Quaternion, Vec3};
use serde::{Deserialize, Serialize};

/// A camera placement computed once per avatar activation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
}

/// Minimum and maximum camera-to-target distance reachable by dollying.
const MIN_DISTANCE: f32 = 0.2;
const MAX_DISTANCE: f32 = 10.0;
/// Pitch limit, keeps the camera away from the poles.
const MAX_PITCH_DEGREES: f32 = 85.0;

/// The live camera the renderer draws through.
///
/// Framing sets it when an avatar becomes active; orbit and dolly controls
/// change it independently afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Camera position in world space.
    pub position: Vec3,
    /// Orbit pivot and look-at point.
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y_radians: f32,
}

impl CameraState {
    /// Creates a camera at `frame` with the given field of view (degrees).
    pub fn new(frame: CameraFrame, fov_y_degrees: f32) -> Self {
        Self {
            position: frame.position,
            target: frame.target,
            fov_y_radians: degrees_to_radians(fov_y_degrees),
        }
    }

    /// Moves the camera to a new frame, keeping the field of view.
    pub fn apply_frame(&mut self, frame: CameraFrame) {
        self.position = frame.position;
        self.target = frame.target;
    }

    /// Returns the current placement as a frame.
    pub fn frame(&self) -> CameraFrame {
        CameraFrame {
            position: self.position,
            target: self.target,
        }
    }

    /// Distance between the camera and its target.
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Rotates the camera around its target. Positive yaw turns left around +Y;
    /// positive pitch raises the camera. The resulting pitch is clamped.
    pub fn orbit(&mut self, yaw_radians: f32, pitch_radians: f32) {
        if !yaw_radians.is_finite() || !pitch_radians.is_finite() {
            return;
        }
        let offset = self.position - self.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return;
        }

        let yawed = Quaternion::from_axis_angle(Vec3::Y, yaw_radians).rotate_vec3(offset);
        let horizontal = (yawed.x * yawed.x + yawed.z * yawed.z).sqrt();
        let current_pitch = yawed.y.atan2(horizontal);
        let limit = degrees_to_radians(MAX_PITCH_DEGREES);
        let pitch = (current_pitch + pitch_radians).clamp(-limit, limit);
        let heading = yawed.x.atan2(yawed.z);

        let (sin_p, cos_p) = pitch.sin_cos();
        let (sin_h, cos_h) = heading.sin_cos();
        let direction = Vec3::new(cos_p * sin_h, sin_p, cos_p * cos_h);
        self.position = self.target + direction * radius;
    }

    /// Scales the camera-to-target distance by `factor`, within fixed limits.
    pub fn dolly(&mut self, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let offset = self.position - self.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return;
        }
        let new_radius = (radius * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.position = self.target + offset.normalize() * new_radius;
    }
}
