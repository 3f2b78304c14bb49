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

use kagami_core::avatar::{HumanoidBone, Skeleton};
use kagami_core::math::Vec3;
use kagami_core::renderer::CameraFrame;
use kagami_core::{Lane, LaneKind};
use serde::{Deserialize, Serialize};

/// Offsets used to frame an avatar from its head joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingParams {
    /// Camera position relative to the head.
    pub camera_offset: Vec3,
    /// Look-at target relative to the head.
    pub look_offset: Vec3,
    /// Frame used when the avatar has no head joint.
    pub default_frame: CameraFrame,
    /// Vertical field of view of the live camera, in degrees.
    pub fov_y_degrees: f32,
}

impl Default for FramingParams {
    fn default() -> Self {
        Self {
            camera_offset: Vec3::new(0.0, 0.0, 0.8),
            look_offset: Vec3::new(0.0, -0.05, 0.0),
            default_frame: CameraFrame {
                position: Vec3::new(0.0, 1.4, 1.5),
                target: Vec3::new(0.0, 1.3, 0.0),
            },
            fov_y_degrees: 30.0,
        }
    }
}

/// Places the camera for an upper-body, face-forward shot of an avatar.
///
/// Framing is a pure function of the head joint's world position, so avatars
/// of any height get the same composition. It runs once per activation; the
/// user's orbit controls take over from there.
#[derive(Debug, Clone, Default)]
pub struct CameraFramingLane {
    params: FramingParams,
}

impl CameraFramingLane {
    /// Creates a framing lane with the given offsets.
    pub fn new(params: FramingParams) -> Self {
        Self { params }
    }

    /// The framing offsets.
    pub fn params(&self) -> &FramingParams {
        &self.params
    }

    /// Frames a head at `head` (world space).
    pub fn frame_for_head(&self, head: Vec3) -> CameraFrame {
        CameraFrame {
            position: head + self.params.camera_offset,
            target: head + self.params.look_offset,
        }
    }

    /// Frames `skeleton` from its current head position, or returns the
    /// default frame if it has no usable head joint.
    pub fn compute_frame(&self, skeleton: &Skeleton) -> CameraFrame {
        match skeleton
            .bone_world_position(HumanoidBone::Head)
            .filter(Vec3::is_finite)
        {
            Some(head) => self.frame_for_head(head),
            None => {
                log::debug!("Avatar has no head joint, using the default camera frame");
                self.params.default_frame
            }
        }
    }
}

impl Lane for CameraFramingLane {
    fn strategy_name(&self) -> &'static str {
        "HeadFraming"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Camera
    }
}
