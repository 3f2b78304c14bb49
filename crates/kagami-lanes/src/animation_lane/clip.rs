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

//! Retargetable humanoid animation clips.
//!
//! Tracks are keyed by [`HumanoidBone`] and store poses relative to the rest
//! pose of the rig they were authored on: rotations as deltas from the rest
//! rotation, translations as offsets from the rest translation. Applying a clip
//! to another avatar is then a matter of composing with that avatar's rest pose.

use kagami_core::avatar::HumanoidBone;
use kagami_core::math::{Quaternion, Vec3};

/// How values between two keyframes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the previous keyframe's value.
    Step,
    /// Interpolate linearly (spherically for rotations).
    Linear,
}

/// Values that can be blended between keyframes.
pub trait Interpolate: Copy {
    /// Blends `a` towards `b` by `t` in `[0, 1]`.
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Quaternion {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        Quaternion::slerp(a, b, t)
    }
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        Vec3::lerp(a, b, t)
    }
}

/// A keyframed curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: Interpolation,
}

impl<T: Interpolate> Keyframes<T> {
    /// Builds a curve. Returns `None` if the lists are empty, differ in length,
    /// or the times are not ascending.
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Option<Self> {
        if times.is_empty() || times.len() != values.len() {
            return None;
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] < w[0]) {
            return None;
        }
        Some(Self {
            times,
            values,
            interpolation,
        })
    }

    /// Time of the last keyframe.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Samples the curve at `time`, holding the first and last values outside
    /// the keyed range.
    pub fn sample(&self, time: f32) -> T {
        let last = self.times.len() - 1;
        if time <= self.times[0] {
            return self.values[0];
        }
        if time >= self.times[last] {
            return self.values[last];
        }
        let next = self.times.partition_point(|&t| t <= time);
        let prev = next - 1;
        match self.interpolation {
            Interpolation::Step => self.values[prev],
            Interpolation::Linear => {
                let span = self.times[next] - self.times[prev];
                let t = if span > 0.0 {
                    (time - self.times[prev]) / span
                } else {
                    0.0
                };
                T::interpolate(self.values[prev], self.values[next], t)
            }
        }
    }
}

/// The animated channels of one humanoid bone.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrack {
    /// The bone this track drives.
    pub bone: HumanoidBone,
    /// Rotation deltas from the rest rotation.
    pub rotation: Option<Keyframes<Quaternion>>,
    /// Translation offsets from the rest translation.
    pub translation: Option<Keyframes<Vec3>>,
}

/// A named humanoid animation clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    /// Creates a clip; the duration is the latest keyframe over all tracks.
    pub fn new(name: impl Into<String>, tracks: Vec<BoneTrack>) -> Self {
        let duration = tracks
            .iter()
            .flat_map(|track| {
                let rotation = track.rotation.as_ref().map(Keyframes::end_time);
                let translation = track.translation.as_ref().map(Keyframes::end_time);
                rotation.into_iter().chain(translation)
            })
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// The clip name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// The bone tracks.
    pub fn tracks(&self) -> &[BoneTrack] {
        &self.tracks
    }
}
