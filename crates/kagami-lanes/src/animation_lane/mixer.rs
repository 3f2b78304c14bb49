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

use super::AnimationClip;
use kagami_core::avatar::Skeleton;
use kagami_core::math::{Quaternion, Vec3};
use kagami_core::{Lane, LaneKind};
use std::sync::Arc;

/// Default crossfade between two clips, in seconds.
pub const DEFAULT_CROSSFADE_SECS: f32 = 0.3;

/// One playing clip, with its tracks resolved to joints of a skeleton.
#[derive(Debug, Clone)]
struct Action {
    clip: Arc<AnimationClip>,
    /// `(joint index, track index)` pairs.
    bindings: Vec<(usize, usize)>,
    time: f32,
}

impl Action {
    fn new(clip: Arc<AnimationClip>, skeleton: &Skeleton) -> Self {
        let bindings: Vec<(usize, usize)> = clip
            .tracks()
            .iter()
            .enumerate()
            .filter_map(|(track, t)| skeleton.bone_index(t.bone).map(|joint| (joint, track)))
            .collect();
        let unresolved = clip.tracks().len() - bindings.len();
        if unresolved > 0 {
            log::debug!(
                "Clip '{}': {} track(s) target bones this avatar does not have",
                clip.name(),
                unresolved
            );
        }
        Self {
            clip,
            bindings,
            time: 0.0,
        }
    }

    fn advance(&mut self, dt: f32) {
        let duration = self.clip.duration();
        self.time = if duration > 0.0 {
            (self.time + dt).rem_euclid(duration)
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone)]
struct Fade {
    from: Action,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    fn progress(&self) -> f32 {
        if self.duration > 0.0 {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct JointPose {
    rotation: Option<Quaternion>,
    translation: Option<Vec3>,
    driven: bool,
}

/// Plays looped clips on one skeleton, crossfading between them.
///
/// The mixer owns the skeleton's local pose: every update rewrites each joint,
/// so joints no clip drives return to rest.
#[derive(Debug)]
pub struct AnimationMixer {
    current: Option<Action>,
    fade: Option<Fade>,
    scratch: Vec<JointPose>,
}

impl AnimationMixer {
    /// Creates a mixer scoped to `skeleton`.
    pub fn new(skeleton: &Skeleton) -> Self {
        Self {
            current: None,
            fade: None,
            scratch: vec![JointPose::default(); skeleton.len()],
        }
    }

    /// Starts looping `clip` immediately, dropping whatever was playing.
    pub fn play(&mut self, clip: Arc<AnimationClip>, skeleton: &Skeleton) {
        self.fade = None;
        self.current = Some(Action::new(clip, skeleton));
    }

    /// Blends from the current clip to `clip` over `duration` seconds.
    pub fn crossfade_to(&mut self, clip: Arc<AnimationClip>, skeleton: &Skeleton, duration: f32) {
        let next = Action::new(clip, skeleton);
        match self.current.take() {
            Some(from) if duration > 0.0 => {
                self.fade = Some(Fade {
                    from,
                    elapsed: 0.0,
                    duration,
                });
            }
            _ => self.fade = None,
        }
        self.current = Some(next);
    }

    /// Stops all playback. The pose is left as it was.
    pub fn stop(&mut self) {
        self.current = None;
        self.fade = None;
    }

    /// Name of the clip currently playing (the fade target during a crossfade).
    pub fn current_clip(&self) -> Option<&str> {
        self.current.as_ref().map(|action| action.clip.name())
    }

    /// Playback time of the current clip.
    pub fn time(&self) -> f32 {
        self.current.as_ref().map_or(0.0, |action| action.time)
    }

    /// Returns `true` while a crossfade is in progress.
    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Advances playback by `dt` seconds and writes the blended pose.
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        if let Some(action) = &mut self.current {
            action.advance(dt);
        }
        if let Some(fade) = &mut self.fade {
            fade.from.advance(dt);
            fade.elapsed += dt;
        }
        if self.fade.as_ref().is_some_and(|fade| fade.progress() >= 1.0) {
            self.fade = None;
        }
        if self.current.is_none() && self.fade.is_none() {
            return;
        }

        for pose in &mut self.scratch {
            *pose = JointPose::default();
        }
        let weight = self.fade.as_ref().map_or(1.0, Fade::progress);
        if let Some(fade) = &self.fade {
            sample_into(&fade.from, &mut self.scratch, 1.0, false);
        }
        if let Some(action) = &self.current {
            sample_into(action, &mut self.scratch, weight, true);
        }
        if self.fade.is_some() {
            // Joints only the outgoing clip drives fade back towards rest.
            for pose in self.scratch.iter_mut().filter(|pose| !pose.driven) {
                pose.rotation = pose
                    .rotation
                    .map(|r| Quaternion::slerp(r, Quaternion::IDENTITY, weight));
                pose.translation = pose
                    .translation
                    .map(|t| Vec3::lerp(t, Vec3::ZERO, weight));
            }
        }

        for (joint, pose) in self.scratch.iter().enumerate() {
            skeleton.set_pose_rotation(joint, pose.rotation.unwrap_or(Quaternion::IDENTITY));
            skeleton.set_pose_translation(joint, pose.translation.unwrap_or(Vec3::ZERO));
        }
    }
}

fn sample_into(action: &Action, scratch: &mut [JointPose], weight: f32, driven: bool) {
    let tracks = action.clip.tracks();
    for &(joint, track) in &action.bindings {
        let (Some(pose), Some(track)) = (scratch.get_mut(joint), tracks.get(track)) else {
            continue;
        };
        if let Some(curve) = &track.rotation {
            let base = pose.rotation.unwrap_or(Quaternion::IDENTITY);
            pose.rotation = Some(Quaternion::slerp(base, curve.sample(action.time), weight));
        }
        if let Some(curve) = &track.translation {
            let base = pose.translation.unwrap_or(Vec3::ZERO);
            pose.translation = Some(Vec3::lerp(base, curve.sample(action.time), weight));
        }
        pose.driven |= driven;
    }
}

impl Lane for AnimationMixer {
    fn strategy_name(&self) -> &'static str {
        "AnimationMixer"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Animation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation_lane::{BoneTrack, Interpolation, Keyframes};
    use approx::assert_abs_diff_eq;
    use kagami_core::avatar::{HumanoidBone, Joint};
    use kagami_core::math::{Transform, DEG_TO_RAD};
    use std::collections::HashMap;

    fn skeleton() -> Skeleton {
        let joints = vec![
            Joint::new("hips", None, Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            Joint::new("head", Some(0), Transform::from_translation(Vec3::new(0.0, 0.5, 0.0))),
            Joint::new("hair", Some(1), Transform::IDENTITY),
        ];
        let humanoid = HashMap::from([(HumanoidBone::Hips, 0), (HumanoidBone::Head, 1)]);
        Skeleton::new(joints, humanoid).unwrap()
    }

    fn yaw(degrees: f32) -> Quaternion {
        Quaternion::from_axis_angle(Vec3::Y, degrees * DEG_TO_RAD)
    }

    /// Head turns from rest to `degrees` over one second, then holds.
    fn turn_clip(name: &str, degrees: f32) -> Arc<AnimationClip> {
        let track = BoneTrack {
            bone: HumanoidBone::Head,
            rotation: Keyframes::new(
                vec![0.0, 1.0, 2.0],
                vec![Quaternion::IDENTITY, yaw(degrees), yaw(degrees)],
                Interpolation::Linear,
            ),
            translation: None,
        };
        Arc::new(AnimationClip::new(name, vec![track]))
    }

    #[test]
    fn play_samples_relative_to_rest() {
        let mut skeleton = skeleton();
        let mut mixer = AnimationMixer::new(&skeleton);
        mixer.play(turn_clip("turn", 40.0), &skeleton);

        mixer.update(0.5, &mut skeleton);

        assert_eq!(mixer.current_clip(), Some("turn"));
        assert_abs_diff_eq!(skeleton.joints()[1].local.rotation, yaw(20.0), epsilon = 1e-5);
        assert_abs_diff_eq!(
            skeleton.joints()[1].local.translation,
            Vec3::new(0.0, 0.5, 0.0)
        );
        assert_eq!(skeleton.joints()[2].local, Transform::IDENTITY);
    }

    #[test]
    fn playback_loops() {
        let mut skeleton = skeleton();
        let mut mixer = AnimationMixer::new(&skeleton);
        mixer.play(turn_clip("turn", 40.0), &skeleton);

        mixer.update(2.5, &mut skeleton);

        assert_abs_diff_eq!(mixer.time(), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn crossfade_blends_then_settles() {
        let mut skeleton = skeleton();
        let mut mixer = AnimationMixer::new(&skeleton);
        mixer.play(turn_clip("left", 30.0), &skeleton);
        mixer.update(1.5, &mut skeleton);

        mixer.crossfade_to(turn_clip("right", -30.0), &skeleton, 0.4);
        assert!(mixer.is_fading());
        mixer.update(1.2, &mut skeleton);

        assert!(!mixer.is_fading());
        assert_eq!(mixer.current_clip(), Some("right"));
        assert_abs_diff_eq!(skeleton.joints()[1].local.rotation, yaw(-30.0), epsilon = 1e-5);
    }

    #[test]
    fn crossfade_midpoint_is_between_clips() {
        let mut skeleton = skeleton();
        let mut mixer = AnimationMixer::new(&skeleton);
        mixer.play(turn_clip("left", 30.0), &skeleton);
        mixer.update(0.5, &mut skeleton);

        mixer.crossfade_to(turn_clip("right", -30.0), &skeleton, 2.0);
        // Both clips hold their end pose between t = 1.0 and t = 2.0.
        mixer.update(1.0, &mut skeleton);

        // Halfway through the fade: +30° blended with -30°.
        assert!(mixer.is_fading());
        assert_abs_diff_eq!(
            skeleton.joints()[1].local.rotation,
            Quaternion::IDENTITY,
            epsilon = 1e-4
        );
    }

    #[test]
    fn crossfade_without_current_clip_plays_directly() {
        let skeleton = skeleton();
        let mut mixer = AnimationMixer::new(&skeleton);
        mixer.crossfade_to(turn_clip("turn", 10.0), &skeleton, 0.3);
        assert!(!mixer.is_fading());
        assert_eq!(mixer.current_clip(), Some("turn"));
    }

    #[test]
    fn tracks_for_missing_bones_are_ignored() {
        let mut skeleton = skeleton();
        let track = BoneTrack {
            bone: HumanoidBone::LeftHand,
            rotation: Keyframes::new(vec![0.0], vec![yaw(90.0)], Interpolation::Step),
            translation: None,
        };
        let mut mixer = AnimationMixer::new(&skeleton);
        mixer.play(Arc::new(AnimationClip::new("wave", vec![track])), &skeleton);
        mixer.update(0.1, &mut skeleton);
        for joint in skeleton.joints() {
            assert_eq!(joint.local, joint.rest);
        }
    }
}
