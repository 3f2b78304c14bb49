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

//! Decodes humanoid animation clips from glTF/GLB files (`.vrma` or plain `.glb`).

use super::buffers::{json_chunk, load_buffer_data};
use super::vrm_loader_lane::node_transform;
use super::vrm_schema::GltfRoot;
use super::AssetLoaderLane;
use crate::animation_lane::{AnimationClip, BoneTrack, Interpolation, Keyframes};
use gltf::animation::util::ReadOutputs;
use kagami_core::avatar::HumanoidBone;
use kagami_core::math::{Quaternion, Transform, Vec3};
use kagami_core::{Lane, LaneKind};
use std::error::Error;

/// A lane that reads the first animation of a glTF file as an [`AnimationClip`].
///
/// Target nodes are mapped to humanoid bones through the `VRMC_vrm_animation`
/// extension when present, otherwise by matching node names to bone names.
/// Keyframes are stored relative to the file's own rest pose.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipLoaderLane;

impl ClipLoaderLane {
    /// Creates a new instance of `ClipLoaderLane`.
    pub fn new() -> Self {
        Self
    }
}

impl AssetLoaderLane<AnimationClip> for ClipLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<AnimationClip, Box<dyn Error + Send + Sync>> {
        let gltf = gltf::Gltf::from_slice(bytes)
            .map_err(|e| format!("Failed to parse GLTF file: {}", e))?;
        let json = json_chunk(bytes)?;
        let root: GltfRoot = serde_json::from_slice(&json)?;
        let buffers = load_buffer_data(&gltf)?;

        let animation = gltf
            .animations()
            .next()
            .ok_or("No animations found in clip file")?;

        let bone_of_node = node_bones(&gltf.document, &root);
        let rest: Vec<Transform> = gltf.nodes().map(|node| node_transform(&node)).collect();

        let mut tracks: Vec<BoneTrack> = Vec::new();
        for channel in animation.channels() {
            let node = channel.target().node().index();
            let Some(bone) = bone_of_node.get(node).copied().flatten() else {
                continue;
            };
            let interpolation = channel.sampler().interpolation();
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let times: Vec<f32> = reader
                .read_inputs()
                .ok_or("Animation channel has no keyframe times")?
                .collect();
            let outputs = reader
                .read_outputs()
                .ok_or("Animation channel has no keyframe values")?;

            let track = match tracks.iter().position(|t| t.bone == bone) {
                Some(index) => &mut tracks[index],
                None => {
                    tracks.push(BoneTrack {
                        bone,
                        rotation: None,
                        translation: None,
                    });
                    let last = tracks.len() - 1;
                    &mut tracks[last]
                }
            };

            match outputs {
                ReadOutputs::Rotations(rotations) => {
                    let inverse_rest = rest[node].rotation.conjugate();
                    let values = key_values(
                        rotations.into_f32().map(Quaternion::from_array).collect(),
                        interpolation,
                    )
                    .into_iter()
                    .map(|q| (inverse_rest * q.normalize()).normalize())
                    .collect();
                    track.rotation = curve(times, values, interpolation, bone)?;
                }
                ReadOutputs::Translations(translations) => {
                    let rest_translation = rest[node].translation;
                    let values = key_values(translations.map(Vec3::from_array).collect(), interpolation)
                        .into_iter()
                        .map(|t| t - rest_translation)
                        .collect();
                    track.translation = curve(times, values, interpolation, bone)?;
                }
                _ => log::trace!("Ignoring non-skeletal channel on bone '{bone}'"),
            }
        }

        tracks.retain(|t| t.rotation.is_some() || t.translation.is_some());
        if tracks.is_empty() {
            return Err("Clip has no tracks targeting humanoid bones".into());
        }

        let name = animation.name().unwrap_or("clip");
        Ok(AnimationClip::new(name, tracks))
    }
}

impl Lane for ClipLoaderLane {
    fn strategy_name(&self) -> &'static str {
        "ClipLoader"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Asset
    }
}

fn node_bones(document: &gltf::Document, root: &GltfRoot) -> Vec<Option<HumanoidBone>> {
    let mut bones = vec![None; document.nodes().len()];
    match root
        .extensions
        .vrma
        .as_ref()
        .and_then(|vrma| vrma.humanoid.as_ref())
    {
        Some(humanoid) => {
            for (name, node) in &humanoid.human_bones {
                if let (Some(bone), Some(slot)) =
                    (HumanoidBone::from_name(name), bones.get_mut(node.node))
                {
                    *slot = Some(bone);
                }
            }
        }
        None => {
            for node in document.nodes() {
                bones[node.index()] = node.name().and_then(HumanoidBone::from_name);
            }
        }
    }
    bones
}

/// Cubic spline samplers store `(in-tangent, value, out-tangent)` triplets;
/// only the values are kept.
fn key_values<T: Copy>(values: Vec<T>, interpolation: gltf::animation::Interpolation) -> Vec<T> {
    match interpolation {
        gltf::animation::Interpolation::CubicSpline => {
            values.chunks_exact(3).map(|triplet| triplet[1]).collect()
        }
        _ => values,
    }
}

fn curve<T: crate::animation_lane::Interpolate>(
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: gltf::animation::Interpolation,
    bone: HumanoidBone,
) -> Result<Option<Keyframes<T>>, Box<dyn Error + Send + Sync>> {
    let interpolation = match interpolation {
        gltf::animation::Interpolation::Step => Interpolation::Step,
        _ => Interpolation::Linear,
    };
    Keyframes::new(times, values, interpolation)
        .map(Some)
        .ok_or_else(|| format!("Malformed keyframes on bone '{bone}'").into())
}
