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

//! Decodes VRM avatars (glTF 2.0 / GLB with the VRM 0.x or VRM 1.0 extension).

use super::buffers::{decode_data_uri, json_chunk, load_buffer_data, view_bytes};
use super::vrm_schema::{GltfRoot, Vrm0, Vrm1};
use super::AssetLoaderLane;
use kagami_core::avatar::{
    AvatarAsset, AvatarMeta, AvatarSourceLoader, Expression, ExpressionPreset, ExpressionTable,
    HumanoidBone, Joint, MeshData, MorphBind, ParseError, Skeleton, TextureData, VrmVersion,
};
use kagami_core::math::{Quaternion, Transform, Vec3, PI};
use kagami_core::{Lane, LaneKind};
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::error::Error;

/// A lane that parses VRM model bytes into an [`AvatarAsset`].
///
/// VRM 0.x models face −Z; they are turned 180° about Y at load time so every
/// avatar faces +Z.
#[derive(Debug, Clone, Copy, Default)]
pub struct VrmLoaderLane;

impl VrmLoaderLane {
    /// Creates a new instance of `VrmLoaderLane`.
    pub fn new() -> Self {
        Self
    }
}

enum VrmExtension {
    V1(Vrm1),
    V0(Vrm0),
}

impl AvatarSourceLoader for VrmLoaderLane {
    fn parse(&self, bytes: &[u8], label: &str) -> Result<AvatarAsset, ParseError> {
        let gltf = gltf::Gltf::from_slice(bytes)
            .map_err(|e| ParseError::InvalidContainer(e.to_string()))?;
        let json = json_chunk(bytes).map_err(ParseError::InvalidContainer)?;
        let root: GltfRoot = serde_json::from_slice(&json)
            .map_err(|e| ParseError::InvalidContainer(format!("malformed VRM extension: {e}")))?;

        let extension = match (root.extensions.vrm1, root.extensions.vrm0) {
            (Some(vrm), _) => VrmExtension::V1(vrm),
            (None, Some(vrm)) => VrmExtension::V0(vrm),
            (None, None) => return Err(ParseError::MissingExtension),
        };

        let buffers = load_buffer_data(&gltf).map_err(ParseError::InvalidBuffer)?;
        let document = &gltf.document;

        let (joints, node_to_joint) = collect_joints(document);
        let humanoid_nodes = match &extension {
            VrmExtension::V1(vrm) => vrm1_humanoid(vrm)?,
            VrmExtension::V0(vrm) => vrm0_humanoid(vrm)?,
        };
        let mut humanoid = HashMap::with_capacity(humanoid_nodes.len());
        for (bone, node) in humanoid_nodes {
            let joint = node_to_joint.get(node).copied().flatten().ok_or_else(|| {
                ParseError::MissingHumanoid(format!(
                    "bone '{bone}' references node {node}, which is not part of the scene"
                ))
            })?;
            humanoid.insert(bone, joint);
        }
        if !humanoid.contains_key(&HumanoidBone::Hips) {
            return Err(ParseError::MissingHumanoid(
                "required bone 'hips' is not mapped".to_string(),
            ));
        }

        let mut skeleton = Skeleton::new(joints, humanoid)?;
        let meshes = read_meshes(document, &buffers)?;
        let textures = read_textures(document, &buffers)?;

        let (meta, expressions) = match &extension {
            VrmExtension::V1(vrm) => (
                AvatarMeta {
                    title: vrm.meta.name.clone(),
                    author: vrm.meta.authors.join(", "),
                    version: VrmVersion::V1,
                },
                vrm1_expressions(vrm, document),
            ),
            VrmExtension::V0(vrm) => {
                skeleton.set_root_transform(Transform::new(
                    Vec3::ZERO,
                    Quaternion::from_axis_angle(Vec3::Y, PI),
                    Vec3::ONE,
                ));
                (
                    AvatarMeta {
                        title: vrm.meta.title.clone(),
                        author: vrm.meta.author.clone(),
                        version: VrmVersion::V0,
                    },
                    vrm0_expressions(vrm, meshes.len()),
                )
            }
        };

        log::debug!(
            "Parsed '{}' ({:?}): {} joints, {} meshes, {} textures, {} expressions",
            label,
            meta.version,
            skeleton.len(),
            meshes.len(),
            textures.len(),
            expressions.len()
        );

        Ok(AvatarAsset {
            meta,
            skeleton,
            expressions,
            meshes,
            textures,
        })
    }
}

impl AssetLoaderLane<AvatarAsset> for VrmLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<AvatarAsset, Box<dyn Error + Send + Sync>> {
        self.parse(bytes, "<bytes>").map_err(Into::into)
    }
}

impl Lane for VrmLoaderLane {
    fn strategy_name(&self) -> &'static str {
        "VrmLoader"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Asset
    }
}

/// Orders the scene's nodes parents-first and returns the joint list together
/// with a node-index to joint-index map.
pub(crate) fn collect_joints(document: &gltf::Document) -> (Vec<Joint>, Vec<Option<usize>>) {
    let node_count = document.nodes().len();
    let roots: Vec<gltf::Node<'_>> = match document
        .default_scene()
        .or_else(|| document.scenes().next())
    {
        Some(scene) => scene.nodes().collect(),
        None => {
            let mut is_child = vec![false; node_count];
            for node in document.nodes() {
                for child in node.children() {
                    is_child[child.index()] = true;
                }
            }
            document
                .nodes()
                .filter(|node| !is_child[node.index()])
                .collect()
        }
    };

    let mut node_to_joint = vec![None; node_count];
    let mut joints = Vec::with_capacity(node_count);
    let mut queue: VecDeque<(gltf::Node<'_>, Option<usize>)> =
        roots.into_iter().map(|node| (node, None)).collect();

    while let Some((node, parent)) = queue.pop_front() {
        if node_to_joint[node.index()].is_some() {
            continue;
        }
        let index = joints.len();
        node_to_joint[node.index()] = Some(index);
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index()));
        joints.push(Joint::new(name, parent, node_transform(&node)));
        for child in node.children() {
            queue.push_back((child, Some(index)));
        }
    }
    (joints, node_to_joint)
}

pub(crate) fn node_transform(node: &gltf::Node<'_>) -> Transform {
    let (translation, rotation, scale) = node.transform().decomposed();
    Transform::new(
        Vec3::from_array(translation),
        Quaternion::from_array(rotation),
        Vec3::from_array(scale),
    )
}

fn vrm1_humanoid(vrm: &Vrm1) -> Result<Vec<(HumanoidBone, usize)>, ParseError> {
    let humanoid = vrm
        .humanoid
        .as_ref()
        .ok_or_else(|| ParseError::MissingHumanoid("VRMC_vrm has no humanoid".to_string()))?;
    Ok(humanoid
        .human_bones
        .iter()
        .filter_map(|(name, node)| match HumanoidBone::from_name(name) {
            Some(bone) => Some((bone, node.node)),
            None => {
                log::trace!("Ignoring humanoid bone '{name}'");
                None
            }
        })
        .collect())
}

fn vrm0_humanoid(vrm: &Vrm0) -> Result<Vec<(HumanoidBone, usize)>, ParseError> {
    let humanoid = vrm
        .humanoid
        .as_ref()
        .ok_or_else(|| ParseError::MissingHumanoid("VRM has no humanoid".to_string()))?;
    Ok(humanoid
        .human_bones
        .iter()
        .filter_map(|entry| {
            let bone = HumanoidBone::from_name(&entry.bone)?;
            let node = usize::try_from(entry.node).ok()?;
            Some((bone, node))
        })
        .collect())
}

fn vrm1_expressions(vrm: &Vrm1, document: &gltf::Document) -> ExpressionTable {
    let node_mesh: Vec<Option<usize>> = document
        .nodes()
        .map(|node| node.mesh().map(|mesh| mesh.index()))
        .collect();

    let presets = vrm.expressions.preset.iter().map(|(name, expr)| {
        let preset = ExpressionPreset::from_vrm1(name);
        if preset.is_none() {
            log::warn!("Unknown expression preset '{name}', keeping it as custom");
        }
        (name, preset, expr)
    });
    let custom = vrm
        .expressions
        .custom
        .iter()
        .map(|(name, expr)| (name, None, expr));

    let expressions = presets
        .chain(custom)
        .map(|(name, preset, expr)| Expression {
            name: name.clone(),
            preset,
            binds: expr
                .morph_target_binds
                .iter()
                .filter_map(|bind| match node_mesh.get(bind.node).copied().flatten() {
                    Some(mesh) => Some(MorphBind {
                        mesh,
                        morph_index: bind.index,
                        weight: bind.weight.clamp(0.0, 1.0),
                    }),
                    None => {
                        log::warn!(
                            "Expression '{name}' binds node {} which has no mesh",
                            bind.node
                        );
                        None
                    }
                })
                .collect(),
            is_binary: expr.is_binary,
        })
        .collect();
    ExpressionTable::new(expressions)
}

fn vrm0_expressions(vrm: &Vrm0, mesh_count: usize) -> ExpressionTable {
    let expressions = vrm
        .blend_shape_master
        .blend_shape_groups
        .iter()
        .filter_map(|group| {
            let preset = ExpressionPreset::from_vrm0(&group.preset_name);
            let name = match preset {
                Some(preset) => preset.name().to_string(),
                None if !group.name.is_empty() => group.name.clone(),
                None => return None,
            };
            let binds = group
                .binds
                .iter()
                .filter_map(|bind| {
                    let mesh = usize::try_from(bind.mesh).ok().filter(|m| *m < mesh_count)?;
                    let morph_index = usize::try_from(bind.index).ok()?;
                    Some(MorphBind {
                        mesh,
                        morph_index,
                        weight: (bind.weight / 100.0).clamp(0.0, 1.0),
                    })
                })
                .collect();
            Some(Expression {
                name,
                preset,
                binds,
                is_binary: group.is_binary,
            })
        })
        .collect();
    ExpressionTable::new(expressions)
}

fn read_meshes(document: &gltf::Document, buffers: &[Vec<u8>]) -> Result<Vec<MeshData>, ParseError> {
    document
        .meshes()
        .map(|mesh| {
            let mut data = MeshData {
                name: mesh
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("mesh{}", mesh.index())),
                ..Default::default()
            };
            for primitive in mesh.primitives() {
                let reader =
                    primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .ok_or_else(|| {
                        ParseError::InvalidBuffer(format!(
                            "mesh '{}' has a primitive without positions",
                            data.name
                        ))
                    })?
                    .map(Vec3::from_array)
                    .collect();

                let too_large = || {
                    ParseError::InvalidBuffer(format!(
                        "mesh '{}' has more vertices than 32-bit indices address",
                        data.name
                    ))
                };
                let base = u32::try_from(data.positions.len()).map_err(|_| too_large())?;
                let count = u32::try_from(positions.len()).map_err(|_| too_large())?;
                let end = base.checked_add(count).ok_or_else(too_large)?;
                match reader.read_indices() {
                    Some(indices) => {
                        for index in indices.into_u32() {
                            if index >= count {
                                return Err(ParseError::InvalidBuffer(format!(
                                    "mesh '{}' indexes vertex {} of {}",
                                    data.name, index, count
                                )));
                            }
                            data.indices.push(base + index);
                        }
                    }
                    None => data.indices.extend(base..end),
                }
                data.positions.extend(positions);
                data.morph_target_count =
                    data.morph_target_count.max(primitive.morph_targets().count());
            }
            Ok(data)
        })
        .collect()
}

fn read_textures(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
) -> Result<Vec<TextureData>, ParseError> {
    document
        .images()
        .map(|img| {
            let name = img
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("image{}", img.index()));
            let encoded: Cow<'_, [u8]> = match img.source() {
                gltf::image::Source::View { view, .. } => {
                    Cow::Borrowed(view_bytes(buffers, &view).map_err(ParseError::InvalidBuffer)?)
                }
                gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
                    Cow::Owned(decode_data_uri(uri).map_err(|details| {
                        ParseError::InvalidImage {
                            name: name.clone(),
                            details,
                        }
                    })?)
                }
                gltf::image::Source::Uri { uri, .. } => {
                    return Err(ParseError::InvalidImage {
                        details: format!("external image '{uri}' is not supported"),
                        name,
                    })
                }
            };
            let decoded = image::load_from_memory(&encoded)
                .map_err(|e| ParseError::InvalidImage {
                    name: name.clone(),
                    details: e.to_string(),
                })?
                .to_rgba8();
            Ok(TextureData {
                name,
                width: decoded.width(),
                height: decoded.height(),
                rgba: decoded.into_raw(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_lane::SampleAvatar;
    use approx::assert_abs_diff_eq;

    fn parse(bytes: &[u8]) -> Result<AvatarAsset, ParseError> {
        VrmLoaderLane::new().parse(bytes, "test")
    }

    #[test]
    fn parses_vrm1_avatar() {
        let bytes = SampleAvatar::new(VrmVersion::V1)
            .title("Hikari")
            .head_height(1.6)
            .with_texture()
            .to_glb()
            .unwrap();
        let asset = parse(&bytes).unwrap();

        assert_eq!(asset.meta.title, "Hikari");
        assert_eq!(asset.meta.version, VrmVersion::V1);

        let head = asset
            .skeleton
            .bone_world_position(HumanoidBone::Head)
            .unwrap();
        assert_abs_diff_eq!(head, Vec3::new(0.0, 1.6, 0.0), epsilon = 1e-5);

        assert_eq!(asset.meshes.len(), 1);
        assert_eq!(asset.meshes[0].morph_target_count, 1);
        assert_eq!(asset.meshes[0].indices, vec![0, 1, 2]);

        assert_eq!(asset.textures.len(), 1);
        assert_eq!(asset.textures[0].width, 2);
        assert_eq!(asset.textures[0].rgba.len(), 2 * 2 * 4);

        let aa = asset.expressions.get("aa").unwrap();
        assert_eq!(aa.preset, Some(ExpressionPreset::Aa));
        assert_eq!(aa.binds[0].mesh, 0);
        assert!(asset.expressions.get("blink").unwrap().is_binary);
    }

    #[test]
    fn vrm0_presets_are_mapped_and_model_is_turned() {
        let bytes = SampleAvatar::new(VrmVersion::V0).to_glb().unwrap();
        let asset = parse(&bytes).unwrap();

        assert_eq!(asset.meta.version, VrmVersion::V0);
        let aa = asset.expressions.get("aa").unwrap();
        assert_eq!(aa.binds[0].weight, 1.0);
        let happy = asset.expressions.get("happy").unwrap();
        assert_eq!(happy.preset, Some(ExpressionPreset::Happy));
        assert_abs_diff_eq!(happy.binds[0].weight, 0.5);

        let hips = asset.skeleton.bone_index(HumanoidBone::Hips).unwrap();
        let world = asset.skeleton.world_transform(hips).unwrap();
        assert_abs_diff_eq!(
            world.rotation,
            Quaternion::from_axis_angle(Vec3::Y, PI),
            epsilon = 1e-5
        );
    }

    #[test]
    fn plain_gltf_without_vrm_is_rejected() {
        let bytes = br#"{"asset":{"version":"2.0"}}"#;
        assert_eq!(parse(bytes).unwrap_err(), ParseError::MissingExtension);
    }

    #[test]
    fn garbage_is_an_invalid_container() {
        let err = parse(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidContainer(_)), "{err}");
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        for indices in [[0, 1, 3], [0, 1, u32::MAX]] {
            let bytes = SampleAvatar::new(VrmVersion::V1)
                .with_indices(&indices)
                .to_glb()
                .unwrap();
            let err = parse(&bytes).unwrap_err();
            assert!(matches!(err, ParseError::InvalidBuffer(_)), "{err}");
        }
    }

    #[test]
    fn missing_hips_is_rejected() {
        let bytes = SampleAvatar::new(VrmVersion::V1)
            .omit_bone(HumanoidBone::Hips)
            .to_glb()
            .unwrap();
        assert!(matches!(
            parse(&bytes).unwrap_err(),
            ParseError::MissingHumanoid(_)
        ));
    }

    #[test]
    fn loads_through_the_asset_lane_trait() {
        let bytes = SampleAvatar::new(VrmVersion::V1).to_glb().unwrap();
        let lane: &dyn AssetLoaderLane<AvatarAsset> = &VrmLoaderLane::new();
        assert!(lane.load(&bytes).is_ok());
        assert!(lane.load(b"nope").is_err());
    }
}
