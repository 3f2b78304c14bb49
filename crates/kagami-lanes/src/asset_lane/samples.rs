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

//! Small, self-contained sample assets built in memory.
//!
//! Used by the demo when no model files are at hand, and by tests that need a
//! real GLB to parse.

use kagami_core::avatar::{HumanoidBone, VrmVersion};
use kagami_core::math::{Quaternion, Vec3, DEG_TO_RAD};
use serde_json::{json, Value};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Wraps a glTF JSON document and its binary buffer in a GLB container.
pub fn write_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let mut json = json.to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let bin_chunk_len = if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total = 12 + 8 + json.len() + bin_chunk_len;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}

/// Encodes mono samples as a 16-bit PCM WAV file.
pub fn write_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Accumulates the binary chunk with its buffer views and accessors.
#[derive(Default)]
struct BinBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BinBuilder {
    fn view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));
        self.views.len() - 1
    }

    fn floats(&mut self, values: &[f32], kind: &str, width: usize) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.view(&bytes);
        let component = |c: usize| values.iter().skip(c).step_by(width).copied();
        let min: Vec<f32> = (0..width)
            .map(|c| component(c).fold(f32::INFINITY, f32::min))
            .collect();
        let max: Vec<f32> = (0..width)
            .map(|c| component(c).fold(f32::NEG_INFINITY, f32::max))
            .collect();
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": values.len() / width,
            "type": kind,
            "min": min,
            "max": max,
        }));
        self.accessors.len() - 1
    }

    fn indices(&mut self, indices: &[u32]) -> usize {
        let (bytes, component_type): (Vec<u8>, u32) =
            match indices.iter().map(|&i| u16::try_from(i)).collect::<Result<Vec<_>, _>>() {
                Ok(short) => (short.iter().flat_map(|i| i.to_le_bytes()).collect(), 5123),
                Err(_) => (indices.iter().flat_map(|i| i.to_le_bytes()).collect(), 5125),
            };
        let view = self.view(&bytes);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": component_type,
            "count": indices.len(),
            "type": "SCALAR",
        }));
        self.accessors.len() - 1
    }
}

/// The bone chain of the sample avatar: bone, offset from its parent.
const CHAIN: [(HumanoidBone, f32); 5] = [
    (HumanoidBone::Hips, 0.0),
    (HumanoidBone::Spine, 0.1),
    (HumanoidBone::Chest, 0.15),
    (HumanoidBone::Neck, 0.15),
    (HumanoidBone::Head, 0.1),
];

/// A minimal VRM avatar: a five-bone spine, one triangle with a mouth morph,
/// and the `aa`, `happy` and `blink` expressions.
#[derive(Debug, Clone)]
pub struct SampleAvatar {
    version: VrmVersion,
    title: String,
    head_height: f32,
    texture: bool,
    omitted: Vec<HumanoidBone>,
    indices: Vec<u32>,
}

impl SampleAvatar {
    /// Starts a sample avatar of the given VRM revision.
    pub fn new(version: VrmVersion) -> Self {
        Self {
            version,
            title: "Sample".to_string(),
            head_height: 1.5,
            texture: false,
            omitted: Vec::new(),
            indices: vec![0, 1, 2],
        }
    }

    /// Sets the model title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the world height of the head joint.
    pub fn head_height(mut self, height: f32) -> Self {
        self.head_height = height;
        self
    }

    /// Embeds a 2×2 PNG texture.
    pub fn with_texture(mut self) -> Self {
        self.texture = true;
        self
    }

    /// Leaves a bone out of the humanoid mapping (its node is kept).
    pub fn omit_bone(mut self, bone: HumanoidBone) -> Self {
        self.omitted.push(bone);
        self
    }

    /// Replaces the triangle's index list. The mesh has three vertices.
    pub fn with_indices(mut self, indices: &[u32]) -> Self {
        self.indices = indices.to_vec();
        self
    }

    /// Encodes the avatar as a `.vrm` (GLB) file.
    pub fn to_glb(&self) -> anyhow::Result<Vec<u8>> {
        let spine_length: f32 = CHAIN.iter().map(|(_, offset)| offset).sum();
        let hips_height = self.head_height - spine_length;

        let mut nodes: Vec<Value> = CHAIN
            .iter()
            .enumerate()
            .map(|(index, (bone, offset))| {
                let y = if index == 0 { hips_height } else { *offset };
                let mut node = json!({ "name": bone.name(), "translation": [0.0, y, 0.0] });
                if index + 1 < CHAIN.len() {
                    node["children"] = json!([index + 1]);
                }
                node
            })
            .collect();
        let body_node = nodes.len();
        nodes.push(json!({ "name": "Body", "mesh": 0 }));

        let mut bin = BinBuilder::default();
        let h = self.head_height;
        let positions = bin.floats(
            &[-0.1, h - 0.2, 0.0, 0.1, h - 0.2, 0.0, 0.0, h, 0.05],
            "VEC3",
            3,
        );
        let indices = bin.indices(&self.indices);
        let mouth = bin.floats(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -0.05, 0.0], "VEC3", 3);

        let mut doc = json!({
            "asset": { "version": "2.0", "generator": "kagami sample" },
            "scene": 0,
            "scenes": [{ "nodes": [0, body_node] }],
            "nodes": nodes,
            "meshes": [{
                "name": "Body",
                "primitives": [{
                    "attributes": { "POSITION": positions },
                    "indices": indices,
                    "targets": [{ "POSITION": mouth }],
                }],
            }],
        });

        if self.texture {
            let png = sample_png()?;
            let view = bin.view(&png);
            doc["images"] = json!([{ "name": "skin", "bufferView": view, "mimeType": "image/png" }]);
        }

        let mapped: Vec<(usize, HumanoidBone)> = CHAIN
            .iter()
            .enumerate()
            .filter(|(_, (bone, _))| !self.omitted.contains(bone))
            .map(|(node, (bone, _))| (node, *bone))
            .collect();

        match self.version {
            VrmVersion::V1 => {
                let human_bones: serde_json::Map<String, Value> = mapped
                    .iter()
                    .map(|(node, bone)| (bone.name().to_string(), json!({ "node": node })))
                    .collect();
                doc["extensionsUsed"] = json!(["VRMC_vrm"]);
                doc["extensions"] = json!({
                    "VRMC_vrm": {
                        "specVersion": "1.0",
                        "meta": { "name": self.title, "authors": ["kagami"] },
                        "humanoid": { "humanBones": human_bones },
                        "expressions": {
                            "preset": {
                                "aa": { "morphTargetBinds": [{ "node": body_node, "index": 0, "weight": 1.0 }] },
                                "happy": { "morphTargetBinds": [{ "node": body_node, "index": 0, "weight": 0.5 }] },
                                "blink": { "morphTargetBinds": [], "isBinary": true },
                            },
                        },
                    },
                });
            }
            VrmVersion::V0 => {
                let human_bones: Vec<Value> = mapped
                    .iter()
                    .map(|(node, bone)| json!({ "bone": bone.name(), "node": node }))
                    .collect();
                doc["extensionsUsed"] = json!(["VRM"]);
                doc["extensions"] = json!({
                    "VRM": {
                        "meta": { "title": self.title, "author": "kagami" },
                        "humanoid": { "humanBones": human_bones },
                        "blendShapeMaster": {
                            "blendShapeGroups": [
                                { "name": "A", "presetName": "a", "binds": [{ "mesh": 0, "index": 0, "weight": 100 }] },
                                { "name": "Joy", "presetName": "joy", "binds": [{ "mesh": 0, "index": 0, "weight": 50 }] },
                                { "name": "Blink", "presetName": "blink", "binds": [], "isBinary": true },
                            ],
                        },
                    },
                });
            }
        }

        doc["buffers"] = json!([{ "byteLength": bin.bin.len() }]);
        doc["bufferViews"] = Value::Array(bin.views);
        doc["accessors"] = Value::Array(bin.accessors);
        Ok(write_glb(&serde_json::to_vec(&doc)?, &bin.bin))
    }
}

fn sample_png() -> anyhow::Result<Vec<u8>> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([230, 190, 170, 255]));
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}

/// A minimal humanoid animation: the head turns and returns while the hips bob.
#[derive(Debug, Clone)]
pub struct SampleClip {
    name: String,
    duration: f32,
    yaw_degrees: f32,
    vrma: bool,
}

impl SampleClip {
    /// Starts a sample clip named `name`, two seconds long.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: 2.0,
            yaw_degrees: 20.0,
            vrma: true,
        }
    }

    /// Sets the clip length in seconds.
    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = seconds;
        self
    }

    /// Sets the head turn at mid-clip.
    pub fn yaw_degrees(mut self, degrees: f32) -> Self {
        self.yaw_degrees = degrees;
        self
    }

    /// Omits the `VRMC_vrm_animation` extension so bones resolve by node name.
    pub fn without_vrma_extension(mut self) -> Self {
        self.vrma = false;
        self
    }

    /// Encodes the clip as a `.vrma` (GLB) file.
    pub fn to_glb(&self) -> anyhow::Result<Vec<u8>> {
        let turned = Quaternion::from_axis_angle(Vec3::Y, self.yaw_degrees * DEG_TO_RAD);
        let identity = Quaternion::IDENTITY;

        let mut bin = BinBuilder::default();
        let times = bin.floats(&[0.0, self.duration / 2.0, self.duration], "SCALAR", 1);
        let rotations = bin.floats(
            &[
                identity.x, identity.y, identity.z, identity.w, turned.x, turned.y, turned.z,
                turned.w, identity.x, identity.y, identity.z, identity.w,
            ],
            "VEC4",
            4,
        );
        let translations = bin.floats(
            &[0.0, 1.0, 0.0, 0.0, 1.05, 0.0, 0.0, 1.0, 0.0],
            "VEC3",
            3,
        );

        let mut doc = json!({
            "asset": { "version": "2.0", "generator": "kagami sample" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [
                { "name": "Hips", "translation": [0.0, 1.0, 0.0], "children": [1] },
                { "name": "Head", "translation": [0.0, 0.5, 0.0] },
            ],
            "animations": [{
                "name": self.name,
                "channels": [
                    { "sampler": 0, "target": { "node": 1, "path": "rotation" } },
                    { "sampler": 1, "target": { "node": 0, "path": "translation" } },
                ],
                "samplers": [
                    { "input": times, "output": rotations, "interpolation": "LINEAR" },
                    { "input": times, "output": translations, "interpolation": "LINEAR" },
                ],
            }],
            "buffers": [{ "byteLength": bin.bin.len() }],
        });
        if self.vrma {
            doc["extensionsUsed"] = json!(["VRMC_vrm_animation"]);
            doc["extensions"] = json!({
                "VRMC_vrm_animation": {
                    "specVersion": "1.0",
                    "humanoid": { "humanBones": { "hips": { "node": 0 }, "head": { "node": 1 } } },
                },
            });
        }
        doc["bufferViews"] = Value::Array(bin.views);
        doc["accessors"] = Value::Array(bin.accessors);
        Ok(write_glb(&serde_json::to_vec(&doc)?, &bin.bin))
    }
}
