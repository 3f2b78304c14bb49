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

//! Serde mirror of the VRM extension blocks this crate reads.
//!
//! Only the fields the viewer consumes are declared; everything else in the
//! extension JSON is ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GltfRoot {
    #[serde(default)]
    pub extensions: RootExtensions,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RootExtensions {
    #[serde(rename = "VRMC_vrm")]
    pub vrm1: Option<Vrm1>,
    #[serde(rename = "VRM")]
    pub vrm0: Option<Vrm0>,
    #[serde(rename = "VRMC_vrm_animation")]
    pub vrma: Option<VrmAnimation>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct NodeRef {
    pub node: usize,
}

// VRM 1.0

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm1 {
    pub spec_version: String,
    pub meta: Vrm1Meta,
    pub humanoid: Option<Vrm1Humanoid>,
    pub expressions: Vrm1Expressions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Vrm1Meta {
    pub name: String,
    pub authors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm1Humanoid {
    pub human_bones: BTreeMap<String, NodeRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Vrm1Expressions {
    pub preset: BTreeMap<String, Vrm1Expression>,
    pub custom: BTreeMap<String, Vrm1Expression>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm1Expression {
    pub morph_target_binds: Vec<Vrm1MorphBind>,
    pub is_binary: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Vrm1MorphBind {
    pub node: usize,
    pub index: usize,
    #[serde(default = "full_weight")]
    pub weight: f32,
}

fn full_weight() -> f32 {
    1.0
}

// VRM 0.x

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm0 {
    pub meta: Vrm0Meta,
    pub humanoid: Option<Vrm0Humanoid>,
    pub blend_shape_master: Vrm0BlendShapeMaster,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Vrm0Meta {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm0Humanoid {
    pub human_bones: Vec<Vrm0HumanBone>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Vrm0HumanBone {
    pub bone: String,
    /// Some exporters write `-1` for unassigned bones.
    pub node: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm0BlendShapeMaster {
    pub blend_shape_groups: Vec<Vrm0BlendShapeGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Vrm0BlendShapeGroup {
    pub name: String,
    pub preset_name: String,
    pub binds: Vec<Vrm0Bind>,
    pub is_binary: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Vrm0Bind {
    pub mesh: i64,
    pub index: i64,
    /// Percent, `0..=100`.
    #[serde(default)]
    pub weight: f32,
}

// VRM Animation

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct VrmAnimation {
    pub humanoid: Option<Vrm1Humanoid>,
}
