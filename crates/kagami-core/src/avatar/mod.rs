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

//! Provides the avatar model shared by the loader, the animation system, and
//! the render loop.
//!
//! The key components are:
//! - [`AvatarAsset`]: the CPU-side result of parsing an avatar file.
//! - [`AvatarHandle`]: one loaded avatar instance that owns its GPU resources.
//! - [`Skeleton`] and [`ExpressionTable`]: the parts other systems drive.
//! - [`AvatarSourceLoader`]: the contract every avatar format parser implements.

mod expression;
mod handle;
mod humanoid;
mod skeleton;
mod source;

pub use expression::*;
pub use handle::*;
pub use humanoid::*;
pub use skeleton::*;
pub use source::*;

use crate::math::Vec3;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of a loaded avatar instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AvatarId(u64);

impl AvatarId {
    /// Allocates a fresh identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "avatar#{}", self.0)
    }
}

/// The VRM specification revision a model was authored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrmVersion {
    /// VRM 0.x (`extensions.VRM`), models face −Z.
    V0,
    /// VRM 1.0 (`extensions.VRMC_vrm`), models face +Z.
    V1,
}

/// Descriptive metadata of an avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarMeta {
    /// Model title.
    pub title: String,
    /// Author or authors, comma separated.
    pub author: String,
    /// Source specification revision.
    pub version: VrmVersion,
}

/// CPU-side geometry of one mesh primitive.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Name of the source mesh.
    pub name: String,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Triangle indices.
    pub indices: Vec<u32>,
    /// Number of morph targets (blend shapes).
    pub morph_target_count: usize,
}

impl MeshData {
    /// Approximate GPU footprint of the vertex and index buffers.
    pub fn byte_size(&self) -> u64 {
        (self.positions.len() * std::mem::size_of::<Vec3>()
            + self.indices.len() * std::mem::size_of::<u32>()) as u64
    }
}

/// A decoded RGBA8 texture.
#[derive(Debug, Clone, Default)]
pub struct TextureData {
    /// Name or index label of the source image.
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 pixels.
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// GPU footprint in bytes.
    pub fn byte_size(&self) -> u64 {
        self.rgba.len() as u64
    }
}

/// A fully parsed avatar, not yet uploaded to the GPU.
#[derive(Debug, Clone)]
pub struct AvatarAsset {
    /// Descriptive metadata.
    pub meta: AvatarMeta,
    /// Skeleton in rest pose.
    pub skeleton: Skeleton,
    /// Expression vocabulary.
    pub expressions: ExpressionTable,
    /// Mesh primitives.
    pub meshes: Vec<MeshData>,
    /// Decoded textures.
    pub textures: Vec<TextureData>,
}
