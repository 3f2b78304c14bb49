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

//! The live avatar instance and the GPU resources it owns.

use super::{AvatarAsset, AvatarId, AvatarMeta, ExpressionTable, ExpressionWeights, MeshData, Skeleton};
use crate::disposal::{Disposable, DisposalKey};
use crate::renderer::{GpuResourceId, SceneRenderer};
use std::fmt;
use std::sync::Arc;

/// GPU-side resources created for one avatar.
///
/// Releasing destroys every resource through the renderer that created it. The
/// id list is drained on release, so a second release has nothing left to
/// destroy, and a set that is dropped without being released still frees its
/// resources.
pub struct GpuAvatarResources {
    key: DisposalKey,
    renderer: Arc<dyn SceneRenderer>,
    ids: Vec<GpuResourceId>,
    released: bool,
}

impl GpuAvatarResources {
    /// Creates an empty resource set bound to `renderer`.
    pub fn new(renderer: Arc<dyn SceneRenderer>) -> Self {
        Self {
            key: DisposalKey::next(),
            renderer,
            ids: Vec::new(),
            released: false,
        }
    }

    /// Records a resource created by this set's renderer.
    pub fn push(&mut self, id: GpuResourceId) {
        self.ids.push(id);
    }

    /// Returns the live resource ids.
    pub fn ids(&self) -> &[GpuResourceId] {
        &self.ids
    }

    /// Returns `true` once every resource has been destroyed.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn destroy_all(&mut self) {
        for id in self.ids.drain(..) {
            if let Err(e) = self.renderer.destroy(id) {
                log::error!("Failed to destroy GPU resource {:?}: {}", id, e);
            }
        }
    }
}

impl fmt::Debug for GpuAvatarResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuAvatarResources")
            .field("key", &self.key)
            .field("ids", &self.ids)
            .finish()
    }
}

impl Disposable for GpuAvatarResources {
    fn disposal_key(&self) -> DisposalKey {
        self.key
    }

    fn release(&mut self) {
        self.destroy_all();
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn describe(&self) -> String {
        format!("gpu resources ({} live)", self.ids.len())
    }
}

impl Drop for GpuAvatarResources {
    fn drop(&mut self) {
        if !self.ids.is_empty() {
            log::warn!(
                "{} GPU resources dropped without disposal; releasing now",
                self.ids.len()
            );
            self.destroy_all();
        }
    }
}

/// One loaded avatar instance.
///
/// Owns its skeleton, expression state, and GPU resources. Exactly one handle is
/// active at a time; replaced and abandoned handles are released through the
/// disposal coordinator.
#[derive(Debug)]
pub struct AvatarHandle {
    id: AvatarId,
    key: DisposalKey,
    label: String,
    meta: AvatarMeta,
    skeleton: Skeleton,
    expressions: ExpressionTable,
    weights: ExpressionWeights,
    morph_weights: Vec<Vec<f32>>,
    meshes: Vec<MeshData>,
    gpu: GpuAvatarResources,
    disposed: bool,
}

impl AvatarHandle {
    /// Wraps a parsed asset and its uploaded GPU resources.
    ///
    /// Texture pixels are dropped here; they only live on the GPU from now on.
    pub fn new(label: impl Into<String>, asset: AvatarAsset, gpu: GpuAvatarResources) -> Self {
        let morph_weights = asset
            .meshes
            .iter()
            .map(|m| vec![0.0; m.morph_target_count])
            .collect();
        Self {
            id: AvatarId::next(),
            key: DisposalKey::next(),
            label: label.into(),
            meta: asset.meta,
            skeleton: asset.skeleton,
            expressions: asset.expressions,
            weights: ExpressionWeights::new(),
            morph_weights,
            meshes: asset.meshes,
            gpu,
            disposed: false,
        }
    }

    /// Returns the instance identifier.
    pub fn id(&self) -> AvatarId {
        self.id
    }

    /// Returns the source label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the model metadata.
    pub fn meta(&self) -> &AvatarMeta {
        &self.meta
    }

    /// Returns the skeleton.
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Returns the skeleton for posing.
    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    /// Returns the expression table.
    pub fn expressions(&self) -> &ExpressionTable {
        &self.expressions
    }

    /// Returns the current expression weights.
    pub fn expression_weights(&self) -> &ExpressionWeights {
        &self.weights
    }

    /// Returns the expression weights for the emote controller to write.
    pub fn expression_weights_mut(&mut self) -> &mut ExpressionWeights {
        &mut self.weights
    }

    /// Returns per-mesh morph target weights resolved by the last [`update`](Self::update).
    pub fn morph_weights(&self) -> &[Vec<f32>] {
        &self.morph_weights
    }

    /// Returns the mesh list (CPU copy kept for bounds and diagnostics).
    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    /// Returns the GPU resource set.
    pub fn gpu_resources(&self) -> &GpuAvatarResources {
        &self.gpu
    }

    /// Adopts extra GPU resources created for this avatar (skinning, morph buffers).
    pub fn adopt_gpu_resources(&mut self, ids: impl IntoIterator<Item = GpuResourceId>) {
        for id in ids {
            self.gpu.push(id);
        }
    }

    /// Returns `true` once the handle has been released.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Per-frame humanoid update: world transforms from the current pose, then
    /// expression weights resolved into morph weights.
    pub fn update(&mut self) {
        if self.disposed {
            return;
        }
        self.skeleton.update_world_transforms();
        self.expressions
            .resolve_morph_weights(&self.weights, &mut self.morph_weights);
    }
}

impl Disposable for AvatarHandle {
    fn disposal_key(&self) -> DisposalKey {
        self.key
    }

    fn release(&mut self) {
        self.gpu.release();
        self.meshes = Vec::new();
        self.morph_weights = Vec::new();
        self.disposed = true;
    }

    fn is_released(&self) -> bool {
        self.disposed
    }

    fn describe(&self) -> String {
        format!("{} '{}'", self.id, self.label)
    }
}
