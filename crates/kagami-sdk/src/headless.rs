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

//! A renderer that draws nothing, for tests, tools and servers.

use kagami_core::avatar::{AvatarHandle, MeshData, TextureData};
use kagami_core::renderer::{
    FrameStats, FrameView, GpuResourceId, RenderError, ResourceError, SceneRenderer,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Bytes reserved per joint for the skinning palette (one 4x4 f32 matrix).
const BYTES_PER_JOINT: u64 = 64;

#[derive(Debug, Default)]
struct Books {
    next_id: u64,
    live: HashMap<GpuResourceId, u64>,
    used_bytes: u64,
    peak_bytes: u64,
    frames_rendered: u64,
    last_stats: Option<FrameStats>,
}

/// Allocates resource ids and accounts their sizes without touching a GPU.
///
/// An optional memory budget makes allocations fail with
/// [`ResourceError::OutOfMemory`] once exceeded.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    budget: Option<u64>,
    books: Mutex<Books>,
}

impl HeadlessRenderer {
    /// Creates a renderer without a memory limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer that fails allocations beyond `bytes`.
    pub fn with_memory_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            books: Mutex::default(),
        }
    }

    /// Number of live resources.
    pub fn live_resources(&self) -> usize {
        self.books().live.len()
    }

    /// Bytes held by live resources.
    pub fn used_bytes(&self) -> u64 {
        self.books().used_bytes
    }

    /// Highest value [`used_bytes`](Self::used_bytes) ever reached.
    pub fn peak_bytes(&self) -> u64 {
        self.books().peak_bytes
    }

    /// Number of frames rendered.
    pub fn frames_rendered(&self) -> u64 {
        self.books().frames_rendered
    }

    /// Statistics of the last rendered frame.
    pub fn last_stats(&self) -> Option<FrameStats> {
        self.books().last_stats
    }

    fn books(&self) -> MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate(&self, bytes: u64) -> Result<GpuResourceId, ResourceError> {
        let mut books = self.books();
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(books.used_bytes);
            if bytes > available {
                return Err(ResourceError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }
        books.next_id += 1;
        let id = GpuResourceId(books.next_id);
        books.live.insert(id, bytes);
        books.used_bytes += bytes;
        books.peak_bytes = books.peak_bytes.max(books.used_bytes);
        Ok(id)
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn create_mesh(&self, mesh: &MeshData) -> Result<GpuResourceId, ResourceError> {
        self.allocate(mesh.byte_size())
    }

    fn create_texture(&self, texture: &TextureData) -> Result<GpuResourceId, ResourceError> {
        self.allocate(texture.byte_size())
    }

    fn prepare_avatar(&self, avatar: &AvatarHandle) -> Result<Vec<GpuResourceId>, ResourceError> {
        let palette = self.allocate(avatar.skeleton().len() as u64 * BYTES_PER_JOINT)?;
        let morph_floats: usize = avatar.meshes().iter().map(|m| m.morph_target_count).sum();
        if morph_floats == 0 {
            return Ok(vec![palette]);
        }
        match self.allocate(morph_floats as u64 * 4) {
            Ok(morphs) => Ok(vec![palette, morphs]),
            Err(e) => {
                self.destroy(palette)?;
                Err(e)
            }
        }
    }

    fn destroy(&self, id: GpuResourceId) -> Result<(), ResourceError> {
        let mut books = self.books();
        let bytes = books
            .live
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle(id))?;
        books.used_bytes -= bytes;
        Ok(())
    }

    fn render(&self, view: &FrameView<'_>) -> Result<FrameStats, RenderError> {
        let (draw_calls, triangles) = view.avatar.map_or((0, 0), |avatar| {
            let meshes = avatar.meshes();
            let triangles = meshes.iter().map(|m| m.indices.len() as u64 / 3).sum();
            (meshes.len() as u32, triangles)
        });
        let stats = FrameStats {
            frame_number: view.frame_number,
            draw_calls,
            triangles,
        };
        let mut books = self.books();
        books.frames_rendered += 1;
        books.last_stats = Some(stats);
        Ok(stats)
    }
}
