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

//! Defines the contract between the viewer and the 3D rendering backend.
//!
//! The backend is an existing scene/camera/renderer capability; the viewer only
//! orchestrates it. Like a graphics device, a [`SceneRenderer`] is shared
//! (`Arc`) and takes `&self`, so loader workers can upload while the render
//! thread draws.

mod camera;
mod error;

pub use camera::*;
pub use error::*;

use crate::avatar::{AvatarHandle, MeshData, TextureData};

/// An opaque handle to a GPU resource owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuResourceId(pub u64);

/// Everything the renderer needs to draw one frame.
#[derive(Debug)]
pub struct FrameView<'a> {
    /// Monotonic frame counter of the render loop.
    pub frame_number: u64,
    /// The active avatar, if any. `None` renders the empty scene.
    pub avatar: Option<&'a AvatarHandle>,
    /// The live camera.
    pub camera: &'a CameraState,
}

/// Statistics reported after a frame was submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// The frame this report belongs to.
    pub frame_number: u64,
    /// Number of draw calls issued.
    pub draw_calls: u32,
    /// Number of triangles submitted.
    pub triangles: u64,
}

/// The rendering backend as seen by the viewer.
pub trait SceneRenderer: Send + Sync {
    /// Uploads a mesh's vertex and index buffers.
    fn create_mesh(&self, mesh: &MeshData) -> Result<GpuResourceId, ResourceError>;

    /// Uploads a texture.
    fn create_texture(&self, texture: &TextureData) -> Result<GpuResourceId, ResourceError>;

    /// Creates the per-instance resources (skinning palette, morph weight
    /// buffers) an avatar needs before it can join the scene.
    ///
    /// Called on the render thread at activation. The returned ids are adopted by
    /// the avatar and destroyed with it.
    fn prepare_avatar(&self, avatar: &AvatarHandle) -> Result<Vec<GpuResourceId>, ResourceError>;

    /// Destroys a resource. Destroying an unknown id is an error.
    fn destroy(&self, id: GpuResourceId) -> Result<(), ResourceError>;

    /// Draws the scene through the given camera.
    fn render(&self, view: &FrameView<'_>) -> Result<FrameStats, RenderError>;
}
