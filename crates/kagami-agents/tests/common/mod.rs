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

//! Test doubles shared by the agent integration tests.

#![allow(dead_code)]

use kagami_agents::animation_agent::{AnimationBinder, ClipLibrary};
use kagami_agents::avatar_load_agent::AvatarLoadAgent;
use kagami_agents::ViewerState;
use kagami_core::avatar::{
    AvatarHandle, AvatarId, ExpressionTable, ExpressionWeights, MeshData, TextureData, VrmVersion,
};
use kagami_core::emote::{EmoteController, EmotionTag};
use kagami_core::math::Vec3;
use kagami_core::renderer::{
    CameraFrame, CameraState, FrameStats, FrameView, GpuResourceId, RenderError, ResourceError,
    SceneRenderer,
};
use kagami_core::schedule::{FrameRequestId, FrameScheduler, Task, TaskSpawner};
use kagami_lanes::{CameraFramingLane, SampleAvatar, VrmLoaderLane};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Queues tasks until the test decides to run them.
#[derive(Default)]
pub struct ManualSpawner {
    queue: Mutex<Vec<(&'static str, Task)>>,
}

impl ManualSpawner {
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Removes every queued task, oldest first.
    pub fn take_all(&self) -> Vec<Task> {
        self.queue
            .lock()
            .unwrap()
            .drain(..)
            .map(|(_, task)| task)
            .collect()
    }

    pub fn run_all(&self) {
        for task in self.take_all() {
            task();
        }
    }
}

impl TaskSpawner for ManualSpawner {
    fn spawn(&self, name: &'static str, task: Task) {
        self.queue.lock().unwrap().push((name, task));
    }
}

#[derive(Default)]
struct RendererLog {
    next_id: u64,
    live: HashSet<GpuResourceId>,
    destroyed: usize,
    frames: Vec<(u64, Option<AvatarId>)>,
}

/// A renderer that only keeps books.
#[derive(Default)]
pub struct RecordingRenderer {
    log: Mutex<RendererLog>,
    fail_textures: AtomicBool,
    fail_prepare: AtomicBool,
    fail_render: AtomicBool,
}

impl RecordingRenderer {
    pub fn live_count(&self) -> usize {
        self.log.lock().unwrap().live.len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.log.lock().unwrap().destroyed
    }

    /// Frame number and avatar of every render call.
    pub fn frames(&self) -> Vec<(u64, Option<AvatarId>)> {
        self.log.lock().unwrap().frames.clone()
    }

    pub fn rendered_avatars(&self) -> HashSet<AvatarId> {
        self.frames().into_iter().filter_map(|(_, a)| a).collect()
    }

    pub fn fail_textures(&self, fail: bool) {
        self.fail_textures.store(fail, Ordering::SeqCst);
    }

    pub fn fail_prepare(&self, fail: bool) {
        self.fail_prepare.store(fail, Ordering::SeqCst);
    }

    pub fn fail_render(&self, fail: bool) {
        self.fail_render.store(fail, Ordering::SeqCst);
    }

    fn allocate(&self) -> GpuResourceId {
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        let id = GpuResourceId(log.next_id);
        log.live.insert(id);
        id
    }
}

impl SceneRenderer for RecordingRenderer {
    fn create_mesh(&self, _mesh: &MeshData) -> Result<GpuResourceId, ResourceError> {
        Ok(self.allocate())
    }

    fn create_texture(&self, texture: &TextureData) -> Result<GpuResourceId, ResourceError> {
        if self.fail_textures.load(Ordering::SeqCst) {
            return Err(ResourceError::OutOfMemory {
                requested: texture.byte_size(),
                available: 0,
            });
        }
        Ok(self.allocate())
    }

    fn prepare_avatar(&self, _avatar: &AvatarHandle) -> Result<Vec<GpuResourceId>, ResourceError> {
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(ResourceError::OutOfMemory {
                requested: 4096,
                available: 0,
            });
        }
        Ok(vec![self.allocate()])
    }

    fn destroy(&self, id: GpuResourceId) -> Result<(), ResourceError> {
        let mut log = self.log.lock().unwrap();
        if !log.live.remove(&id) {
            return Err(ResourceError::InvalidHandle(id));
        }
        log.destroyed += 1;
        Ok(())
    }

    fn render(&self, view: &FrameView<'_>) -> Result<FrameStats, RenderError> {
        self.log
            .lock()
            .unwrap()
            .frames
            .push((view.frame_number, view.avatar.map(AvatarHandle::id)));
        if self.fail_render.load(Ordering::SeqCst) {
            return Err(RenderError::SurfaceLost);
        }
        Ok(FrameStats {
            frame_number: view.frame_number,
            draw_calls: view.avatar.map_or(0, |a| a.meshes().len() as u32),
            triangles: 0,
        })
    }
}

#[derive(Debug, Default)]
pub struct SchedulerLog {
    next: u64,
    pub requested: Vec<FrameRequestId>,
    pub cancelled: Vec<FrameRequestId>,
}

impl SchedulerLog {
    pub fn last_requested(&self) -> Option<FrameRequestId> {
        self.requested.last().copied()
    }
}

/// Hands out frame ids; the test fires the callbacks itself.
pub struct ManualScheduler(pub Arc<Mutex<SchedulerLog>>);

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequestId {
        let mut log = self.0.lock().unwrap();
        log.next += 1;
        let id = FrameRequestId(log.next);
        log.requested.push(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        self.0.lock().unwrap().cancelled.push(id);
    }
}

#[derive(Debug, Default)]
pub struct EmoteLog {
    pub bound: Vec<Vec<String>>,
    /// `(volume, emotion, dt)` of every update.
    pub updates: Vec<(f32, Option<String>, f32)>,
}

/// Writes the volume to `aa` and records every call.
pub struct RecordingEmote(pub Arc<Mutex<EmoteLog>>);

impl EmoteController for RecordingEmote {
    fn bind_expressions(&mut self, table: &ExpressionTable) {
        let names = table.names().into_iter().map(str::to_string).collect();
        self.0.lock().unwrap().bound.push(names);
    }

    fn update(
        &mut self,
        volume: f32,
        emotion: Option<&EmotionTag>,
        dt: f32,
        weights: &mut ExpressionWeights,
    ) {
        weights.set("aa", volume);
        self.0.lock().unwrap().updates.push((
            volume,
            emotion.map(|e| e.as_str().to_string()),
            dt,
        ));
    }
}

/// Everything a load test needs, wired like the viewer wires it.
pub struct Harness {
    pub spawner: Arc<ManualSpawner>,
    pub renderer: Arc<RecordingRenderer>,
    pub emote: Arc<Mutex<EmoteLog>>,
    pub state: ViewerState,
    pub binder: AnimationBinder,
    pub loader: AvatarLoadAgent,
}

impl Harness {
    pub fn new(clips: ClipLibrary) -> Self {
        let spawner = Arc::new(ManualSpawner::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let emote = Arc::new(Mutex::new(EmoteLog::default()));
        let state = ViewerState::new(
            default_camera(),
            Box::new(RecordingEmote(emote.clone())),
        );
        let binder = AnimationBinder::new(Arc::new(clips), spawner.clone(), "idle");
        let loader = AvatarLoadAgent::new(
            Arc::new(VrmLoaderLane::new()),
            renderer.clone(),
            spawner.clone(),
            &binder,
            CameraFramingLane::default(),
        );
        Self {
            spawner,
            renderer,
            emote,
            state,
            binder,
            loader,
        }
    }

    /// Rebuilds the load agent with a default avatar file.
    pub fn with_default_avatar(mut self, path: PathBuf) -> Self {
        self.loader = AvatarLoadAgent::new(
            Arc::new(VrmLoaderLane::new()),
            self.renderer.clone(),
            self.spawner.clone(),
            &self.binder,
            CameraFramingLane::default(),
        )
        .with_default_avatar(Some(path));
        self
    }

    pub fn poll(&mut self) -> Vec<kagami_agents::avatar_load_agent::LoadOutcome> {
        self.loader.poll(&mut self.state, &self.binder)
    }
}

pub fn default_camera() -> CameraState {
    CameraState::new(
        CameraFrame {
            position: Vec3::new(0.0, 1.4, 1.5),
            target: Vec3::new(0.0, 1.3, 0.0),
        },
        30.0,
    )
}

/// A VRM 1.0 sample avatar with one mesh and one texture.
pub fn avatar_bytes(title: &str) -> Arc<[u8]> {
    SampleAvatar::new(VrmVersion::V1)
        .title(title)
        .with_texture()
        .to_glb()
        .unwrap()
        .into()
}
