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

use super::LoadOutcome;
use crate::animation_agent::{AnimationBinder, ClipLibrary};
use crate::worker::run_contained;
use crate::{ActiveAvatar, LoadGeneration, ViewerState};
use crossbeam_channel::{Receiver, Sender};
use kagami_core::avatar::{
    AvatarHandle, AvatarSource, AvatarSourceLoader, GpuAvatarResources, ParseError,
};
use kagami_core::renderer::{ResourceError, SceneRenderer};
use kagami_core::schedule::TaskSpawner;
use kagami_lanes::CameraFramingLane;
use std::path::PathBuf;
use std::sync::Arc;

/// What a load job produced before it reached the render thread.
enum LoadFailure {
    Parse(ParseError),
    Upload {
        error: ResourceError,
        partial: GpuAvatarResources,
    },
}

struct LoadCompletion {
    generation: LoadGeneration,
    label: String,
    result: Result<AvatarHandle, LoadFailure>,
}

/// Loads avatars off the render thread and installs the newest one.
///
/// Every [`request_load`](Self::request_load) takes a fresh generation from
/// the [`ViewerState`]. A finished job is only installed if its generation is
/// still the latest one when [`poll`](Self::poll) sees it; anything older is
/// released without ever being rendered. Completion order does not matter.
pub struct AvatarLoadAgent {
    loader: Arc<dyn AvatarSourceLoader>,
    renderer: Arc<dyn SceneRenderer>,
    spawner: Arc<dyn TaskSpawner>,
    clips: Arc<ClipLibrary>,
    idle_clip: String,
    framing: CameraFramingLane,
    default_avatar: Option<PathBuf>,
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
    in_flight: usize,
}

impl AvatarLoadAgent {
    /// Creates a load agent.
    ///
    /// The idle clip named by `binder` is warmed inside each load job so that
    /// activation never touches the disk.
    pub fn new(
        loader: Arc<dyn AvatarSourceLoader>,
        renderer: Arc<dyn SceneRenderer>,
        spawner: Arc<dyn TaskSpawner>,
        binder: &AnimationBinder,
        framing: CameraFramingLane,
    ) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            loader,
            renderer,
            spawner,
            clips: binder.clips().clone(),
            idle_clip: binder.idle_clip().to_string(),
            framing,
            default_avatar: None,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Sets the file [`AvatarSource::Default`] resolves to.
    pub fn with_default_avatar(mut self, path: Option<PathBuf>) -> Self {
        self.default_avatar = path;
        self
    }

    /// The camera framing lane used at activation.
    pub fn framing(&self) -> &CameraFramingLane {
        &self.framing
    }

    /// Number of jobs whose result has not been polled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts loading `source` and returns the request's generation.
    ///
    /// Any request still in flight becomes stale from this point on.
    pub fn request_load(
        &mut self,
        state: &mut ViewerState,
        source: AvatarSource,
    ) -> LoadGeneration {
        let source = match (source, &self.default_avatar) {
            (AvatarSource::Default, Some(path)) => AvatarSource::File(path.clone()),
            (source, _) => source,
        };
        let generation = state.next_generation();
        let label = source.label();
        log::info!("Loading avatar '{}' as request {}", label, generation);

        let loader = self.loader.clone();
        let renderer = self.renderer.clone();
        let clips = self.clips.clone();
        let idle_clip = self.idle_clip.clone();
        let sender = self.sender.clone();
        self.in_flight += 1;
        self.spawner.spawn(
            "avatar-load",
            Box::new(move || {
                let result = run_contained("avatar-load", || {
                    let result = run_load(&*loader, &renderer, &source, &label);
                    if result.is_ok() {
                        // Only warms the cache; the binder reports the outcome.
                        let _ = clips.get(&idle_clip);
                    }
                    result
                })
                .unwrap_or_else(|message| {
                    Err(LoadFailure::Parse(ParseError::LoaderPanicked(message)))
                });
                if let Err(e) = sender.send(LoadCompletion {
                    generation,
                    label,
                    result,
                }) {
                    log::debug!(
                        "Load agent gone, releasing request {}",
                        e.into_inner().generation
                    );
                }
            }),
        );
        generation
    }

    /// Handles every finished job, installing at most the latest one.
    ///
    /// Must run on the render thread, between frames.
    pub fn poll(&mut self, state: &mut ViewerState, binder: &AnimationBinder) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            outcomes.push(self.complete(state, binder, completion));
        }
        outcomes
    }

    /// Releases the results of jobs that finished but were never polled.
    pub fn shutdown(&mut self, state: &mut ViewerState) {
        while let Ok(completion) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            log::debug!("Releasing unpolled load request {}", completion.generation);
            release(state, completion.result);
        }
        if self.in_flight > 0 {
            log::warn!(
                "{} avatar loads still running at shutdown; their resources are released on drop",
                self.in_flight
            );
        }
    }

    fn complete(
        &self,
        state: &mut ViewerState,
        binder: &AnimationBinder,
        completion: LoadCompletion,
    ) -> LoadOutcome {
        let LoadCompletion {
            generation,
            label,
            result,
        } = completion;

        if generation != state.generation() {
            log::debug!(
                "Discarding avatar '{}' from request {}, superseded by {}",
                label,
                generation,
                state.generation()
            );
            release(state, result);
            return LoadOutcome::Superseded { generation };
        }

        match result {
            Ok(handle) => self.activate(state, binder, generation, label, handle),
            Err(LoadFailure::Parse(error)) => {
                log::warn!("Failed to load avatar '{}': {}", label, error);
                LoadOutcome::ParseError {
                    generation,
                    label,
                    error,
                }
            }
            Err(LoadFailure::Upload { error, mut partial }) => {
                log::error!("Failed to upload avatar '{}': {}", label, error);
                state.dispose(&mut partial);
                LoadOutcome::ResourceExhausted {
                    generation,
                    label,
                    error,
                }
            }
        }
    }

    /// Installs `handle`. Nothing in the state changes unless every step
    /// before the swap succeeds.
    fn activate(
        &self,
        state: &mut ViewerState,
        binder: &AnimationBinder,
        generation: LoadGeneration,
        label: String,
        mut handle: AvatarHandle,
    ) -> LoadOutcome {
        match self.renderer.prepare_avatar(&handle) {
            Ok(ids) => handle.adopt_gpu_resources(ids),
            Err(error) => {
                log::error!("Failed to prepare avatar '{}': {}", label, error);
                state.dispose(&mut handle);
                return LoadOutcome::ResourceExhausted {
                    generation,
                    label,
                    error,
                };
            }
        }

        let binding = binder.bind(&handle);
        let clip_error = binding.clip_error().cloned();
        let frame = self.framing.compute_frame(handle.skeleton());
        let avatar = handle.id();

        state.camera.apply_frame(frame);
        state.install(ActiveAvatar { handle, binding });
        log::info!("Activated {} '{}' (request {})", avatar, label, generation);

        LoadOutcome::Loaded {
            generation,
            avatar,
            label,
            clip_error,
        }
    }
}

impl std::fmt::Debug for AvatarLoadAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarLoadAgent")
            .field("default_avatar", &self.default_avatar)
            .field("idle_clip", &self.idle_clip)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

/// The worker half of a load: read, parse, upload.
fn run_load(
    loader: &dyn AvatarSourceLoader,
    renderer: &Arc<dyn SceneRenderer>,
    source: &AvatarSource,
    label: &str,
) -> Result<AvatarHandle, LoadFailure> {
    let bytes = source.read_bytes().map_err(LoadFailure::Parse)?;
    let mut asset = loader.parse(&bytes, label).map_err(LoadFailure::Parse)?;

    let mut gpu = GpuAvatarResources::new(renderer.clone());
    for mesh in &asset.meshes {
        match renderer.create_mesh(mesh) {
            Ok(id) => gpu.push(id),
            Err(error) => return Err(LoadFailure::Upload { error, partial: gpu }),
        }
    }
    for texture in std::mem::take(&mut asset.textures) {
        match renderer.create_texture(&texture) {
            Ok(id) => gpu.push(id),
            Err(error) => return Err(LoadFailure::Upload { error, partial: gpu }),
        }
    }

    log::debug!(
        "Parsed and uploaded '{}': {} joints, {} meshes, {} GPU resources",
        label,
        asset.skeleton.len(),
        asset.meshes.len(),
        gpu.ids().len()
    );
    Ok(AvatarHandle::new(label, asset, gpu))
}

fn release(state: &mut ViewerState, result: Result<AvatarHandle, LoadFailure>) {
    match result {
        Ok(mut handle) => {
            state.dispose(&mut handle);
        }
        Err(LoadFailure::Upload { mut partial, .. }) => {
            state.dispose(&mut partial);
        }
        Err(LoadFailure::Parse(_)) => {}
    }
}
