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

//! The process-wide state bundle of the viewer.

use crate::animation_agent::AnimationBinding;
use kagami_core::audio::AudioAnalysisSample;
use kagami_core::avatar::{AvatarHandle, AvatarId};
use kagami_core::disposal::{Disposable, DisposalCoordinator};
use kagami_core::emote::{EmoteController, EmotionTag};
use kagami_core::renderer::CameraState;
use std::fmt;

/// Identifies one load request. Later requests have larger generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LoadGeneration(pub u64);

impl fmt::Display for LoadGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The active avatar together with its animation binding.
///
/// The two are installed and removed as one value, so no frame can see a
/// mixer bound to one avatar while the skeleton belongs to another.
#[derive(Debug)]
pub struct ActiveAvatar {
    /// The avatar instance.
    pub handle: AvatarHandle,
    /// Its mixer and clips.
    pub binding: AnimationBinding,
}

impl ActiveAvatar {
    /// Per-frame animation: advances the mixer, then solves the pose and
    /// expressions.
    pub(crate) fn animate(&mut self, dt: f32) {
        self.binding.update(dt, self.handle.skeleton_mut());
        self.handle.update();
    }
}

/// Everything the viewer knows at runtime.
///
/// Created when the viewer starts and torn down on dispose. Agents receive it
/// explicitly; nothing reaches it through globals.
pub struct ViewerState {
    pub(crate) active: Option<ActiveAvatar>,
    pub(crate) generation: LoadGeneration,
    pub(crate) running: bool,
    pub(crate) last_sample: Option<AudioAnalysisSample>,
    pub(crate) camera: CameraState,
    pub(crate) pending_emotion: Option<EmotionTag>,
    pub(crate) disposal: DisposalCoordinator,
    pub(crate) emote: Box<dyn EmoteController>,
}

impl ViewerState {
    /// Creates the state with no avatar and the loop stopped.
    pub fn new(camera: CameraState, emote: Box<dyn EmoteController>) -> Self {
        Self {
            active: None,
            generation: LoadGeneration::default(),
            running: false,
            last_sample: None,
            camera,
            pending_emotion: None,
            disposal: DisposalCoordinator::new(),
            emote,
        }
    }

    /// The active avatar, if any.
    pub fn active(&self) -> Option<&ActiveAvatar> {
        self.active.as_ref()
    }

    /// Identifier of the active avatar, if any.
    pub fn active_avatar_id(&self) -> Option<AvatarId> {
        self.active.as_ref().map(|active| active.handle.id())
    }

    /// The most recent load generation handed out.
    pub fn generation(&self) -> LoadGeneration {
        self.generation
    }

    /// Whether the render loop is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The lip-sync sample of the last tick that had an avatar.
    pub fn last_sample(&self) -> Option<AudioAnalysisSample> {
        self.last_sample
    }

    /// The live camera.
    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// The live camera, for orbit controls.
    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    /// Queues an emotion command for the next tick. A newer command replaces
    /// one that was not consumed yet.
    pub fn set_emotion(&mut self, tag: EmotionTag) {
        self.pending_emotion = Some(tag);
    }

    /// The disposal ledger.
    pub fn disposal(&self) -> &DisposalCoordinator {
        &self.disposal
    }

    /// Releases `resource` through the disposal coordinator.
    pub fn dispose<D: Disposable + ?Sized>(&mut self, resource: &mut D) -> bool {
        self.disposal.dispose(resource)
    }

    pub(crate) fn next_generation(&mut self) -> LoadGeneration {
        self.generation = LoadGeneration(self.generation.0 + 1);
        self.generation
    }

    /// Swaps `avatar` in, disposes the previous one and hands the new
    /// expression table to the emote controller.
    pub(crate) fn install(&mut self, avatar: ActiveAvatar) {
        if let Some(mut previous) = self.active.replace(avatar) {
            log::info!(
                "Replacing {} '{}'",
                previous.handle.id(),
                previous.handle.label()
            );
            self.disposal.dispose(&mut previous.handle);
        }
        if let Some(active) = &self.active {
            self.emote.bind_expressions(active.handle.expressions());
        }
    }

    /// Runs the emote controller against the active avatar's weights.
    /// Does nothing without an avatar; a pending emotion then stays queued.
    pub(crate) fn drive_emote(&mut self, volume: f32, dt: f32) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let emotion = self.pending_emotion.take();
        self.emote.update(
            volume,
            emotion.as_ref(),
            dt,
            active.handle.expression_weights_mut(),
        );
    }

    /// Releases the active avatar and marks the loop stopped.
    pub fn teardown(&mut self) {
        self.running = false;
        if let Some(mut active) = self.active.take() {
            self.disposal.dispose(&mut active.handle);
        }
        self.pending_emotion = None;
        self.last_sample = None;
    }
}

impl fmt::Debug for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerState")
            .field("active", &self.active_avatar_id())
            .field("generation", &self.generation)
            .field("running", &self.running)
            .field("last_sample", &self.last_sample)
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}
