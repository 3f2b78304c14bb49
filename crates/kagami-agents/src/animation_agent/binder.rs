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

use super::{ClipLibrary, ClipLoadError};
use crate::worker::run_contained;
use crate::{ActiveAvatar, ViewerState};
use crossbeam_channel::{Receiver, Sender};
use kagami_core::avatar::{AvatarHandle, AvatarId, Skeleton};
use kagami_core::schedule::TaskSpawner;
use kagami_lanes::{AnimationClip, AnimationMixer, DEFAULT_CROSSFADE_SECS};
use std::sync::Arc;

/// The animation state bound to one avatar instance.
#[derive(Debug)]
pub struct AnimationBinding {
    avatar: AvatarId,
    mixer: AnimationMixer,
    clip_error: Option<ClipLoadError>,
}

impl AnimationBinding {
    /// The avatar this binding drives.
    pub fn avatar(&self) -> AvatarId {
        self.avatar
    }

    /// The mixer.
    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    /// Why the idle clip is missing, if it is.
    pub fn clip_error(&self) -> Option<&ClipLoadError> {
        self.clip_error.as_ref()
    }

    /// Advances the mixer and writes the pose into `skeleton`.
    pub fn update(&mut self, dt: f32, skeleton: &mut Skeleton) {
        self.mixer.update(dt, skeleton);
    }
}

/// Result of a named-animation request, reported by [`AnimationBinder::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationOutcome {
    /// The clip is now crossfading in on the avatar.
    Started {
        /// The animated avatar.
        avatar: AvatarId,
        /// Clip name.
        clip: String,
    },
    /// The clip could not be loaded; the current animation keeps playing.
    Failed {
        /// Clip name.
        clip: String,
        /// The cause.
        error: ClipLoadError,
    },
    /// The avatar the request targeted was replaced before the clip arrived.
    Stale {
        /// Clip name.
        clip: String,
    },
}

struct ClipCompletion {
    avatar: AvatarId,
    name: String,
    result: Result<Arc<AnimationClip>, ClipLoadError>,
}

/// Attaches the idle clip to new avatars and plays named clips on request.
///
/// Clip files are read on the task spawner; results come back over a channel
/// and are applied on the render thread by [`poll`](Self::poll), only if the
/// requesting avatar is still the active one.
pub struct AnimationBinder {
    clips: Arc<ClipLibrary>,
    spawner: Arc<dyn TaskSpawner>,
    idle_clip: String,
    crossfade_secs: f32,
    sender: Sender<ClipCompletion>,
    receiver: Receiver<ClipCompletion>,
}

impl AnimationBinder {
    /// Creates a binder whose idle clip is looked up as `idle_clip`.
    pub fn new(
        clips: Arc<ClipLibrary>,
        spawner: Arc<dyn TaskSpawner>,
        idle_clip: impl Into<String>,
    ) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            clips,
            spawner,
            idle_clip: idle_clip.into(),
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
            sender,
            receiver,
        }
    }

    /// Overrides the crossfade duration of named clips.
    pub fn with_crossfade(mut self, seconds: f32) -> Self {
        self.crossfade_secs = seconds.max(0.0);
        self
    }

    /// The clip cache.
    pub fn clips(&self) -> &Arc<ClipLibrary> {
        &self.clips
    }

    /// Name of the clip every avatar starts with.
    pub fn idle_clip(&self) -> &str {
        &self.idle_clip
    }

    /// Builds a binding for `avatar` playing the idle clip.
    ///
    /// A missing or broken idle clip is not fatal: the binding keeps the
    /// avatar in its bind pose and records the error. The avatar load job
    /// warms the idle clip, so this is normally a cache hit.
    pub fn bind(&self, avatar: &AvatarHandle) -> AnimationBinding {
        let mut mixer = AnimationMixer::new(avatar.skeleton());
        let clip_error = match self.clips.get(&self.idle_clip) {
            Ok(clip) => {
                mixer.play(clip, avatar.skeleton());
                None
            }
            Err(e) => {
                log::warn!(
                    "{} '{}' has no idle animation, keeping bind pose: {}",
                    avatar.id(),
                    avatar.label(),
                    e
                );
                Some(e)
            }
        };
        AnimationBinding {
            avatar: avatar.id(),
            mixer,
            clip_error,
        }
    }

    /// Loads the clip `name` in the background for the active avatar.
    pub fn request_clip(&self, state: &ViewerState, name: &str) -> Result<(), ClipLoadError> {
        let avatar = state
            .active_avatar_id()
            .ok_or(ClipLoadError::NoActiveAvatar)?;

        let clips = self.clips.clone();
        let sender = self.sender.clone();
        let name = name.to_string();
        self.spawner.spawn(
            "clip-load",
            Box::new(move || {
                let result = run_contained("clip-load", || clips.get(&name)).unwrap_or_else(
                    |details| {
                        Err(ClipLoadError::Decode {
                            name: name.clone(),
                            details,
                        })
                    },
                );
                if sender
                    .send(ClipCompletion {
                        avatar,
                        name,
                        result,
                    })
                    .is_err()
                {
                    log::debug!("Animation binder gone, dropping clip result");
                }
            }),
        );
        Ok(())
    }

    /// Applies every finished clip request.
    pub fn poll(&self, state: &mut ViewerState) -> Vec<AnimationOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            outcomes.push(self.apply(state, completion));
        }
        outcomes
    }

    fn apply(&self, state: &mut ViewerState, completion: ClipCompletion) -> AnimationOutcome {
        let ClipCompletion {
            avatar,
            name,
            result,
        } = completion;

        let Some(ActiveAvatar { handle, binding }) = state
            .active
            .as_mut()
            .filter(|active| active.handle.id() == avatar)
        else {
            log::debug!("Discarding clip '{}' requested for {}", name, avatar);
            return AnimationOutcome::Stale { clip: name };
        };

        match result {
            Ok(clip) => {
                log::info!("Crossfading {} to '{}'", avatar, name);
                binding
                    .mixer
                    .crossfade_to(clip, handle.skeleton(), self.crossfade_secs);
                AnimationOutcome::Started { avatar, clip: name }
            }
            Err(error) => AnimationOutcome::Failed { clip: name, error },
        }
    }
}

impl std::fmt::Debug for AnimationBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationBinder")
            .field("clips", &self.clips)
            .field("idle_clip", &self.idle_clip)
            .field("crossfade_secs", &self.crossfade_secs)
            .finish_non_exhaustive()
    }
}
