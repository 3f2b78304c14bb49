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

//! Messages between the host and the viewer.

use kagami_agents::animation_agent::{AnimationOutcome, ClipLoadError};
use kagami_agents::avatar_load_agent::LoadOutcome;
use kagami_agents::lip_sync_agent::{AudioDecodeError, SpeechOutcome};
use kagami_agents::LoadGeneration;
use kagami_core::avatar::{AvatarId, ParseError};
use kagami_core::emote::EmotionTag;
use kagami_core::renderer::ResourceError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A request from the host, applied on the next [`Viewer::pump`](crate::Viewer::pump).
#[derive(Debug, Clone)]
pub enum ViewerCommand {
    /// Loads a model file.
    LoadAvatarFile(PathBuf),
    /// Loads a model already in memory.
    LoadAvatarBytes {
        /// Label for logs and events.
        label: String,
        /// The file contents.
        data: Arc<[u8]>,
    },
    /// Loads the configured default model.
    LoadDefaultAvatar,
    /// Crossfades the active avatar to a named clip.
    PlayAnimation(String),
    /// Shows an emotion on the next frame.
    SetEmotion(EmotionTag),
    /// Decodes a speech clip and makes it the lip-sync source.
    LoadSpeechClip {
        /// Label for logs and events.
        label: String,
        /// Encoded audio.
        data: Arc<[u8]>,
        /// Start playing once decoded.
        autoplay: bool,
    },
    /// Starts or resumes the speech clip.
    PlaySpeech,
    /// Stops and rewinds the speech clip.
    StopSpeech,
    /// Orbits the camera around its target, in radians.
    OrbitCamera {
        /// Rotation about the vertical axis.
        yaw: f32,
        /// Rotation toward or away from the vertical axis.
        pitch: f32,
    },
    /// Scales the camera distance.
    DollyCamera(f32),
    /// Starts the render loop.
    StartLoop,
    /// Stops the render loop.
    StopLoop,
}

/// Why an avatar did not become active.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AvatarLoadError {
    /// The source could not be read or parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The renderer ran out of resources.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[from] ResourceError),
}

/// Something the host may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// A new avatar is on screen.
    AvatarLoaded {
        /// The request that produced it.
        generation: LoadGeneration,
        /// The avatar.
        avatar: AvatarId,
        /// Source label.
        label: String,
        /// Set when it shows its bind pose because the idle clip is missing.
        idle_clip_error: Option<ClipLoadError>,
    },
    /// The latest load request failed; the previous avatar stays.
    AvatarLoadFailed {
        /// The request.
        generation: LoadGeneration,
        /// Source label.
        label: String,
        /// The cause.
        error: AvatarLoadError,
    },
    /// A named clip started.
    AnimationStarted {
        /// The clip.
        clip: String,
    },
    /// A named clip could not be played.
    AnimationFailed {
        /// The clip.
        clip: String,
        /// The cause.
        error: ClipLoadError,
    },
    /// A speech clip is connected.
    SpeechClipReady {
        /// Clip label.
        label: String,
        /// Clip length.
        duration: Duration,
    },
    /// A speech clip could not be decoded.
    SpeechClipFailed(AudioDecodeError),
}

impl ViewerEvent {
    /// Maps a load outcome to the event the host sees. Superseded loads are
    /// internal and produce none.
    pub fn from_load(outcome: LoadOutcome) -> Option<Self> {
        match outcome {
            LoadOutcome::Loaded {
                generation,
                avatar,
                label,
                clip_error,
            } => Some(ViewerEvent::AvatarLoaded {
                generation,
                avatar,
                label,
                idle_clip_error: clip_error,
            }),
            LoadOutcome::ParseError {
                generation,
                label,
                error,
            } => Some(ViewerEvent::AvatarLoadFailed {
                generation,
                label,
                error: error.into(),
            }),
            LoadOutcome::ResourceExhausted {
                generation,
                label,
                error,
            } => Some(ViewerEvent::AvatarLoadFailed {
                generation,
                label,
                error: error.into(),
            }),
            LoadOutcome::Superseded { .. } => None,
        }
    }

    /// Maps an animation outcome. Stale clips produce no event.
    pub fn from_animation(outcome: AnimationOutcome) -> Option<Self> {
        match outcome {
            AnimationOutcome::Started { clip, .. } => Some(ViewerEvent::AnimationStarted { clip }),
            AnimationOutcome::Failed { clip, error } => {
                Some(ViewerEvent::AnimationFailed { clip, error })
            }
            AnimationOutcome::Stale { .. } => None,
        }
    }

    /// Maps a speech outcome. Stale clips produce no event.
    pub fn from_speech(outcome: SpeechOutcome) -> Option<Self> {
        match outcome {
            SpeechOutcome::Ready {
                label, duration, ..
            } => Some(ViewerEvent::SpeechClipReady { label, duration }),
            SpeechOutcome::Failed { error, .. } => Some(ViewerEvent::SpeechClipFailed(error)),
            SpeechOutcome::Stale { .. } => None,
        }
    }
}
