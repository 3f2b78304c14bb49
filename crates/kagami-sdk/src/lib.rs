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

//! The public-facing API of the Kagami avatar viewer.
//!
//! A [`Viewer`] owns the whole runtime: the avatar loader with its race
//! policy, the animation binder, lip-sync and the render loop. Hosts talk to
//! it through [`ViewerCommand`]s and receive [`ViewerEvent`]s back; frames are
//! driven by calling [`Viewer::on_frame`] from the host's frame callback.

#![warn(missing_docs)]

mod config;
mod events;
mod headless;
mod schedule;
mod viewer;

pub use config::*;
pub use events::*;
pub use headless::*;
pub use schedule::*;
pub use viewer::*;

/// Types most hosts need.
pub mod prelude {
    pub use crate::{
        FrameQueue, HeadlessRenderer, ThreadSpawner, TokioSpawner, Viewer, ViewerCommand,
        ViewerConfig, ViewerEvent,
    };
    pub use kagami_core::avatar::{AvatarId, AvatarSource};
    pub use kagami_core::emote::EmotionTag;
    pub use kagami_core::renderer::{FrameStats, SceneRenderer};
    pub use kagami_core::schedule::{FrameRequestId, FrameScheduler, TaskSpawner};
}
