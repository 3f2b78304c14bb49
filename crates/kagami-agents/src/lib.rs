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

//! # Kagami Agents
//!
//! Stateful orchestrators of the avatar viewer. Each agent wraps one or more
//! lanes and owns the policy around them:
//!
//! - [`AvatarLoadAgent`](avatar_load_agent::AvatarLoadAgent) loads avatars off
//!   the render thread and swaps them in under a generation-counter race policy.
//! - [`AnimationBinder`](animation_agent::AnimationBinder) binds an idle clip
//!   to each new avatar and plays named animations on request.
//! - [`LipSyncAgent`](lip_sync_agent::LipSyncAgent) owns the audio tap and
//!   turns it into one volume sample per frame.
//! - [`RenderLoopDriver`](render_agent::RenderLoopDriver) runs the per-frame
//!   pipeline.
//!
//! All of them operate on an explicit [`ViewerState`], mutated only on the
//! render thread.

#![warn(missing_docs)]

pub mod animation_agent;
pub mod avatar_load_agent;
pub mod lip_sync_agent;
pub mod render_agent;
mod viewer_state;
mod worker;

pub use viewer_state::*;
