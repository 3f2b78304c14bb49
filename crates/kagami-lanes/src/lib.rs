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

//! # Kagami Lanes
//!
//! Hot-path algorithms of the avatar viewer. Lanes are stateless or
//! self-contained strategies: decoding VRM models and animation clips,
//! decoding speech audio, turning audio windows into a mouth-open signal,
//! sampling and blending animation, framing the camera, and mapping volume and
//! emotion onto expression weights. Orchestration lives in `kagami-agents`.

#![warn(missing_docs)]

pub mod animation_lane;
pub mod asset_lane;
pub mod audio_lane;
pub mod camera_lane;
pub mod emote_lane;

pub use animation_lane::*;
pub use asset_lane::*;
pub use audio_lane::*;
pub use camera_lane::*;
pub use emote_lane::*;
