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

use crate::animation_agent::ClipLoadError;
use crate::LoadGeneration;
use kagami_core::avatar::{AvatarId, ParseError};
use kagami_core::renderer::ResourceError;

/// How one load request ended, as seen on the render thread.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The avatar is now active.
    Loaded {
        /// The request.
        generation: LoadGeneration,
        /// The new avatar.
        avatar: AvatarId,
        /// Source label.
        label: String,
        /// Set when the idle clip was unavailable and the avatar shows its
        /// bind pose.
        clip_error: Option<ClipLoadError>,
    },
    /// The source could not be read or parsed. The previous avatar stays.
    ParseError {
        /// The request.
        generation: LoadGeneration,
        /// Source label.
        label: String,
        /// The cause.
        error: ParseError,
    },
    /// A newer request was issued while this one was in flight. Everything
    /// it produced has been released.
    Superseded {
        /// The request.
        generation: LoadGeneration,
    },
    /// GPU resources ran out while uploading or activating. The previous
    /// avatar stays and the partial upload has been released.
    ResourceExhausted {
        /// The request.
        generation: LoadGeneration,
        /// Source label.
        label: String,
        /// The cause.
        error: ResourceError,
    },
}

impl LoadOutcome {
    /// The request this outcome belongs to.
    pub fn generation(&self) -> LoadGeneration {
        match self {
            LoadOutcome::Loaded { generation, .. }
            | LoadOutcome::ParseError { generation, .. }
            | LoadOutcome::Superseded { generation }
            | LoadOutcome::ResourceExhausted { generation, .. } => *generation,
        }
    }

    /// Returns `true` if the request activated an avatar.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }
}
