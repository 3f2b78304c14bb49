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

//! Identity of the hot-path algorithm implementations ("lanes").

use std::fmt;

/// Broad category of work a lane performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Asset decoding (models, clips, audio).
    Asset,
    /// Audio analysis.
    Audio,
    /// Skeletal animation sampling and blending.
    Animation,
    /// Camera placement.
    Camera,
    /// Expression weight generation.
    Expression,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Asset => write!(f, "Asset"),
            LaneKind::Audio => write!(f, "Audio"),
            LaneKind::Animation => write!(f, "Animation"),
            LaneKind::Camera => write!(f, "Camera"),
            LaneKind::Expression => write!(f, "Expression"),
        }
    }
}

/// Common identity shared by every lane.
pub trait Lane {
    /// A short, stable name for logs (`"VrmLoader"`, `"LipSync"`).
    fn strategy_name(&self) -> &'static str;

    /// The lane's category.
    fn lane_kind(&self) -> LaneKind;
}
