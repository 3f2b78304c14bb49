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

//! Asset decoding lanes.

mod audio_loader_lane;
mod buffers;
mod clip_loader_lane;
mod samples;
mod vrm_loader_lane;
mod vrm_schema;

pub use audio_loader_lane::*;
pub use clip_loader_lane::*;
pub use samples::*;
pub use vrm_loader_lane::*;

use std::error::Error;

/// A lane that parses raw bytes into an asset of type `A`.
///
/// Loaders run on worker threads, so they must be `Send + Sync` and never touch
/// render state.
pub trait AssetLoaderLane<A>: Send + Sync {
    /// Parses a byte slice read from an asset file.
    fn load(&self, bytes: &[u8]) -> Result<A, Box<dyn Error + Send + Sync>>;
}
