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

//! Defines the error types of the rendering seam.

use super::GpuResourceId;
use thiserror::Error;

/// An error related to the creation or destruction of a GPU resource.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    /// The device ran out of memory for the requested allocation.
    #[error("out of GPU memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Bytes requested by the failed allocation.
        requested: u64,
        /// Bytes still available on the device.
        available: u64,
    },
    /// The handle does not name a live resource.
    #[error("invalid GPU resource handle {0:?}")]
    InvalidHandle(GpuResourceId),
    /// An error originating from the backend implementation.
    #[error("backend resource error: {0}")]
    Backend(String),
}

/// An error raised while drawing a frame.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    /// The surface was lost or outdated; the next frame may succeed.
    #[error("render surface lost")]
    SurfaceLost,
    /// An error originating from the backend implementation.
    #[error("backend render error: {0}")]
    Backend(String),
}
