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

//! Host scheduling primitives: per-frame callbacks and background tasks.

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(pub u64);

/// The host's per-frame scheduling primitive.
///
/// Mirrors a request/cancel animation-frame API: each request yields one callback
/// carrying the returned id, unless it is cancelled first.
pub trait FrameScheduler {
    /// Schedules a callback for the next display refresh.
    fn request_frame(&mut self) -> FrameRequestId;

    /// Cancels a pending request. Unknown or already-fired ids are ignored.
    fn cancel_frame(&mut self, id: FrameRequestId);
}

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs work off the render thread (model decode, audio decode, file reads).
pub trait TaskSpawner: Send + Sync {
    /// Runs `task` asynchronously. `name` labels the work in logs and threads.
    fn spawn(&self, name: &'static str, task: Task);
}
