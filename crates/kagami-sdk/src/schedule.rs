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

//! Ready-made host scheduling: a frame queue and two task spawners.

use kagami_core::schedule::{FrameRequestId, FrameScheduler, Task, TaskSpawner};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::{Builder, Handle, Runtime};

#[derive(Debug, Default)]
struct QueueState {
    next: u64,
    pending: Vec<FrameRequestId>,
}

/// A frame scheduler for hosts that own their loop.
///
/// Clones share one queue: hand one to the viewer and keep one to collect
/// the due frames with [`take_due`](Self::take_due).
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl FrameQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every requested, uncancelled frame.
    pub fn take_due(&self) -> Vec<FrameRequestId> {
        std::mem::take(&mut self.lock().pending)
    }

    /// Number of frames waiting.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Returns `true` if no frame is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameRequestId {
        let mut state = self.lock();
        state.next += 1;
        let id = FrameRequestId(state.next);
        state.pending.push(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        self.lock().pending.retain(|pending| *pending != id);
    }
}

/// Runs each task on its own named OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl TaskSpawner for ThreadSpawner {
    fn spawn(&self, name: &'static str, task: Task) {
        let spawned = std::thread::Builder::new()
            .name(format!("kagami-{name}"))
            .spawn(task);
        if let Err(e) = spawned {
            log::error!("Failed to spawn '{}' thread: {}", name, e);
        }
    }
}

/// Runs tasks on a tokio runtime's blocking pool.
pub struct TokioSpawner {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl TokioSpawner {
    /// Starts a dedicated multi-threaded runtime.
    pub fn new(worker_threads: usize) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("kagami-worker")
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Uses a runtime owned by the host.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, name: &'static str, task: Task) {
        log::trace!("Spawning '{}' on the blocking pool", name);
        drop(self.handle.spawn_blocking(task));
    }
}

impl Drop for TokioSpawner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSpawner")
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}
