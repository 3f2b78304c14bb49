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

use crate::lip_sync_agent::LipSyncAgent;
use crate::ViewerState;
use kagami_core::renderer::{FrameStats, FrameView, SceneRenderer};
use kagami_core::schedule::{FrameRequestId, FrameScheduler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Tuning of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLoopConfig {
    /// Upper bound of the per-tick elapsed time, in seconds. Longer gaps
    /// (a backgrounded window, a debugger pause) are treated as this long.
    pub max_frame_delta_secs: f32,
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            max_frame_delta_secs: 0.1,
        }
    }
}

/// Whether the loop is scheduling frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No frame is scheduled.
    Stopped,
    /// A frame request is outstanding.
    Running,
}

/// Runs the frame pipeline on host frame callbacks.
///
/// Each tick, with an avatar present:
/// 1. the lip-sync agent samples the audio tap,
/// 2. the emote controller turns volume and any pending emotion into
///    expression weights,
/// 3. the mixer poses the skeleton,
/// 4. the avatar solves its pose and expressions.
///
/// The scene is then rendered, with or without an avatar. A failure in one
/// tick is logged and the loop continues.
pub struct RenderLoopDriver {
    config: RenderLoopConfig,
    renderer: Arc<dyn SceneRenderer>,
    scheduler: Box<dyn FrameScheduler>,
    pending: Option<FrameRequestId>,
    last_timestamp: Option<Duration>,
    frame_number: u64,
}

impl RenderLoopDriver {
    /// Creates a stopped driver.
    pub fn new(
        config: RenderLoopConfig,
        renderer: Arc<dyn SceneRenderer>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        Self {
            config,
            renderer,
            scheduler,
            pending: None,
            last_timestamp: None,
            frame_number: 0,
        }
    }

    /// The loop tuning.
    pub fn config(&self) -> &RenderLoopConfig {
        &self.config
    }

    /// Number of ticks run so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Whether a frame is scheduled.
    pub fn loop_state(&self) -> LoopState {
        if self.pending.is_some() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    /// Schedules the first frame. Does nothing if already running.
    pub fn start(&mut self, state: &mut ViewerState) {
        if self.pending.is_some() {
            return;
        }
        state.running = true;
        self.last_timestamp = None;
        self.pending = Some(self.scheduler.request_frame());
        log::info!("Render loop started");
    }

    /// Cancels the outstanding frame request. Safe to call any number of
    /// times, running or not.
    pub fn stop(&mut self, state: &mut ViewerState) {
        state.running = false;
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel_frame(id);
            log::info!("Render loop stopped after {} frames", self.frame_number);
        }
    }

    /// Returns `true` if `id` is the frame this driver is waiting for.
    pub fn accepts(&self, id: FrameRequestId) -> bool {
        self.pending == Some(id)
    }

    /// Host frame callback. Ticks and schedules the next frame, or ignores a
    /// callback that belongs to a cancelled request.
    pub fn on_frame(
        &mut self,
        id: FrameRequestId,
        timestamp: Duration,
        state: &mut ViewerState,
        lip_sync: &mut LipSyncAgent,
    ) -> Option<FrameStats> {
        if !self.accepts(id) {
            log::trace!("Ignoring frame callback {:?}", id);
            return None;
        }
        self.pending = None;
        let stats = self.tick(timestamp, state, lip_sync);
        if state.running {
            self.pending = Some(self.scheduler.request_frame());
        }
        stats
    }

    /// Runs one frame of the pipeline at `timestamp`.
    pub fn tick(
        &mut self,
        timestamp: Duration,
        state: &mut ViewerState,
        lip_sync: &mut LipSyncAgent,
    ) -> Option<FrameStats> {
        let dt = self.frame_delta(timestamp);
        self.frame_number += 1;

        lip_sync.advance(Duration::from_secs_f32(dt));
        if state.active.is_some() {
            let sample = lip_sync.sample(timestamp);
            state.last_sample = Some(sample);
            state.drive_emote(sample.volume, dt);
            if let Some(active) = state.active.as_mut() {
                active.animate(dt);
            }
        }

        let view = FrameView {
            frame_number: self.frame_number,
            avatar: state.active.as_ref().map(|active| &active.handle),
            camera: &state.camera,
        };
        match self.renderer.render(&view) {
            Ok(stats) => Some(stats),
            Err(e) => {
                log::error!("Frame {} failed to render: {}", self.frame_number, e);
                None
            }
        }
    }

    /// Seconds since the previous tick, clamped. The first tick after a
    /// start reports zero.
    fn frame_delta(&mut self, timestamp: Duration) -> f32 {
        let dt = match self.last_timestamp {
            Some(previous) => timestamp.saturating_sub(previous).as_secs_f32(),
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);
        dt.clamp(0.0, self.config.max_frame_delta_secs.max(0.0))
    }
}

impl std::fmt::Debug for RenderLoopDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoopDriver")
            .field("config", &self.config)
            .field("pending", &self.pending)
            .field("frame_number", &self.frame_number)
            .finish_non_exhaustive()
    }
}

