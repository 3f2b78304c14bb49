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

mod common;

use common::{avatar_bytes, Harness, ManualScheduler, SchedulerLog};
use kagami_agents::animation_agent::ClipLibrary;
use kagami_agents::lip_sync_agent::LipSyncAgent;
use kagami_agents::render_agent::{LoopState, RenderLoopConfig, RenderLoopDriver};
use kagami_core::avatar::AvatarSource;
use kagami_core::emote::EmotionTag;
use kagami_core::renderer::FrameStats;
use kagami_lanes::{LipSyncParams, StreamTap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct LoopHarness {
    h: Harness,
    driver: RenderLoopDriver,
    lip_sync: LipSyncAgent,
    frames: Arc<Mutex<SchedulerLog>>,
}

impl LoopHarness {
    fn new() -> Self {
        let h = Harness::new(ClipLibrary::new(None));
        let frames = Arc::new(Mutex::new(SchedulerLog::default()));
        let driver = RenderLoopDriver::new(
            RenderLoopConfig::default(),
            h.renderer.clone(),
            Box::new(ManualScheduler(frames.clone())),
        );
        let lip_sync = LipSyncAgent::new(LipSyncParams::default(), h.spawner.clone());
        Self {
            h,
            driver,
            lip_sync,
            frames,
        }
    }

    fn load_avatar(&mut self) {
        self.h.loader.request_load(
            &mut self.h.state,
            AvatarSource::bytes("a.vrm", avatar_bytes("A")),
        );
        self.h.spawner.run_all();
        self.h.poll();
    }

    fn start(&mut self) {
        self.driver.start(&mut self.h.state);
    }

    /// Fires the outstanding frame request at `ms` milliseconds.
    fn fire(&mut self, ms: u64) -> Option<FrameStats> {
        let id = self.frames.lock().unwrap().last_requested()?;
        self.driver.on_frame(
            id,
            Duration::from_millis(ms),
            &mut self.h.state,
            &mut self.lip_sync,
        )
    }
}

#[test]
fn renders_the_empty_scene_without_an_avatar() {
    // --- 1. ARRANGE ---
    let mut lh = LoopHarness::new();
    lh.start();

    // --- 2. ACT ---
    for frame in 0..10 {
        assert!(lh.fire(frame * 16).is_some());
    }

    // --- 3. ASSERT ---
    let frames = lh.h.renderer.frames();
    assert_eq!(frames.len(), 10);
    assert!(frames.iter().all(|(_, avatar)| avatar.is_none()));
    assert_eq!(frames.last().map(|(n, _)| *n), Some(10));
    assert!(lh.h.emote.lock().unwrap().updates.is_empty());
    assert!(lh.h.state.last_sample().is_none());
}

#[test]
fn stop_cancels_the_pending_frame_and_is_idempotent() {
    let mut lh = LoopHarness::new();
    lh.start();
    let pending = lh.frames.lock().unwrap().last_requested().unwrap();

    lh.driver.stop(&mut lh.h.state);
    lh.driver.stop(&mut lh.h.state);

    assert_eq!(lh.frames.lock().unwrap().cancelled, vec![pending]);
    assert_eq!(lh.driver.loop_state(), LoopState::Stopped);
    assert!(!lh.h.state.is_running());

    // A callback that raced the cancellation is ignored.
    assert!(lh.fire(16).is_none());
    assert!(lh.h.renderer.frames().is_empty());
}

#[test]
fn stop_before_start_does_nothing() {
    let mut lh = LoopHarness::new();
    lh.driver.stop(&mut lh.h.state);
    assert!(lh.frames.lock().unwrap().cancelled.is_empty());
    assert_eq!(lh.driver.loop_state(), LoopState::Stopped);
}

#[test]
fn start_while_running_keeps_one_request() {
    let mut lh = LoopHarness::new();
    lh.start();
    lh.start();

    assert_eq!(lh.frames.lock().unwrap().requested.len(), 1);
    assert_eq!(lh.driver.loop_state(), LoopState::Running);
    assert!(lh.h.state.is_running());
}

#[test]
fn first_tick_is_zero_and_long_gaps_are_clamped() {
    let mut lh = LoopHarness::new();
    lh.load_avatar();
    lh.start();

    lh.fire(1_000);
    lh.fire(6_000);
    lh.fire(6_020);

    let dts: Vec<f32> = lh
        .h
        .emote
        .lock()
        .unwrap()
        .updates
        .iter()
        .map(|(_, _, dt)| *dt)
        .collect();
    assert_eq!(dts.len(), 3);
    assert_eq!(dts[0], 0.0);
    assert!((dts[1] - 0.1).abs() < 1e-6);
    assert!((dts[2] - 0.02).abs() < 1e-4);
}

#[test]
fn emotion_is_consumed_by_exactly_one_tick() {
    let mut lh = LoopHarness::new();
    lh.load_avatar();
    lh.start();

    lh.h.state.set_emotion(EmotionTag::new("Happy"));
    lh.fire(0);
    lh.fire(16);

    let emote = lh.h.emote.lock().unwrap();
    assert_eq!(emote.updates[0].1.as_deref(), Some("happy"));
    assert_eq!(emote.updates[1].1, None);
}

#[test]
fn emotion_waits_for_an_avatar() {
    let mut lh = LoopHarness::new();
    lh.start();
    lh.h.state.set_emotion(EmotionTag::new("sad"));
    lh.fire(0);

    lh.load_avatar();
    lh.fire(16);

    let emote = lh.h.emote.lock().unwrap();
    assert_eq!(emote.updates.len(), 1);
    assert_eq!(emote.updates[0].1.as_deref(), Some("sad"));
}

#[test]
fn render_failure_does_not_stop_the_loop() {
    let mut lh = LoopHarness::new();
    lh.h.renderer.fail_render(true);
    lh.start();

    for frame in 0..3 {
        assert!(lh.fire(frame * 16).is_none());
    }

    assert_eq!(lh.h.renderer.frames().len(), 3);
    assert_eq!(lh.frames.lock().unwrap().requested.len(), 4);
    assert_eq!(lh.driver.loop_state(), LoopState::Running);
}

#[test]
fn audio_drives_the_mouth_of_the_active_avatar() {
    let mut lh = LoopHarness::new();
    lh.load_avatar();
    let (tap, feed) = StreamTap::new(4096, 1);
    lh.lip_sync.connect_tap(&mut lh.h.state, Box::new(tap));
    feed.push_interleaved(&[0.9; 2048]);
    lh.start();

    let stats = lh.fire(0).unwrap();

    assert_eq!(stats.draw_calls, 1);
    let sample = lh.h.state.last_sample().unwrap();
    assert!(sample.volume > 0.9);
    assert_eq!(sample.timestamp, Duration::ZERO);

    let active = lh.h.state.active().unwrap();
    assert!(active.handle.expression_weights().get("aa") > 0.9);
    // The `aa` expression drives the first morph of the body mesh.
    assert!(active.handle.morph_weights()[0][0] > 0.9);
    assert_eq!(
        lh.h.renderer.frames(),
        vec![(1, Some(active.handle.id()))]
    );
}

#[test]
fn silence_keeps_the_mouth_closed() {
    let mut lh = LoopHarness::new();
    lh.load_avatar();
    lh.start();

    lh.fire(0);

    assert_eq!(lh.h.state.last_sample().unwrap().volume, 0.0);
    assert_eq!(lh.h.emote.lock().unwrap().updates[0].0, 0.0);
}
