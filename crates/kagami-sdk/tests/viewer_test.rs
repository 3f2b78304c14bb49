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

use kagami_agents::animation_agent::ClipLoadError;
use kagami_core::avatar::VrmVersion;
use kagami_core::schedule::Task;
use kagami_lanes::{write_wav, SampleAvatar, SampleClip};
use kagami_sdk::prelude::*;
use kagami_sdk::{AvatarLoadError, ViewerConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Runs background work immediately, on the calling thread.
struct InlineSpawner;

impl TaskSpawner for InlineSpawner {
    fn spawn(&self, _name: &'static str, task: Task) {
        task();
    }
}

struct Host {
    viewer: Viewer,
    renderer: Arc<HeadlessRenderer>,
    frames: FrameQueue,
    clock: Duration,
}

impl Host {
    fn new(config: ViewerConfig) -> Self {
        Self::with(config, HeadlessRenderer::new(), Arc::new(InlineSpawner))
    }

    fn with(
        config: ViewerConfig,
        renderer: HeadlessRenderer,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        let renderer = Arc::new(renderer);
        let frames = FrameQueue::new();
        let viewer = Viewer::with_defaults(
            config,
            renderer.clone(),
            Box::new(frames.clone()),
            spawner,
        );
        Self {
            viewer,
            renderer,
            frames,
            clock: Duration::ZERO,
        }
    }

    /// Pumps and fires the due frames, 16 ms apart, `count` times.
    fn run_frames(&mut self, count: usize) {
        for _ in 0..count {
            self.viewer.pump();
            for id in self.frames.take_due() {
                self.viewer.on_frame(id, self.clock);
            }
            self.clock += Duration::from_millis(16);
        }
    }
}

fn avatar(title: &str) -> ViewerCommand {
    ViewerCommand::LoadAvatarBytes {
        label: format!("{title}.vrm"),
        data: SampleAvatar::new(VrmVersion::V1)
            .title(title)
            .to_glb()
            .unwrap()
            .into(),
    }
}

#[test]
fn loads_and_renders_an_avatar() {
    // --- 1. ARRANGE ---
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(avatar("Alice"));
    host.viewer.send(ViewerCommand::StartLoop);

    // --- 2. ACT ---
    host.run_frames(3);

    // --- 3. ASSERT ---
    let events = host.viewer.drain_events();
    assert!(matches!(
        &events[..],
        [ViewerEvent::AvatarLoaded {
            label,
            idle_clip_error: Some(ClipLoadError::NotFound(_)),
            ..
        }] if label == "Alice.vrm"
    ));
    let stats = host.renderer.last_stats().unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.triangles, 1);
    assert_eq!(host.renderer.frames_rendered(), 3);
}

#[test]
fn only_the_last_of_two_queued_loads_is_reported() {
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(avatar("First"));
    host.viewer.send(avatar("Second"));

    host.viewer.pump();

    let loaded: Vec<_> = host
        .viewer
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            ViewerEvent::AvatarLoaded { label, .. } => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(loaded, vec!["Second.vrm".to_string()]);
    let active = host.viewer.state().active().unwrap();
    assert_eq!(active.handle.meta().title, "Second");
}

#[test]
fn exhausted_memory_reports_a_failure_and_leaks_nothing() {
    let mut host = Host::with(
        ViewerConfig::default(),
        HeadlessRenderer::with_memory_budget(16),
        Arc::new(InlineSpawner),
    );
    host.viewer.send(avatar("Big"));

    host.viewer.pump();

    assert!(matches!(
        &host.viewer.drain_events()[..],
        [ViewerEvent::AvatarLoadFailed {
            error: AvatarLoadError::ResourceExhausted(_),
            ..
        }]
    ));
    assert!(host.viewer.state().active().is_none());
    assert_eq!(host.renderer.live_resources(), 0);
}

#[test]
fn malformed_bytes_report_a_parse_failure() {
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(ViewerCommand::LoadAvatarBytes {
        label: "junk.vrm".into(),
        data: Arc::from(&b"junk"[..]),
    });

    host.viewer.pump();

    assert!(matches!(
        &host.viewer.drain_events()[..],
        [ViewerEvent::AvatarLoadFailed {
            error: AvatarLoadError::Parse(_),
            ..
        }]
    ));
}

#[test]
fn dispose_releases_everything_and_is_idempotent() {
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(avatar("Alice"));
    host.viewer.send(ViewerCommand::StartLoop);
    host.run_frames(2);
    assert!(host.renderer.live_resources() > 0);
    assert!(!host.frames.is_empty());

    host.viewer.dispose();
    host.viewer.dispose();

    assert!(host.viewer.is_disposed());
    assert_eq!(host.renderer.live_resources(), 0);
    assert!(host.frames.is_empty());
    assert!(host.viewer.state().active().is_none());
    assert!(!host.viewer.state().is_running());
    assert_eq!(host.viewer.on_frame(FrameRequestId(99), Duration::ZERO), None);
}

#[test]
fn dropping_the_viewer_releases_gpu_resources() {
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(avatar("Alice"));
    host.viewer.pump();
    let renderer = host.renderer.clone();
    assert!(renderer.live_resources() > 0);

    drop(host);

    assert_eq!(renderer.live_resources(), 0);
}

#[test]
fn play_animation_without_an_avatar_fails() {
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(ViewerCommand::PlayAnimation("wave".into()));

    host.viewer.pump();

    assert_eq!(
        host.viewer.drain_events(),
        vec![ViewerEvent::AnimationFailed {
            clip: "wave".into(),
            error: ClipLoadError::NoActiveAvatar,
        }]
    );
}

#[test]
fn named_animation_from_the_animations_directory() -> anyhow::Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("idle.vrma"), SampleClip::new("idle").to_glb()?)?;
    std::fs::write(dir.path().join("wave.vrma"), SampleClip::new("wave").to_glb()?)?;
    let mut config = ViewerConfig::default();
    config.assets.animations_dir = Some(dir.path().to_path_buf());
    let mut host = Host::new(config);

    host.viewer.send(avatar("Alice"));
    host.viewer.pump();
    host.viewer.send(ViewerCommand::PlayAnimation("wave".into()));
    host.viewer.pump();

    let events = host.viewer.drain_events();
    assert!(matches!(
        &events[0],
        ViewerEvent::AvatarLoaded {
            idle_clip_error: None,
            ..
        }
    ));
    assert_eq!(
        events[1],
        ViewerEvent::AnimationStarted {
            clip: "wave".into()
        }
    );
    Ok(())
}

#[test]
fn speech_clip_moves_the_mouth() -> anyhow::Result<()> {
    let mut host = Host::new(ViewerConfig::default());
    let tone: Vec<f32> = (0..16_000).map(|i| 0.8 * (i as f32 * 0.3).sin()).collect();
    host.viewer.send(avatar("Alice"));
    host.viewer.send(ViewerCommand::LoadSpeechClip {
        label: "hello.wav".into(),
        data: write_wav(&tone, 16_000)?.into(),
        autoplay: true,
    });
    host.viewer.send(ViewerCommand::StartLoop);

    // 16 ms frames; the window fills after about 130 ms of playback.
    host.run_frames(12);

    assert!(host
        .viewer
        .drain_events()
        .iter()
        .any(|e| matches!(e, ViewerEvent::SpeechClipReady { .. })));
    let sample = host.viewer.state().last_sample().unwrap();
    assert!(sample.volume > 0.9, "volume was {}", sample.volume);

    host.viewer.send(ViewerCommand::StopSpeech);
    host.run_frames(1);
    assert_eq!(host.viewer.state().last_sample().unwrap().volume, 0.0);
    Ok(())
}

#[test]
fn camera_commands_move_the_camera() {
    let mut host = Host::new(ViewerConfig::default());
    host.viewer.send(avatar("Alice"));
    host.viewer.pump();
    let framed = *host.viewer.state().camera();

    host.viewer.send(ViewerCommand::DollyCamera(2.0));
    host.viewer.pump();

    let camera = host.viewer.state().camera();
    assert_eq!(camera.target, framed.target);
    assert!((camera.distance() - 2.0 * framed.distance()).abs() < 1e-4);
}

#[test]
fn default_avatar_comes_from_the_config() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("default.vrm");
    std::fs::write(&path, SampleAvatar::new(VrmVersion::V0).title("Zero").to_glb()?)?;
    let mut config = ViewerConfig::default();
    config.assets.default_avatar = Some(path);
    let mut host = Host::new(config);

    host.viewer.send(ViewerCommand::LoadDefaultAvatar);
    host.viewer.pump();

    let active = host.viewer.state().active().unwrap();
    assert_eq!(active.handle.meta().title, "Zero");
    assert_eq!(active.handle.meta().version, VrmVersion::V0);
    Ok(())
}

#[test]
fn tokio_spawner_completes_loads_in_the_background() -> anyhow::Result<()> {
    let mut host = Host::with(
        ViewerConfig::default(),
        HeadlessRenderer::new(),
        Arc::new(TokioSpawner::new(2)?),
    );
    host.viewer.send(avatar("Async"));

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while events.is_empty() && Instant::now() < deadline {
        host.viewer.pump();
        events = host.viewer.drain_events();
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(matches!(&events[..], [ViewerEvent::AvatarLoaded { .. }]));
    assert_eq!(host.viewer.loads_in_flight(), 0);
    Ok(())
}
