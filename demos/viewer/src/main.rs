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

// Headless avatar viewer demo.
// Run with: cargo run -p kagami-viewer -- [model.vrm] --frames 240

use anyhow::{Context, Result};
use clap::Parser;
use kagami_core::avatar::VrmVersion;
use kagami_core::emote::EmotionTag;
use kagami_core::schedule::TaskSpawner;
use kagami_lanes::{AssetLoaderLane, ClipLoaderLane, SampleAvatar, SampleClip};
use kagami_sdk::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long to wait for the first avatar before rendering anyway.
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "kagami-viewer", version)]
#[command(about = "Loads a VRM avatar and renders it headlessly")]
struct Cli {
    /// VRM model to load. A built-in sample avatar is used when omitted.
    avatar: Option<PathBuf>,

    /// Viewer configuration file (RON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames to render.
    #[arg(long, default_value_t = 120)]
    frames: u32,

    /// Refresh rate of the simulated display.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Emotion to show once the avatar is on screen.
    #[arg(long)]
    emotion: Option<String>,

    /// Speech clip driving the mouth (WAV, MP3, OGG, FLAC...).
    #[arg(long)]
    speech: Option<PathBuf>,

    /// Animation to crossfade to halfway through.
    #[arg(long)]
    animation: Option<String>,

    /// GPU memory budget of the headless renderer, in bytes.
    #[arg(long)]
    memory_budget: Option<u64>,

    /// Run background work on plain threads instead of the tokio pool.
    #[arg(long)]
    threads: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if cli.print_config {
        println!("{}", config.to_ron_string()?);
        return Ok(());
    }

    let renderer = Arc::new(match cli.memory_budget {
        Some(bytes) => HeadlessRenderer::with_memory_budget(bytes),
        None => HeadlessRenderer::new(),
    });
    let spawner: Arc<dyn TaskSpawner> = if cli.threads {
        Arc::new(ThreadSpawner)
    } else {
        Arc::new(TokioSpawner::new(2).context("failed to start the worker runtime")?)
    };
    let frames = FrameQueue::new();
    let uses_sample_clips = config.assets.animations_dir.is_none();
    let mut viewer = Viewer::with_defaults(
        config,
        renderer.clone(),
        Box::new(frames.clone()),
        spawner,
    );

    if uses_sample_clips {
        preload_sample_clips(&viewer)?;
    }

    viewer.send(load_command(cli.avatar.as_ref())?);
    if let Some(path) = &cli.speech {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read speech clip {}", path.display()))?;
        viewer.send(ViewerCommand::LoadSpeechClip {
            label: path.display().to_string(),
            data: data.into(),
            autoplay: true,
        });
    }
    wait_for_load(&mut viewer)?;

    if let Some(emotion) = &cli.emotion {
        viewer.send(ViewerCommand::SetEmotion(EmotionTag::new(emotion)));
    }
    viewer.send(ViewerCommand::StartLoop);

    let frame_time = Duration::from_secs_f64(1.0 / f64::from(cli.fps.max(1)));
    let mut clock = Duration::ZERO;
    for frame in 0..cli.frames {
        if frame == cli.frames / 2 {
            if let Some(name) = &cli.animation {
                viewer.send(ViewerCommand::PlayAnimation(name.clone()));
            }
        }
        viewer.pump();
        for id in frames.take_due() {
            viewer.on_frame(id, clock);
        }
        report_events(&viewer);
        clock += frame_time;
    }

    let volume = viewer.state().last_sample().map_or(0.0, |s| s.volume);
    log::info!("--- Summary ---");
    log::info!("  Frames rendered: {}", renderer.frames_rendered());
    if let Some(stats) = renderer.last_stats() {
        log::info!(
            "  Last frame: {} draw calls, {} triangles",
            stats.draw_calls,
            stats.triangles
        );
    }
    log::info!("  Last mouth volume: {:.3}", volume);
    log::info!(
        "  GPU memory: {:.1} KB (peak {:.1} KB)",
        renderer.used_bytes() as f64 / 1024.0,
        renderer.peak_bytes() as f64 / 1024.0
    );

    viewer.dispose();
    log::info!(
        "  Live resources after dispose: {}",
        renderer.live_resources()
    );
    Ok(())
}

fn load_command(path: Option<&PathBuf>) -> Result<ViewerCommand> {
    Ok(match path {
        Some(path) => ViewerCommand::LoadAvatarFile(path.clone()),
        None => {
            log::info!("No model given, using the built-in sample avatar");
            ViewerCommand::LoadAvatarBytes {
                label: "sample.vrm".to_string(),
                data: SampleAvatar::new(VrmVersion::V1)
                    .title("Kagami Sample")
                    .with_texture()
                    .to_glb()?
                    .into(),
            }
        }
    })
}

fn preload_sample_clips(viewer: &Viewer) -> Result<()> {
    let loader = ClipLoaderLane::new();
    for clip in [
        SampleClip::new("idle").duration(3.0).yaw_degrees(10.0),
        SampleClip::new("nod").duration(1.0).yaw_degrees(35.0),
    ] {
        let decoded = loader.load(&clip.to_glb()?).map_err(|e| anyhow::anyhow!(e))?;
        viewer.clips().insert(decoded);
    }
    Ok(())
}

fn wait_for_load(viewer: &mut Viewer) -> Result<()> {
    let deadline = Instant::now() + LOAD_TIMEOUT;
    loop {
        viewer.pump();
        report_events(viewer);
        if viewer.loads_in_flight() == 0 {
            return Ok(());
        }
        if Instant::now() > deadline {
            anyhow::bail!("avatar did not load within {:?}", LOAD_TIMEOUT);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn report_events(viewer: &Viewer) {
    for event in viewer.drain_events() {
        match event {
            ViewerEvent::AvatarLoaded {
                avatar,
                label,
                idle_clip_error,
                ..
            } => {
                log::info!("{} loaded from '{}'", avatar, label);
                if let Some(error) = idle_clip_error {
                    log::warn!("  no idle animation: {}", error);
                }
            }
            ViewerEvent::AvatarLoadFailed { label, error, .. } => {
                log::error!("Could not load '{}': {}", label, error);
            }
            ViewerEvent::AnimationStarted { clip } => log::info!("Playing '{}'", clip),
            ViewerEvent::AnimationFailed { clip, error } => {
                log::warn!("Could not play '{}': {}", clip, error);
            }
            ViewerEvent::SpeechClipReady { label, duration } => {
                log::info!("Speech '{}' ready ({:.2}s)", label, duration.as_secs_f32());
            }
            ViewerEvent::SpeechClipFailed(error) => log::warn!("{}", error),
        }
    }
}
