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

//! The viewer facade.

use crate::{ViewerCommand, ViewerConfig, ViewerEvent};
use kagami_agents::animation_agent::{AnimationBinder, ClipLibrary};
use kagami_agents::avatar_load_agent::AvatarLoadAgent;
use kagami_agents::lip_sync_agent::LipSyncAgent;
use kagami_agents::render_agent::RenderLoopDriver;
use kagami_agents::{LoadGeneration, ViewerState};
use kagami_core::audio::AudioTap;
use kagami_core::avatar::{AvatarSource, AvatarSourceLoader};
use kagami_core::emote::EmoteController;
use kagami_core::event::EventBus;
use kagami_core::renderer::{CameraState, FrameStats, SceneRenderer};
use kagami_core::schedule::{FrameRequestId, FrameScheduler, TaskSpawner};
use kagami_lanes::{CameraFramingLane, VisemeEmoteController, VrmLoaderLane};
use std::sync::Arc;
use std::time::Duration;

/// The avatar viewer.
///
/// Everything here runs on the thread that owns the viewer (the render
/// thread). Background work goes through the [`TaskSpawner`] and comes back
/// when [`pump`](Self::pump) runs.
pub struct Viewer {
    config: ViewerConfig,
    state: ViewerState,
    loads: AvatarLoadAgent,
    binder: AnimationBinder,
    lip_sync: LipSyncAgent,
    driver: RenderLoopDriver,
    commands: EventBus<ViewerCommand>,
    events: EventBus<ViewerEvent>,
    disposed: bool,
}

impl Viewer {
    /// Assembles a viewer from its host collaborators.
    pub fn new(
        config: ViewerConfig,
        renderer: Arc<dyn SceneRenderer>,
        scheduler: Box<dyn FrameScheduler>,
        spawner: Arc<dyn TaskSpawner>,
        loader: Arc<dyn AvatarSourceLoader>,
        emote: Box<dyn EmoteController>,
    ) -> Self {
        let framing = CameraFramingLane::new(config.framing);
        let camera = CameraState::new(
            framing.params().default_frame,
            config.framing.fov_y_degrees,
        );
        let state = ViewerState::new(camera, emote);

        let clips = Arc::new(ClipLibrary::new(config.assets.animations_dir.clone()));
        let binder = AnimationBinder::new(
            clips,
            spawner.clone(),
            config.assets.idle_clip.clone(),
        )
        .with_crossfade(config.assets.crossfade_secs);
        let loads = AvatarLoadAgent::new(
            loader,
            renderer.clone(),
            spawner.clone(),
            &binder,
            framing,
        )
        .with_default_avatar(config.assets.default_avatar.clone());
        let lip_sync = LipSyncAgent::new(config.lip_sync, spawner);
        let driver = RenderLoopDriver::new(config.render_loop, renderer, scheduler);

        log::info!("Viewer created");
        Self {
            config,
            state,
            loads,
            binder,
            lip_sync,
            driver,
            commands: EventBus::new(),
            events: EventBus::new(),
            disposed: false,
        }
    }

    /// Assembles a viewer with the built-in VRM loader and viseme emote
    /// controller.
    pub fn with_defaults(
        config: ViewerConfig,
        renderer: Arc<dyn SceneRenderer>,
        scheduler: Box<dyn FrameScheduler>,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        let emote = Box::new(VisemeEmoteController::new(config.emote));
        Self::new(
            config,
            renderer,
            scheduler,
            spawner,
            Arc::new(VrmLoaderLane::new()),
            emote,
        )
    }

    /// The configuration the viewer was built with.
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Read access to the runtime state.
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// The clip cache, for preloading in-memory clips.
    pub fn clips(&self) -> &Arc<ClipLibrary> {
        self.binder.clips()
    }

    /// A sender hosts can move to other threads.
    pub fn command_sender(&self) -> flume::Sender<ViewerCommand> {
        self.commands.sender()
    }

    /// Queues a command for the next [`pump`](Self::pump).
    pub fn send(&self, command: ViewerCommand) {
        self.commands.publish(command);
    }

    /// A receiver for the events the viewer publishes.
    pub fn event_receiver(&self) -> flume::Receiver<ViewerEvent> {
        self.events.receiver().clone()
    }

    /// Takes every event published so far.
    pub fn drain_events(&self) -> Vec<ViewerEvent> {
        self.events.drain()
    }

    /// Number of avatar loads still running.
    pub fn loads_in_flight(&self) -> usize {
        self.loads.in_flight()
    }

    /// Makes a host-fed tap (for example a microphone
    /// [`StreamTap`](kagami_lanes::StreamTap)) the lip-sync source.
    pub fn connect_audio_tap(&mut self, tap: Box<dyn AudioTap>) {
        if self.disposed {
            return;
        }
        self.lip_sync.connect_tap(&mut self.state, tap);
    }

    /// Applies queued commands and finished background work.
    pub fn pump(&mut self) {
        if self.disposed {
            return;
        }
        for command in self.commands.drain() {
            self.handle_command(command);
        }

        let outcomes = self.loads.poll(&mut self.state, &self.binder);
        for event in outcomes.into_iter().filter_map(ViewerEvent::from_load) {
            self.events.publish(event);
        }
        let outcomes = self.binder.poll(&mut self.state);
        for event in outcomes.into_iter().filter_map(ViewerEvent::from_animation) {
            self.events.publish(event);
        }
        let outcomes = self.lip_sync.poll(&mut self.state);
        for event in outcomes.into_iter().filter_map(ViewerEvent::from_speech) {
            self.events.publish(event);
        }
    }

    /// Host frame callback: pumps, then runs one tick if `id` is the frame
    /// the loop is waiting for.
    pub fn on_frame(&mut self, id: FrameRequestId, timestamp: Duration) -> Option<FrameStats> {
        if self.disposed {
            return None;
        }
        self.pump();
        self.driver
            .on_frame(id, timestamp, &mut self.state, &mut self.lip_sync)
    }

    /// Starts loading an avatar and returns the request's generation.
    pub fn load_avatar(&mut self, source: AvatarSource) -> Option<LoadGeneration> {
        if self.disposed {
            return None;
        }
        Some(self.loads.request_load(&mut self.state, source))
    }

    /// Stops the loop and releases every resource. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.driver.stop(&mut self.state);
        let dropped = self.commands.drain().len();
        if dropped > 0 {
            log::debug!("Dropping {} unprocessed commands", dropped);
        }
        self.loads.shutdown(&mut self.state);
        self.lip_sync.shutdown(&mut self.state);
        self.state.teardown();
        log::info!(
            "Viewer disposed ({} resources released)",
            self.state.disposal().released_count()
        );
    }

    /// Returns `true` once [`dispose`](Self::dispose) ran.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn handle_command(&mut self, command: ViewerCommand) {
        log::debug!("Handling {:?}", CommandName(&command));
        match command {
            ViewerCommand::LoadAvatarFile(path) => {
                self.loads
                    .request_load(&mut self.state, AvatarSource::File(path));
            }
            ViewerCommand::LoadAvatarBytes { label, data } => {
                self.loads
                    .request_load(&mut self.state, AvatarSource::Bytes { label, data });
            }
            ViewerCommand::LoadDefaultAvatar => {
                self.loads
                    .request_load(&mut self.state, AvatarSource::Default);
            }
            ViewerCommand::PlayAnimation(name) => {
                if let Err(error) = self.binder.request_clip(&self.state, &name) {
                    log::warn!("Cannot play '{}': {}", name, error);
                    self.events
                        .publish(ViewerEvent::AnimationFailed { clip: name, error });
                }
            }
            ViewerCommand::SetEmotion(tag) => self.state.set_emotion(tag),
            ViewerCommand::LoadSpeechClip {
                label,
                data,
                autoplay,
            } => {
                self.lip_sync.load_speech(label, data, autoplay);
            }
            ViewerCommand::PlaySpeech => {
                if !self.lip_sync.play_speech() {
                    log::warn!("PlaySpeech ignored: no speech clip is loaded");
                }
            }
            ViewerCommand::StopSpeech => {
                self.lip_sync.stop_speech();
            }
            ViewerCommand::OrbitCamera { yaw, pitch } => {
                self.state.camera_mut().orbit(yaw, pitch);
            }
            ViewerCommand::DollyCamera(factor) => self.state.camera_mut().dolly(factor),
            ViewerCommand::StartLoop => self.driver.start(&mut self.state),
            ViewerCommand::StopLoop => self.driver.stop(&mut self.state),
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("state", &self.state)
            .field("loads", &self.loads)
            .field("lip_sync", &self.lip_sync)
            .field("driver", &self.driver)
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Logs a command without its payload bytes.
struct CommandName<'a>(&'a ViewerCommand);

impl std::fmt::Debug for CommandName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            ViewerCommand::LoadAvatarBytes { label, data } => {
                write!(f, "LoadAvatarBytes({label}, {} bytes)", data.len())
            }
            ViewerCommand::LoadSpeechClip { label, data, .. } => {
                write!(f, "LoadSpeechClip({label}, {} bytes)", data.len())
            }
            other => write!(f, "{other:?}"),
        }
    }
}
