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

use crate::worker::run_contained;
use crate::ViewerState;
use crossbeam_channel::{Receiver, Sender};
use kagami_core::audio::{AudioAnalysisSample, AudioTap, SoundData};
use kagami_core::schedule::TaskSpawner;
use kagami_lanes::{
    AssetLoaderLane, AudioLoaderLane, ClipPlaybackTap, LipSyncAnalyzer, LipSyncParams,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A speech clip could not be decoded.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to decode speech clip '{label}': {details}")]
pub struct AudioDecodeError {
    /// Label of the clip.
    pub label: String,
    /// Decoder error message.
    pub details: String,
}

/// Identifies one speech or tap request. Later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeechRequestId(pub u64);

impl fmt::Display for SpeechRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speech#{}", self.0)
    }
}

/// Result of a [`LipSyncAgent::load_speech`] request.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechOutcome {
    /// The clip is connected as the audio source.
    Ready {
        /// The request.
        request: SpeechRequestId,
        /// Clip label.
        label: String,
        /// Clip length.
        duration: Duration,
    },
    /// The bytes could not be decoded. The previous source stays.
    Failed {
        /// The request.
        request: SpeechRequestId,
        /// The cause.
        error: AudioDecodeError,
    },
    /// Another source was requested while this clip was decoding.
    Stale {
        /// The request.
        request: SpeechRequestId,
    },
}

enum TapSlot {
    Speech(ClipPlaybackTap),
    External(Box<dyn AudioTap>),
}

impl TapSlot {
    fn tap(&self) -> &dyn AudioTap {
        match self {
            TapSlot::Speech(tap) => tap,
            TapSlot::External(tap) => tap.as_ref(),
        }
    }

    fn tap_mut(&mut self) -> &mut dyn AudioTap {
        match self {
            TapSlot::Speech(tap) => tap,
            TapSlot::External(tap) => tap.as_mut(),
        }
    }
}

struct SpeechCompletion {
    request: SpeechRequestId,
    label: String,
    autoplay: bool,
    result: Result<SoundData, AudioDecodeError>,
}

/// Owns the connected audio tap and samples it once per frame.
///
/// At most one tap is connected. Connecting another, or a decoded speech
/// clip arriving, disposes the previous one through the viewer's disposal
/// coordinator.
pub struct LipSyncAgent {
    analyzer: LipSyncAnalyzer,
    slot: Option<TapSlot>,
    decoder: AudioLoaderLane,
    spawner: Arc<dyn TaskSpawner>,
    sender: Sender<SpeechCompletion>,
    receiver: Receiver<SpeechCompletion>,
    latest_request: SpeechRequestId,
}

impl LipSyncAgent {
    /// Creates an agent with no tap connected.
    pub fn new(params: LipSyncParams, spawner: Arc<dyn TaskSpawner>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            analyzer: LipSyncAnalyzer::new(params),
            slot: None,
            decoder: AudioLoaderLane::new(),
            spawner,
            sender,
            receiver,
            latest_request: SpeechRequestId(0),
        }
    }

    /// The analyzer.
    pub fn analyzer(&self) -> &LipSyncAnalyzer {
        &self.analyzer
    }

    /// Returns `true` while an audio source is connected.
    pub fn is_connected(&self) -> bool {
        self.slot.is_some()
    }

    /// Connects a host-provided tap, such as a [`StreamTap`](kagami_lanes::StreamTap).
    /// Pending speech decodes become stale.
    pub fn connect_tap(&mut self, state: &mut ViewerState, tap: Box<dyn AudioTap>) {
        self.next_request();
        self.replace_slot(state, Some(TapSlot::External(tap)));
    }

    /// Disconnects and disposes the current tap. The mouth reads silence
    /// from the next frame on.
    pub fn disconnect(&mut self, state: &mut ViewerState) {
        self.next_request();
        self.replace_slot(state, None);
    }

    /// Decodes a speech clip on the task spawner. When it arrives it replaces
    /// the current source; with `autoplay` it starts playing right away.
    pub fn load_speech(
        &mut self,
        label: impl Into<String>,
        bytes: Arc<[u8]>,
        autoplay: bool,
    ) -> SpeechRequestId {
        let request = self.next_request();
        let label = label.into();
        let decoder = self.decoder;
        let sender = self.sender.clone();
        self.spawner.spawn(
            "speech-decode",
            Box::new(move || {
                let result = run_contained("speech-decode", || {
                    decoder.load(&bytes).map_err(|e| e.to_string())
                })
                .unwrap_or_else(|message| Err(format!("decoder crashed: {message}")))
                .map_err(|details| AudioDecodeError {
                    label: label.clone(),
                    details,
                });
                if sender
                    .send(SpeechCompletion {
                        request,
                        label,
                        autoplay,
                        result,
                    })
                    .is_err()
                {
                    log::debug!("Lip-sync agent gone, dropping {}", request);
                }
            }),
        );
        request
    }

    /// Connects every decoded clip that is still the latest request.
    pub fn poll(&mut self, state: &mut ViewerState) -> Vec<SpeechOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            outcomes.push(self.complete(state, completion));
        }
        outcomes
    }

    /// Starts or resumes the speech clip. Returns `false` if the connected
    /// source is not a speech clip.
    pub fn play_speech(&mut self) -> bool {
        self.with_speech(ClipPlaybackTap::play)
    }

    /// Pauses the speech clip.
    pub fn pause_speech(&mut self) -> bool {
        self.with_speech(ClipPlaybackTap::pause)
    }

    /// Stops and rewinds the speech clip.
    pub fn stop_speech(&mut self) -> bool {
        self.with_speech(ClipPlaybackTap::stop)
    }

    /// Playback position of the speech clip, if one is connected.
    pub fn speech_position(&self) -> Option<Duration> {
        match &self.slot {
            Some(TapSlot::Speech(tap)) => Some(tap.position()),
            _ => None,
        }
    }

    /// Moves the tap's clock forward by one frame.
    pub fn advance(&mut self, elapsed: Duration) {
        if let Some(slot) = &mut self.slot {
            slot.tap_mut().advance(elapsed);
        }
    }

    /// Produces this frame's volume. Without a tap the result is silence.
    pub fn sample(&mut self, timestamp: Duration) -> AudioAnalysisSample {
        let tap = self.slot.as_ref().map(TapSlot::tap);
        self.analyzer.sample(tap, timestamp)
    }

    /// Disposes the connected tap and ignores decodes still in flight.
    pub fn shutdown(&mut self, state: &mut ViewerState) {
        self.disconnect(state);
        while self.receiver.try_recv().is_ok() {}
    }

    fn complete(&mut self, state: &mut ViewerState, completion: SpeechCompletion) -> SpeechOutcome {
        let SpeechCompletion {
            request,
            label,
            autoplay,
            result,
        } = completion;

        if request != self.latest_request {
            log::debug!("Discarding speech clip '{}' ({})", label, request);
            return SpeechOutcome::Stale { request };
        }

        match result {
            Ok(sound) => {
                let mut tap = ClipPlaybackTap::new(&sound);
                if autoplay {
                    tap.play();
                }
                let duration = tap.duration();
                log::info!(
                    "Speech clip '{}' ready ({:.2}s, {} Hz)",
                    label,
                    duration.as_secs_f32(),
                    sound.sample_rate
                );
                self.replace_slot(state, Some(TapSlot::Speech(tap)));
                SpeechOutcome::Ready {
                    request,
                    label,
                    duration,
                }
            }
            Err(error) => {
                log::warn!("{}", error);
                SpeechOutcome::Failed { request, error }
            }
        }
    }

    fn next_request(&mut self) -> SpeechRequestId {
        self.latest_request = SpeechRequestId(self.latest_request.0 + 1);
        self.latest_request
    }

    fn replace_slot(&mut self, state: &mut ViewerState, slot: Option<TapSlot>) {
        if let Some(mut previous) = std::mem::replace(&mut self.slot, slot) {
            state.dispose(previous.tap_mut());
        }
    }

    fn with_speech(&mut self, f: impl FnOnce(&mut ClipPlaybackTap)) -> bool {
        match &mut self.slot {
            Some(TapSlot::Speech(tap)) => {
                f(tap);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for LipSyncAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LipSyncAgent")
            .field("analyzer", &self.analyzer)
            .field("connected", &self.is_connected())
            .field("latest_request", &self.latest_request)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kagami_core::math::Vec3;
    use kagami_core::renderer::{CameraFrame, CameraState};
    use kagami_core::schedule::Task;
    use kagami_lanes::{write_wav, StreamTap, VisemeEmoteController};

    struct InlineSpawner;

    impl TaskSpawner for InlineSpawner {
        fn spawn(&self, _name: &'static str, task: Task) {
            task();
        }
    }

    fn state() -> ViewerState {
        let frame = CameraFrame {
            position: Vec3::new(0.0, 1.4, 1.5),
            target: Vec3::new(0.0, 1.3, 0.0),
        };
        ViewerState::new(
            CameraState::new(frame, 30.0),
            Box::new(VisemeEmoteController::default()),
        )
    }

    fn agent() -> LipSyncAgent {
        LipSyncAgent::new(LipSyncParams::default(), Arc::new(InlineSpawner))
    }

    fn tone(seconds: f32, amplitude: f32) -> Arc<[u8]> {
        let rate = 16_000;
        let samples: Vec<f32> = (0..(seconds * rate as f32) as usize)
            .map(|i| amplitude * (i as f32 * 0.3).sin())
            .collect();
        write_wav(&samples, rate).unwrap().into()
    }

    #[test]
    fn no_tap_reads_as_silence() {
        let mut agent = agent();
        let sample = agent.sample(Duration::from_millis(5));
        assert_eq!(sample.volume, 0.0);
        assert_eq!(sample.timestamp, Duration::from_millis(5));
    }

    #[test]
    fn speech_clip_opens_the_mouth_while_playing() {
        let mut state = state();
        let mut agent = agent();

        agent.load_speech("hello", tone(1.0, 0.8), true);
        let outcomes = agent.poll(&mut state);
        assert!(matches!(outcomes.as_slice(), [SpeechOutcome::Ready { .. }]));

        agent.advance(Duration::from_millis(200));
        assert!(agent.sample(Duration::ZERO).volume > 0.9);

        assert!(agent.stop_speech());
        assert_eq!(agent.sample(Duration::ZERO).volume, 0.0);
    }

    #[test]
    fn clip_without_autoplay_waits_for_play() {
        let mut state = state();
        let mut agent = agent();

        agent.load_speech("hello", tone(1.0, 0.8), false);
        agent.poll(&mut state);
        agent.advance(Duration::from_millis(200));
        assert_eq!(agent.speech_position(), Some(Duration::ZERO));

        agent.play_speech();
        agent.advance(Duration::from_millis(200));
        assert_eq!(agent.speech_position(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn undecodable_speech_keeps_previous_source() {
        let mut state = state();
        let mut agent = agent();
        let (tap, _feed) = StreamTap::new(64, 1);
        agent.connect_tap(&mut state, Box::new(tap));

        agent.load_speech("noise", Arc::from(&b"not audio"[..]), true);
        let outcomes = agent.poll(&mut state);

        assert!(matches!(outcomes.as_slice(), [SpeechOutcome::Failed { .. }]));
        assert!(agent.is_connected());
        assert!(!agent.play_speech());
    }

    #[test]
    fn older_decode_is_stale() {
        let mut state = state();
        let mut agent = agent();

        let first = agent.load_speech("first", tone(0.5, 0.8), true);
        let second = agent.load_speech("second", tone(0.25, 0.8), true);
        let outcomes = agent.poll(&mut state);

        assert_eq!(outcomes[0], SpeechOutcome::Stale { request: first });
        assert!(matches!(
            &outcomes[1],
            SpeechOutcome::Ready { request, .. } if *request == second
        ));
    }

    #[test]
    fn replacing_a_tap_disposes_the_old_one() {
        let mut state = state();
        let mut agent = agent();
        let (first, feed) = StreamTap::new(64, 1);
        let (second, _) = StreamTap::new(64, 1);

        agent.connect_tap(&mut state, Box::new(first));
        agent.connect_tap(&mut state, Box::new(second));

        assert!(!feed.is_connected());
        assert_eq!(state.disposal().released_count(), 1);

        agent.shutdown(&mut state);
        assert!(!agent.is_connected());
        assert_eq!(state.disposal().released_count(), 2);
    }
}
