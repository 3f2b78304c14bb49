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

//! Audio analysis contracts for lip-sync.

use crate::disposal::Disposable;
use std::time::Duration;
use thiserror::Error;

/// The lip-sync signal for one render tick. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioAnalysisSample {
    /// Mouth-open volume in `[0, 1]`.
    pub volume: f32,
    /// Host timestamp of the tick the sample was computed for.
    pub timestamp: Duration,
}

impl AudioAnalysisSample {
    /// A silent sample at `timestamp`.
    pub fn silent(timestamp: Duration) -> Self {
        Self {
            volume: 0.0,
            timestamp,
        }
    }
}

/// Returned when lip-sync is sampled with no connected audio tap.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("audio analyzer has no connected tap")]
pub struct AnalyzerUnavailable;

/// An analysis tap attached to an audio source.
///
/// A tap only observes audio: it never routes samples to an output device.
pub trait AudioTap: Disposable + Send {
    /// Copies the most recent mono samples into `window`, oldest first.
    ///
    /// Missing history is zero-filled. Returns `false` if the tap is not
    /// connected to a source. Must not block.
    fn fill_window(&self, window: &mut [f32]) -> bool;

    /// Moves the tap's playback clock forward by one render tick.
    ///
    /// Live taps follow the capture device and ignore this.
    fn advance(&mut self, _elapsed: Duration) {}
}

/// Decoded audio, ready for analysis or playback.
#[derive(Debug, Clone)]
pub struct SoundData {
    /// The raw, interleaved audio samples in `[-1.0, 1.0]`.
    /// For stereo, samples are ordered `[L, R, L, R, ...]`.
    pub samples: Vec<f32>,
    /// The number of channels in the audio data (e.g., 1 for mono, 2 for stereo).
    pub channels: u16,
    /// The number of samples per second (e.g., 44100 Hz).
    pub sample_rate: u32,
}

impl SoundData {
    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        match self.channels {
            0 => 0,
            c => self.samples.len() / c as usize,
        }
    }

    /// Duration of the clip.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Averages all channels into one mono track.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}
