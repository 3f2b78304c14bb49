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

//! Speech audio decoding lanes.

mod symphonia_loader_lane;
mod wav_loader_lane;

pub use symphonia_loader_lane::*;
pub use wav_loader_lane::*;

use super::AssetLoaderLane;
use kagami_core::audio::SoundData;
use kagami_core::{Lane, LaneKind};
use std::error::Error;

/// Picks a decoder by sniffing the container: RIFF/WAVE goes through
/// [`WavLoaderLane`], everything else through [`SymphoniaLoaderLane`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioLoaderLane {
    wav: WavLoaderLane,
    symphonia: SymphoniaLoaderLane,
}

impl AudioLoaderLane {
    /// Creates a new instance of `AudioLoaderLane`.
    pub fn new() -> Self {
        Self::default()
    }

    fn is_wav(bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
    }
}

impl AssetLoaderLane<SoundData> for AudioLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<SoundData, Box<dyn Error + Send + Sync>> {
        if Self::is_wav(bytes) {
            self.wav.load(bytes)
        } else {
            self.symphonia.load(bytes)
        }
    }
}

/// Averages interleaved frames into `out`. A trailing partial frame is
/// dropped.
pub(super) fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

impl Lane for AudioLoaderLane {
    fn strategy_name(&self) -> &'static str {
        "AudioLoader"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Asset
    }
}
