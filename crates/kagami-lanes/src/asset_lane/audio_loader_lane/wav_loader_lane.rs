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

use super::downmix_into;
use crate::asset_lane::AssetLoaderLane;
use anyhow::anyhow;
use kagami_core::audio::SoundData;
use kagami_core::{Lane, LaneKind};
use std::{error::Error, io::Cursor};

/// Decodes RIFF/WAVE speech clips with `hound`. Every channel is mixed down
/// to mono, which is all the lip-sync analyzer looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavLoaderLane;

impl WavLoaderLane {
    /// Creates a new instance of `WavLoaderLane`.
    pub fn new() -> Self {
        Self
    }
}

impl AssetLoaderLane<SoundData> for WavLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<SoundData, Box<dyn Error + Send + Sync>> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(anyhow!(
                "WAV header declares {} channels at {} Hz",
                spec.channels,
                spec.sample_rate
            )
            .into());
        }

        // The header's sample count is untrusted; the payload bounds it.
        let bytes_per_sample = usize::from(spec.bits_per_sample.div_ceil(8).max(1));
        let declared = reader.len() as usize;
        let mut interleaved = Vec::with_capacity(declared.min(bytes.len() / bytes_per_sample));
        match spec.sample_format {
            hound::SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    interleaved.push(sample?);
                }
            }
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << spec.bits_per_sample.saturating_sub(1)) as f32;
                for sample in reader.samples::<i32>() {
                    interleaved.push(sample? as f32 / full_scale);
                }
            }
        }

        let channels = usize::from(spec.channels);
        let mut samples = Vec::with_capacity(interleaved.len() / channels);
        downmix_into(&interleaved, channels, &mut samples);
        log::debug!(
            "Decoded WAV: {} frames, {} channel(s) at {} Hz",
            samples.len(),
            channels,
            spec.sample_rate
        );

        Ok(SoundData {
            samples,
            channels: 1,
            sample_rate: spec.sample_rate,
        })
    }
}

impl Lane for WavLoaderLane {
    fn strategy_name(&self) -> &'static str {
        "WavLoader"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Asset
    }
}
