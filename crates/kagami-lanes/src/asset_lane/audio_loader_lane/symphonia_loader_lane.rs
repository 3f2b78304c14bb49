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
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

/// Decodes compressed speech clips (MP3, OGG/Vorbis, FLAC, AAC, ...) with
/// `symphonia`, mixed down to mono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaLoaderLane;

impl SymphoniaLoaderLane {
    /// Creates a new instance of `SymphoniaLoaderLane`.
    pub fn new() -> Self {
        Self
    }
}

impl AssetLoaderLane<SoundData> for SymphoniaLoaderLane {
    fn load(&self, bytes: &[u8]) -> Result<SoundData, Box<dyn Error + Send + Sync>> {
        let source =
            MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let probed = symphonia::default::get_probe().format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("No decodable audio track"))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("Unknown sample rate"))?;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;
        let mut skipped = 0usize;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Box::new(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    log::trace!("Skipping corrupt packet: {}", reason);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(Box::new(e)),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let frames = decoded.capacity();
            if scratch
                .as_ref()
                .map_or(true, |buf| buf.capacity() < frames * channels)
            {
                scratch = Some(SampleBuffer::new(frames as u64, spec));
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            downmix_into(buf.samples(), channels, &mut samples);
        }

        if skipped > 0 {
            log::warn!("Skipped {} corrupt audio packets", skipped);
        }
        if samples.is_empty() {
            return Err(anyhow!("Audio stream contains no samples").into());
        }

        Ok(SoundData {
            samples,
            channels: 1,
            sample_rate,
        })
    }
}

impl Lane for SymphoniaLoaderLane {
    fn strategy_name(&self) -> &'static str {
        "SymphoniaLoader"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Asset
    }
}
