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

//! Turns raw audio into a mouth-open signal.
//!
//! Each sample reads the most recent window from the connected tap, takes the
//! peak absolute amplitude, squashes it with a logistic curve and gates the
//! result with a dead zone so silence yields exactly zero.

use kagami_core::audio::{AnalyzerUnavailable, AudioAnalysisSample, AudioTap};
use kagami_core::{Lane, LaneKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning of the amplitude-to-volume curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncParams {
    /// Number of samples inspected per analysis. Allocated once.
    pub window_size: usize,
    /// Logistic steepness `k`.
    pub steepness: f32,
    /// Logistic bias `b`.
    pub bias: f32,
    /// Squashed values below this threshold become exactly `0`.
    pub dead_zone: f32,
}

impl LipSyncParams {
    /// Volume the curve assigns to a silent window before the dead zone.
    /// Tunings where this reaches the dead zone leave the mouth open on
    /// background noise.
    pub fn silence_level(&self) -> f32 {
        squash(0.0, self.steepness, self.bias)
    }
}

impl Default for LipSyncParams {
    fn default() -> Self {
        Self {
            window_size: 2048,
            steepness: 45.0,
            bias: 5.0,
            dead_zone: 0.1,
        }
    }
}

/// Peak absolute amplitude of a window. Non-finite samples count as silence.
pub fn peak_amplitude(window: &[f32]) -> f32 {
    window
        .iter()
        .map(|s| if s.is_finite() { s.abs() } else { 0.0 })
        .fold(0.0, f32::max)
}

/// `1 / (1 + e^(-k·peak + b))`.
pub fn squash(peak: f32, steepness: f32, bias: f32) -> f32 {
    1.0 / (1.0 + (-steepness * peak + bias).exp())
}

/// The lip-sync analyzer. Owns its sample window; never blocks.
#[derive(Debug, Clone)]
pub struct LipSyncAnalyzer {
    params: LipSyncParams,
    window: Vec<f32>,
}

impl LipSyncAnalyzer {
    /// Creates an analyzer and allocates its window.
    pub fn new(params: LipSyncParams) -> Self {
        let window = vec![0.0; params.window_size.max(1)];
        Self { params, window }
    }

    /// The active tuning.
    pub fn params(&self) -> &LipSyncParams {
        &self.params
    }

    /// Length of the analysis window in samples.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Maps a window of samples to a volume in `[0, 1]`.
    pub fn volume_of(&self, window: &[f32]) -> f32 {
        let peak = peak_amplitude(window);
        if peak == 0.0 {
            return 0.0;
        }
        let v = squash(peak, self.params.steepness, self.params.bias);
        if !v.is_finite() || v < self.params.dead_zone {
            0.0
        } else {
            v.min(1.0)
        }
    }

    /// Reads the latest window from `tap` and computes the volume.
    ///
    /// Fails with [`AnalyzerUnavailable`] when no tap is connected.
    pub fn analyze(
        &mut self,
        tap: Option<&dyn AudioTap>,
        timestamp: Duration,
    ) -> Result<AudioAnalysisSample, AnalyzerUnavailable> {
        let tap = tap.ok_or(AnalyzerUnavailable)?;
        if !tap.fill_window(&mut self.window) {
            return Err(AnalyzerUnavailable);
        }
        Ok(AudioAnalysisSample {
            volume: self.volume_of(&self.window),
            timestamp,
        })
    }

    /// Like [`analyze`](Self::analyze), but an unavailable tap reads as silence.
    pub fn sample(&mut self, tap: Option<&dyn AudioTap>, timestamp: Duration) -> AudioAnalysisSample {
        self.analyze(tap, timestamp)
            .unwrap_or_else(|AnalyzerUnavailable| AudioAnalysisSample::silent(timestamp))
    }
}

impl Default for LipSyncAnalyzer {
    fn default() -> Self {
        Self::new(LipSyncParams::default())
    }
}

impl Lane for LipSyncAnalyzer {
    fn strategy_name(&self) -> &'static str {
        "LipSync"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Audio
    }
}
