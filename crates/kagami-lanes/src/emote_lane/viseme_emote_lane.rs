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

//! A default emote controller: volume opens the mouth, emotion commands hold a
//! facial preset for a while and then relax back to neutral.

use kagami_core::avatar::{ExpressionPreset, ExpressionTable, ExpressionWeights};
use kagami_core::emote::{EmoteController, EmotionTag};
use kagami_core::{Lane, LaneKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const EMOTIONS: [ExpressionPreset; 5] = [
    ExpressionPreset::Happy,
    ExpressionPreset::Angry,
    ExpressionPreset::Sad,
    ExpressionPreset::Relaxed,
    ExpressionPreset::Surprised,
];

/// Timing and gain of the default emote controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmoteParams {
    /// Multiplier applied to the lip-sync volume before it drives `aa`.
    pub mouth_gain: f32,
    /// Seconds an emotion stays at full weight.
    pub hold_secs: f32,
    /// Seconds it takes to fade back to neutral afterwards.
    pub fade_secs: f32,
}

impl Default for EmoteParams {
    fn default() -> Self {
        Self {
            mouth_gain: 1.0,
            hold_secs: 3.0,
            fade_secs: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveEmotion {
    preset: ExpressionPreset,
    remaining_hold: f32,
    weight: f32,
}

/// Maps volume to the `aa` viseme and emotion tags to emotion presets.
///
/// Expressions the avatar does not define are never written.
#[derive(Debug, Clone, Default)]
pub struct VisemeEmoteController {
    params: EmoteParams,
    available: HashSet<String>,
    emotion: Option<ActiveEmotion>,
}

impl VisemeEmoteController {
    /// Creates a controller with the given timing.
    pub fn new(params: EmoteParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// The emotion currently shown and its weight.
    pub fn current_emotion(&self) -> Option<(ExpressionPreset, f32)> {
        self.emotion.map(|e| (e.preset, e.weight))
    }

    fn set_if_available(&self, weights: &mut ExpressionWeights, name: &str, weight: f32) {
        if self.available.contains(name) {
            weights.set(name, weight);
        }
    }

    fn apply_command(&mut self, tag: &EmotionTag) {
        if tag.as_str() == ExpressionPreset::Neutral.name() {
            self.emotion = None;
            return;
        }
        match EMOTIONS.iter().find(|preset| preset.name() == tag.as_str()) {
            Some(&preset) if self.available.contains(preset.name()) => {
                self.emotion = Some(ActiveEmotion {
                    preset,
                    remaining_hold: self.params.hold_secs,
                    weight: 1.0,
                });
            }
            Some(_) => log::debug!("Avatar has no '{tag}' expression, ignoring"),
            None => log::warn!("Unknown emotion '{tag}', ignoring"),
        }
    }

    fn decay(&mut self, dt: f32) {
        let Some(emotion) = &mut self.emotion else {
            return;
        };
        if emotion.remaining_hold > 0.0 {
            emotion.remaining_hold -= dt;
            return;
        }
        emotion.weight = if self.params.fade_secs > 0.0 {
            emotion.weight - dt / self.params.fade_secs
        } else {
            0.0
        };
        if emotion.weight <= 0.0 {
            self.emotion = None;
        }
    }
}

impl EmoteController for VisemeEmoteController {
    fn bind_expressions(&mut self, table: &ExpressionTable) {
        self.available = table.names().into_iter().map(str::to_string).collect();
        self.emotion = None;
        log::debug!(
            "Emote controller bound to {} expressions",
            self.available.len()
        );
    }

    fn update(
        &mut self,
        volume: f32,
        emotion: Option<&EmotionTag>,
        dt: f32,
        weights: &mut ExpressionWeights,
    ) {
        if let Some(tag) = emotion {
            self.apply_command(tag);
        } else {
            self.decay(dt.max(0.0));
        }

        let mouth = (volume * self.params.mouth_gain).clamp(0.0, 1.0);
        self.set_if_available(weights, ExpressionPreset::Aa.name(), mouth);

        for preset in EMOTIONS {
            let weight = match self.emotion {
                Some(active) if active.preset == preset => active.weight,
                _ => 0.0,
            };
            self.set_if_available(weights, preset.name(), weight);
        }
    }
}

impl Lane for VisemeEmoteController {
    fn strategy_name(&self) -> &'static str {
        "VisemeEmote"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Expression
    }
}
