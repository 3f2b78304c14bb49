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

//! The contract of the emote controller, which turns the lip-sync volume and
//! emotion commands into expression weights.

use crate::avatar::{ExpressionTable, ExpressionWeights};
use std::fmt;

/// A discrete emotion command (`"happy"`, `"angry"`, ...), normalised to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmotionTag(String);

impl EmotionTag {
    /// Creates a tag, trimming whitespace and lowercasing.
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmotionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes expression weights from the per-tick signals.
///
/// The viewer makes no assumption about how weights are derived.
pub trait EmoteController {
    /// Called once each time an avatar becomes active.
    fn bind_expressions(&mut self, table: &ExpressionTable);

    /// Called once per tick while an avatar is active.
    ///
    /// `volume` is in `[0, 1]`; `emotion` carries a command issued since the
    /// previous tick, if any; `dt` is the elapsed time in seconds.
    fn update(
        &mut self,
        volume: f32,
        emotion: Option<&EmotionTag>,
        dt: f32,
        weights: &mut ExpressionWeights,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_is_normalised() {
        assert_eq!(EmotionTag::new("  Happy ").as_str(), "happy");
        assert_eq!(EmotionTag::new("ANGRY"), EmotionTag::new("angry"));
    }
}
