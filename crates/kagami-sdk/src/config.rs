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

//! Viewer configuration, loaded from RON or built in code.

use kagami_agents::render_agent::RenderLoopConfig;
use kagami_lanes::{EmoteParams, FramingParams, LipSyncParams, DEFAULT_CROSSFADE_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An error raised while reading or validating a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config file '{path}': {details}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying I/O error.
        details: String,
    },
    /// The text is not valid RON for a [`ViewerConfig`].
    #[error("invalid config: {0}")]
    Parse(String),
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    /// A value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Where the viewer finds its files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Model loaded by `LoadDefaultAvatar`.
    pub default_avatar: Option<PathBuf>,
    /// Directory holding `<name>.vrma` / `<name>.glb` animation clips.
    pub animations_dir: Option<PathBuf>,
    /// Clip every avatar starts with.
    pub idle_clip: String,
    /// Crossfade duration of `PlayAnimation`, in seconds.
    pub crossfade_secs: f32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            default_avatar: None,
            animations_dir: None,
            idle_clip: "idle".to_string(),
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
        }
    }
}

/// Complete viewer configuration. Every section falls back to its defaults
/// when omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Lip-sync analyzer tuning.
    pub lip_sync: LipSyncParams,
    /// Camera framing offsets.
    pub framing: FramingParams,
    /// Render loop tuning.
    pub render_loop: RenderLoopConfig,
    /// Default emote controller tuning.
    pub emote: EmoteParams,
    /// File locations.
    pub assets: AssetConfig,
}

impl ViewerConfig {
    /// Parses and validates RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig =
            ron::de::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a RON file. Relative asset paths are resolved against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        let mut config = Self::from_ron_str(&text)?;
        if let Some(base) = path.parent() {
            config.assets.resolve_relative_to(base);
        }
        log::info!("Loaded viewer config from {}", path.display());
        Ok(config)
    }

    /// Renders the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty_config = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty_config)
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Rejects values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lip = &self.lip_sync;
        if lip.window_size == 0 {
            return Err(invalid("lip_sync.window_size", "must be at least 1"));
        }
        if !lip.steepness.is_finite() || !lip.bias.is_finite() {
            return Err(invalid("lip_sync", "steepness and bias must be finite"));
        }
        if !(0.0..1.0).contains(&lip.dead_zone) {
            return Err(invalid("lip_sync.dead_zone", "must be in [0, 1)"));
        }
        if lip.silence_level() >= lip.dead_zone {
            return Err(invalid(
                "lip_sync.dead_zone",
                "must exceed the volume steepness and bias give near-silence",
            ));
        }
        let max_delta = self.render_loop.max_frame_delta_secs;
        if max_delta.is_nan() || max_delta <= 0.0 {
            return Err(invalid(
                "render_loop.max_frame_delta_secs",
                "must be positive",
            ));
        }
        let fov = self.framing.fov_y_degrees;
        if !(fov > 0.0 && fov < 180.0) {
            return Err(invalid("framing.fov_y_degrees", "must be in (0, 180)"));
        }
        if self.assets.idle_clip.trim().is_empty() {
            return Err(invalid("assets.idle_clip", "must not be empty"));
        }
        let crossfade = self.assets.crossfade_secs;
        if crossfade.is_nan() || crossfade < 0.0 {
            return Err(invalid("assets.crossfade_secs", "must not be negative"));
        }
        Ok(())
    }
}

impl AssetConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.default_avatar, &mut self.animations_dir]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ViewerConfig::from_ron_str("()").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.lip_sync.window_size, 2048);
        assert_eq!(config.lip_sync.steepness, 45.0);
        assert_eq!(config.lip_sync.bias, 5.0);
        assert_eq!(config.lip_sync.dead_zone, 0.1);
        assert_eq!(config.render_loop.max_frame_delta_secs, 0.1);
        assert_eq!(config.assets.idle_clip, "idle");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ViewerConfig::from_ron_str(
            "(lip_sync: (steepness: 10.0), assets: (idle_clip: \"breathe\"))",
        )
        .unwrap();
        assert_eq!(config.lip_sync.steepness, 10.0);
        assert_eq!(config.lip_sync.bias, 5.0);
        assert_eq!(config.assets.idle_clip, "breathe");
        assert_eq!(config.framing, FramingParams::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ViewerConfig::from_ron_str("(lip_sync: (dead_zone: 1.5))").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "lip_sync.dead_zone",
                ..
            }
        ));
        assert!(ViewerConfig::from_ron_str("(render_loop: (max_frame_delta_secs: 0.0))").is_err());
    }

    #[test]
    fn rejects_tunings_that_open_the_mouth_on_silence() {
        let err = ViewerConfig::from_ron_str("(lip_sync: (bias: 0.0))").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "lip_sync.dead_zone",
                ..
            }
        ));
        assert!(ViewerConfig::from_ron_str("(lip_sync: (bias: 0.0, dead_zone: 0.6))").is_ok());
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(
            ViewerConfig::from_ron_str("(lip_sync: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn pretty_output_parses_back() {
        let mut config = ViewerConfig::default();
        config.assets.animations_dir = Some(PathBuf::from("anim"));
        config.lip_sync.window_size = 1024;

        let text = config.to_ron_string().unwrap();
        assert_eq!(ViewerConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn load_resolves_paths_next_to_the_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("viewer.ron");
        std::fs::write(
            &path,
            "(assets: (default_avatar: Some(\"models/a.vrm\"), animations_dir: Some(\"/abs/anim\")))",
        )?;

        let config = ViewerConfig::load(&path)?;
        assert_eq!(
            config.assets.default_avatar,
            Some(dir.path().join("models/a.vrm"))
        );
        assert_eq!(config.assets.animations_dir, Some(PathBuf::from("/abs/anim")));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ViewerConfig::load("/no/such/viewer.ron"),
            Err(ConfigError::Io { .. })
        ));
    }
}
