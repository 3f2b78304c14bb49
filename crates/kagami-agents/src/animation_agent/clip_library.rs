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

//! A name-keyed cache of decoded animation clips.

use kagami_lanes::{AnimationClip, AssetLoaderLane, ClipLoaderLane};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// File extensions tried, in order, when resolving a clip name on disk.
const CLIP_EXTENSIONS: [&str; 2] = ["vrma", "glb"];

/// Why a clip could not be provided.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClipLoadError {
    /// No file or preloaded clip carries this name.
    #[error("animation clip '{0}' not found")]
    NotFound(String),
    /// The name would escape the animations directory.
    #[error("invalid animation clip name '{0}'")]
    InvalidName(String),
    /// The file exists but could not be read.
    #[error("failed to read animation clip '{name}': {details}")]
    Io {
        /// Clip name.
        name: String,
        /// The underlying I/O error.
        details: String,
    },
    /// The file could not be decoded into a clip.
    #[error("failed to decode animation clip '{name}': {details}")]
    Decode {
        /// Clip name.
        name: String,
        /// Decoder error message.
        details: String,
    },
    /// A play request arrived while no avatar was active.
    #[error("no active avatar to animate")]
    NoActiveAvatar,
}

type CachedClip = Result<Arc<AnimationClip>, ClipLoadError>;

/// Resolves clip names to decoded clips and caches the outcome.
///
/// Names map to `<root>/<name>.vrma`, then `<root>/<name>.glb`. Failures are
/// cached as well, so a missing idle clip is only looked up once.
pub struct ClipLibrary {
    root: Option<PathBuf>,
    loader: ClipLoaderLane,
    cache: Mutex<HashMap<String, CachedClip>>,
}

impl ClipLibrary {
    /// Creates a library reading from `root`. With `None`, only clips added via
    /// [`insert`](Self::insert) are available.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            loader: ClipLoaderLane::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The animations directory, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Registers an in-memory clip under its own name, replacing any cached
    /// entry.
    pub fn insert(&self, clip: AnimationClip) -> Arc<AnimationClip> {
        let clip = Arc::new(clip);
        self.lock()
            .insert(clip.name().to_string(), Ok(clip.clone()));
        clip
    }

    /// Returns `true` if a lookup for `name` already happened.
    pub fn is_cached(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Drops every cached entry, successful or not.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the clip named `name`, loading it on a cache miss.
    ///
    /// A miss performs blocking file I/O; call it from a worker, not the
    /// render thread.
    pub fn get(&self, name: &str) -> Result<Arc<AnimationClip>, ClipLoadError> {
        if let Some(cached) = self.lock().get(name) {
            return cached.clone();
        }

        // The lock is not held while decoding.
        let loaded = self.load(name);
        match &loaded {
            Ok(clip) => log::info!(
                "Loaded animation clip '{}' ({:.2}s, {} tracks)",
                name,
                clip.duration(),
                clip.tracks().len()
            ),
            Err(e) => log::warn!("{}", e),
        }
        self.lock()
            .entry(name.to_string())
            .or_insert(loaded)
            .clone()
    }

    fn load(&self, name: &str) -> CachedClip {
        if name.is_empty() || name.contains(|c| c == '/' || c == '\\') || name.contains("..") {
            return Err(ClipLoadError::InvalidName(name.to_string()));
        }
        let Some(root) = &self.root else {
            return Err(ClipLoadError::NotFound(name.to_string()));
        };

        let Some(path) = CLIP_EXTENSIONS
            .iter()
            .map(|ext| root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
        else {
            return Err(ClipLoadError::NotFound(name.to_string()));
        };

        let bytes = std::fs::read(&path).map_err(|e| ClipLoadError::Io {
            name: name.to_string(),
            details: e.to_string(),
        })?;
        let clip = self
            .loader
            .load(&bytes)
            .map_err(|e| ClipLoadError::Decode {
                name: name.to_string(),
                details: e.to_string(),
            })?;
        Ok(Arc::new(clip))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedClip>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ClipLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipLibrary")
            .field("root", &self.root)
            .field("cached", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kagami_lanes::SampleClip;
    use tempfile::tempdir;

    #[test]
    fn loads_vrma_before_glb() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join("idle.vrma"),
            SampleClip::new("from_vrma").duration(1.0).to_glb()?,
        )?;
        std::fs::write(
            dir.path().join("idle.glb"),
            SampleClip::new("from_glb").duration(4.0).to_glb()?,
        )?;

        let library = ClipLibrary::new(Some(dir.path().to_path_buf()));
        let clip = library.get("idle")?;
        assert!((clip.duration() - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn falls_back_to_glb() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join("wave.glb"),
            SampleClip::new("wave").to_glb()?,
        )?;

        let library = ClipLibrary::new(Some(dir.path().to_path_buf()));
        assert!(library.get("wave").is_ok());
        Ok(())
    }

    #[test]
    fn failures_are_cached() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let library = ClipLibrary::new(Some(dir.path().to_path_buf()));

        assert_eq!(
            library.get("idle").unwrap_err(),
            ClipLoadError::NotFound("idle".into())
        );
        assert!(library.is_cached("idle"));

        // A file appearing later is not picked up until the cache is cleared.
        std::fs::write(
            dir.path().join("idle.vrma"),
            SampleClip::new("idle").to_glb()?,
        )?;
        assert!(library.get("idle").is_err());
        library.clear();
        assert!(library.get("idle").is_ok());
        Ok(())
    }

    #[test]
    fn undecodable_file_is_a_decode_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("broken.vrma"), b"not a clip")?;
        let library = ClipLibrary::new(Some(dir.path().to_path_buf()));

        assert!(matches!(
            library.get("broken"),
            Err(ClipLoadError::Decode { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_path_like_names() {
        let library = ClipLibrary::new(Some(PathBuf::from(".")));
        for name in ["../idle", "a/b", "", "..\\x"] {
            assert!(matches!(
                library.get(name),
                Err(ClipLoadError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn inserted_clips_need_no_directory() {
        let library = ClipLibrary::new(None);
        library.insert(AnimationClip::new("pose", Vec::new()));
        assert_eq!(library.get("pose").unwrap().name(), "pose");
        assert!(matches!(
            library.get("other"),
            Err(ClipLoadError::NotFound(_))
        ));
    }
}
