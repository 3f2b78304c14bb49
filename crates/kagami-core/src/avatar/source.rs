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

//! Where avatars come from, and the contract for parsing them.

use super::{AvatarAsset, SkeletonError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// A reference to avatar model data.
#[derive(Debug, Clone)]
pub enum AvatarSource {
    /// A model file on disk.
    File(PathBuf),
    /// Model bytes already in memory (a dropped file, a downloaded blob).
    Bytes {
        /// Human-readable label used in logs and events.
        label: String,
        /// The raw file contents.
        data: Arc<[u8]>,
    },
    /// The configured default avatar.
    Default,
}

impl AvatarSource {
    /// Creates a file source.
    pub fn file(path: impl AsRef<Path>) -> Self {
        AvatarSource::File(path.as_ref().to_path_buf())
    }

    /// Creates an in-memory source.
    pub fn bytes(label: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        AvatarSource::Bytes {
            label: label.into(),
            data: data.into(),
        }
    }

    /// A label suitable for logs.
    pub fn label(&self) -> String {
        match self {
            AvatarSource::File(path) => path.display().to_string(),
            AvatarSource::Bytes { label, .. } => label.clone(),
            AvatarSource::Default => "<default avatar>".to_string(),
        }
    }

    /// Reads the source's bytes. Performs blocking file I/O for `File`.
    ///
    /// `Default` must be resolved to a concrete source before reading.
    pub fn read_bytes(&self) -> Result<Arc<[u8]>, ParseError> {
        match self {
            AvatarSource::File(path) => std::fs::read(path)
                .map(Arc::from)
                .map_err(|e| ParseError::Io {
                    path: path.display().to_string(),
                    source_error: e.to_string(),
                }),
            AvatarSource::Bytes { data, .. } => Ok(data.clone()),
            AvatarSource::Default => Err(ParseError::NoDefaultAvatar),
        }
    }
}

/// An avatar source could not be turned into an [`AvatarAsset`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    /// The file could not be read.
    #[error("failed to read avatar '{path}': {source_error}")]
    Io {
        /// The path that failed.
        path: String,
        /// The underlying I/O error.
        source_error: String,
    },
    /// No default avatar is configured.
    #[error("no default avatar is configured")]
    NoDefaultAvatar,
    /// The bytes are not a readable glTF/GLB container.
    #[error("invalid model container: {0}")]
    InvalidContainer(String),
    /// The container is valid glTF but carries no VRM extension.
    #[error("model has no VRM extension")]
    MissingExtension,
    /// The VRM extension lacks a usable humanoid mapping.
    #[error("invalid humanoid mapping: {0}")]
    MissingHumanoid(String),
    /// A buffer could not be resolved or decoded.
    #[error("invalid buffer data: {0}")]
    InvalidBuffer(String),
    /// An embedded image could not be decoded.
    #[error("invalid image '{name}': {details}")]
    InvalidImage {
        /// The image label.
        name: String,
        /// Decoder error message.
        details: String,
    },
    /// The node hierarchy is malformed.
    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(#[from] SkeletonError),
    /// The loader panicked on this input.
    #[error("avatar loader crashed: {0}")]
    LoaderPanicked(String),
}

/// Parses raw model bytes into an [`AvatarAsset`].
///
/// Implementations run on worker threads and must not touch render state.
pub trait AvatarSourceLoader: Send + Sync {
    /// Parses `bytes`; `label` is only used for diagnostics.
    fn parse(&self, bytes: &[u8], label: &str) -> Result<AvatarAsset, ParseError>;
}
