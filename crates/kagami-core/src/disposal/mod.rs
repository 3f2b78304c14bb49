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

//! Centralised release of native resources.
//!
//! Everything that owns a GPU buffer, a texture, or an audio node implements
//! [`Disposable`]. Components never release such resources directly; they hand
//! them to the [`DisposalCoordinator`], which releases each one exactly once.
//! Avatar replacement, abandoned loads, and shutdown all go through it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A process-unique identity for a disposable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisposalKey(u64);

impl DisposalKey {
    /// Allocates a fresh key.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DisposalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single disposal contract shared by every native-backed resource.
pub trait Disposable {
    /// The resource's identity. Must stay the same for the resource's lifetime.
    fn disposal_key(&self) -> DisposalKey;

    /// Frees the native handles. Only the coordinator calls this.
    fn release(&mut self);

    /// Returns `true` once [`release`](Self::release) has run.
    fn is_released(&self) -> bool;

    /// A short description for logs.
    fn describe(&self) -> String {
        format!("resource {}", self.disposal_key())
    }
}

/// Releases resources exactly once and keeps a tally.
///
/// Each resource records its own released state, so the coordinator holds
/// counters only and stays the same size however many resources pass through.
#[derive(Debug, Default)]
pub struct DisposalCoordinator {
    released: u64,
    repeated: u64,
}

impl DisposalCoordinator {
    /// Creates a coordinator with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases `resource` unless it was already disposed.
    ///
    /// Returns `true` if this call released it; disposing twice is a no-op.
    pub fn dispose<D: Disposable + ?Sized>(&mut self, resource: &mut D) -> bool {
        if resource.is_released() {
            self.repeated += 1;
            log::trace!("{} already disposed, ignoring", resource.describe());
            return false;
        }
        log::debug!("Disposing {}", resource.describe());
        resource.release();
        self.released += 1;
        true
    }

    /// Number of resources released so far.
    pub fn released_count(&self) -> u64 {
        self.released
    }

    /// Number of redundant dispose calls that were ignored.
    pub fn repeated_count(&self) -> u64 {
        self.repeated
    }
}
