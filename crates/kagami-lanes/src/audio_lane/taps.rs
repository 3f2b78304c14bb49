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

//! Analysis taps: where the lip-sync analyzer reads audio from.
//!
//! Taps only observe audio. A speech clip is analyzed through a
//! [`ClipPlaybackTap`] while the host plays it on its own output, so the
//! analysis path never emits sound a second time.

use kagami_core::audio::{AudioTap, SoundData};
use kagami_core::disposal::{Disposable, DisposalKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

/// Fixed-capacity ring of mono samples.
#[derive(Debug)]
struct RingBuffer {
    data: Vec<f32>,
    write: usize,
    filled: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            write: 0,
            filled: 0,
        }
    }

    fn push(&mut self, sample: f32) {
        self.data[self.write] = sample;
        self.write = (self.write + 1) % self.data.len();
        self.filled = (self.filled + 1).min(self.data.len());
    }

    /// Copies the newest samples into `out`, oldest first, zero-filling the front.
    fn copy_latest(&self, out: &mut [f32]) {
        let available = self.filled.min(out.len());
        let (silence, recent) = out.split_at_mut(out.len() - available);
        silence.fill(0.0);
        let capacity = self.data.len();
        let start = (self.write + capacity - available) % capacity;
        for (i, slot) in recent.iter_mut().enumerate() {
            *slot = self.data[(start + i) % capacity];
        }
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
        self.write = 0;
        self.filled = 0;
    }
}

#[derive(Debug)]
struct StreamShared {
    ring: Mutex<RingBuffer>,
    connected: AtomicBool,
}

/// A tap on a live stream (typically microphone capture).
#[derive(Debug)]
pub struct StreamTap {
    key: DisposalKey,
    shared: Arc<StreamShared>,
}

/// The producer side of a [`StreamTap`], handed to the capture callback.
#[derive(Debug, Clone)]
pub struct StreamFeed {
    shared: Arc<StreamShared>,
    channels: u16,
}

impl StreamTap {
    /// Creates a tap holding up to `capacity` mono samples, fed with
    /// `channels`-channel interleaved audio.
    pub fn new(capacity: usize, channels: u16) -> (StreamTap, StreamFeed) {
        let shared = Arc::new(StreamShared {
            ring: Mutex::new(RingBuffer::new(capacity)),
            connected: AtomicBool::new(true),
        });
        let tap = StreamTap {
            key: DisposalKey::next(),
            shared: shared.clone(),
        };
        let feed = StreamFeed {
            shared,
            channels: channels.max(1),
        };
        (tap, feed)
    }
}

impl StreamFeed {
    /// Appends interleaved samples, down-mixed to mono.
    pub fn push_interleaved(&self, samples: &[f32]) {
        if !self.is_connected() {
            return;
        }
        let channels = self.channels as usize;
        let mut ring = match self.shared.ring.lock() {
            Ok(ring) => ring,
            Err(poisoned) => poisoned.into_inner(),
        };
        for frame in samples.chunks_exact(channels) {
            ring.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    /// Returns `false` once the tap has been disposed.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }
}

impl AudioTap for StreamTap {
    fn fill_window(&self, window: &mut [f32]) -> bool {
        if !self.shared.connected.load(Ordering::Acquire) {
            return false;
        }
        match self.shared.ring.try_lock() {
            Ok(ring) => ring.copy_latest(window),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().copy_latest(window),
            // The capture thread is writing; keep the previous window.
            Err(TryLockError::WouldBlock) => {}
        }
        true
    }
}

impl Disposable for StreamTap {
    fn disposal_key(&self) -> DisposalKey {
        self.key
    }

    fn release(&mut self) {
        self.shared.connected.store(false, Ordering::Release);
        match self.shared.ring.lock() {
            Ok(mut ring) => ring.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn is_released(&self) -> bool {
        !self.shared.connected.load(Ordering::Acquire)
    }

    fn describe(&self) -> String {
        format!("stream tap {}", self.key)
    }
}

/// A tap over a decoded clip, positioned by the render clock.
#[derive(Debug)]
pub struct ClipPlaybackTap {
    key: DisposalKey,
    samples: Arc<[f32]>,
    sample_rate: u32,
    position: Duration,
    playing: bool,
    released: bool,
}

impl ClipPlaybackTap {
    /// Wraps decoded audio, down-mixed to mono. Starts paused at the beginning.
    pub fn new(sound: &SoundData) -> Self {
        Self {
            key: DisposalKey::next(),
            samples: sound.to_mono().into(),
            sample_rate: sound.sample_rate.max(1),
            position: Duration::ZERO,
            playing: false,
            released: false,
        }
    }

    /// Length of the clip.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Current playback position.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Starts or resumes playback. A finished clip restarts from the beginning.
    pub fn play(&mut self) {
        if self.is_finished() {
            self.position = Duration::ZERO;
        }
        self.playing = true;
    }

    /// Pauses playback, keeping the position.
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Pauses and rewinds.
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = Duration::ZERO;
    }

    /// Moves the playback position, clamped to the clip.
    pub fn seek(&mut self, position: Duration) {
        self.position = position.min(self.duration());
    }

    /// Returns `true` while playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Returns `true` once the position reached the end.
    pub fn is_finished(&self) -> bool {
        self.position >= self.duration()
    }

    fn cursor(&self) -> usize {
        let frame = self.position.as_secs_f64() * self.sample_rate as f64;
        (frame as usize).min(self.samples.len())
    }
}

impl AudioTap for ClipPlaybackTap {
    fn fill_window(&self, window: &mut [f32]) -> bool {
        if self.released {
            return false;
        }
        if !self.playing {
            window.fill(0.0);
            return true;
        }
        let end = self.cursor();
        let available = end.min(window.len());
        let (silence, recent) = window.split_at_mut(window.len() - available);
        silence.fill(0.0);
        recent.copy_from_slice(&self.samples[end - available..end]);
        true
    }

    fn advance(&mut self, elapsed: Duration) {
        if !self.playing {
            return;
        }
        self.position = (self.position + elapsed).min(self.duration());
        if self.is_finished() {
            self.playing = false;
        }
    }
}

impl Disposable for ClipPlaybackTap {
    fn disposal_key(&self) -> DisposalKey {
        self.key
    }

    fn release(&mut self) {
        self.playing = false;
        self.released = true;
        self.samples = Arc::from(Vec::new());
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn describe(&self) -> String {
        format!("clip tap {} ({:.2}s)", self.key, self.duration().as_secs_f32())
    }
}
