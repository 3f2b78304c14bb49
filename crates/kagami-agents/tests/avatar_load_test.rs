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

mod common;

use approx::assert_abs_diff_eq;
use common::{avatar_bytes, Harness};
use kagami_agents::animation_agent::{ClipLibrary, ClipLoadError};
use kagami_agents::avatar_load_agent::{AvatarLoadAgent, LoadOutcome};
use kagami_core::avatar::{AvatarAsset, AvatarSource, AvatarSourceLoader, ParseError};
use kagami_core::math::Vec3;
use kagami_core::renderer::ResourceError;
use kagami_lanes::{CameraFramingLane, SampleClip};
use std::sync::Arc;
use tempfile::tempdir;

/// Each sample avatar owns a mesh and a texture, plus one resource from
/// `prepare_avatar`.
const RESOURCES_PER_AVATAR: usize = 3;

fn source(name: &str) -> AvatarSource {
    AvatarSource::bytes(format!("{name}.vrm"), avatar_bytes(name))
}

fn active_title(h: &Harness) -> Option<String> {
    h.state.active().map(|a| a.handle.meta().title.clone())
}

#[test]
fn superseded_load_is_released_without_rendering() {
    // --- 1. ARRANGE ---
    let mut h = Harness::new(ClipLibrary::new(None));
    let a = h.loader.request_load(&mut h.state, source("A"));
    let b = h.loader.request_load(&mut h.state, source("B"));
    let mut tasks = h.spawner.take_all();
    let task_b = tasks.pop().unwrap();
    let task_a = tasks.pop().unwrap();

    // --- 2. ACT ---
    // A finishes first, while B is still running.
    task_a();
    let first = h.poll();
    task_b();
    let second = h.poll();

    // --- 3. ASSERT ---
    assert_eq!(first, vec![LoadOutcome::Superseded { generation: a }]);
    assert_eq!(second.len(), 1);
    assert!(
        matches!(&second[0], LoadOutcome::Loaded { generation, label, .. } if *generation == b && label == "B.vrm")
    );
    assert_eq!(active_title(&h).as_deref(), Some("B"));

    // A's mesh and texture were destroyed; only B's resources are alive.
    assert_eq!(h.renderer.live_count(), RESOURCES_PER_AVATAR);
    assert_eq!(h.renderer.destroyed_count(), 2);
    assert_eq!(h.loader.in_flight(), 0);
    assert!(h.renderer.frames().is_empty());
}

#[test]
fn older_request_completing_last_is_discarded() {
    let mut h = Harness::new(ClipLibrary::new(None));
    let a = h.loader.request_load(&mut h.state, source("A"));
    let b = h.loader.request_load(&mut h.state, source("B"));
    let mut tasks = h.spawner.take_all();
    let task_b = tasks.pop().unwrap();
    let task_a = tasks.pop().unwrap();

    task_b();
    let first = h.poll();
    task_a();
    let second = h.poll();

    assert!(matches!(&first[..], [LoadOutcome::Loaded { generation, .. }] if *generation == b));
    assert_eq!(second, vec![LoadOutcome::Superseded { generation: a }]);
    assert_eq!(active_title(&h).as_deref(), Some("B"));
    assert_eq!(h.renderer.live_count(), RESOURCES_PER_AVATAR);
}

#[test]
fn only_the_latest_of_many_overlapping_loads_activates() {
    let mut h = Harness::new(ClipLibrary::new(None));
    let generations: Vec<_> = (1..=5)
        .map(|i| h.loader.request_load(&mut h.state, source(&i.to_string())))
        .collect();
    let mut tasks: Vec<_> = h.spawner.take_all().into_iter().map(Some).collect();

    let mut outcomes = Vec::new();
    for index in [3, 0, 4, 1, 2] {
        if let Some(task) = tasks[index].take() {
            task();
        }
        outcomes.extend(h.poll());
    }

    let loaded: Vec<_> = outcomes.iter().filter(|o| o.is_loaded()).collect();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].generation(), generations[4]);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, LoadOutcome::Superseded { .. }))
            .count(),
        4
    );
    assert_eq!(active_title(&h).as_deref(), Some("5"));
    assert_eq!(h.renderer.live_count(), RESOURCES_PER_AVATAR);
    assert_eq!(h.emote.lock().unwrap().bound.len(), 1);
}

#[test]
fn parse_error_keeps_the_previous_avatar() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    h.poll();
    let previous = h.state.active_avatar_id();

    let bad = h
        .loader
        .request_load(&mut h.state, AvatarSource::bytes("bad.vrm", &b"garbage"[..]));
    h.spawner.run_all();
    let outcomes = h.poll();

    assert!(matches!(
        &outcomes[..],
        [LoadOutcome::ParseError { generation, error: ParseError::InvalidContainer(_), .. }] if *generation == bad
    ));
    assert_eq!(h.state.active_avatar_id(), previous);
    assert_eq!(h.state.generation(), bad);
}

/// A loader with a bug that panics on every input.
struct CrashingLoader;

impl AvatarSourceLoader for CrashingLoader {
    fn parse(&self, _bytes: &[u8], _label: &str) -> Result<AvatarAsset, ParseError> {
        panic!("index out of bounds in accessor 7")
    }
}

#[test]
fn loader_panic_is_reported_as_a_parse_error() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    h.poll();
    let previous = h.state.active_avatar_id();

    h.loader = AvatarLoadAgent::new(
        Arc::new(CrashingLoader),
        h.renderer.clone(),
        h.spawner.clone(),
        &h.binder,
        CameraFramingLane::default(),
    );
    let crashed = h.loader.request_load(&mut h.state, source("B"));
    h.spawner.run_all();
    let outcomes = h.poll();

    assert_eq!(
        outcomes,
        vec![LoadOutcome::ParseError {
            generation: crashed,
            label: "B.vrm".to_string(),
            error: ParseError::LoaderPanicked("index out of bounds in accessor 7".to_string()),
        }]
    );
    assert_eq!(h.loader.in_flight(), 0);
    assert_eq!(h.state.active_avatar_id(), previous);
    assert_eq!(h.renderer.live_count(), RESOURCES_PER_AVATAR);
}

#[test]
fn missing_file_is_a_parse_error() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader
        .request_load(&mut h.state, AvatarSource::file("/definitely/not/here.vrm"));
    h.spawner.run_all();

    let outcomes = h.poll();
    assert!(matches!(
        &outcomes[..],
        [LoadOutcome::ParseError {
            error: ParseError::Io { .. },
            ..
        }]
    ));
    assert!(h.state.active().is_none());
}

#[test]
fn upload_failure_releases_the_partial_upload() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    h.poll();

    h.renderer.fail_textures(true);
    h.loader.request_load(&mut h.state, source("B"));
    h.spawner.run_all();
    let outcomes = h.poll();

    assert!(matches!(
        &outcomes[..],
        [LoadOutcome::ResourceExhausted {
            error: ResourceError::OutOfMemory { .. },
            ..
        }]
    ));
    assert_eq!(active_title(&h).as_deref(), Some("A"));
    // B's mesh was uploaded before the texture failed, and is gone again.
    assert_eq!(h.renderer.live_count(), RESOURCES_PER_AVATAR);
}

#[test]
fn activation_failure_leaves_state_untouched() {
    let mut h = Harness::new(ClipLibrary::new(None));
    let camera_before = *h.state.camera();
    h.renderer.fail_prepare(true);

    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    let outcomes = h.poll();

    assert!(matches!(
        &outcomes[..],
        [LoadOutcome::ResourceExhausted { .. }]
    ));
    assert!(h.state.active().is_none());
    assert_eq!(*h.state.camera(), camera_before);
    assert!(h.emote.lock().unwrap().bound.is_empty());
    assert_eq!(h.renderer.live_count(), 0);
}

#[test]
fn replacing_an_avatar_disposes_it_and_reframes() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    h.poll();
    h.loader.request_load(&mut h.state, source("B"));
    h.spawner.run_all();
    h.poll();

    assert_eq!(active_title(&h).as_deref(), Some("B"));
    assert_eq!(h.renderer.live_count(), RESOURCES_PER_AVATAR);
    assert_eq!(h.renderer.destroyed_count(), RESOURCES_PER_AVATAR);
    assert_eq!(h.state.disposal().released_count(), 1);

    let emote = h.emote.lock().unwrap();
    assert_eq!(emote.bound.len(), 2);
    assert!(emote.bound[1].iter().any(|name| name == "aa"));

    // Sample avatars keep their head at 1.5 m.
    let camera = h.state.camera();
    assert_abs_diff_eq!(camera.target, Vec3::new(0.0, 1.45, 0.0), epsilon = 1e-4);
    assert_abs_diff_eq!(camera.position, Vec3::new(0.0, 1.5, 0.8), epsilon = 1e-4);
}

#[test]
fn missing_idle_clip_still_activates_in_bind_pose() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    let outcomes = h.poll();

    assert!(matches!(
        &outcomes[..],
        [LoadOutcome::Loaded { clip_error: Some(ClipLoadError::NotFound(name)), .. }] if name == "idle"
    ));
    let active = h.state.active().unwrap();
    assert!(active.binding.mixer().current_clip().is_none());
    assert_eq!(active.binding.avatar(), active.handle.id());
}

#[test]
fn idle_clip_from_the_animations_directory_plays() -> anyhow::Result<()> {
    let dir = tempdir()?;
    std::fs::write(
        dir.path().join("idle.vrma"),
        SampleClip::new("idle").to_glb()?,
    )?;
    let mut h = Harness::new(ClipLibrary::new(Some(dir.path().to_path_buf())));

    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    let outcomes = h.poll();

    assert!(matches!(
        &outcomes[..],
        [LoadOutcome::Loaded {
            clip_error: None,
            ..
        }]
    ));
    assert!(h.binder.clips().is_cached("idle"));
    let active = h.state.active().unwrap();
    assert!(active.binding.mixer().current_clip().is_some());
    Ok(())
}

#[test]
fn default_source_needs_a_configured_avatar() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, AvatarSource::Default);
    h.spawner.run_all();

    assert!(matches!(
        &h.poll()[..],
        [LoadOutcome::ParseError {
            error: ParseError::NoDefaultAvatar,
            ..
        }]
    ));
}

#[test]
fn default_source_resolves_to_the_configured_file() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("default.vrm");
    std::fs::write(&path, avatar_bytes("Default"))?;
    let mut h = Harness::new(ClipLibrary::new(None)).with_default_avatar(path);

    h.loader.request_load(&mut h.state, AvatarSource::Default);
    h.spawner.run_all();
    let outcomes = h.poll();

    assert!(outcomes[0].is_loaded());
    assert_eq!(active_title(&h).as_deref(), Some("Default"));
    Ok(())
}

#[test]
fn shutdown_releases_unpolled_results() {
    let mut h = Harness::new(ClipLibrary::new(None));
    h.loader.request_load(&mut h.state, source("A"));
    h.spawner.run_all();
    assert!(h.renderer.live_count() > 0);

    h.loader.shutdown(&mut h.state);

    assert_eq!(h.renderer.live_count(), 0);
    assert_eq!(h.loader.in_flight(), 0);
    assert!(h.state.active().is_none());
}
