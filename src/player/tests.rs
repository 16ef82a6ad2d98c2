use super::format::{ZERO_DURATION, format_millis, format_secs};
use super::store::{Action, PlayerState, TrackInfo, reduce};
use super::transport::{Bounds, Direction, Popover, VolumeDrag, skip_target};
use super::*;
use crate::audio::{AudioError, Callback, Sound, SoundOptions};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(String),
    Play(String),
    Pause(String),
    Stop(String),
    Seek(String, f64),
    Volume(f32),
    UnloadAll,
}

#[derive(Default)]
struct FakeState {
    playing: bool,
    position: f64,
    duration: Option<f64>,
    on_audible: Option<Callback>,
    on_ended: Option<Callback>,
}

/// Shared view into everything the fake engine did.
#[derive(Clone, Default)]
struct Probe {
    calls: Rc<RefCell<Vec<Call>>>,
    sounds: Rc<RefCell<HashMap<String, FakeState>>>,
}

impl Probe {
    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn set_duration(&self, id: i64, secs: Option<f64>) {
        if let Some(s) = self.sounds.borrow_mut().get_mut(&src(id)) {
            s.duration = secs;
        }
    }

    fn set_position(&self, id: i64, secs: f64) {
        if let Some(s) = self.sounds.borrow_mut().get_mut(&src(id)) {
            s.position = secs;
        }
    }

    fn fire_audible(&self, id: i64) {
        if let Some(cb) = self
            .sounds
            .borrow_mut()
            .get_mut(&src(id))
            .and_then(|s| s.on_audible.as_mut())
        {
            cb();
        }
    }

    fn fire_ended(&self, id: i64) {
        if let Some(s) = self.sounds.borrow_mut().get_mut(&src(id)) {
            s.playing = false;
            if let Some(cb) = s.on_ended.as_mut() {
                cb();
            }
        }
    }
}

struct FakeEngine {
    probe: Probe,
    fail: bool,
}

struct FakeSound {
    src: String,
    probe: Probe,
}

impl FakeSound {
    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut sounds = self.probe.sounds.borrow_mut();
        f(sounds.entry(self.src.clone()).or_default())
    }

    fn record(&self, call: Call) {
        self.probe.calls.borrow_mut().push(call);
    }
}

impl Sound for FakeSound {
    fn play(&mut self) {
        self.record(Call::Play(self.src.clone()));
        self.with(|s| s.playing = true);
    }

    fn pause(&mut self) {
        self.record(Call::Pause(self.src.clone()));
        self.with(|s| s.playing = false);
    }

    fn stop(&mut self) {
        self.record(Call::Stop(self.src.clone()));
        self.with(|s| {
            s.playing = false;
            s.position = 0.0;
        });
    }

    fn seek_to(&mut self, secs: f64) -> Result<(), AudioError> {
        self.record(Call::Seek(self.src.clone(), secs));
        self.with(|s| s.position = secs);
        Ok(())
    }

    fn position(&self) -> f64 {
        self.with(|s| s.position)
    }

    fn duration(&self) -> Option<f64> {
        self.with(|s| s.duration)
    }

    fn is_playing(&self) -> bool {
        self.with(|s| s.playing)
    }
}

impl AudioEngine for FakeEngine {
    type Sound = FakeSound;

    fn create(&mut self, options: SoundOptions) -> Result<FakeSound, AudioError> {
        if self.fail {
            return Err(AudioError::Open {
                src: options.src,
                reason: "offline".into(),
            });
        }
        self.probe
            .calls
            .borrow_mut()
            .push(Call::Create(options.src.clone()));
        self.probe.sounds.borrow_mut().insert(
            options.src.clone(),
            FakeState {
                on_audible: Some(options.on_audible),
                on_ended: Some(options.on_ended),
                ..FakeState::default()
            },
        );
        Ok(FakeSound {
            src: options.src,
            probe: self.probe.clone(),
        })
    }

    fn set_volume(&mut self, volume: f32) {
        self.probe.calls.borrow_mut().push(Call::Volume(volume));
    }

    fn unload_all(&mut self) {
        self.probe.calls.borrow_mut().push(Call::UnloadAll);
    }
}

fn src(id: i64) -> String {
    format!("https://audio.test/{id}.m4a")
}

fn tracks(n: i64) -> Vec<TrackInfo> {
    (1..=n)
        .map(|id| TrackInfo {
            id,
            title: format!("Song {id}"),
            src: src(id),
        })
        .collect()
}

fn player_with(n: i64, fail: bool) -> (Player<FakeEngine>, Probe) {
    let probe = Probe::default();
    let engine = FakeEngine {
        probe: probe.clone(),
        fail,
    };
    let mut player = Player::new(engine, 1.0);
    if n > 0 {
        player.load_playlist(tracks(n));
    }
    probe.clear();
    (player, probe)
}

fn player(n: i64) -> (Player<FakeEngine>, Probe) {
    player_with(n, false)
}

/// Start `id` and let the engine report it audible.
fn start(player: &mut Player<FakeEngine>, probe: &Probe, id: i64) {
    player.play_track(id);
    probe.fire_audible(id);
    player.pump();
}

fn assert_single_flag(state: &PlayerState) {
    let flagged: Vec<_> = state.playlist.iter().filter(|t| t.is_playing).collect();
    assert!(flagged.len() <= 1, "several tracks flagged: {flagged:?}");
    if state.is_playing {
        assert!(state.selected_track().is_some_and(|t| t.is_playing));
    }
}

#[test]
fn skip_target_wraps_both_ways() {
    assert_eq!(skip_target(2, 3, Direction::Next), Some(0));
    assert_eq!(skip_target(0, 3, Direction::Prev), Some(2));
    assert_eq!(skip_target(1, 3, Direction::Next), Some(2));
    assert_eq!(skip_target(0, 1, Direction::Next), Some(0));
    assert_eq!(skip_target(0, 1, Direction::Prev), Some(0));
    assert_eq!(skip_target(0, 0, Direction::Next), None);
}

#[test]
fn format_handles_zero_and_missing() {
    assert_eq!(format_millis(None), ZERO_DURATION);
    assert_eq!(format_millis(Some(0.0)), "0:00:00");
    assert_eq!(format_millis(Some(f64::NAN)), "0:00:00");
    assert_eq!(format_millis(Some(30_000.0)), "0:00:30");
    assert_eq!(format_millis(Some(29_600.0)), "0:00:30");
    assert_eq!(format_secs(Some(3725.0)), "1:02:05");
}

#[test]
fn reduce_select_unknown_id_is_noop() {
    let state = reduce(&PlayerState::default(), Action::CreatePlaylist(tracks(2)));
    let next = reduce(&state, Action::SelectTrack(99));
    assert_eq!(next, state);
}

#[test]
fn reduce_create_playlist_resets_selection_but_keeps_volume() {
    let state = PlayerState::with_volume(0.4);
    let state = reduce(&state, Action::CreatePlaylist(tracks(2)));
    let state = reduce(&state, Action::SelectTrack(2));
    let state = reduce(&state, Action::CreatePlaylist(tracks(3)));

    assert!(state.selection.is_unselected());
    assert_eq!(state.selection.index, 0);
    assert_eq!(state.selection.title, "");
    assert_eq!(state.playlist.len(), 3);
    assert!(!state.is_playing);
    assert_eq!(state.volume, 0.4);
}

#[test]
fn reduce_set_playing_requires_selection() {
    let state = reduce(&PlayerState::default(), Action::CreatePlaylist(tracks(2)));
    let next = reduce(&state, Action::SetPlaying(true));
    assert!(!next.is_playing);
}

#[test]
fn play_selected_then_skip_next_wraps_to_first() {
    let (mut player, probe) = player(2);

    player.play_track(2);
    let state = player.state();
    assert_eq!(state.selection.index, 1);
    assert_eq!(state.selection.id, Some(2));
    assert_eq!(state.selection.title, "Song 2");

    player.skip(Direction::Next);
    let state = player.state();
    assert_eq!(state.selection.index, 0);
    assert_eq!(state.selection.id, Some(1));

    let calls = probe.calls();
    let stop = calls.iter().position(|c| *c == Call::Stop(src(2)));
    let play = calls.iter().rposition(|c| *c == Call::Play(src(1)));
    assert!(stop.is_some() && play.is_some() && stop < play);
}

#[test]
fn skip_prev_from_first_wraps_to_last() {
    let (mut player, _probe) = player(3);
    player.play_track(1);
    player.skip(Direction::Prev);
    assert_eq!(player.state().selection.id, Some(3));
    assert_eq!(player.state().selection.index, 2);
}

#[test]
fn skip_on_single_track_keeps_it_playing() {
    let (mut player, probe) = player(1);
    start(&mut player, &probe, 1);
    let serial = player.state().selection_serial;
    probe.clear();

    player.skip(Direction::Next);
    player.skip(Direction::Prev);

    assert_eq!(player.state().selection.id, Some(1));
    assert_eq!(player.state().selection_serial, serial);
    assert!(probe.calls().is_empty());
}

#[test]
fn single_track_replays_after_it_ends() {
    let (mut player, probe) = player(1);
    start(&mut player, &probe, 1);

    probe.fire_ended(1);
    player.pump();

    assert_eq!(probe.count(&Call::Play(src(1))), 2);
    assert_eq!(probe.count(&Call::Stop(src(1))), 0);
    assert_eq!(probe.count(&Call::Create(src(1))), 1);
    assert!(player.state().track(1).is_some_and(|t| t.is_playing));
}

#[test]
fn replaying_paused_selection_resumes_in_place() {
    let (mut player, probe) = player(2);
    start(&mut player, &probe, 1);
    probe.set_position(1, 20.0);
    player.toggle_play();
    let serial = player.state().selection_serial;
    probe.clear();

    player.play_track(1);

    assert_eq!(probe.calls(), vec![Call::Play(src(1))]);
    let state = player.state();
    assert_eq!(state.selection_serial, serial);
    assert!(state.track(1).is_some_and(|t| t.is_playing));
    assert_eq!(player.binding().position(&state), Some(20.0));
}

#[test]
fn skip_stops_previous_track_once() {
    let (mut player, probe) = player(3);
    start(&mut player, &probe, 1);
    probe.clear();

    player.skip(Direction::Next);

    assert_eq!(
        probe.calls(),
        vec![
            Call::Stop(src(1)),
            Call::Create(src(2)),
            Call::Play(src(2)),
        ]
    );
}

#[test]
fn set_volume_clamps_and_reaches_engine() {
    let (mut player, probe) = player(1);

    player.set_volume(-0.3);
    assert_eq!(player.state().volume, 0.0);
    player.set_volume(1.7);
    assert_eq!(player.state().volume, 1.0);

    assert_eq!(probe.calls(), vec![Call::Volume(0.0), Call::Volume(1.0)]);
}

#[test]
fn set_volume_nan_is_ignored() {
    let (mut player, probe) = player(1);
    player.set_volume(0.5);
    player.set_volume(f32::NAN);
    assert_eq!(player.state().volume, 0.5);
    assert_eq!(probe.calls(), vec![Call::Volume(0.5)]);
}

#[test]
fn at_most_one_track_is_flagged_across_transitions() {
    let (mut player, probe) = player(3);

    start(&mut player, &probe, 1);
    assert_single_flag(&player.state());
    assert!(player.state().is_playing);

    player.play_track(3);
    assert_single_flag(&player.state());
    probe.fire_audible(3);
    player.pump();
    assert_single_flag(&player.state());

    player.toggle_play();
    assert_single_flag(&player.state());
    assert!(!player.state().is_playing);

    player.toggle_play();
    probe.fire_audible(3);
    player.pump();
    assert_single_flag(&player.state());
    assert!(player.state().is_playing);

    player.skip(Direction::Prev);
    assert_single_flag(&player.state());
}

#[test]
fn empty_playlist_operations_are_noops() {
    let (mut player, probe) = player(0);
    let before = player.state();

    player.skip(Direction::Next);
    player.skip(Direction::Prev);
    player.toggle_play();
    player.play_track(1);
    player.seek(0.5);
    player.scrub(10.0);
    player.pump();
    player.frame();

    assert_eq!(*player.state(), *before);
    assert!(probe.calls().is_empty());
}

#[test]
fn toggle_with_nothing_selected_plays_first_track() {
    let (mut player, probe) = player(3);
    player.toggle_play();

    let state = player.state();
    assert_eq!(state.selection.id, Some(1));
    assert!(state.track(1).is_some_and(|t| t.is_playing));
    assert_eq!(probe.count(&Call::Play(src(1))), 1);
}

#[test]
fn audible_marks_playing_and_starts_progress() {
    let (mut player, probe) = player(2);
    player.play_track(1);
    assert!(!player.state().is_playing);

    probe.set_duration(1, Some(100.0));
    probe.set_position(1, 10.0);
    probe.fire_audible(1);
    player.pump();

    assert!(player.state().is_playing);
    assert!(player.is_ticking());
    assert_eq!(player.duration_label(), "0:01:40");
    assert_eq!(player.progress().fraction, 0.1);
    assert_eq!(player.progress().elapsed, "0:00:10");
}

#[test]
fn progress_fraction_is_rounded_and_zero_without_duration() {
    let sample = Progress::sample(1.0, Some(3.0));
    assert_eq!(sample.fraction, 0.3333);

    let unknown = Progress::sample(12.0, None);
    assert_eq!(unknown.fraction, 0.0);
    assert_eq!(unknown.elapsed, "0:00:12");
}

#[test]
fn progress_loop_stops_when_not_playing() {
    let (mut player, probe) = player(1);
    probe.clear();
    player.play_track(1);
    probe.set_duration(1, Some(60.0));
    probe.fire_audible(1);
    player.pump();
    assert!(player.is_ticking());

    probe.set_position(1, 30.0);
    player.frame();
    assert_eq!(player.progress().fraction, 0.5);

    player.toggle_play();
    player.frame();
    assert!(!player.is_ticking());

    // Frames after stopping leave the last sample alone.
    probe.set_position(1, 45.0);
    player.frame();
    assert_eq!(player.progress().fraction, 0.5);
}

#[test]
fn seek_from_pointer_maps_bar_position_to_seconds() {
    let (mut player, probe) = player(1);
    start(&mut player, &probe, 1);
    probe.set_duration(1, Some(120.0));

    let bar = Bounds::new(0.0, 0.0, 200.0, 1.0);
    assert_eq!(transport::seek_fraction_from_pointer(50.0, &bar), 0.25);

    player.seek_from_pointer(50.0, &bar);
    assert!(probe.calls().contains(&Call::Seek(src(1), 30.0)));
    assert_eq!(player.progress().fraction, 0.25);
    assert_eq!(player.progress().elapsed, "0:00:30");
}

#[test]
fn pointer_fraction_is_clamped_and_degenerate_bar_gives_zero() {
    let bar = Bounds::new(10.0, 0.0, 100.0, 1.0);
    assert_eq!(bar.fraction_at(0.0), 0.0);
    assert_eq!(bar.fraction_at(500.0), 1.0);
    assert_eq!(bar.fraction_at(60.0), 0.5);

    let empty = Bounds::new(10.0, 0.0, 0.0, 1.0);
    assert_eq!(empty.fraction_at(20.0), 0.0);
}

#[test]
fn seek_with_unknown_duration_is_deferred() {
    let (mut player, probe) = player(1);
    start(&mut player, &probe, 1);

    player.seek(0.5);
    player.scrub(5.0);
    assert!(!probe.calls().iter().any(|c| matches!(c, Call::Seek(..))));
}

#[test]
fn scrub_moves_relative_to_position() {
    let (mut player, probe) = player(1);
    start(&mut player, &probe, 1);
    probe.set_duration(1, Some(30.0));
    probe.set_position(1, 10.0);

    player.scrub(5.0);
    assert!(probe.calls().contains(&Call::Seek(src(1), 15.0)));

    player.scrub(-60.0);
    assert!(probe.calls().contains(&Call::Seek(src(1), 0.0)));
}

#[test]
fn ended_advances_to_next_track() {
    let (mut player, probe) = player(3);
    start(&mut player, &probe, 1);

    probe.fire_ended(1);
    player.pump();

    let state = player.state();
    assert_eq!(state.selection.id, Some(2));
    assert!(state.track(2).is_some_and(|t| t.is_playing));
    assert_eq!(probe.count(&Call::Play(src(2))), 1);
    assert_eq!(probe.count(&Call::Stop(src(1))), 1);
    assert_eq!(probe.count(&Call::Pause(src(1))), 0);
}

#[test]
fn ended_on_last_track_wraps_around() {
    let (mut player, probe) = player(2);
    start(&mut player, &probe, 2);
    probe.fire_ended(2);
    player.pump();
    assert_eq!(player.state().selection.id, Some(1));
}

#[test]
fn stale_ended_after_manual_skip_is_ignored() {
    let (mut player, probe) = player(3);
    start(&mut player, &probe, 1);

    // The end of track 1 is reported after the user already moved on.
    probe.fire_ended(1);
    player.skip(Direction::Next);
    player.pump();

    assert_eq!(player.state().selection.id, Some(2));
    assert_eq!(probe.count(&Call::Create(src(3))), 0);
}

#[test]
fn audible_after_pause_does_not_resurrect_playback() {
    let (mut player, probe) = player(2);
    player.play_track(1);

    // Audible is queued, then the user pauses before it is applied.
    probe.fire_audible(1);
    player.toggle_play();
    player.pump();

    let state = player.state();
    assert!(!state.is_playing);
    assert!(state.track(1).is_some_and(|t| !t.is_playing));
    assert!(!player.is_ticking());
}

#[test]
fn audible_for_previous_selection_is_ignored() {
    let (mut player, probe) = player(2);
    player.play_track(1);
    probe.fire_audible(1);
    player.play_track(2);
    player.pump();

    let state = player.state();
    assert_eq!(state.selection.id, Some(2));
    assert!(!state.is_playing);
}

#[test]
fn sound_handle_is_created_once_per_track() {
    let (mut player, probe) = player(2);
    player.play_track(1);
    player.skip(Direction::Next);
    player.skip(Direction::Prev);
    player.play_track(1);

    assert_eq!(probe.count(&Call::Create(src(1))), 1);
    assert_eq!(probe.count(&Call::Create(src(2))), 1);
}

#[test]
fn pause_and_resume_issue_single_engine_calls() {
    let (mut player, probe) = player(1);
    start(&mut player, &probe, 1);

    player.toggle_play();
    player.toggle_play();
    probe.fire_audible(1);
    player.pump();

    assert_eq!(probe.count(&Call::Pause(src(1))), 1);
    assert_eq!(probe.count(&Call::Play(src(1))), 2);
}

#[test]
fn load_playlist_releases_previous_handles() {
    let (mut player, probe) = player(2);
    start(&mut player, &probe, 1);
    player.set_volume(0.6);

    player.load_playlist(tracks(3));

    let calls = probe.calls();
    assert!(calls.contains(&Call::Stop(src(1))));
    assert!(calls.contains(&Call::UnloadAll));
    assert!(!player.binding().has_sound(1));

    let state = player.state();
    assert!(state.selection.is_unselected());
    assert!(!state.is_playing);
    assert_eq!(state.playlist.len(), 3);
    assert_eq!(state.volume, 0.6);
    assert_eq!(player.progress().elapsed, ZERO_DURATION);
}

#[test]
fn shutdown_pauses_and_unloads() {
    let (mut player, probe) = player(2);
    start(&mut player, &probe, 1);

    player.shutdown();

    assert!(!player.state().is_playing);
    assert!(probe.calls().contains(&Call::UnloadAll));
}

#[test]
fn engine_failure_leaves_player_usable() {
    let (mut player, probe) = player_with(2, true);
    player.play_track(1);
    player.pump();

    assert_eq!(player.state().selection.id, Some(1));
    assert!(!player.state().is_playing);
    assert!(!probe.calls().iter().any(|c| matches!(c, Call::Play(_))));

    player.skip(Direction::Next);
    assert_eq!(player.state().selection.id, Some(2));
}

#[test]
fn volume_drag_tracks_pointer_only_while_dragging() {
    let slider = Bounds::new(0.0, 0.0, 100.0, 1.0);
    let mut drag = VolumeDrag::default();

    assert_eq!(drag.pointer_move(40.0, &slider), None);
    drag.pointer_down();
    assert_eq!(drag.pointer_move(40.0, &slider), Some(0.4));
    assert_eq!(drag.pointer_move(-20.0, &slider), Some(0.0));
    assert_eq!(drag.pointer_move(250.0, &slider), Some(1.0));
    drag.pointer_up();
    assert!(!drag.is_dragging());
    assert_eq!(drag.pointer_move(40.0, &slider), None);
}

#[test]
fn popover_closes_on_outside_press_only() {
    let toggle = Bounds::new(0.0, 0.0, 4.0, 1.0);
    let panel = Bounds::new(0.0, 1.0, 20.0, 3.0);
    let mut popover = Popover::default();

    assert!(!popover.on_global_pointer_down(50.0, 50.0, &toggle, &panel));

    popover.toggle();
    assert!(!popover.on_global_pointer_down(2.0, 0.0, &toggle, &panel));
    assert!(!popover.on_global_pointer_down(10.0, 2.0, &toggle, &panel));
    assert!(popover.is_visible());

    assert!(popover.on_global_pointer_down(50.0, 50.0, &toggle, &panel));
    assert!(!popover.is_visible());
}
