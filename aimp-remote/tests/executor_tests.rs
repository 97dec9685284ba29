//! Command execution against an in-memory player, without sync loops

mod helpers;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aimp_api::{PlayState, PlayerApi};
use aimp_remote::executor::{execute, Command, CommandExecutor};
use aimp_remote::scope::SessionScope;
use aimp_remote::sync::loaders;
use aimp_remote::{ErrorBudgetConfig, SessionError};
use aimp_state::{Delivery, StateEvent, StateStore};
use helpers::{wait_until, FakePlayer};
use tokio::runtime::Handle;

const WAIT: Duration = Duration::from_secs(3);

struct Fixture {
    player: Arc<FakePlayer>,
    scope: Arc<SessionScope>,
    exhausted: Arc<AtomicU32>,
    events: Arc<Mutex<Vec<StateEvent>>>,
}

async fn fixture(player: Arc<FakePlayer>) -> Fixture {
    let store = Arc::new(StateStore::new(Delivery::Immediate));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.subscribe(move |event: &StateEvent| sink.lock().unwrap().push(event.clone()));

    let exhausted = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&exhausted);
    let scope = Arc::new(SessionScope::new(
        Arc::clone(&player) as Arc<dyn PlayerApi>,
        store,
        ErrorBudgetConfig::default(),
        move |_: &SessionError| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    ));

    loaders::load_initial_state(scope.api(), scope.store())
        .await
        .expect("initial load");
    player.clear_calls();
    events.lock().unwrap().clear();

    Fixture {
        player,
        scope,
        exhausted,
        events,
    }
}

#[tokio::test]
async fn test_play_updates_state_before_remote_call() {
    let f = fixture(FakePlayer::with_library()).await;

    execute(&f.scope, &Command::Play).await.unwrap();

    assert_eq!(f.scope.store().play_state(), PlayState::Playing);
    assert_eq!(f.player.calls(), vec!["play"]);
    assert!(matches!(f.events.lock().unwrap()[0], StateEvent::Play(_)));
}

#[tokio::test]
async fn test_failed_command_keeps_optimistic_state() {
    let f = fixture(FakePlayer::with_library()).await;
    f.player.fail("pause");

    let result = execute(&f.scope, &Command::Pause).await;

    assert!(matches!(result, Err(SessionError::Api(_))));
    assert_eq!(f.scope.store().play_state(), PlayState::Paused);
}

#[tokio::test]
async fn test_mute_then_unmute_restores_volume() {
    let player = FakePlayer::with_library();
    player.update(|s| s.volume = 40);
    let f = fixture(player).await;

    execute(&f.scope, &Command::SetMute(true)).await.unwrap();
    assert!(f.scope.store().read(|s| s.mute));
    assert_eq!(f.scope.store().volume(), 0);

    // A repeated mute must not lose the saved volume
    execute(&f.scope, &Command::SetMute(true)).await.unwrap();

    execute(&f.scope, &Command::SetMute(false)).await.unwrap();
    assert!(!f.scope.store().read(|s| s.mute));
    assert_eq!(f.scope.store().volume(), 40);

    assert_eq!(
        f.player.calls(),
        vec!["set_mute:true", "set_mute:true", "set_mute:false"]
    );
}

#[tokio::test]
async fn test_mute_is_one_atomic_update() {
    let player = FakePlayer::with_library();
    player.update(|s| s.volume = 40);
    let f = fixture(player).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let scope = Arc::clone(&f.scope);
    f.scope.store().subscribe(move |_: &StateEvent| {
        sink.lock()
            .unwrap()
            .push(scope.store().read(|s| (s.mute, s.volume)));
    });

    execute(&f.scope, &Command::SetMute(true)).await.unwrap();

    // Every observer callback sees the final muted state
    assert!(seen.lock().unwrap().iter().all(|pair| *pair == (true, 0)));
}

#[tokio::test]
async fn test_volume_is_clamped() {
    let f = fixture(FakePlayer::with_library()).await;

    execute(&f.scope, &Command::SetVolume(180)).await.unwrap();
    assert_eq!(f.scope.store().volume(), 100);

    execute(&f.scope, &Command::AdjustVolume(-250)).await.unwrap();
    assert_eq!(f.scope.store().volume(), 0);

    assert_eq!(f.player.calls(), vec!["set_volume:100", "set_volume:0"]);
}

#[tokio::test]
async fn test_seek_while_stopped_is_ignored() {
    let f = fixture(FakePlayer::with_library()).await;
    assert_eq!(f.scope.store().play_state(), PlayState::Stopped);
    let before = f.scope.store().snapshot();

    execute(&f.scope, &Command::ChangeSongPlayPosition(30))
        .await
        .unwrap();

    assert!(f.player.calls().is_empty());
    assert_eq!(f.scope.store().snapshot(), before);
    assert!(f.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_seek_is_clamped_to_song_duration() {
    let f = fixture(FakePlayer::with_library()).await;
    execute(&f.scope, &Command::ChangeSong { playlist_id: 10, song_position: 0 })
        .await
        .unwrap();
    f.player.clear_calls();

    execute(&f.scope, &Command::ChangeSongPlayPosition(999))
        .await
        .unwrap();

    assert_eq!(f.scope.store().read(|s| s.play_position), 180);
    assert_eq!(f.player.calls(), vec!["set_song_play_position:180"]);
}

#[tokio::test]
async fn test_change_song_selects_and_plays() {
    let f = fixture(FakePlayer::with_library()).await;

    execute(&f.scope, &Command::ChangeSong { playlist_id: 11, song_position: 1 })
        .await
        .unwrap();

    let state = f.scope.store().snapshot();
    assert_eq!(state.playlist_id, 11);
    assert_eq!(state.song_position, 1);
    assert_eq!(state.play_state, PlayState::Playing);
    assert_eq!(state.current_song().map(|s| s.name.as_str()), Some("green"));
    assert_eq!(f.player.calls(), vec!["play_song:11:1:0"]);

    let kinds: Vec<&str> = f.events.lock().unwrap().iter().map(StateEvent::kind).collect();
    assert_eq!(kinds, vec!["song_changed", "play"]);
}

#[tokio::test]
async fn test_change_song_rejects_unknown_song() {
    let f = fixture(FakePlayer::with_library()).await;

    let result = execute(&f.scope, &Command::ChangeSong { playlist_id: 11, song_position: 9 }).await;

    assert!(matches!(result, Err(SessionError::InvalidCommand(_))));
    assert!(f.player.calls().is_empty());
}

#[tokio::test]
async fn test_next_refetches_current_song() {
    let player = FakePlayer::with_library();
    let f = fixture(Arc::clone(&player)).await;
    execute(&f.scope, &Command::ChangeSong { playlist_id: 10, song_position: 0 })
        .await
        .unwrap();
    f.player.clear_calls();

    execute(&f.scope, &Command::Next).await.unwrap();

    assert_eq!(f.player.calls(), vec!["next", "current_song_info"]);
    assert_eq!(f.scope.store().read(|s| s.song_position), 1);
}

#[tokio::test]
async fn test_previous_refetches_current_song() {
    let f = fixture(FakePlayer::with_library()).await;
    execute(&f.scope, &Command::ChangeSong { playlist_id: 10, song_position: 2 })
        .await
        .unwrap();
    f.player.clear_calls();
    f.events.lock().unwrap().clear();

    execute(&f.scope, &Command::Previous).await.unwrap();

    assert_eq!(f.player.calls(), vec!["previous", "current_song_info"]);
    assert_eq!(f.scope.store().read(|s| (s.playlist_id, s.song_position)), (10, 1));

    let events = f.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        StateEvent::SongChanged(now) => {
            assert_eq!(now.song_position, 1);
            assert_eq!(now.song.as_ref().map(|s| s.name.as_str()), Some("two"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_remove_song_mirrors_remote_delete() {
    let f = fixture(FakePlayer::with_library()).await;

    execute(&f.scope, &Command::RemoveSong { playlist_id: 10, song_position: 1 })
        .await
        .unwrap();

    let playlist = f.scope.store().playlist(10).unwrap();
    let names: Vec<&str> = playlist.songs().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["one", "three"]);
    assert_eq!(f.player.calls(), vec!["remove_song:10:1"]);

    let events = f.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StateEvent::PlaylistUpdated(p) if p.id == 10));
}

#[tokio::test]
async fn test_failed_remove_leaves_playlist_alone() {
    let f = fixture(FakePlayer::with_library()).await;
    f.player.fail("remove_song");

    let result = execute(&f.scope, &Command::RemoveSong { playlist_id: 10, song_position: 1 }).await;

    assert!(result.is_err());
    assert_eq!(f.scope.store().playlist(10).unwrap().song_count(), 3);
}

#[tokio::test]
async fn test_commands_run_in_submission_order() {
    let f = fixture(FakePlayer::with_library()).await;
    let executor = CommandExecutor::start(Arc::clone(&f.scope), &Handle::current());

    for volume in [10u8, 20, 30, 40, 50] {
        assert!(executor.submit(Command::SetVolume(volume)));
    }
    executor.submit(Command::SetShuffle(true));
    executor.submit(Command::Play);

    assert!(wait_until(WAIT, || f.player.calls().len() == 7).await);
    assert_eq!(
        f.player.calls(),
        vec![
            "set_volume:10",
            "set_volume:20",
            "set_volume:30",
            "set_volume:40",
            "set_volume:50",
            "set_shuffle:true",
            "play",
        ]
    );

    executor.shutdown().await;
}

#[tokio::test]
async fn test_extreme_volume_deltas_saturate_and_keep_worker_alive() {
    let f = fixture(FakePlayer::with_library()).await;
    let executor = CommandExecutor::start(Arc::clone(&f.scope), &Handle::current());

    assert!(executor.submit(Command::AdjustVolume(i32::MAX)));
    assert!(wait_until(WAIT, || f.player.count("set_volume") == 1).await);
    assert_eq!(f.scope.store().volume(), 100);

    assert!(executor.submit(Command::AdjustVolume(i32::MIN)));
    assert!(wait_until(WAIT, || f.player.count("set_volume") == 2).await);
    assert_eq!(f.scope.store().volume(), 0);

    assert!(executor.submit(Command::SetVolume(10)));
    assert!(wait_until(WAIT, || f.player.count("set_volume") == 3).await);
    assert_eq!(
        f.player.calls_named("set_volume"),
        vec!["set_volume:100", "set_volume:0", "set_volume:10"]
    );
    assert_eq!(f.scope.store().volume(), 10);
    assert_eq!(f.exhausted.load(Ordering::SeqCst), 0);

    executor.shutdown().await;
}

#[tokio::test]
async fn test_ten_failures_exhaust_budget_and_stop_the_queue() {
    let f = fixture(FakePlayer::with_library()).await;
    f.player.fail("play");
    let executor = CommandExecutor::start(Arc::clone(&f.scope), &Handle::current());

    for _ in 0..11 {
        executor.submit(Command::Play);
    }

    assert!(wait_until(WAIT, || f.exhausted.load(Ordering::SeqCst) == 1).await);
    // Give the worker a chance to (not) pick up the eleventh command
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(f.player.count("play"), 10);
    assert!(f.scope.is_shut_down());
    assert_eq!(f.exhausted.load(Ordering::SeqCst), 1);

    executor.shutdown().await;
}

#[tokio::test]
async fn test_rejected_commands_do_not_count() {
    let f = fixture(FakePlayer::with_library()).await;
    let executor = CommandExecutor::start(Arc::clone(&f.scope), &Handle::current());

    for _ in 0..12 {
        executor.submit(Command::ChangeSong { playlist_id: 99, song_position: 0 });
    }
    executor.submit(Command::Stop);

    assert!(wait_until(WAIT, || f.player.count("stop") == 1).await);
    assert!(!f.scope.is_shut_down());
    assert_eq!(f.exhausted.load(Ordering::SeqCst), 0);

    executor.shutdown().await;
}

#[tokio::test]
async fn test_ramp_steps_reach_full_volume() {
    let player = FakePlayer::with_library();
    player.update(|s| s.volume = 0);
    let f = fixture(player).await;

    let mut ramp = aimp_remote::VolumeRamp::new(aimp_remote::RampDirection::Up);
    for _ in 0..10 {
        execute(&f.scope, &Command::AdjustVolume(ramp.next_step()))
            .await
            .unwrap();
    }

    assert_eq!(f.scope.store().volume(), 100);
    assert_eq!(
        f.player.calls_named("set_volume"),
        vec![
            "set_volume:1",
            "set_volume:4",
            "set_volume:10",
            "set_volume:18",
            "set_volume:29",
            "set_volume:43",
            "set_volume:59",
            "set_volume:78",
            "set_volume:99",
            "set_volume:100",
        ]
    );
}
