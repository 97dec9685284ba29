//! Shared helpers for session-level tests
//!
//! `FakePlayer` is an in-memory `PlayerApi` with a call log and switchable
//! failures; `FakeConnector` hands the same fake to every session.

#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aimp_api::{ApiError, CurrentSongInfo, PlayState, PlayerApi, Playlist, Song, NO_SONG};
use aimp_remote::{Connector, Endpoint, SessionError};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct FakeState {
    pub playlists: Vec<Playlist>,
    pub current: CurrentSongInfo,
    pub play_state: PlayState,
    pub position: u32,
    pub volume: u8,
    pub mute: bool,
    pub shuffle: bool,
    pub repeat: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            playlists: Vec::new(),
            current: CurrentSongInfo {
                playlist_id: 0,
                song_position: NO_SONG,
                song: None,
            },
            play_state: PlayState::Stopped,
            position: 0,
            volume: 50,
            mute: false,
            shuffle: false,
            repeat: false,
        }
    }
}

#[derive(Default)]
pub struct FakePlayer {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    unreachable: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
}

impl FakePlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Two playlists: 10 ("rock", hash "a") and 11 ("jazz", hash "b")
    pub fn with_library() -> Arc<Self> {
        let player = Self::new();
        player.set_playlists(vec![
            playlist(10, "rock", "a", &[("one", 180), ("two", 200), ("three", 240)]),
            playlist(11, "jazz", "b", &[("blue", 300), ("green", 320)]),
        ]);
        player
    }

    pub fn set_playlists(&self, playlists: Vec<Playlist>) {
        self.state.lock().unwrap().playlists = playlists;
    }

    pub fn update(&self, apply: impl FnOnce(&mut FakeState)) {
        apply(&mut self.state.lock().unwrap());
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }

    /// Make every call named `name` fail (`"play"` does not cover `"play_song"`)
    pub fn fail(&self, name: &'static str) {
        self.failing.lock().unwrap().insert(name);
    }

    pub fn recover(&self, name: &'static str) {
        self.failing.lock().unwrap().remove(name);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    /// Delay every call, to keep sessions in a given phase
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Number of logged calls named `name`
    pub fn count(&self, name: &str) -> usize {
        self.calls_named(name).len()
    }

    /// Logged calls named `name`, arguments included, in order
    pub fn calls_named(&self, name: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call_name(call) == name)
            .cloned()
            .collect()
    }

    async fn record(&self, call: String) -> aimp_api::Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.unreachable.lock().unwrap() {
            return Err(ApiError::NetworkError("connection refused".to_string()));
        }

        let failing = self.failing.lock().unwrap().contains(call_name(&call));
        self.calls.lock().unwrap().push(call.clone());

        if failing {
            Err(ApiError::NetworkError(format!("{} failed", call)))
        } else {
            Ok(())
        }
    }
}

fn call_name(call: &str) -> &str {
    call.split(':').next().unwrap_or(call)
}

pub fn playlist(id: i64, name: &str, hash: &str, songs: &[(&str, u32)]) -> Playlist {
    Playlist::new(id, name, 1000, 600, hash).with_songs(
        songs
            .iter()
            .map(|(name, duration)| Song::new(*name, *duration))
            .collect(),
    )
}

#[async_trait]
impl PlayerApi for FakePlayer {
    async fn play(&self) -> aimp_api::Result<()> {
        self.record("play".to_string()).await?;
        self.update(|s| s.play_state = PlayState::Playing);
        Ok(())
    }

    async fn play_song(&self, playlist_id: i64, song_position: u32, play_position: u32) -> aimp_api::Result<()> {
        self.record(format!("play_song:{}:{}:{}", playlist_id, song_position, play_position))
            .await?;
        self.update(|s| {
            let song = s
                .playlists
                .iter()
                .find(|p| p.id == playlist_id)
                .and_then(|p| p.song(song_position as i32).cloned());
            s.current = CurrentSongInfo {
                playlist_id,
                song_position: song_position as i32,
                song,
            };
            s.play_state = PlayState::Playing;
            s.position = play_position;
        });
        Ok(())
    }

    async fn stop(&self) -> aimp_api::Result<()> {
        self.record("stop".to_string()).await?;
        self.update(|s| s.play_state = PlayState::Stopped);
        Ok(())
    }

    async fn pause(&self) -> aimp_api::Result<()> {
        self.record("pause".to_string()).await?;
        // The plugin reports a paused player as not playing
        self.update(|s| s.play_state = PlayState::Stopped);
        Ok(())
    }

    async fn next(&self) -> aimp_api::Result<()> {
        self.record("next".to_string()).await?;
        self.update(|s| {
            let next = s.current.song_position + 1;
            let song = s
                .playlists
                .iter()
                .find(|p| p.id == s.current.playlist_id)
                .and_then(|p| p.song(next).cloned());
            if song.is_some() {
                s.current.song_position = next;
                s.current.song = song;
            }
        });
        Ok(())
    }

    async fn previous(&self) -> aimp_api::Result<()> {
        self.record("previous".to_string()).await?;
        self.update(|s| {
            let previous = s.current.song_position - 1;
            let song = s
                .playlists
                .iter()
                .find(|p| p.id == s.current.playlist_id)
                .and_then(|p| p.song(previous).cloned());
            if song.is_some() {
                s.current.song_position = previous;
                s.current.song = song;
            }
        });
        Ok(())
    }

    async fn play_state(&self) -> aimp_api::Result<PlayState> {
        self.record("play_state".to_string()).await?;
        Ok(self.state().play_state)
    }

    async fn song_play_position(&self) -> aimp_api::Result<u32> {
        self.record("song_play_position".to_string()).await?;
        Ok(self.state().position)
    }

    async fn is_repeat_song(&self) -> aimp_api::Result<bool> {
        self.record("is_repeat_song".to_string()).await?;
        Ok(self.state().repeat)
    }

    async fn volume(&self) -> aimp_api::Result<u8> {
        self.record("volume".to_string()).await?;
        Ok(self.state().volume)
    }

    async fn is_mute(&self) -> aimp_api::Result<bool> {
        self.record("is_mute".to_string()).await?;
        Ok(self.state().mute)
    }

    async fn is_shuffle(&self) -> aimp_api::Result<bool> {
        self.record("is_shuffle".to_string()).await?;
        Ok(self.state().shuffle)
    }

    async fn current_song_info(&self) -> aimp_api::Result<CurrentSongInfo> {
        self.record("current_song_info".to_string()).await?;
        Ok(self.state().current)
    }

    async fn playlists(&self) -> aimp_api::Result<Vec<Playlist>> {
        self.record("playlists".to_string()).await?;
        // Listing never carries songs
        Ok(self
            .state()
            .playlists
            .iter()
            .map(|p| Playlist::new(p.id, p.name.clone(), p.size_bytes, p.duration, p.hash.clone()))
            .collect())
    }

    async fn playlist_hash(&self, playlist_id: i64) -> aimp_api::Result<String> {
        self.record(format!("playlist_hash:{}", playlist_id)).await?;
        self.state()
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .map(|p| p.hash.clone())
            .ok_or(ApiError::PlaylistNotFound(playlist_id))
    }

    async fn playlist_songs(&self, playlist_id: i64) -> aimp_api::Result<Vec<Song>> {
        self.record(format!("playlist_songs:{}", playlist_id)).await?;
        self.state()
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .map(|p| p.songs().to_vec())
            .ok_or(ApiError::PlaylistNotFound(playlist_id))
    }

    async fn set_song_play_position(&self, seconds: u32) -> aimp_api::Result<()> {
        self.record(format!("set_song_play_position:{}", seconds)).await?;
        self.update(|s| s.position = seconds);
        Ok(())
    }

    async fn set_repeat_song(&self, repeat: bool) -> aimp_api::Result<()> {
        self.record(format!("set_repeat_song:{}", repeat)).await?;
        self.update(|s| s.repeat = repeat);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> aimp_api::Result<()> {
        self.record(format!("set_volume:{}", volume)).await?;
        self.update(|s| s.volume = volume);
        Ok(())
    }

    async fn set_mute(&self, mute: bool) -> aimp_api::Result<()> {
        self.record(format!("set_mute:{}", mute)).await?;
        self.update(|s| s.mute = mute);
        Ok(())
    }

    async fn set_shuffle(&self, shuffle: bool) -> aimp_api::Result<()> {
        self.record(format!("set_shuffle:{}", shuffle)).await?;
        self.update(|s| s.shuffle = shuffle);
        Ok(())
    }

    async fn remove_song(&self, playlist_id: i64, song_position: u32) -> aimp_api::Result<()> {
        self.record(format!("remove_song:{}:{}", playlist_id, song_position))
            .await?;
        self.update(|s| {
            if let Some(p) = s.playlists.iter_mut().find(|p| p.id == playlist_id) {
                p.remove_song(song_position as i32);
            }
        });
        Ok(())
    }

    /// Reachability only; not recorded in the call log
    async fn ping(&self) -> bool {
        !*self.unreachable.lock().unwrap()
    }
}

/// Hands out the same fake for every session
#[derive(Clone)]
pub struct FakeConnector {
    pub player: Arc<FakePlayer>,
}

impl FakeConnector {
    pub fn new(player: Arc<FakePlayer>) -> Self {
        Self { player }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _endpoint: &Endpoint) -> Result<Arc<dyn PlayerApi>, SessionError> {
        Ok(Arc::clone(&self.player) as Arc<dyn PlayerApi>)
    }
}

/// Poll `condition` every 10 ms until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Await a future with a deadline, panicking with `what` on timeout
pub async fn within<T>(timeout: Duration, what: &str, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}
