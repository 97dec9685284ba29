use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::models::{CurrentSongInfo, PlayState, Playlist, Song};

/// Everything the session layer needs from a remote player
///
/// `WebCtlClient` is the production implementation; tests substitute an
/// in-memory player. No method retries.
#[async_trait]
pub trait PlayerApi: Send + Sync {
    /// Reachability probe; every failure is reported as `false`
    async fn ping(&self) -> bool {
        match self.playlists().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Ping failed: {}", e);
                false
            }
        }
    }

    // Transport

    async fn play(&self) -> Result<()>;

    /// Select a song and start it at `play_position` seconds
    async fn play_song(&self, playlist_id: i64, song_position: u32, play_position: u32) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn next(&self) -> Result<()>;

    async fn previous(&self) -> Result<()>;

    // Status reads

    async fn play_state(&self) -> Result<PlayState>;

    /// Play position in seconds
    async fn song_play_position(&self) -> Result<u32>;

    async fn is_repeat_song(&self) -> Result<bool>;

    async fn volume(&self) -> Result<u8>;

    async fn is_mute(&self) -> Result<bool>;

    async fn is_shuffle(&self) -> Result<bool>;

    async fn current_song_info(&self) -> Result<CurrentSongInfo>;

    // Catalog

    /// Every playlist with its hash filled in, songs not loaded
    async fn playlists(&self) -> Result<Vec<Playlist>>;

    async fn playlist_hash(&self, playlist_id: i64) -> Result<String>;

    async fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<Song>>;

    // Status writes

    async fn set_song_play_position(&self, seconds: u32) -> Result<()>;

    async fn set_repeat_song(&self, repeat: bool) -> Result<()>;

    async fn set_volume(&self, volume: u8) -> Result<()>;

    async fn set_mute(&self, mute: bool) -> Result<()>;

    async fn set_shuffle(&self, shuffle: bool) -> Result<()>;

    async fn remove_song(&self, playlist_id: i64, song_position: u32) -> Result<()>;
}
