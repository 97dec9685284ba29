//! reqwest-backed client for the Web Control plugin

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::api::PlayerApi;
use crate::error::{ApiError, Result};
use crate::models::{CurrentSongInfo, PlayState, Playlist, Song, NO_SONG};
use crate::status::StatusCode;

/// Port the plugin listens on out of the box
pub const DEFAULT_PORT: u16 = 38475;

/// Connect and read timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connection parameters for a `WebCtlClient`
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    /// Sent as the `User-Agent` header
    pub client_name: String,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Base URL every action is sent to
    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("http://[{}]:{}/", self.host, self.port)
        } else {
            format!("http://{}:{}/", self.host, self.port)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            client_name: "aimp-remote".to_string(),
        }
    }
}

/// Client for one player endpoint
///
/// Holds connection parameters only; all player state lives in the caller.
#[derive(Debug, Clone)]
pub struct WebCtlClient {
    http: reqwest::Client,
    base_url: String,
}

impl WebCtlClient {
    /// Create a client with the default timeout and client name
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::with_config(ClientConfig::new(host, port))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .user_agent(config.client_name.clone())
            .build()
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one action and return the raw response body
    async fn request(&self, action: &str, params: &[(&str, String)]) -> Result<String> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(params.len() + 1);
        query.push(("action", action.to_string()));
        query.extend(params.iter().cloned());

        trace!("GET {} action={}", self.base_url, action);

        let body = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(body)
    }

    /// Read one entry of the status namespace as raw text
    pub async fn custom_status(&self, status: StatusCode) -> Result<String> {
        let body = self
            .request("get_custom_status", &[("status", status.code().to_string())])
            .await?;
        Ok(body.trim().to_string())
    }

    /// Write one entry of the status namespace
    pub async fn set_custom_status(&self, status: StatusCode, value: &str) -> Result<()> {
        self.request(
            "set_custom_status",
            &[
                ("status", status.code().to_string()),
                ("value", value.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn bool_status(&self, status: StatusCode) -> Result<bool> {
        parse_bool_status(&self.custom_status(status).await?)
    }

    async fn set_bool_status(&self, status: StatusCode, value: bool) -> Result<()> {
        self.set_custom_status(status, if value { "1" } else { "0" })
            .await
    }
}

#[async_trait]
impl PlayerApi for WebCtlClient {
    async fn play(&self) -> Result<()> {
        self.request("player_play", &[]).await.map(drop)
    }

    async fn play_song(&self, playlist_id: i64, song_position: u32, play_position: u32) -> Result<()> {
        debug!(
            "Playing song {} of playlist {} from {}s",
            song_position, playlist_id, play_position
        );
        self.request(
            "set_song_play",
            &[
                ("playlist", playlist_id.to_string()),
                ("song", song_position.to_string()),
            ],
        )
        .await?;
        self.set_song_play_position(play_position).await
    }

    async fn stop(&self) -> Result<()> {
        self.request("player_stop", &[]).await.map(drop)
    }

    async fn pause(&self) -> Result<()> {
        self.request("player_pause", &[]).await.map(drop)
    }

    async fn next(&self) -> Result<()> {
        self.request("player_next", &[]).await.map(drop)
    }

    async fn previous(&self) -> Result<()> {
        // Action name as deployed by the plugin
        self.request("player_prevous", &[]).await.map(drop)
    }

    async fn play_state(&self) -> Result<PlayState> {
        let playing = self.bool_status(StatusCode::Play).await?;
        Ok(if playing {
            PlayState::Playing
        } else {
            PlayState::Stopped
        })
    }

    async fn song_play_position(&self) -> Result<u32> {
        parse_position(&self.custom_status(StatusCode::Position).await?)
    }

    async fn is_repeat_song(&self) -> Result<bool> {
        self.bool_status(StatusCode::RepeatSong).await
    }

    async fn volume(&self) -> Result<u8> {
        parse_volume(&self.custom_status(StatusCode::Volume).await?)
    }

    async fn is_mute(&self) -> Result<bool> {
        self.bool_status(StatusCode::Mute).await
    }

    async fn is_shuffle(&self) -> Result<bool> {
        self.bool_status(StatusCode::Shuffle).await
    }

    async fn current_song_info(&self) -> Result<CurrentSongInfo> {
        let body = self.request("get_song_current", &[]).await?;
        parse_current_song(&body)
    }

    async fn playlists(&self) -> Result<Vec<Playlist>> {
        let body = self.request("get_playlist_list", &[]).await?;
        let mut playlists = parse_playlists(&body)?;

        for playlist in &mut playlists {
            playlist.hash = self.playlist_hash(playlist.id).await?;
        }

        Ok(playlists)
    }

    async fn playlist_hash(&self, playlist_id: i64) -> Result<String> {
        let body = self
            .request("get_playlist_crc", &[("id", playlist_id.to_string())])
            .await?;
        Ok(body.trim().to_string())
    }

    async fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<Song>> {
        let body = self
            .request("get_playlist_songs", &[("id", playlist_id.to_string())])
            .await?;
        parse_playlist_songs(playlist_id, &body)
    }

    async fn set_song_play_position(&self, seconds: u32) -> Result<()> {
        self.set_custom_status(StatusCode::Position, &seconds.to_string())
            .await
    }

    async fn set_repeat_song(&self, repeat: bool) -> Result<()> {
        self.set_bool_status(StatusCode::RepeatSong, repeat).await
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        if volume > 100 {
            return Err(ApiError::InvalidParameter(format!(
                "Volume {} is out of range [0, 100]",
                volume
            )));
        }
        self.set_custom_status(StatusCode::Volume, &volume.to_string())
            .await
    }

    async fn set_mute(&self, mute: bool) -> Result<()> {
        self.set_bool_status(StatusCode::Mute, mute).await
    }

    async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.set_bool_status(StatusCode::Shuffle, shuffle).await
    }

    async fn remove_song(&self, playlist_id: i64, song_position: u32) -> Result<()> {
        self.request(
            "playlist_del_file",
            &[
                ("playlist", playlist_id.to_string()),
                ("file", song_position.to_string()),
            ],
        )
        .await
        .map(drop)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    id: i64,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct SongEntry {
    name: String,
    /// Milliseconds
    length: u64,
}

#[derive(Debug, Deserialize)]
struct SongsResponse {
    status: String,
    #[serde(default)]
    songs: Vec<SongEntry>,
}

#[derive(Debug, Deserialize)]
struct CurrentSongResponse {
    status: String,
    #[serde(rename = "PlayingList", default)]
    playing_list: i64,
    #[serde(rename = "PlayingFile", default = "no_song")]
    playing_file: i32,
    #[serde(rename = "PlayingFileName", default)]
    playing_file_name: String,
    /// Milliseconds
    #[serde(default)]
    length: u64,
}

fn no_song() -> i32 {
    NO_SONG
}

fn millis_to_seconds(millis: u64) -> u32 {
    u32::try_from(millis / 1000).unwrap_or(u32::MAX)
}

/// Parse a `"1"`/`"0"` status value; anything else is a protocol error
pub fn parse_bool_status(raw: &str) -> Result<bool> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ApiError::ParseError(format!(
            "Expected boolean status \"0\" or \"1\", got {:?}",
            other
        ))),
    }
}

/// Parse a volume status value, which must lie in [0, 100]
pub fn parse_volume(raw: &str) -> Result<u8> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::ParseError(format!("Volume is not a number: {:?}", raw)))?;

    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| ApiError::ParseError(format!("Volume {} is out of range [0, 100]", value)))
}

/// Parse a play position status value in seconds, which must be non-negative
pub fn parse_position(raw: &str) -> Result<u32> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::ParseError(format!("Position is not a number: {:?}", raw)))?;

    u32::try_from(value)
        .map_err(|_| ApiError::ParseError(format!("Position {} must not be negative", value)))
}

/// Parse the `get_playlist_list` body; hashes are left empty
pub fn parse_playlists(body: &str) -> Result<Vec<Playlist>> {
    let entries: Vec<PlaylistEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .map(|entry| Playlist::new(entry.id, entry.name, entry.size, entry.duration, String::new()))
        .collect())
}

/// Parse the `get_playlist_songs` body
pub fn parse_playlist_songs(playlist_id: i64, body: &str) -> Result<Vec<Song>> {
    let response: SongsResponse = serde_json::from_str(body)?;
    if response.status != "OK" {
        return Err(ApiError::PlaylistNotFound(playlist_id));
    }

    Ok(response
        .songs
        .into_iter()
        .map(|entry| Song::new(entry.name, millis_to_seconds(entry.length)))
        .collect())
}

/// Parse the `get_song_current` body
pub fn parse_current_song(body: &str) -> Result<CurrentSongInfo> {
    let response: CurrentSongResponse = serde_json::from_str(body)?;
    if response.status != "OK" {
        return Err(ApiError::RemoteFailure(format!(
            "Unable to retrieve the current song (status {:?})",
            response.status
        )));
    }

    let song = (response.playing_file >= 0).then(|| {
        Song::new(response.playing_file_name, millis_to_seconds(response.length))
    });

    Ok(CurrentSongInfo {
        playlist_id: response.playing_list,
        song_position: if song.is_some() { response.playing_file } else { NO_SONG },
        song,
    })
}
