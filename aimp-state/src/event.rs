//! Notifications produced by the state store

use aimp_api::{PlayState, Playlist, Song};

/// Snapshot of what is selected, attached to song and transport events
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub playlist: Option<Playlist>,
    pub song: Option<Song>,
    /// Position of the song inside its playlist, `aimp_api::NO_SONG` when none
    pub song_position: i32,
    /// Seconds into the song
    pub play_position: u32,
    /// `play_position` relative to the song duration, in [0, 1]
    pub fraction: f64,
}

/// A change observed in the mirrored player state
///
/// Events are only produced for real changes: setting a value to what the
/// store already holds is silent.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    Play(NowPlaying),
    Pause(NowPlaying),
    Stop(NowPlaying),
    /// The set or order of playlists changed; carries the whole catalog
    PlaylistsUpdated {
        playlists: Vec<Playlist>,
        now_playing: NowPlaying,
    },
    /// One playlist's content changed in place
    PlaylistUpdated(Playlist),
    SongChanged(NowPlaying),
    SongPositionChanged(NowPlaying),
    VolumeChanged(u8),
    ShuffleChanged(bool),
    RepeatChanged(bool),
    MuteChanged(bool),
}

impl StateEvent {
    pub(crate) fn for_play_state(state: PlayState, now_playing: NowPlaying) -> Self {
        match state {
            PlayState::Playing => StateEvent::Play(now_playing),
            PlayState::Paused => StateEvent::Pause(now_playing),
            PlayState::Stopped => StateEvent::Stop(now_playing),
        }
    }

    /// Short name, mostly for logs
    pub fn kind(&self) -> &'static str {
        match self {
            StateEvent::Play(_) => "play",
            StateEvent::Pause(_) => "pause",
            StateEvent::Stop(_) => "stop",
            StateEvent::PlaylistsUpdated { .. } => "playlists_updated",
            StateEvent::PlaylistUpdated(_) => "playlist_updated",
            StateEvent::SongChanged(_) => "song_changed",
            StateEvent::SongPositionChanged(_) => "song_position_changed",
            StateEvent::VolumeChanged(_) => "volume_changed",
            StateEvent::ShuffleChanged(_) => "shuffle_changed",
            StateEvent::RepeatChanged(_) => "repeat_changed",
            StateEvent::MuteChanged(_) => "mute_changed",
        }
    }
}
