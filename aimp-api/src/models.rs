//! Value types shared by the protocol client and the state layers

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Song position meaning "nothing selected"
pub const NO_SONG: i32 = -1;

/// A single entry of a playlist
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Song {
    pub name: String,
    /// Whole seconds
    pub duration: u32,
}

impl Song {
    pub fn new(name: impl Into<String>, duration: u32) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    pub fn hours(&self) -> u32 {
        self.duration / 3600
    }

    /// Minutes past the hour, like [`Playlist::minutes`]
    pub fn minutes(&self) -> u32 {
        (self.duration / 60) % 60
    }

    /// Whole minutes of the song, as shown in `[mm:ss]`
    pub fn total_minutes(&self) -> u32 {
        self.duration / 60
    }

    pub fn seconds(&self) -> u32 {
        self.duration % 60
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:02}:{:02}] {}", self.total_minutes(), self.seconds(), self.name)
    }
}

/// A playlist as listed by the player
///
/// The songs are held behind an `Arc` so that an unchanged playlist can be
/// carried over from one catalog poll to the next without copying.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub size_bytes: u64,
    /// Whole seconds
    pub duration: u32,
    /// Opaque content hash reported by the player
    pub hash: String,
    songs: Arc<Vec<Song>>,
}

impl Playlist {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        size_bytes: u64,
        duration: u32,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            size_bytes,
            duration,
            hash: hash.into(),
            songs: Arc::new(Vec::new()),
        }
    }

    /// Builder-style helper used when the songs are already known
    pub fn with_songs(mut self, songs: Vec<Song>) -> Self {
        self.songs = Arc::new(songs);
        self
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn song(&self, position: i32) -> Option<&Song> {
        usize::try_from(position)
            .ok()
            .and_then(|index| self.songs.get(index))
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    pub fn set_songs(&mut self, songs: Vec<Song>) {
        self.songs = Arc::new(songs);
    }

    /// Reuse the song list of a previously fetched copy of this playlist
    pub fn share_songs_from(&mut self, other: &Playlist) {
        self.songs = Arc::clone(&other.songs);
    }

    /// Remove one song by position, returning it when the position was valid
    pub fn remove_song(&mut self, position: i32) -> Option<Song> {
        let index = usize::try_from(position).ok()?;
        if index >= self.songs.len() {
            return None;
        }
        Some(Arc::make_mut(&mut self.songs).remove(index))
    }

    pub fn find_song_position(&self, song: &Song) -> Option<i32> {
        self.songs
            .iter()
            .position(|candidate| candidate == song)
            .and_then(|index| i32::try_from(index).ok())
    }

    pub fn contains_song(&self, song: &Song) -> bool {
        self.songs.contains(song)
    }

    pub fn hours(&self) -> u32 {
        self.duration / 3600
    }

    pub fn minutes(&self) -> u32 {
        (self.duration / 60) % 60
    }

    pub fn seconds(&self) -> u32 {
        self.duration % 60
    }

    /// Per-playlist identity used for catalog diffing
    ///
    /// Covers every listed attribute, not the songs: the content hash already
    /// changes whenever the songs do.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.name.hash(&mut hasher);
        self.size_bytes.hash(&mut hasher);
        self.duration.hash(&mut hasher);
        self.hash.hash(&mut hasher);
        hasher.finish()
    }
}

/// Two playlists are the same content when both id and content hash agree
impl PartialEq for Playlist {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.hash == other.hash
    }
}

impl Eq for Playlist {}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// XOR of every playlist fingerprint; order-independent
pub fn catalog_fingerprint(playlists: &[Playlist]) -> u64 {
    playlists
        .iter()
        .fold(0, |acc, playlist| acc ^ playlist.fingerprint())
}

/// What the player reports as currently selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSongInfo {
    pub playlist_id: i64,
    /// `NO_SONG` when nothing is selected
    pub song_position: i32,
    pub song: Option<Song>,
}

impl CurrentSongInfo {
    pub fn has_song(&self) -> bool {
        self.song_position >= 0 && self.song.is_some()
    }
}

/// Transport state of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlayState::Playing => "playing",
            PlayState::Paused => "paused",
            PlayState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}
