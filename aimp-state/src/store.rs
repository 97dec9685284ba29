//! Mirrored player state and its change-detecting mutation API
//!
//! All writes go through [`StateStore::update`], which hands out a
//! [`StateTxn`] while the state lock is held. Every setter on the transaction
//! compares against the current value and records an event only when the
//! value really changes; the recorded events are published once the
//! transaction is over, outside the state lock.

use aimp_api::{catalog_fingerprint, CurrentSongInfo, PlayState, Playlist, Song, NO_SONG};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::event::{NowPlaying, StateEvent};
use crate::observer::{Delivery, Dispatcher, StateObserver, SubscriptionId};

/// Plain snapshot of a session's player state
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub playlists: Vec<Playlist>,
    pub catalog_fingerprint: u64,
    pub playlist_id: i64,
    pub song_position: i32,
    pub play_state: PlayState,
    /// Seconds into the current song
    pub play_position: u32,
    pub volume: u8,
    pub volume_before_mute: u8,
    pub shuffle: bool,
    pub repeat: bool,
    pub mute: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            playlists: Vec::new(),
            catalog_fingerprint: 0,
            playlist_id: 0,
            song_position: NO_SONG,
            play_state: PlayState::Stopped,
            play_position: 0,
            volume: 0,
            volume_before_mute: 0,
            shuffle: false,
            repeat: false,
            mute: false,
        }
    }
}

impl PlayerState {
    pub fn playlist(&self, id: i64) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    pub fn playlist_index(&self, id: i64) -> Option<usize> {
        self.playlists.iter().position(|p| p.id == id)
    }

    pub fn current_playlist(&self) -> Option<&Playlist> {
        self.playlist(self.playlist_id)
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current_playlist()
            .and_then(|playlist| playlist.song(self.song_position))
    }

    pub fn now_playing(&self) -> NowPlaying {
        let playlist = self.current_playlist().cloned();
        let song = playlist
            .as_ref()
            .and_then(|p| p.song(self.song_position))
            .cloned();
        let fraction = match &song {
            Some(song) if song.duration > 0 => {
                (f64::from(self.play_position) / f64::from(song.duration)).min(1.0)
            }
            _ => 0.0,
        };

        NowPlaying {
            playlist,
            song,
            song_position: self.song_position,
            play_position: self.play_position,
            fraction,
        }
    }
}

/// Mutable view of the state handed out by [`StateStore::update`]
pub struct StateTxn<'a> {
    state: &'a mut PlayerState,
    events: Vec<StateEvent>,
}

impl<'a> StateTxn<'a> {
    /// Read access to the state as modified so far
    pub fn state(&self) -> &PlayerState {
        self.state
    }

    pub fn set_play_state(&mut self, play_state: PlayState) -> bool {
        if self.state.play_state == play_state {
            return false;
        }
        self.state.play_state = play_state;
        if play_state == PlayState::Stopped {
            self.state.play_position = 0;
        }
        self.events
            .push(StateEvent::for_play_state(play_state, self.state.now_playing()));
        true
    }

    pub fn set_play_position(&mut self, seconds: u32) -> bool {
        if self.state.play_position == seconds {
            return false;
        }
        self.state.play_position = seconds;
        self.events
            .push(StateEvent::SongPositionChanged(self.state.now_playing()));
        true
    }

    /// Move the play position one second forward while playing
    ///
    /// Stays put when stopped, paused, or at the end of the song.
    pub fn advance_position(&mut self) -> bool {
        if self.state.play_state != PlayState::Playing {
            return false;
        }
        let duration = match self.state.current_song() {
            Some(song) => song.duration,
            None => return false,
        };
        if self.state.play_position >= duration {
            return false;
        }
        self.set_play_position(self.state.play_position + 1)
    }

    /// Set the volume, clamped to [0, 100]
    ///
    /// A non-zero volume while muted also lifts the mute.
    pub fn set_volume(&mut self, volume: u8) -> bool {
        let volume = volume.min(100);
        if self.state.volume == volume {
            return false;
        }
        self.state.volume = volume;
        self.events.push(StateEvent::VolumeChanged(volume));
        if volume > 0 {
            self.set_mute(false);
        }
        true
    }

    /// Reconcile a volume reading from the player
    ///
    /// While muted the volume stays at 0 and the reading only refreshes the
    /// volume an unmute restores.
    pub fn apply_remote_volume(&mut self, volume: u8) -> bool {
        if self.state.mute {
            self.state.volume_before_mute = volume.min(100);
            return self.set_volume(0);
        }
        self.set_volume(volume)
    }

    pub fn set_mute(&mut self, mute: bool) -> bool {
        if self.state.mute == mute {
            return false;
        }
        self.state.mute = mute;
        self.events.push(StateEvent::MuteChanged(mute));
        true
    }

    pub fn set_shuffle(&mut self, shuffle: bool) -> bool {
        if self.state.shuffle == shuffle {
            return false;
        }
        self.state.shuffle = shuffle;
        self.events.push(StateEvent::ShuffleChanged(shuffle));
        true
    }

    pub fn set_repeat(&mut self, repeat: bool) -> bool {
        if self.state.repeat == repeat {
            return false;
        }
        self.state.repeat = repeat;
        self.events.push(StateEvent::RepeatChanged(repeat));
        true
    }

    /// Save the current volume so an unmute can restore it
    pub fn remember_volume(&mut self) {
        self.state.volume_before_mute = self.state.volume;
    }

    pub fn volume_before_mute(&self) -> u8 {
        self.state.volume_before_mute
    }

    /// Select a song; the identity is the (playlist, position) pair
    ///
    /// Selecting a new song rewinds the play position. Moving between two
    /// "no song" selections is silent.
    pub fn set_current_song(&mut self, playlist_id: i64, song_position: i32) -> bool {
        let song_position = song_position.max(NO_SONG);
        if self.state.playlist_id == playlist_id && self.state.song_position == song_position {
            return false;
        }

        let was_empty = self.state.song_position < 0;
        self.state.playlist_id = playlist_id;
        self.state.song_position = song_position;

        if was_empty && song_position < 0 {
            return false;
        }

        self.state.play_position = 0;
        self.events.push(StateEvent::SongChanged(self.state.now_playing()));
        true
    }

    pub fn apply_current_song(&mut self, info: &CurrentSongInfo) -> bool {
        let position = if info.has_song() {
            info.song_position
        } else {
            NO_SONG
        };
        self.set_current_song(info.playlist_id, position)
    }

    /// Replace the playlist catalog
    ///
    /// Nothing happens when the combined fingerprint is unchanged. When the
    /// ids or names changed, one `PlaylistsUpdated` carries the whole
    /// catalog; otherwise every playlist whose hash changed gets its own
    /// `PlaylistUpdated`. Size or duration drift alone only refreshes the
    /// stored catalog.
    pub fn set_playlists(&mut self, playlists: Vec<Playlist>) -> bool {
        let fingerprint = catalog_fingerprint(&playlists);
        if fingerprint == self.state.catalog_fingerprint
            && playlists.len() == self.state.playlists.len()
        {
            trace!("Playlist catalog unchanged");
            return false;
        }

        let layout_changed = playlists.len() != self.state.playlists.len()
            || playlists
                .iter()
                .zip(&self.state.playlists)
                .any(|(new, old)| new.id != old.id || new.name != old.name);

        let changed: Vec<Playlist> = if layout_changed {
            Vec::new()
        } else {
            playlists
                .iter()
                .zip(&self.state.playlists)
                .filter(|(new, old)| new.hash != old.hash)
                .map(|(new, _)| new.clone())
                .collect()
        };

        self.state.playlists = playlists;
        self.state.catalog_fingerprint = fingerprint;

        if layout_changed {
            debug!("Playlist catalog replaced ({} playlists)", self.state.playlists.len());
            self.events.push(StateEvent::PlaylistsUpdated {
                playlists: self.state.playlists.clone(),
                now_playing: self.state.now_playing(),
            });
        } else {
            for playlist in changed {
                debug!("Playlist {} updated", playlist.id);
                self.events.push(StateEvent::PlaylistUpdated(playlist));
            }
        }
        true
    }

    /// Mirror a remote single-song delete
    pub fn remove_song(&mut self, playlist_id: i64, song_position: i32) -> bool {
        let index = match self.state.playlist_index(playlist_id) {
            Some(index) => index,
            None => return false,
        };

        let playlist = &mut self.state.playlists[index];
        if playlist.remove_song(song_position).is_none() {
            return false;
        }
        let updated = playlist.clone();

        if self.state.playlist_id == playlist_id && song_position < self.state.song_position {
            self.state.song_position -= 1;
        }

        self.events.push(StateEvent::PlaylistUpdated(updated));
        true
    }
}

/// Thread-safe owner of one session's [`PlayerState`]
pub struct StateStore {
    state: Mutex<PlayerState>,
    /// Keeps batches from concurrent updates in the order they were made
    publish_order: ReentrantMutex<()>,
    dispatcher: Dispatcher<StateEvent>,
}

impl StateStore {
    pub fn new(delivery: Delivery) -> Self {
        Self {
            state: Mutex::new(PlayerState::default()),
            publish_order: ReentrantMutex::new(()),
            dispatcher: Dispatcher::new(delivery, "aimp-state"),
        }
    }

    /// Apply a set of changes atomically and publish the resulting events
    pub fn update<R>(&self, apply: impl FnOnce(&mut StateTxn<'_>) -> R) -> R {
        let _order = self.publish_order.lock();

        let (result, events) = {
            let mut state = self.state.lock();
            let mut txn = StateTxn {
                state: &mut *state,
                events: Vec::new(),
            };
            let result = apply(&mut txn);
            (result, txn.events)
        };

        if !events.is_empty() {
            trace!(
                "Publishing {} state event(s): {:?}",
                events.len(),
                events.iter().map(StateEvent::kind).collect::<Vec<_>>()
            );
        }
        self.dispatcher.publish(events);
        result
    }

    /// Read the state under the lock
    pub fn read<R>(&self, read: impl FnOnce(&PlayerState) -> R) -> R {
        let state = self.state.lock();
        read(&*state)
    }

    pub fn snapshot(&self) -> PlayerState {
        self.state.lock().clone()
    }

    /// Drop everything back to the initial state without notifying anyone
    pub fn clear(&self) {
        *self.state.lock() = PlayerState::default();
    }

    pub fn subscribe(&self, observer: impl StateObserver + 'static) -> SubscriptionId {
        self.dispatcher
            .subscribe(move |event: &StateEvent| observer.on_state_event(event))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    pub fn delivery(&self) -> Delivery {
        self.dispatcher.delivery()
    }

    // Convenience readers

    pub fn playlists(&self) -> Vec<Playlist> {
        self.read(|s| s.playlists.clone())
    }

    pub fn has_playlists(&self) -> bool {
        self.read(|s| !s.playlists.is_empty())
    }

    pub fn playlist(&self, id: i64) -> Option<Playlist> {
        self.read(|s| s.playlist(id).cloned())
    }

    pub fn play_state(&self) -> PlayState {
        self.read(|s| s.play_state)
    }

    pub fn volume(&self) -> u8 {
        self.read(|s| s.volume)
    }

    pub fn now_playing(&self) -> NowPlaying {
        self.read(PlayerState::now_playing)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Delivery::Immediate)
    }
}
