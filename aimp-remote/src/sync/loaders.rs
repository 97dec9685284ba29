//! Fetch-and-reconcile procedures, one per category of remote data
//!
//! Each loader issues its requests first and applies the results in a single
//! store update, so the state lock is never held across a network call.

use aimp_api::{catalog_fingerprint, PlayState, PlayerApi};
use aimp_state::StateStore;
use tracing::{debug, trace};

use crate::error::Result;

/// Whether the catalog loader may reuse songs of unchanged playlists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongsPolicy {
    /// Download every playlist's songs
    AlwaysFetch,
    /// Skip playlists whose content hash is unchanged
    ReuseUnchanged,
}

/// Transport state, shuffle, repeat and mute
///
/// The player cannot report "paused": a remote "not playing" keeps a local
/// `Paused` as is.
pub async fn load_commons(api: &dyn PlayerApi, store: &StateStore) -> Result<()> {
    let remote_state = api.play_state().await?;
    let shuffle = api.is_shuffle().await?;
    let repeat = api.is_repeat_song().await?;
    let mute = api.is_mute().await?;

    store.update(|txn| {
        let play_state = match (remote_state, txn.state().play_state) {
            (PlayState::Stopped, PlayState::Paused) => PlayState::Paused,
            (remote, _) => remote,
        };
        txn.set_play_state(play_state);
        txn.set_shuffle(shuffle);
        txn.set_repeat(repeat);
        txn.set_mute(mute);
    });
    Ok(())
}

/// Play position, clamped to the current song's duration
pub async fn load_song_play_position(api: &dyn PlayerApi, store: &StateStore) -> Result<()> {
    let position = api.song_play_position().await?;

    store.update(|txn| {
        if txn.state().play_state == PlayState::Stopped {
            txn.set_play_position(0);
            return;
        }
        let position = match txn.state().current_song() {
            Some(song) => position.min(song.duration),
            None => position,
        };
        txn.set_play_position(position);
    });
    Ok(())
}

pub async fn load_current_song(api: &dyn PlayerApi, store: &StateStore) -> Result<()> {
    let info = api.current_song_info().await?;
    trace!(
        "Current song: playlist {} position {}",
        info.playlist_id,
        info.song_position
    );
    store.update(|txn| txn.apply_current_song(&info));
    Ok(())
}

/// Volume; while muted only the remembered pre-mute volume is refreshed
pub async fn load_volume(api: &dyn PlayerApi, store: &StateStore) -> Result<()> {
    let volume = api.volume().await?;
    store.update(|txn| txn.apply_remote_volume(volume));
    Ok(())
}

/// Playlist catalog with songs
///
/// Returns whether the stored catalog changed.
pub async fn load_playlists(
    api: &dyn PlayerApi,
    store: &StateStore,
    policy: SongsPolicy,
) -> Result<bool> {
    let mut playlists = api.playlists().await?;

    let (cached, cached_fingerprint) = store.read(|s| (s.playlists.clone(), s.catalog_fingerprint));
    if policy == SongsPolicy::ReuseUnchanged
        && playlists.len() == cached.len()
        && catalog_fingerprint(&playlists) == cached_fingerprint
    {
        trace!("Playlist catalog unchanged, skipping songs");
        return Ok(false);
    }

    for playlist in &mut playlists {
        let reusable = match policy {
            SongsPolicy::AlwaysFetch => None,
            SongsPolicy::ReuseUnchanged => cached
                .iter()
                .find(|c| c.id == playlist.id && c.hash == playlist.hash),
        };

        match reusable {
            Some(previous) => playlist.share_songs_from(previous),
            None => {
                debug!("Fetching songs of playlist {}", playlist.id);
                let songs = api.playlist_songs(playlist.id).await?;
                playlist.set_songs(songs);
            }
        }
    }

    Ok(store.update(|txn| txn.set_playlists(playlists)))
}

/// Everything needed before a session is usable
///
/// Songs are always downloaded here; later polls reuse them.
pub async fn load_initial_state(api: &dyn PlayerApi, store: &StateStore) -> Result<()> {
    load_playlists(api, store, SongsPolicy::AlwaysFetch).await?;
    load_current_song(api, store).await?;
    load_commons(api, store).await?;
    load_volume(api, store).await?;
    load_song_play_position(api, store).await?;
    Ok(())
}
