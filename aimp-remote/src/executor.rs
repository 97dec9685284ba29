//! Serialized execution of player commands
//!
//! One worker task drains an unbounded queue, so commands run strictly in
//! submission order and never overlap. Each command applies its local state
//! change first, so observers see the result immediately, then calls the
//! player. Failures go to the session's error budget, never to the caller.

use std::sync::Arc;

use aimp_api::PlayState;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::scope::SessionScope;

/// A mutating operation on the remote player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Stop,
    Pause,
    Next,
    Previous,
    SetRepeat(bool),
    SetShuffle(bool),
    SetMute(bool),
    /// Absolute volume, clamped to [0, 100]
    SetVolume(u8),
    /// Relative to the volume at execution time, clamped to [0, 100]
    AdjustVolume(i32),
    ChangeSong { playlist_id: i64, song_position: i32 },
    /// Seconds into the current song
    ChangeSongPlayPosition(u32),
    RemoveSong { playlist_id: i64, song_position: i32 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play => "play",
            Command::Stop => "stop",
            Command::Pause => "pause",
            Command::Next => "next",
            Command::Previous => "previous",
            Command::SetRepeat(_) => "set_repeat",
            Command::SetShuffle(_) => "set_shuffle",
            Command::SetMute(_) => "set_mute",
            Command::SetVolume(_) => "set_volume",
            Command::AdjustVolume(_) => "adjust_volume",
            Command::ChangeSong { .. } => "change_song",
            Command::ChangeSongPlayPosition(_) => "change_song_play_position",
            Command::RemoveSong { .. } => "remove_song",
        }
    }
}

/// Single-worker command queue bound to one session
pub struct CommandExecutor {
    sender: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl CommandExecutor {
    pub fn start(scope: Arc<SessionScope>, runtime: &Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = runtime.spawn(Self::run(scope, receiver));
        Self { sender, worker }
    }

    /// Queue a command; returns false once the worker is gone
    pub fn submit(&self, command: Command) -> bool {
        self.sender.send(command).is_ok()
    }

    /// Abort the worker and wait until it has stopped
    ///
    /// Queued commands are dropped without running.
    pub async fn shutdown(self) {
        self.worker.abort();
        let _ = self.worker.await;
    }

    async fn run(scope: Arc<SessionScope>, mut receiver: mpsc::UnboundedReceiver<Command>) {
        debug!("Command worker started");

        while let Some(command) = receiver.recv().await {
            if scope.is_shut_down() {
                debug!("Session shutting down, dropping {} and the rest of the queue", command.name());
                break;
            }

            debug!("Executing {:?}", command);
            match execute(&scope, &command).await {
                Ok(()) => {}
                Err(SessionError::InvalidCommand(reason)) => {
                    warn!("Rejected {}: {}", command.name(), reason);
                }
                Err(e) => scope.report_failure(command.name(), &e),
            }
        }

        debug!("Command worker stopped");
    }
}

/// Run one command against the session
pub async fn execute(scope: &SessionScope, command: &Command) -> Result<()> {
    let api = scope.api();
    let store = scope.store();

    match *command {
        Command::Play => {
            store.update(|txn| txn.set_play_state(PlayState::Playing));
            api.play().await?;
        }
        Command::Stop => {
            store.update(|txn| txn.set_play_state(PlayState::Stopped));
            api.stop().await?;
        }
        Command::Pause => {
            store.update(|txn| txn.set_play_state(PlayState::Paused));
            api.pause().await?;
        }
        Command::Next => {
            api.next().await?;
            let info = api.current_song_info().await?;
            store.update(|txn| txn.apply_current_song(&info));
        }
        Command::Previous => {
            api.previous().await?;
            let info = api.current_song_info().await?;
            store.update(|txn| txn.apply_current_song(&info));
        }
        Command::SetRepeat(repeat) => {
            store.update(|txn| txn.set_repeat(repeat));
            api.set_repeat_song(repeat).await?;
        }
        Command::SetShuffle(shuffle) => {
            store.update(|txn| txn.set_shuffle(shuffle));
            api.set_shuffle(shuffle).await?;
        }
        Command::SetMute(true) => {
            store.update(|txn| {
                // A second mute must not overwrite the saved volume with 0
                if !txn.state().mute {
                    txn.remember_volume();
                }
                txn.set_mute(true);
                txn.set_volume(0);
            });
            api.set_mute(true).await?;
        }
        Command::SetMute(false) => {
            store.update(|txn| {
                if txn.state().mute {
                    let restored = txn.volume_before_mute();
                    txn.set_mute(false);
                    txn.set_volume(restored);
                }
            });
            api.set_mute(false).await?;
        }
        Command::SetVolume(volume) => {
            let volume = volume.min(100);
            store.update(|txn| txn.set_volume(volume));
            api.set_volume(volume).await?;
        }
        Command::AdjustVolume(delta) => {
            let target = store.update(|txn| {
                let target = i32::from(txn.state().volume)
                    .saturating_add(delta)
                    .clamp(0, 100) as u8;
                txn.set_volume(target);
                target
            });
            api.set_volume(target).await?;
        }
        Command::ChangeSong {
            playlist_id,
            song_position,
        } => {
            let valid = store.read(|s| {
                s.playlist(playlist_id)
                    .map(|p| p.song(song_position).is_some())
                    .unwrap_or(false)
            });
            if !valid {
                return Err(SessionError::InvalidCommand(format!(
                    "No song {} in playlist {}",
                    song_position, playlist_id
                )));
            }

            store.update(|txn| {
                txn.set_current_song(playlist_id, song_position);
                txn.set_play_position(0);
                txn.set_play_state(PlayState::Playing);
            });
            // Validated above, so the position is non-negative
            api.play_song(playlist_id, song_position.unsigned_abs(), 0).await?;
        }
        Command::ChangeSongPlayPosition(seconds) => {
            let target = store.update(|txn| {
                if txn.state().play_state == PlayState::Stopped {
                    return None;
                }
                let seconds = match txn.state().current_song() {
                    Some(song) => seconds.min(song.duration),
                    None => seconds,
                };
                txn.set_play_position(seconds);
                Some(seconds)
            });

            match target {
                Some(seconds) => api.set_song_play_position(seconds).await?,
                None => debug!("Ignoring seek while stopped"),
            }
        }
        Command::RemoveSong {
            playlist_id,
            song_position,
        } => {
            if song_position < 0 {
                return Err(SessionError::InvalidCommand(format!(
                    "Invalid song position {}",
                    song_position
                )));
            }
            api.remove_song(playlist_id, song_position.unsigned_abs()).await?;
            store.update(|txn| txn.remove_song(playlist_id, song_position));
        }
    }

    Ok(())
}
