//! Watch an AIMP player and print what it is doing
//!
//! Connection settings come from the environment:
//! - `AIMP_HOST` (required), `AIMP_PORT`, `AIMP_TIMEOUT_MS`
//! - `AIMP_SYNC_PROFILE`: rarely, optimally or often
//! - `AIMP_LOG_MODE` / `AIMP_LOG_LEVEL` for log output
//!
//! Run with: AIMP_HOST=192.168.1.20 cargo run -p aimp-remote --example watch_player

use aimp_remote::logging::init_logging_from_env;
use aimp_remote::{ConnectionEvent, ConnectionStatus, SessionController, Settings, StateEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let settings = Settings::from_env()?;
    println!("AIMP remote - watching {}:{}", settings.host, settings.port);
    println!("=====================================");

    let controller = SessionController::new()?;

    controller.add_listener(|event: &ConnectionEvent| match event {
        ConnectionEvent::StatusChanged(status) => println!("[connection] {}", status),
        ConnectionEvent::HostNotFound { host } => println!("[connection] cannot resolve {}", host),
        ConnectionEvent::RemoteNotFound { host, port } => {
            println!("[connection] no player answering at {}:{}", host, port)
        }
        ConnectionEvent::UnresolvedError(e) => println!("[connection] failed: {}", e),
    });

    controller.subscribe(|event: &StateEvent| match event {
        StateEvent::Play(now) | StateEvent::Pause(now) | StateEvent::Stop(now) => {
            let song = now.song.as_ref().map(|s| s.to_string()).unwrap_or_default();
            println!("[{}] {}", event.kind(), song);
        }
        StateEvent::SongChanged(now) => match &now.song {
            Some(song) => println!("[song] {}", song),
            None => println!("[song] nothing"),
        },
        StateEvent::PlaylistsUpdated { playlists, .. } => {
            println!("[catalog] {} playlists", playlists.len());
            for playlist in playlists.iter() {
                println!("   {} ({} songs)", playlist.name, playlist.song_count());
            }
        }
        StateEvent::PlaylistUpdated(playlist) => {
            println!("[catalog] {} changed ({} songs)", playlist.name, playlist.song_count())
        }
        StateEvent::SongPositionChanged(_) => {}
        other => println!("[{}] {:?}", other.kind(), other),
    });

    controller.connect_with(&settings)?;

    println!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    if controller.status() != ConnectionStatus::Disconnected {
        controller.disconnect()?;
        let mut status = controller.status_watch();
        while *status.borrow() != ConnectionStatus::Disconnected {
            status.changed().await?;
        }
    }

    println!("Bye");
    Ok(())
}
