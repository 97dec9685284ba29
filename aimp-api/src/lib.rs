//! Typed client for the AIMP Web Control plugin
//!
//! The plugin exposes the player over plain HTTP GET requests of the form
//! `http://{host}:{port}/?action=<name>&<params>`. This crate turns those
//! actions into typed async calls behind the [`PlayerApi`] trait, and holds
//! the value types (`Song`, `Playlist`, `CurrentSongInfo`, `PlayState`) the
//! rest of the workspace shares.
//!
//! ```rust,ignore
//! use aimp_api::{PlayerApi, WebCtlClient};
//!
//! let client = WebCtlClient::new("192.168.1.20", aimp_api::DEFAULT_PORT)?;
//! for playlist in client.playlists().await? {
//!     println!("{} ({} songs)", playlist, client.playlist_songs(playlist.id).await?.len());
//! }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod models;
pub mod status;

pub use api::PlayerApi;
pub use client::{ClientConfig, WebCtlClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{ApiError, Result};
pub use models::{catalog_fingerprint, CurrentSongInfo, PlayState, Playlist, Song, NO_SONG};
pub use status::StatusCode;
