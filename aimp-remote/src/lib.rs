//! Session engine for remote-controlling an AIMP player
//!
//! A [`SessionController`] connects to the player's Web Control plugin,
//! mirrors its state (playlists, current song, transport, volume and
//! friends) into a local store kept fresh by background polling, and
//! serializes user commands against the player.
//!
//! Applications observe the session through two capabilities:
//!
//! - [`StateObserver`]: every change of the mirrored player state
//! - [`ConnectionListener`]: lifecycle transitions and connect failures
//!
//! ```rust,ignore
//! use aimp_remote::{ConnectionEvent, SessionController, Settings, StateEvent};
//!
//! let controller = SessionController::new()?;
//! controller.subscribe(|event: &StateEvent| println!("{}", event.kind()));
//! controller.add_listener(|event: &ConnectionEvent| println!("{:?}", event));
//! controller.connect_with(&Settings::from_env()?)?;
//! ```

pub mod budget;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod logging;
pub mod scope;
pub mod session;
pub mod sync;
pub mod volume_ramp;

pub use budget::{BudgetVerdict, ErrorBudget, ErrorBudgetConfig};
pub use config::{Endpoint, Settings, SyncParams, SyncProfile};
pub use connection::{ConnectionEvent, ConnectionListener, ConnectionStatus};
pub use error::{Result, SessionError};
pub use executor::Command;
pub use session::{Connector, SessionBuilder, SessionController, WebCtlConnector};
pub use volume_ramp::{RampDirection, VolumeRamp, VolumeRampHandle};

// Re-exports so applications need a single dependency
pub use aimp_api::{CurrentSongInfo, PlayState, PlayerApi, Playlist, Song};
pub use aimp_state::{Delivery, NowPlaying, PlayerState, StateEvent, StateObserver, SubscriptionId};
