//! Background synchronization with the remote player

pub mod loaders;
pub mod scheduler;

pub use loaders::SongsPolicy;
pub use scheduler::{SyncLoop, SyncScheduler, POSITION_TICK};
