//! Mirrored state of a remote AIMP player
//!
//! [`StateStore`] owns one session's [`PlayerState`] behind a single lock.
//! Writers (command execution and background sync) mutate it through
//! [`StateStore::update`]; observers registered with
//! [`StateStore::subscribe`] receive a [`StateEvent`] for every real change,
//! delivered according to the store's [`Delivery`] mode.

pub mod event;
pub mod observer;
pub mod store;

pub use event::{NowPlaying, StateEvent};
pub use observer::{Delivery, Dispatcher, StateObserver, SubscriptionId};
pub use store::{PlayerState, StateStore, StateTxn};
