//! Periodic sync loops of a connected session
//!
//! Three independently scheduled loops refresh the playlists, the play state
//! and the miscellaneous settings; a fourth ticks the play position forward
//! every second between polls. Every loop stops at its next tick once the
//! session scope is shut down, and is aborted outright when the scheduler is
//! dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::config::SyncParams;
use crate::error::Result;
use crate::scope::SessionScope;
use crate::sync::loaders::{self, SongsPolicy};

/// Period of the local play-position ticker
pub const POSITION_TICK: Duration = Duration::from_secs(1);

/// Kind of background loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncLoop {
    Playlists,
    PlayState,
    Misc,
    PositionTicker,
}

impl SyncLoop {
    /// One pass of the loop
    pub async fn run_once(self, scope: &SessionScope) -> Result<()> {
        let api = scope.api();
        let store = scope.store();

        match self {
            SyncLoop::Playlists => {
                loaders::load_playlists(api, store, SongsPolicy::ReuseUnchanged).await?;
                scope.checkpoint()?;
                loaders::load_current_song(api, store).await?;
                scope.checkpoint()?;
                loaders::load_song_play_position(api, store).await?;
            }
            SyncLoop::PlayState => {
                if !store.has_playlists() {
                    trace!("No playlists yet, skipping play state sync");
                    return Ok(());
                }
                loaders::load_song_play_position(api, store).await?;
                scope.checkpoint()?;
                loaders::load_commons(api, store).await?;
                scope.checkpoint()?;
                loaders::load_current_song(api, store).await?;
            }
            SyncLoop::Misc => {
                loaders::load_commons(api, store).await?;
                scope.checkpoint()?;
                loaders::load_volume(api, store).await?;
            }
            SyncLoop::PositionTicker => {
                store.update(|txn| txn.advance_position());
            }
        }
        Ok(())
    }
}

impl fmt::Display for SyncLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncLoop::Playlists => "playlists sync",
            SyncLoop::PlayState => "play state sync",
            SyncLoop::Misc => "misc sync",
            SyncLoop::PositionTicker => "position ticker",
        };
        f.write_str(name)
    }
}

/// A spawned loop; aborted when dropped
#[derive(Debug)]
struct PeriodicTask {
    kind: SyncLoop,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    fn spawn(
        runtime: &Handle,
        scope: Arc<SessionScope>,
        kind: SyncLoop,
        period: Duration,
        first_run: Instant,
    ) -> Self {
        let handle = runtime.spawn(async move {
            debug!("Starting {} (period {:?})", kind, period);

            let mut interval = time::interval_at(first_run, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if scope.is_shut_down() {
                    break;
                }
                if let Err(e) = kind.run_once(&scope).await {
                    scope.report_failure(&kind.to_string(), &e);
                }
            }

            debug!("{} stopped", kind);
        });

        Self { kind, handle }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The set of loops belonging to one connected session
#[derive(Debug)]
pub struct SyncScheduler {
    tasks: Vec<PeriodicTask>,
}

impl SyncScheduler {
    /// Start all loops; the sync loops run right away, the ticker after one
    /// period
    pub fn start(scope: Arc<SessionScope>, params: SyncParams, runtime: &Handle) -> Self {
        // interval_at needs a runtime context for its clock
        let _guard = runtime.enter();
        let now = Instant::now();

        let tasks = vec![
            PeriodicTask::spawn(runtime, Arc::clone(&scope), SyncLoop::Playlists, params.playlists_period, now),
            PeriodicTask::spawn(runtime, Arc::clone(&scope), SyncLoop::PlayState, params.play_state_period, now),
            PeriodicTask::spawn(runtime, Arc::clone(&scope), SyncLoop::Misc, params.misc_period, now),
            PeriodicTask::spawn(runtime, scope, SyncLoop::PositionTicker, POSITION_TICK, now + POSITION_TICK),
        ];

        Self { tasks }
    }

    pub fn loops(&self) -> Vec<SyncLoop> {
        self.tasks.iter().map(|task| task.kind).collect()
    }

    /// Abort every loop and wait until all have stopped
    pub async fn shutdown(mut self) {
        for task in &self.tasks {
            task.handle.abort();
        }
        for task in &mut self.tasks {
            let _ = (&mut task.handle).await;
        }
    }
}
