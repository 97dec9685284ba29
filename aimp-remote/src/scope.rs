//! Resources shared by everything running inside one session

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aimp_api::PlayerApi;
use aimp_state::StateStore;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::budget::{BudgetVerdict, ErrorBudget, ErrorBudgetConfig};
use crate::error::{Result, SessionError};

type ExhaustedHook = Box<dyn Fn(&SessionError) + Send + Sync>;

/// One session's player handle, state store, error budget and shutdown flag
///
/// The command worker, the sync loops and the connect sequence all hold an
/// `Arc<SessionScope>`; setting the shutdown flag makes every one of them
/// stop at its next checkpoint.
pub struct SessionScope {
    pub(crate) api: Arc<dyn PlayerApi>,
    pub(crate) store: Arc<StateStore>,
    budget: Mutex<ErrorBudget>,
    shutdown: AtomicBool,
    on_exhausted: ExhaustedHook,
}

impl SessionScope {
    pub fn new(
        api: Arc<dyn PlayerApi>,
        store: Arc<StateStore>,
        budget: ErrorBudgetConfig,
        on_exhausted: impl Fn(&SessionError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            api,
            store,
            budget: Mutex::new(ErrorBudget::new(budget)),
            shutdown: AtomicBool::new(false),
            on_exhausted: Box::new(on_exhausted),
        }
    }

    pub fn api(&self) -> &dyn PlayerApi {
        self.api.as_ref()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Returns whether this call was the one that set the flag
    pub(crate) fn shut_down(&self) -> bool {
        !self.shutdown.swap(true, Ordering::AcqRel)
    }

    /// Fail with `Cancelled` once the session is shutting down
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(SessionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Count a steady-state failure against the error budget
    ///
    /// Cancellations and failures that arrive after shutdown are not counted.
    /// Exhausting the budget shuts the scope down and hands the owner a
    /// `BudgetExceeded` error to act on.
    pub fn report_failure(&self, context: &str, failure: &SessionError) {
        if failure.is_cancellation() || self.is_shut_down() {
            debug!("{} abandoned: {}", context, failure);
            return;
        }

        let (verdict, threshold) = {
            let mut budget = self.budget.lock();
            (budget.record(), budget.config().threshold)
        };
        match verdict {
            BudgetVerdict::Absorbed { count } => {
                warn!(
                    "{} failed ({}/{} recent failures): {}",
                    context, count, threshold, failure
                );
            }
            BudgetVerdict::Exhausted { count } => {
                error!(
                    "{} failed; {} failures within the reset window, disconnecting: {}",
                    context, count, failure
                );
                if self.shut_down() {
                    (self.on_exhausted)(&SessionError::BudgetExceeded(count));
                }
            }
        }
    }
}
