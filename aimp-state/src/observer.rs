//! Observer registration and event delivery
//!
//! `Dispatcher<E>` keeps an ordered list of callbacks and hands every event to
//! each of them in registration order. Where the callbacks run is chosen by
//! the owner through [`Delivery`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::event::StateEvent;

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Where observer callbacks are invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// On the thread that produced the event, right after the state lock is
    /// released
    Immediate,
    /// On one dedicated delivery thread, in production order
    #[default]
    Queued,
}

/// Receives every state change of a session
pub trait StateObserver: Send + Sync {
    fn on_state_event(&self, event: &StateEvent);
}

impl<F> StateObserver for F
where
    F: Fn(&StateEvent) + Send + Sync,
{
    fn on_state_event(&self, event: &StateEvent) {
        self(event)
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Registry<E> = Arc<RwLock<Vec<(SubscriptionId, Callback<E>)>>>;

/// Ordered fan-out of events to registered callbacks
pub struct Dispatcher<E> {
    observers: Registry<E>,
    next_id: AtomicU64,
    queue: Option<mpsc::Sender<Vec<E>>>,
    delivery: Delivery,
}

impl<E> Dispatcher<E>
where
    E: Send + 'static,
{
    /// Create a dispatcher; `Delivery::Queued` starts the delivery thread
    ///
    /// Falls back to immediate delivery if the thread cannot be spawned.
    pub fn new(delivery: Delivery, name: &str) -> Self {
        let observers: Registry<E> = Arc::new(RwLock::new(Vec::new()));

        let queue = match delivery {
            Delivery::Immediate => None,
            Delivery::Queued => {
                let (sender, receiver) = mpsc::channel::<Vec<E>>();
                let worker_observers = Arc::clone(&observers);
                let spawned = thread::Builder::new()
                    .name(format!("{}-delivery", name))
                    .spawn(move || {
                        // Ends once every sender is gone
                        while let Ok(batch) = receiver.recv() {
                            deliver(&worker_observers, &batch);
                        }
                        debug!("Delivery thread stopped");
                    });

                match spawned {
                    Ok(_) => Some(sender),
                    Err(e) => {
                        warn!("Failed to spawn delivery thread, delivering inline: {}", e);
                        None
                    }
                }
            }
        };

        let delivery = if queue.is_some() {
            delivery
        } else {
            Delivery::Immediate
        };

        Self {
            observers,
            next_id: AtomicU64::new(1),
            queue,
            delivery,
        }
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Hand a batch of events to every callback
    ///
    /// Queued: returns as soon as the batch is enqueued. Immediate: returns
    /// after every callback has run.
    pub fn publish(&self, events: Vec<E>) {
        if events.is_empty() {
            return;
        }

        match &self.queue {
            Some(sender) => {
                if sender.send(events).is_err() {
                    warn!("Delivery thread is gone, dropping events");
                }
            }
            None => deliver(&self.observers, &events),
        }
    }
}

fn deliver<E>(observers: &Registry<E>, events: &[E]) {
    // Snapshot so callbacks may register or unregister without deadlocking
    let snapshot: Vec<Callback<E>> = observers
        .read()
        .iter()
        .map(|(_, callback)| Arc::clone(callback))
        .collect();

    for event in events {
        for callback in &snapshot {
            callback(event);
        }
    }
}
