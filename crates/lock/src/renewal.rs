use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use redlease_store::KeyValueStore;

/// Registry key: `(lock key, holder token)`.
pub(crate) type RenewalKey = (String, String);

/// Shared index of live renewal tasks.
pub(crate) type RenewalRegistry = Arc<DashMap<RenewalKey, RenewalHandle>>;

/// Local handle to a running renewal task.
#[derive(Debug)]
pub(crate) struct RenewalHandle {
    pub(crate) cancel: CancellationToken,
    /// Distinguishes a task from a later replacement for the same pair.
    pub(crate) generation: u64,
}

/// Time between renewal ticks: half the lease.
pub(crate) fn renewal_period(ttl: Duration) -> Duration {
    ttl / 2
}

/// Outcome of one renewal tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Renewed,
    Failed,
    Lost,
    Cancelled,
}

/// Background task that keeps one lease alive.
pub(crate) struct Renewal {
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) registry: RenewalRegistry,
    pub(crate) key: String,
    pub(crate) token: String,
    pub(crate) ttl: Duration,
    pub(crate) max_failures: Option<u32>,
    pub(crate) cancel: CancellationToken,
    pub(crate) generation: u64,
}

impl Renewal {
    /// Tick every half lease until cancelled, until the stored value stops
    /// matching the token, or until the failure budget is spent.
    pub(crate) async fn run(self) {
        let period = renewal_period(self.ttl);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        debug!(period = ?period, "renewal task started");

        loop {
            // Cancellation wins over a due tick, so a cancelled task never
            // starts another round trip.
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("renewal task cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Tick::Renewed => failures = 0,
                Tick::Failed => {
                    failures = failures.saturating_add(1);
                    if self.max_failures.is_some_and(|max| failures >= max) {
                        error!(failures, "renewal failure budget spent, giving up ownership");
                        break;
                    }
                }
                Tick::Lost => {
                    info!("lock no longer held by this holder, renewal stopped");
                    break;
                }
                Tick::Cancelled => {
                    debug!("renewal task cancelled mid-tick");
                    break;
                }
            }
        }

        let generation = self.generation;
        self.registry
            .remove_if(&(self.key, self.token), |_, handle| {
                handle.generation == generation
            });
    }

    /// Re-read the key and extend it if it still holds our token.
    ///
    /// The read and the extend are two store calls. If the lease lapses and
    /// another holder takes the key between them, this tick extends that
    /// holder's lease once; the next tick reads the new token and stops.
    async fn tick(&self) -> Tick {
        let current = match self.store.get(&self.key).await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "renewal read failed");
                return Tick::Failed;
            }
        };

        if current.as_deref() != Some(self.token.as_str()) {
            return Tick::Lost;
        }

        // A release may have run while the read was in flight.
        if self.cancel.is_cancelled() {
            return Tick::Cancelled;
        }

        match self.store.expire(&self.key, self.ttl).await {
            Ok(true) => {
                debug!(ttl = ?self.ttl, "lease renewed");
                Tick::Renewed
            }
            Ok(false) => Tick::Lost,
            Err(e) => {
                warn!(error = %e, "lease extension failed");
                Tick::Failed
            }
        }
    }
}
