use serde::Deserialize;

/// Behavior of the lease renewal task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Start a renewal task for every successful acquire (default: true).
    pub auto_renew: bool,

    /// Stop renewing after this many consecutive failed ticks.
    ///
    /// `None` (default) keeps retrying on every tick; the lease then lapses
    /// in the store on its own if the outage outlasts the TTL.
    pub max_renewal_failures: Option<u32>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            auto_renew: true,
            max_renewal_failures: None,
        }
    }
}
