//! Daemon supervisor: the reconciliation loop and the change monitor as two
//! tasks sharing one context.

use super::Reconciler;
use crate::error::{Error, Result};
use crate::monitor::ChangeMonitor;
use crate::traits::ChangeFeed;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
enum Unit {
    Monitor,
    Loop,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Monitor => f.write_str("change monitor"),
            Unit::Loop => f.write_str("reconciliation loop"),
        }
    }
}

/// Long-running mode
///
/// ## Shutdown
///
/// Cancelling the token passed to [`Daemon::run`] stops both tasks. If the
/// change monitor fails, the daemon cancels the loop itself and returns the
/// monitor's error: without the feed, address changes would go unnoticed
/// until the next forced refresh.
pub struct Daemon {
    reconciler: Arc<Reconciler>,
    feed: Box<dyn ChangeFeed>,
}

impl Daemon {
    pub fn new(reconciler: Reconciler, feed: Box<dyn ChangeFeed>) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            feed,
        }
    }

    /// The reconciler driven by this daemon
    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Run until `shutdown` is cancelled or a unit fails
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The first unit failure (normally `Error::ChangeFeed`)
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let stop = shutdown.child_token();
        let mut units = JoinSet::new();

        let monitor = ChangeMonitor::new(self.reconciler.context());
        let feed = self.feed;
        let monitor_stop = stop.clone();
        units.spawn(async move { (Unit::Monitor, monitor.run(feed.as_ref(), monitor_stop).await) });

        let reconciler = Arc::clone(&self.reconciler);
        let loop_stop = stop.clone();
        units.spawn(async move { (Unit::Loop, reconciler.run(loop_stop).await) });

        info!("Daemon started");

        let mut outcome = Ok(());
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((unit, Ok(()))) => debug!("{} stopped", unit),
                Ok((unit, Err(e))) => {
                    error!("{} failed: {}", unit, e);
                    stop.cancel();
                    if outcome.is_ok() {
                        outcome = Err(e);
                    }
                }
                Err(e) => {
                    error!("Daemon task aborted: {}", e);
                    stop.cancel();
                    if outcome.is_ok() {
                        outcome = Err(Error::Other(format!("daemon task aborted: {}", e)));
                    }
                }
            }
        }

        info!("Daemon stopped");
        outcome
    }
}
