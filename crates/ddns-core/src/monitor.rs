//! Change monitor
//!
//! Turns the change feed into the context's pending flag. The monitor never
//! reconciles itself; it only decides whether the next tick should.

use crate::address::canonical_address;
use crate::context::ReconciliationContext;
use crate::error::{Error, Result};
use crate::traits::{ChangeEvent, ChangeFeed, ChangeKind};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct ChangeMonitor {
    context: Arc<ReconciliationContext>,
}

impl ChangeMonitor {
    pub fn new(context: Arc<ReconciliationContext>) -> Self {
        Self { context }
    }

    /// Apply one notification to the context.
    ///
    /// Removals, link changes and overruns always set the trigger. An added address
    /// sets it only when the last pass did not already see that address, so
    /// the kernel re-announcing a known address stays quiet.
    ///
    /// Returns whether the trigger was set.
    pub fn observe(&self, event: &ChangeEvent) -> bool {
        match event.kind {
            ChangeKind::Overrun => {
                warn!("Change feed dropped notifications: reconcile requested");
                self.context.request_reconcile();
                true
            }
            ChangeKind::AddressRemoved | ChangeKind::LinkAdded | ChangeKind::LinkRemoved => {
                debug!("{:?} ({:?}): reconcile requested", event.kind, event.address);
                self.context.request_reconcile();
                true
            }
            ChangeKind::AddressAdded => match &event.address {
                Some(address) => {
                    let triggered = self.context.note_new_address(&canonical_address(address));
                    if triggered {
                        debug!("New address {}: reconcile requested", address);
                    } else {
                        debug!("Known address {} re-announced", address);
                    }
                    triggered
                }
                None => {
                    self.context.request_reconcile();
                    true
                }
            },
            ChangeKind::Other => false,
        }
    }

    /// Consume `feed` until `shutdown` is cancelled.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown was requested
    /// - `Err(Error::ChangeFeed)`: The feed failed or ended; the daemon
    ///   cannot detect changes any more and must stop
    pub async fn run(&self, feed: &dyn ChangeFeed, shutdown: CancellationToken) -> Result<()> {
        let mut events = feed.subscribe()?;
        info!("Change monitor subscribed");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Change monitor stopping");
                    return Ok(());
                }

                next = events.next() => {
                    match next {
                        Some(Ok(event)) => {
                            self.observe(&event);
                        }
                        Some(Err(e)) => {
                            error!("Change feed failed: {}", e);
                            return Err(if e.is_fatal() {
                                e
                            } else {
                                Error::change_feed(e.to_string())
                            });
                        }
                        None => {
                            error!("Change feed ended");
                            return Err(Error::change_feed("notification stream ended"));
                        }
                    }
                }
            }
        }
    }
}
