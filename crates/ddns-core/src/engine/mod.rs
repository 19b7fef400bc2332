//! Reconciliation engine
//!
//! The [`Reconciler`] keeps the published records in line with the host's
//! best addresses. It is driven either once (one-shot mode) or by its own
//! timer loop, which [`Daemon`] runs next to the change monitor.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐   trigger / known set   ┌───────────────┐
//!  ChangeFeed ──▶│ ChangeMonitor│────────────────────────▶│ Reconciliation│
//!                └──────────────┘                         │    Context    │
//!                                                         └───────────────┘
//!                                                                 ▲
//!                                                  claim / replace│
//!  ┌──────────────┐  snapshot   ┌──────────────┐                  │
//!  │AddressSource │────────────▶│  Reconciler  │──────────────────┘
//!  └──────────────┘             └──────────────┘
//!                          lookup │         │ apply (per drifted family)
//!                                 ▼         ▼
//!                       ┌──────────────┐ ┌──────────────┐
//!                       │ RecordSource │ │  UpdateSink  │
//!                       └──────────────┘ └──────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Claim the pass in the context (clears the trigger, resets the timer)
//! 2. Discover addresses and select the best one per family
//! 3. Replace the context's known-address set, and run the configured hooks
//!    when the local addresses changed since the previous pass
//! 4. Read the published record (when a record source is configured)
//! 5. Push each family whose best address differs from the reference

mod daemon;

pub use daemon::Daemon;

use crate::address::IpFamily;
use crate::config::DdnsConfig;
use crate::context::ReconciliationContext;
use crate::error::{Error, Result};
use crate::hooks;
use crate::selector::{HostAddressState, select_best};
use crate::traits::{AddressSource, RecordSource, SyncRecord, UpdateSink};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// An address successfully delivered through the update sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied<T> {
    pub address: T,
    pub applied_at: DateTime<Utc>,
}

/// Last successfully delivered address per family
///
/// In-memory only; a restarted process starts empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Baseline {
    pub ipv4: Option<Applied<Ipv4Addr>>,
    pub ipv6: Option<Applied<Ipv6Addr>>,
}

impl Baseline {
    fn address(&self, family: IpFamily) -> Option<IpAddr> {
        match family {
            IpFamily::V4 => self.ipv4.map(|a| IpAddr::V4(a.address)),
            IpFamily::V6 => self.ipv6.map(|a| IpAddr::V6(a.address)),
        }
    }

    fn record(&mut self, addr: IpAddr) {
        let applied_at = Utc::now();
        match addr {
            IpAddr::V4(address) => self.ipv4 = Some(Applied { address, applied_at }),
            IpAddr::V6(address) => self.ipv6 = Some(Applied { address, applied_at }),
        }
    }
}

/// What happened to one family during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyOutcome {
    /// No usable address (or the family is disabled); nothing was sent
    NoAddress,
    /// The reference already holds this address
    InSync(IpAddr),
    /// The sink accepted this address
    Updated(IpAddr),
    /// The sink failed; the baseline was kept
    Failed { address: IpAddr, reason: String },
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Selection result
    pub state: HostAddressState,
    /// Published record as read during the pass
    pub record: Option<SyncRecord>,
    pub ipv4: FamilyOutcome,
    pub ipv6: FamilyOutcome,
}

impl PassOutcome {
    fn idle(state: HostAddressState) -> Self {
        Self {
            state,
            record: None,
            ipv4: FamilyOutcome::NoAddress,
            ipv6: FamilyOutcome::NoAddress,
        }
    }

    /// Number of accepted sink calls
    pub fn updates_applied(&self) -> usize {
        [&self.ipv4, &self.ipv6]
            .iter()
            .filter(|o| matches!(o, FamilyOutcome::Updated(_)))
            .count()
    }

    /// Whether any sink call failed
    pub fn has_failures(&self) -> bool {
        [&self.ipv4, &self.ipv6]
            .iter()
            .any(|o| matches!(o, FamilyOutcome::Failed { .. }))
    }
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Either call [`Reconciler::run_once()`] (one-shot mode), or hand it to a
///    [`Daemon`] which drives [`Reconciler::run()`] next to the change monitor
///
/// ## Locking
///
/// The shared context and the baseline are each guarded by a mutex that is
/// never held across discovery, lookups or sink calls.
pub struct Reconciler {
    config: DdnsConfig,
    source: Box<dyn AddressSource>,
    sink: Box<dyn UpdateSink>,
    records: Option<Box<dyn RecordSource>>,
    context: Arc<ReconciliationContext>,
    baseline: Mutex<Baseline>,
    hooked: Mutex<Option<LocalState>>,
}

/// Local addresses as last handed to the hooks
type LocalState = (HashSet<String>, BTreeSet<(IpAddr, u8)>);

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `config`: Validated configuration
    /// - `source`: Address source implementation
    /// - `sink`: Update sink implementation
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the configuration does not validate
    pub fn new(
        config: DdnsConfig,
        source: Box<dyn AddressSource>,
        sink: Box<dyn UpdateSink>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            source,
            sink,
            records: None,
            context: Arc::new(ReconciliationContext::new()),
            baseline: Mutex::new(Baseline::default()),
            hooked: Mutex::new(None),
        })
    }

    /// Compare against the published record instead of the local baseline
    pub fn with_record_source(mut self, records: Box<dyn RecordSource>) -> Self {
        self.records = Some(records);
        self
    }

    /// Shared context, for the change monitor
    pub fn context(&self) -> Arc<ReconciliationContext> {
        Arc::clone(&self.context)
    }

    pub fn config(&self) -> &DdnsConfig {
        &self.config
    }

    /// Snapshot of the last delivered addresses
    pub fn baseline(&self) -> Baseline {
        *self.baseline.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Run one pass immediately, without the timer or the trigger
    ///
    /// # Parameters
    ///
    /// - `force`: Push every family that has a usable address, even when the
    ///   reference already holds it
    pub async fn run_once(&self, force: bool) -> Result<PassOutcome> {
        self.reconcile(force).await
    }

    /// Discover, select and look up without updating anything
    pub async fn inspect(&self) -> Result<(HostAddressState, Option<SyncRecord>)> {
        let state = self.discover_and_select().await?;
        let record = self.lookup_record().await?;
        Ok((state, record))
    }

    /// Run the timer loop until `shutdown` is cancelled
    ///
    /// Every `min_period` the loop checks the context; when the trigger is
    /// set or `force_refresh_period` has been exceeded it runs a pass. A pass
    /// that fails anywhere re-arms the trigger so the next tick retries.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let tick = self.config.min_period();
        let refresh = self.config.force_refresh_period();

        let delay = self.config.startup_delay();
        if !delay.is_zero() {
            info!("Waiting {:?} before the first pass", delay);
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            "Reconciliation loop started for {} (tick {:?}, refresh {:?})",
            self.config.hostname, tick, refresh
        );

        loop {
            if self.context.try_begin_pass(refresh) {
                match self.reconcile(false).await {
                    Ok(outcome) if outcome.has_failures() => {
                        self.context.rearm();
                    }
                    Ok(outcome) => {
                        debug!("Pass finished: {} update(s)", outcome.updates_applied());
                    }
                    Err(e) => {
                        warn!("Reconciliation pass failed: {}", e);
                        self.context.rearm();
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Reconciliation loop stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(tick) => {}
            }
            self.context.advance(tick);
        }
    }

    async fn reconcile(&self, force: bool) -> Result<PassOutcome> {
        let state = self.discover_and_select().await?;
        self.context.replace_known(state.observed.clone());
        self.run_hooks_on_change(&state).await;

        if state.is_disconnected() {
            info!("No usable address for {}, nothing to publish", self.config.hostname);
            return Ok(PassOutcome::idle(state));
        }

        let record = self.lookup_record().await?;
        let baseline = self.baseline();
        let reference = |family: IpFamily| match &record {
            Some(r) => match family {
                IpFamily::V4 => r.ipv4.map(IpAddr::V4),
                IpFamily::V6 => r.ipv6.map(IpAddr::V6),
            },
            None => baseline.address(family),
        };

        let ipv4 = self
            .push(IpFamily::V4, state.ipv4.map(IpAddr::V4), reference(IpFamily::V4), force)
            .await;
        let ipv6 = self
            .push(IpFamily::V6, state.ipv6.map(IpAddr::V6), reference(IpFamily::V6), force)
            .await;

        Ok(PassOutcome {
            state,
            record,
            ipv4,
            ipv6,
        })
    }

    async fn discover_and_select(&self) -> Result<HostAddressState> {
        let snapshot = self
            .bounded("address discovery", self.source.discover())
            .await?;
        debug!(
            "{} reported {} address(es)",
            self.source.source_name(),
            snapshot.len()
        );

        let state = select_best(&snapshot, &self.config.interfaces, self.config.families());
        info!(
            "Selected addresses: ipv4={:?} ipv6={:?}",
            state.ipv4, state.ipv6
        );
        Ok(state)
    }

    async fn run_hooks_on_change(&self, state: &HostAddressState) {
        if self.config.hooks.is_empty() {
            return;
        }

        let current = (state.observed.clone(), state.local_networks.clone());
        {
            let mut hooked = self.hooked.lock().unwrap_or_else(|p| p.into_inner());
            if hooked.as_ref() == Some(&current) {
                return;
            }
            *hooked = Some(current);
        }

        debug!("Local addresses changed, running {} hook(s)", self.config.hooks.len());
        hooks::run_hooks(
            &self.config.hooks,
            &state.local_networks,
            self.config.call_timeout(),
        )
        .await;
    }

    async fn lookup_record(&self) -> Result<Option<SyncRecord>> {
        let Some(records) = &self.records else {
            return Ok(None);
        };

        let record = self
            .bounded("record lookup", records.lookup(&self.config.hostname))
            .await?;
        debug!(
            "{} reports {}: A={:?} AAAA={:?}",
            records.source_name(),
            record.hostname,
            record.ipv4,
            record.ipv6
        );
        Ok(Some(record))
    }

    async fn push(
        &self,
        family: IpFamily,
        best: Option<IpAddr>,
        reference: Option<IpAddr>,
        force: bool,
    ) -> FamilyOutcome {
        let Some(address) = best else {
            return FamilyOutcome::NoAddress;
        };

        if !force && reference == Some(address) {
            debug!("{} {} record in sync: {}", self.config.hostname, family.record_type(), address);
            return FamilyOutcome::InSync(address);
        }

        info!(
            "Updating {} {} record: {:?} -> {}{}",
            self.config.hostname,
            family.record_type(),
            reference,
            address,
            if force { " (forced)" } else { "" }
        );

        let (ipv4, ipv6) = match address {
            IpAddr::V4(a) => (Some(a), None),
            IpAddr::V6(a) => (None, Some(a)),
        };

        match self
            .bounded("update", self.sink.apply(&self.config.hostname, ipv4, ipv6))
            .await
        {
            Ok(()) => {
                self.baseline
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .record(address);
                info!("{} accepted {} for {}", self.sink.sink_name(), address, self.config.hostname);
                FamilyOutcome::Updated(address)
            }
            Err(e) => {
                warn!(
                    "{} failed to publish {} for {}: {}",
                    self.sink.sink_name(),
                    address,
                    self.config.hostname,
                    e
                );
                FamilyOutcome::Failed {
                    address,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.call_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!("{} after {:?}", what, limit))),
        }
    }
}
