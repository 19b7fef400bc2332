//! Best-address selection over one discovery snapshot

use crate::address::{IpFamily, NetworkAddress, ScoredAddress};
use crate::filter::AddressFilter;
use crate::scoring;
use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// Which families take part in selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySet {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl FamilySet {
    pub fn both() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
        }
    }

    pub fn contains(&self, family: IpFamily) -> bool {
        match family {
            IpFamily::V4 => self.ipv4,
            IpFamily::V6 => self.ipv6,
        }
    }
}

/// Result of one selection pass
///
/// Rebuilt from scratch every pass; nothing carries over between snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAddressState {
    /// Best usable IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// Best usable IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// Every address seen on an allowed interface, up or down
    pub observed: HashSet<String>,
    /// On-link networks of addresses on allowed interfaces that are up
    pub local_networks: BTreeSet<(IpAddr, u8)>,
}

impl HostAddressState {
    /// Whether neither family has a usable address
    pub fn is_disconnected(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }
}

/// Pick the highest-scoring address per family.
///
/// Candidates on interfaces rejected by `filter` are ignored entirely. Every
/// other candidate lands in the observed set, but only those on interfaces
/// that are up, in an enabled family, are scored. A candidate replaces the
/// current best only with a strictly greater score, so among equals the
/// earliest one in the snapshot wins, and a score of 0 is never selected.
pub fn select_best<'a, I>(snapshot: I, filter: &AddressFilter, families: FamilySet) -> HostAddressState
where
    I: IntoIterator<Item = &'a NetworkAddress>,
{
    let mut state = HostAddressState::default();
    let mut best_v4: Option<ScoredAddress> = None;
    let mut best_v6: Option<ScoredAddress> = None;

    for candidate in snapshot {
        if !filter.allow_device(&candidate.interface) {
            debug!(
                "Skipping {} on {}: interface filtered",
                candidate.address, candidate.interface
            );
            continue;
        }

        state.observed.insert(candidate.canonical());

        if !candidate.interface_up {
            continue;
        }
        if let Some(network) = candidate.network() {
            state.local_networks.insert(network);
        }
        if !families.contains(candidate.family) {
            continue;
        }

        let scored = ScoredAddress {
            address: candidate.clone(),
            score: scoring::score(candidate),
        };
        debug!(
            "Candidate {} on {} (flags {:#x}) scored {}",
            candidate.address, candidate.interface, candidate.flags, scored.score
        );
        if scored.score == scoring::SCORE_UNUSABLE {
            continue;
        }

        let best = match candidate.family {
            IpFamily::V4 => &mut best_v4,
            IpFamily::V6 => &mut best_v6,
        };
        if best.as_ref().is_none_or(|b| scored.score > b.score) {
            *best = Some(scored);
        }
    }

    state.ipv4 = best_v4.and_then(|b| match b.address.ip() {
        Some(IpAddr::V4(addr)) => Some(addr),
        _ => None,
    });
    state.ipv6 = best_v6.and_then(|b| match b.address.ip() {
        Some(IpAddr::V6(addr)) => Some(addr),
        _ => None,
    });
    state
}
