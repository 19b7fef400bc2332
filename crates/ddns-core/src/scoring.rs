//! Address quality scoring
//!
//! Scores rank candidate addresses within one family. Zero means the address
//! must never be published; for IPv6 higher means more stable:
//!
//! | score | IPv6 address kind                                   |
//! |-------|-----------------------------------------------------|
//! | 3     | global, EUI-64 interface identifier                 |
//! | 2     | global, flagged as kernel-managed temporary address |
//! | 1     | any other global unicast address                    |
//! | 0     | not globally routable, or malformed                 |
//!
//! IPv4 has only two tiers: 1 for global unicast, 0 otherwise.

use crate::address::{IFA_F_MANAGETEMPADDR, IpFamily, NetworkAddress};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Unusable score
pub const SCORE_UNUSABLE: u8 = 0;
/// Plain global unicast
pub const SCORE_GLOBAL: u8 = 1;
/// Global address carrying the temporary-address flag
pub const SCORE_TEMPORARY: u8 = 2;
/// Global address with an EUI-64 interface identifier
pub const SCORE_EUI64: u8 = 3;

/// IPv4 blocks that are private, unspecified, loopback, link-local,
/// documentation, benchmarking, multicast or reserved.
///
/// Shared address space (100.64.0.0/10) is neither private nor reserved and
/// scores as global.
const IPV4_UNUSABLE: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 0, 0, 0), 24),
    (Ipv4Addr::new(192, 0, 2, 0), 24),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(198, 18, 0, 0), 15),
    (Ipv4Addr::new(198, 51, 100, 0), 24),
    (Ipv4Addr::new(203, 0, 113, 0), 24),
    (Ipv4Addr::new(224, 0, 0, 0), 4),
    (Ipv4Addr::new(240, 0, 0, 0), 4),
];

/// Globally reachable anycast relays inside 192.0.0.0/24.
const IPV4_GLOBAL_EXCEPTIONS: &[Ipv4Addr] = &[Ipv4Addr::new(192, 0, 0, 9), Ipv4Addr::new(192, 0, 0, 10)];

/// Non-global blocks carved out of 2000::/3.
const IPV6_UNUSABLE_GLOBAL: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 23),
    (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x2002, 0, 0, 0, 0, 0, 0, 0), 16),
    (Ipv6Addr::new(0x3fff, 0, 0, 0, 0, 0, 0, 0), 20),
];

/// Globally reachable exceptions inside 2001::/23.
const IPV6_GLOBAL_EXCEPTIONS: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::new(0x2001, 1, 0, 0, 0, 0, 0, 1), 128),
    (Ipv6Addr::new(0x2001, 1, 0, 0, 0, 0, 0, 2), 128),
    (Ipv6Addr::new(0x2001, 3, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x2001, 4, 0x112, 0, 0, 0, 0, 0), 48),
    (Ipv6Addr::new(0x2001, 0x20, 0, 0, 0, 0, 0, 0), 28),
    (Ipv6Addr::new(0x2001, 0x30, 0, 0, 0, 0, 0, 0), 28),
];

/// Score a textual IPv4 address. Malformed input scores 0.
pub fn score_ipv4(address: &str) -> u8 {
    match address.parse::<Ipv4Addr>() {
        Ok(addr) => score_ipv4_addr(addr),
        Err(_) => SCORE_UNUSABLE,
    }
}

/// Score a textual IPv6 address with its kernel flags. Malformed input scores 0.
pub fn score_ipv6(address: &str, flags: u32) -> u8 {
    match address.parse::<Ipv6Addr>() {
        Ok(addr) => score_ipv6_addr(addr, flags),
        Err(_) => SCORE_UNUSABLE,
    }
}

pub fn score_ipv4_addr(addr: Ipv4Addr) -> u8 {
    if IPV4_GLOBAL_EXCEPTIONS.contains(&addr) {
        return SCORE_GLOBAL;
    }
    if IPV4_UNUSABLE
        .iter()
        .any(|(net, len)| ipv4_in_prefix(addr, *net, *len))
    {
        SCORE_UNUSABLE
    } else {
        SCORE_GLOBAL
    }
}

pub fn score_ipv6_addr(addr: Ipv6Addr, flags: u32) -> u8 {
    if !is_global_ipv6(addr) {
        return SCORE_UNUSABLE;
    }

    let octets = addr.octets();
    if octets[11] == 0xff && octets[12] == 0xfe {
        SCORE_EUI64
    } else if flags & IFA_F_MANAGETEMPADDR != 0 {
        SCORE_TEMPORARY
    } else {
        SCORE_GLOBAL
    }
}

/// Score a discovered address according to its declared family.
///
/// An address whose text does not parse as its declared family scores 0.
pub fn score(address: &NetworkAddress) -> u8 {
    match address.family {
        IpFamily::V4 => score_ipv4(&address.address),
        IpFamily::V6 => score_ipv6(&address.address, address.flags),
    }
}

// Only 2000::/3 is allocated global unicast; unspecified, loopback, mapped,
// ULA, link-local, site-local, multicast and reserved space all fall outside.
fn is_global_ipv6(addr: Ipv6Addr) -> bool {
    if !ipv6_in_prefix(addr, Ipv6Addr::new(0x2000, 0, 0, 0, 0, 0, 0, 0), 3) {
        return false;
    }
    if IPV6_GLOBAL_EXCEPTIONS
        .iter()
        .any(|(net, len)| ipv6_in_prefix(addr, *net, *len))
    {
        return true;
    }
    !IPV6_UNUSABLE_GLOBAL
        .iter()
        .any(|(net, len)| ipv6_in_prefix(addr, *net, *len))
}

fn ipv4_in_prefix(addr: Ipv4Addr, net: Ipv4Addr, len: u8) -> bool {
    let mask = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) };
    u32::from(addr) & mask == u32::from(net) & mask
}

fn ipv6_in_prefix(addr: Ipv6Addr, net: Ipv6Addr, len: u8) -> bool {
    let mask = if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) };
    u128::from(addr) & mask == u128::from(net) & mask
}
