//! Address records exchanged between the address source and the selector

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Kernel address flag marking an address whose temporary (privacy)
/// companions are managed by the kernel (`IFA_F_MANAGETEMPADDR`).
pub const IFA_F_MANAGETEMPADDR: u32 = 0x100;

/// Protocol family of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl IpFamily {
    /// Family of a parsed address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    /// DNS record type carrying this family
    pub fn record_type(&self) -> &'static str {
        match self {
            IpFamily::V4 => "A",
            IpFamily::V6 => "AAAA",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("ipv4"),
            IpFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// One address as reported by the address source
///
/// The address is kept in textual form: sources may hand over whatever the
/// operating system reports, and malformed entries are simply scored as
/// unusable by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAddress {
    /// Textual address as reported
    pub address: String,
    /// Protocol family
    pub family: IpFamily,
    /// Owning interface name
    pub interface: String,
    /// Raw kernel address flags
    pub flags: u32,
    /// Whether the owning interface is operationally up
    pub interface_up: bool,
    /// Prefix length of the on-link network
    pub prefix_len: u8,
}

impl NetworkAddress {
    /// Build a record from a parsed address
    pub fn new(addr: IpAddr, interface: impl Into<String>, flags: u32, interface_up: bool) -> Self {
        Self {
            address: addr.to_string(),
            family: IpFamily::of(&addr),
            interface: interface.into(),
            flags,
            interface_up,
            prefix_len: host_prefix_len(&addr),
        }
    }

    /// Set the on-link prefix length (defaults to a host prefix)
    pub fn with_prefix_len(mut self, prefix_len: u8) -> Self {
        self.prefix_len = prefix_len;
        self
    }

    /// On-link network as (network address, prefix length)
    ///
    /// Out-of-range prefix lengths are clamped to a host prefix.
    pub fn network(&self) -> Option<(IpAddr, u8)> {
        let ip = self.ip()?;
        let len = self.prefix_len.min(host_prefix_len(&ip));
        let net = match ip {
            IpAddr::V4(v4) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
            }
            IpAddr::V6(v6) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
            }
        };
        Some((net, len))
    }

    /// Parse the textual address, if it is well formed
    pub fn ip(&self) -> Option<IpAddr> {
        self.address.parse().ok()
    }

    /// Textual form used for the observed-address set
    pub fn canonical(&self) -> String {
        canonical_address(&self.address)
    }
}

/// An address together with its quality score (0 = unusable)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredAddress {
    pub address: NetworkAddress,
    pub score: u8,
}

fn host_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Canonical textual form of an address string
///
/// Parseable addresses are re-rendered so `2001:DB8:0::1` and `2001:db8::1`
/// compare equal; anything else is returned unchanged.
pub fn canonical_address(raw: &str) -> String {
    match raw.parse::<IpAddr>() {
        Ok(addr) => addr.to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_normalizes_ipv6_spelling() {
        assert_eq!(canonical_address("2001:DB8:0:0::1"), "2001:db8::1");
        assert_eq!(canonical_address("192.0.2.1"), "192.0.2.1");
        assert_eq!(canonical_address("not-an-address"), "not-an-address");
    }

    #[test]
    fn network_masks_host_bits() {
        let v4 = NetworkAddress::new("85.207.1.2".parse().unwrap(), "eth0", 0, true).with_prefix_len(24);
        assert_eq!(v4.network(), Some(("85.207.1.0".parse().unwrap(), 24)));

        let v6 = NetworkAddress::new("2a01:4f8:10a:1::5".parse().unwrap(), "eth0", 0, true)
            .with_prefix_len(64);
        assert_eq!(v6.network(), Some(("2a01:4f8:10a:1::".parse().unwrap(), 64)));

        let host = NetworkAddress::new("85.207.1.2".parse().unwrap(), "eth0", 0, true);
        assert_eq!(host.network(), Some(("85.207.1.2".parse().unwrap(), 32)));

        let everything = host.clone().with_prefix_len(0);
        assert_eq!(everything.network(), Some(("0.0.0.0".parse().unwrap(), 0)));
    }

    #[test]
    fn new_derives_family_from_address() {
        let v4 = NetworkAddress::new("198.51.100.7".parse().unwrap(), "eth0", 0, true);
        let v6 = NetworkAddress::new("2a00:1450::1".parse().unwrap(), "eth0", 0, true);
        assert_eq!(v4.family, IpFamily::V4);
        assert_eq!(v6.family, IpFamily::V6);
        assert_eq!(v6.family.record_type(), "AAAA");
    }
}
