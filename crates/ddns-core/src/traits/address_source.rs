// # Address Source Trait
//
// Defines the interface for enumerating the host's current addresses.
//
// ## Implementations
//
// - Netlink (Linux): `ddns-ip-netlink` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressSource;
//
// let snapshot = source.discover().await?;
// for addr in &snapshot {
//     println!("{} on {} (up: {})", addr.address, addr.interface, addr.interface_up);
// }
// ```

use crate::address::NetworkAddress;
use async_trait::async_trait;

/// Trait for address enumeration
///
/// Every call returns a complete, fresh snapshot of all addresses on all
/// interfaces, including those on interfaces that are down. Filtering and
/// scoring are not the source's concern; the selector does both.
///
/// # Restartability
///
/// `discover()` may be called any number of times. A failed call must leave
/// the source usable for the next one.
///
/// # Trust Level: Semi-Trusted
///
/// Address sources may perform platform I/O (netlink sockets, sysfs) but must
/// not decide whether DNS needs updating.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Enumerate all current addresses
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<NetworkAddress>)`: The snapshot, in the order the operating
    ///   system reported it. Order matters: the selector breaks score ties in
    ///   favour of the earlier entry.
    /// - `Err(Error)`: If enumeration failed; the pass is abandoned and
    ///   retried on the next tick
    async fn discover(&self) -> Result<Vec<NetworkAddress>, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}
