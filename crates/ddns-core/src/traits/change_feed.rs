// # Change Feed Trait
//
// Defines the interface for the live stream of link and address
// notifications that drives event-triggered reconciliation.
//
// ## Implementations
//
// - Netlink multicast groups (Linux): `ddns-ip-netlink` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::ChangeFeed;
// use tokio_stream::StreamExt;
//
// let mut events = feed.subscribe()?;
// while let Some(event) = events.next().await {
//     println!("{:?}", event?);
// }
// ```

use std::pin::Pin;
use tokio_stream::Stream;

/// Classified notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// An address was added to an interface
    AddressAdded,
    /// An address was removed from an interface
    AddressRemoved,
    /// A link appeared or changed state
    LinkAdded,
    /// A link disappeared
    LinkRemoved,
    /// The feed dropped notifications (socket buffer overrun); state is unknown
    Overrun,
    /// Anything else the feed delivers; ignored by the monitor
    Other,
}

/// One notification from the change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Notification kind
    pub kind: ChangeKind,
    /// Textual address, for address notifications that carry one
    pub address: Option<String>,
}

impl ChangeEvent {
    pub fn address_added(address: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::AddressAdded,
            address: Some(address.into()),
        }
    }

    pub fn address_removed(address: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::AddressRemoved,
            address: Some(address.into()),
        }
    }

    pub fn link_added() -> Self {
        Self {
            kind: ChangeKind::LinkAdded,
            address: None,
        }
    }

    pub fn link_removed() -> Self {
        Self {
            kind: ChangeKind::LinkRemoved,
            address: None,
        }
    }

    pub fn overrun() -> Self {
        Self {
            kind: ChangeKind::Overrun,
            address: None,
        }
    }

    pub fn other() -> Self {
        Self {
            kind: ChangeKind::Other,
            address: None,
        }
    }
}

/// Stream of feed notifications
///
/// An `Err` item, or the end of the stream, means the feed is gone.
pub type ChangeStream =
    Pin<Box<dyn Stream<Item = Result<ChangeEvent, crate::Error>> + Send + 'static>>;

/// Trait for change notification sources
///
/// # Behavior
///
/// - The stream is unbounded and runs for the daemon's lifetime
/// - It must never end under normal conditions; ending or yielding an error
///   is treated as fatal by the daemon
/// - Lost notifications are reported as [`ChangeEvent::overrun`], not as an
///   error
/// - Dropping the stream must release the underlying subscription
///
/// # Trust Level: Semi-Trusted
///
/// Feeds may spawn one blocking reader for their socket, but must not poll
/// on a timer and must not decide anything about DNS.
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to notifications
    ///
    /// # Returns
    ///
    /// - `Ok(ChangeStream)`: The live notification stream
    /// - `Err(Error)`: If the subscription could not be established
    fn subscribe(&self) -> Result<ChangeStream, crate::Error>;
}
