//! Blocking rtnetlink sockets: one-shot dumps and the notification listener

use crate::parse::{self, LinkTable};
use ddns_core::address::NetworkAddress;
use ddns_core::traits::ChangeEvent;
use ddns_core::{Error, Result};
use netlink_packet_core::{
    NetlinkHeader, NetlinkMessage, NetlinkPayload, NLM_F_DUMP, NLM_F_REQUEST,
};
use netlink_packet_route::{AddressMessage, LinkMessage, RtnlMessage};
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
use std::io;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, trace, warn};

const RTMGRP_LINK: u32 = 0x1;
const RTMGRP_IPV4_IFADDR: u32 = 0x10;
const RTMGRP_IPV6_IFADDR: u32 = 0x100;

const RECV_BUFFER_SIZE: usize = 64 * 1024;

const ENOBUFS: i32 = 105;

fn dump(socket: &Socket, request: RtnlMessage, sequence: u32) -> io::Result<Vec<RtnlMessage>> {
    let mut header = NetlinkHeader::default();
    header.flags = NLM_F_REQUEST | NLM_F_DUMP;
    header.sequence_number = sequence;

    let mut packet = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(request));
    packet.finalize();
    let mut out = vec![0u8; packet.buffer_len()];
    packet.serialize(&mut out);
    socket.send(&out, 0)?;

    let mut replies = Vec::new();
    let mut buf = Vec::with_capacity(RECV_BUFFER_SIZE);
    loop {
        buf.clear();
        socket.recv(&mut buf, 0)?;

        let payloads = parse::decode_all(&buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        for payload in payloads {
            match payload {
                NetlinkPayload::Done(_) => return Ok(replies),
                NetlinkPayload::InnerMessage(msg) => replies.push(msg),
                NetlinkPayload::Error(e) => {
                    return Err(io::Error::other(format!("kernel rejected dump: {:?}", e)));
                }
                _ => {}
            }
        }
    }
}

fn open_request_socket() -> io::Result<Socket> {
    let mut socket = Socket::new(NETLINK_ROUTE)?;
    socket.bind_auto()?;
    socket.connect(&SocketAddr::new(0, 0))?;
    Ok(socket)
}

/// Enumerate every address on every interface
///
/// Links are dumped first so each address can carry its interface's name
/// and operational state.
pub(crate) fn dump_addresses() -> Result<Vec<NetworkAddress>> {
    let socket = open_request_socket()
        .map_err(|e| Error::address_source(format!("Failed to open netlink socket: {}", e)))?;

    let links: LinkTable = dump(&socket, RtnlMessage::GetLink(LinkMessage::default()), 1)
        .map_err(|e| Error::address_source(format!("Link dump failed: {}", e)))?
        .iter()
        .filter_map(|msg| match msg {
            RtnlMessage::NewLink(link) => Some(parse::link_state(link)),
            _ => None,
        })
        .collect();
    trace!("Netlink link dump: {:?}", links);

    let addresses = dump(&socket, RtnlMessage::GetAddress(AddressMessage::default()), 2)
        .map_err(|e| Error::address_source(format!("Address dump failed: {}", e)))?
        .iter()
        .filter_map(|msg| match msg {
            RtnlMessage::NewAddress(addr) => parse::network_address(addr, &links),
            _ => None,
        })
        .collect();

    Ok(addresses)
}

/// Bind to the link and address groups and forward notifications to `tx`
///
/// The listener thread stops after the receiver is dropped (on the next
/// notification) or after the first fatal receive error, which it forwards.
/// Overruns are forwarded as [`ChangeEvent::overrun`] and reading continues.
pub(crate) fn spawn_listener(tx: UnboundedSender<Result<ChangeEvent>>) -> Result<()> {
    let mut socket = Socket::new(NETLINK_ROUTE)
        .map_err(|e| Error::change_feed(format!("Failed to open netlink socket: {}", e)))?;
    let groups = RTMGRP_LINK | RTMGRP_IPV4_IFADDR | RTMGRP_IPV6_IFADDR;
    socket
        .bind(&SocketAddr::new(0, groups))
        .map_err(|e| Error::change_feed(format!("Failed to bind netlink socket: {}", e)))?;

    std::thread::Builder::new()
        .name("netlink-feed".to_string())
        .spawn(move || listen(socket, tx))
        .map_err(|e| Error::change_feed(format!("Failed to start netlink listener: {}", e)))?;

    debug!("Subscribed to rtnetlink link and address groups");
    Ok(())
}

/// Map a receive error to what the feed reports
///
/// An overrun (`ENOBUFS`) only means the kernel dropped notifications; the
/// socket stays usable and a resync recovers the lost state.
pub(crate) fn recv_failure(err: &io::Error) -> Result<ChangeEvent> {
    if err.raw_os_error() == Some(ENOBUFS) {
        Ok(ChangeEvent::overrun())
    } else {
        Err(Error::change_feed(format!("netlink receive failed: {}", err)))
    }
}

fn listen(socket: Socket, tx: UnboundedSender<Result<ChangeEvent>>) {
    let mut buf = Vec::with_capacity(RECV_BUFFER_SIZE);
    loop {
        buf.clear();
        if let Err(e) = socket.recv(&mut buf, 0) {
            let outcome = recv_failure(&e);
            let fatal = outcome.is_err();
            if fatal {
                error!("Netlink receive failed: {}", e);
            } else {
                warn!("Netlink socket overrun, notifications lost: {}", e);
            }
            if tx.send(outcome).is_err() || fatal {
                return;
            }
            continue;
        }

        let payloads = match parse::decode_all(&buf) {
            Ok(payloads) => payloads,
            Err(e) => {
                warn!("Dropping undecodable netlink datagram: {}", e);
                continue;
            }
        };

        for payload in payloads {
            let NetlinkPayload::InnerMessage(msg) = payload else {
                continue;
            };
            let event = parse::change_event(&msg);
            trace!("Netlink notification: {:?}", event);
            if tx.send(Ok(event)).is_err() {
                debug!("Change feed receiver dropped, stopping netlink listener");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::traits::ChangeKind;

    #[test]
    fn overrun_is_reported_as_resync_event() {
        let event = recv_failure(&io::Error::from_raw_os_error(ENOBUFS)).unwrap();
        assert_eq!(event.kind, ChangeKind::Overrun);
    }

    #[test]
    fn other_receive_errors_are_fatal() {
        let err = recv_failure(&io::Error::from_raw_os_error(9)).unwrap_err();
        assert!(matches!(err, Error::ChangeFeed(_)));
    }
}
