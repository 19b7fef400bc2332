//! Decoding of rtnetlink messages into core types

use ddns_core::address::NetworkAddress;
use ddns_core::traits::ChangeEvent;
use netlink_packet_core::{NetlinkMessage, NetlinkPayload};
use netlink_packet_route::address::nlas::Nla as AddressNla;
use netlink_packet_route::link::nlas::Nla as LinkNla;
use netlink_packet_route::{AddressMessage, LinkMessage, RtnlMessage};
use netlink_packet_utils::DecodeError;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub(crate) const AF_INET: u8 = 2;
pub(crate) const AF_INET6: u8 = 10;

pub(crate) const IFF_UP: u32 = 0x1;
pub(crate) const IFF_RUNNING: u32 = 0x40;
pub(crate) const IFF_LOWER_UP: u32 = 0x10000;

/// Interface name and operational state, keyed by ifindex
pub(crate) type LinkTable = HashMap<u32, LinkState>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkState {
    pub name: String,
    pub up: bool,
}

/// Administratively up, running and with carrier
pub(crate) fn link_is_up(flags: u32) -> bool {
    let wanted = IFF_UP | IFF_RUNNING | IFF_LOWER_UP;
    flags & wanted == wanted
}

pub(crate) fn link_state(msg: &LinkMessage) -> (u32, LinkState) {
    let name = msg
        .nlas
        .iter()
        .find_map(|nla| match nla {
            LinkNla::IfName(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| format!("if{}", msg.header.index));

    (
        msg.header.index,
        LinkState {
            name,
            up: link_is_up(msg.header.flags),
        },
    )
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// The interface's own address carried by an RTM_*ADDR message
///
/// IFA_LOCAL wins over IFA_ADDRESS: on point-to-point links the latter is the
/// peer.
pub(crate) fn message_address(msg: &AddressMessage) -> Option<IpAddr> {
    let mut local = None;
    let mut address = None;
    for nla in &msg.nlas {
        match nla {
            AddressNla::Local(bytes) => local = ip_from_bytes(bytes),
            AddressNla::Address(bytes) => address = ip_from_bytes(bytes),
            _ => {}
        }
    }
    local.or(address)
}

/// Full 32-bit flags from IFA_FLAGS, or the 8-bit header flags without it
pub(crate) fn message_flags(msg: &AddressMessage) -> u32 {
    msg.nlas
        .iter()
        .find_map(|nla| match nla {
            AddressNla::Flags(flags) => Some(*flags),
            _ => None,
        })
        .unwrap_or(u32::from(msg.header.flags))
}

pub(crate) fn network_address(msg: &AddressMessage, links: &LinkTable) -> Option<NetworkAddress> {
    if msg.header.family != AF_INET && msg.header.family != AF_INET6 {
        return None;
    }
    let ip = message_address(msg)?;

    let (interface, up) = match links.get(&msg.header.index) {
        Some(link) => (link.name.clone(), link.up),
        None => (format!("if{}", msg.header.index), false),
    };

    Some(NetworkAddress::new(ip, interface, message_flags(msg), up).with_prefix_len(msg.header.prefix_len))
}

pub(crate) fn change_event(msg: &RtnlMessage) -> ChangeEvent {
    match msg {
        RtnlMessage::NewAddress(addr) => match message_address(addr) {
            Some(ip) => ChangeEvent::address_added(ip.to_string()),
            None => ChangeEvent::other(),
        },
        RtnlMessage::DelAddress(addr) => match message_address(addr) {
            Some(ip) => ChangeEvent::address_removed(ip.to_string()),
            None => ChangeEvent::other(),
        },
        RtnlMessage::NewLink(_) => ChangeEvent::link_added(),
        RtnlMessage::DelLink(_) => ChangeEvent::link_removed(),
        _ => ChangeEvent::other(),
    }
}

/// Split one receive buffer into its netlink messages
pub(crate) fn decode_all(
    buf: &[u8],
) -> Result<Vec<NetlinkPayload<RtnlMessage>>, DecodeError> {
    let mut payloads = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let msg = NetlinkMessage::<RtnlMessage>::deserialize(&buf[offset..])?;
        let length = msg.header.length as usize;
        if length == 0 {
            break;
        }
        offset += (length + 3) & !3;
        payloads.push(msg.payload);
    }

    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::address::IFA_F_MANAGETEMPADDR;
    use ddns_core::traits::ChangeKind;
    use netlink_packet_core::NetlinkHeader;

    fn link(index: u32, name: &str, flags: u32) -> LinkMessage {
        let mut msg = LinkMessage::default();
        msg.header.index = index;
        msg.header.flags = flags;
        msg.nlas.push(LinkNla::IfName(name.to_string()));
        msg
    }

    fn v6_address(index: u32, octets: [u8; 16], flags: Option<u32>) -> AddressMessage {
        let mut msg = AddressMessage::default();
        msg.header.family = AF_INET6;
        msg.header.index = index;
        msg.header.prefix_len = 64;
        msg.nlas.push(AddressNla::Address(octets.to_vec()));
        if let Some(flags) = flags {
            msg.nlas.push(AddressNla::Flags(flags));
        }
        msg
    }

    fn links(entries: &[(u32, &str, bool)]) -> LinkTable {
        entries
            .iter()
            .map(|(index, name, up)| {
                (
                    *index,
                    LinkState {
                        name: name.to_string(),
                        up: *up,
                    },
                )
            })
            .collect()
    }

    const GLOBAL_V6: [u8; 16] = [
        0x2a, 0x01, 0x04, 0xf8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
    ];

    #[test]
    fn link_up_needs_all_three_flags() {
        assert!(link_is_up(IFF_UP | IFF_RUNNING | IFF_LOWER_UP));
        assert!(!link_is_up(IFF_UP | IFF_RUNNING));
        assert!(!link_is_up(IFF_UP | IFF_LOWER_UP));
        assert!(!link_is_up(0));
    }

    #[test]
    fn link_state_reads_name_and_flags() {
        let (index, state) = link_state(&link(3, "eth0", IFF_UP | IFF_RUNNING | IFF_LOWER_UP));
        assert_eq!(index, 3);
        assert_eq!(state.name, "eth0");
        assert!(state.up);
    }

    #[test]
    fn ipv4_prefers_local_over_peer() {
        let mut msg = AddressMessage::default();
        msg.header.family = AF_INET;
        msg.header.index = 5;
        msg.nlas.push(AddressNla::Address(vec![10, 0, 0, 2]));
        msg.nlas.push(AddressNla::Local(vec![85, 207, 1, 2]));

        let addr = network_address(&msg, &links(&[(5, "ppp0", true)])).unwrap();
        assert_eq!(addr.address, "85.207.1.2");
        assert_eq!(addr.interface, "ppp0");
        assert!(addr.interface_up);
    }

    #[test]
    fn flags_attribute_overrides_header_flags() {
        let mut msg = v6_address(2, GLOBAL_V6, Some(IFA_F_MANAGETEMPADDR));
        msg.header.flags = 0x80;
        assert_eq!(message_flags(&msg), IFA_F_MANAGETEMPADDR);

        let mut msg = v6_address(2, GLOBAL_V6, None);
        msg.header.flags = 0x80;
        assert_eq!(message_flags(&msg), 0x80);
    }

    #[test]
    fn unknown_interface_is_reported_down() {
        let addr = network_address(&v6_address(9, GLOBAL_V6, None), &LinkTable::new()).unwrap();
        assert_eq!(addr.interface, "if9");
        assert!(!addr.interface_up);
        assert_eq!(addr.address, "2a01:4f8::1");
        assert_eq!(addr.prefix_len, 64);
    }

    #[test]
    fn malformed_address_is_skipped() {
        let mut msg = AddressMessage::default();
        msg.header.family = AF_INET;
        msg.nlas.push(AddressNla::Address(vec![1, 2, 3]));
        assert!(network_address(&msg, &LinkTable::new()).is_none());
    }

    #[test]
    fn notifications_map_to_change_kinds() {
        let added = change_event(&RtnlMessage::NewAddress(v6_address(2, GLOBAL_V6, None)));
        assert_eq!(added.kind, ChangeKind::AddressAdded);
        assert_eq!(added.address.as_deref(), Some("2a01:4f8::1"));

        let removed = change_event(&RtnlMessage::DelAddress(v6_address(2, GLOBAL_V6, None)));
        assert_eq!(removed.kind, ChangeKind::AddressRemoved);

        assert_eq!(
            change_event(&RtnlMessage::NewLink(link(2, "eth0", 0))).kind,
            ChangeKind::LinkAdded
        );
        assert_eq!(
            change_event(&RtnlMessage::DelLink(link(2, "eth0", 0))).kind,
            ChangeKind::LinkRemoved
        );
    }

    #[test]
    fn decode_all_walks_concatenated_messages() {
        let mut buf = Vec::new();
        for msg in [
            RtnlMessage::NewLink(link(2, "eth0", IFF_UP)),
            RtnlMessage::NewAddress(v6_address(2, GLOBAL_V6, None)),
        ] {
            let mut packet = NetlinkMessage::new(NetlinkHeader::default(), NetlinkPayload::InnerMessage(msg));
            packet.finalize();
            let mut bytes = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut bytes);
            buf.extend_from_slice(&bytes);
        }

        let payloads = decode_all(&buf).unwrap();
        assert_eq!(payloads.len(), 2);
        assert!(matches!(
            payloads[1],
            NetlinkPayload::InnerMessage(RtnlMessage::NewAddress(_))
        ));
    }

    #[test]
    fn decode_all_rejects_truncated_buffer() {
        let mut packet = NetlinkMessage::new(
            NetlinkHeader::default(),
            NetlinkPayload::InnerMessage(RtnlMessage::NewLink(link(2, "eth0", IFF_UP))),
        );
        packet.finalize();
        let mut bytes = vec![0u8; packet.buffer_len()];
        packet.serialize(&mut bytes);

        let result: Result<_, DecodeError> = decode_all(&bytes[..bytes.len() - 4]);
        assert!(result.is_err());
    }
}
