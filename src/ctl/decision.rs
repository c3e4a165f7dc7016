//! Flood or forward: what to do with one packet-in.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::time::Instant;

use super::super::config::ForwardingConfig;
use super::super::ds::actions::Action;
use super::super::ds::ethernet::EthernetFrame;
use super::super::ds::packet_in::PacketIn;
use super::super::ds::ports::{is_physical, Port, PortNo, PortNumber};
use super::super::err::*;
use super::installer::{FlowMatch, FlowRule};
use super::learning::MacTable;

/// A packet-in reduced to what forwarding needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketInEvent {
    pub dpid: u64,
    pub buffer_id: Option<u32>,
    pub in_port: u32,
    pub frame: EthernetFrame,
    /// the raw frame, sent back inline when the switch did not buffer it
    pub data: Vec<u8>,
}

impl PacketInEvent {
    pub fn parse(dpid: u64, packet_in: PacketIn) -> Result<Self> {
        let in_port = match packet_in.mmatch.in_port() {
            Some(0) | None => bail!(ErrorKind::MalformedPacket(
                "packet-in without an ingress port".to_string()
            )),
            Some(port) => port,
        };
        let frame = EthernetFrame::try_from(&packet_in.ethernet_frame[..])?;
        Ok(PacketInEvent {
            dpid,
            buffer_id: packet_in.buffer(),
            in_port,
            frame,
            data: packet_in.ethernet_frame,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FloodScope {
    /// the switch's own FLOOD port; used while no port list is known
    Reserved,
    /// explicit output ports, ingress excluded
    Ports(Vec<u32>),
}

impl FloodScope {
    pub fn actions(&self) -> Vec<Action> {
        match self {
            FloodScope::Reserved => vec![Action::output(PortNumber::Reserved(PortNo::Flood))],
            FloodScope::Ports(ports) => ports
                .iter()
                .map(|port| Action::output(PortNumber::NormalPort(*port)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodReason {
    UnknownDestination,
    Broadcast,
    PortDown,
    /// destination sits behind the ingress port
    Hairpin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Lldp,
    /// destination sits behind the ingress port and the loop guard is off
    SameSegment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Flood {
        scope: FloodScope,
        reason: FloodReason,
    },
    Forward {
        out_port: u32,
        rule: FlowRule,
    },
    Drop {
        reason: DropReason,
    },
}

impl Decision {
    pub fn is_flood(&self) -> bool {
        matches!(self, Decision::Flood { .. })
    }
}

fn flood(event: &PacketInEvent, ports: &BTreeMap<u32, Port>, reason: FloodReason) -> Decision {
    let scope = if ports.is_empty() {
        FloodScope::Reserved
    } else {
        FloodScope::Ports(
            ports
                .values()
                .filter(|port| port.port_no != event.in_port && port.can_flood())
                .map(|port| port.port_no)
                .collect(),
        )
    };
    Decision::Flood { scope, reason }
}

/// Whether a learned port can be used. With no port list every port is
/// assumed up; with one, a port missing from it is gone.
fn port_usable(ports: &BTreeMap<u32, Port>, port_no: u32) -> bool {
    if ports.is_empty() || !is_physical(port_no) {
        return true;
    }
    ports.get(&port_no).map_or(false, Port::is_up)
}

/// Learns the source, then picks flood, forward or drop.
pub fn decide(
    event: &PacketInEvent,
    table: &mut MacTable,
    ports: &BTreeMap<u32, Port>,
    config: &ForwardingConfig,
    now: Instant,
) -> Decision {
    let src = event.frame.src;
    let dst = event.frame.dst;

    if config.ignore_lldp && event.frame.is_lldp() {
        return Decision::Drop {
            reason: DropReason::Lldp,
        };
    }

    table.learn(event.dpid, src, event.in_port, now);

    if dst.is_multicast() {
        return flood(event, ports, FloodReason::Broadcast);
    }
    let out_port = match table.lookup(event.dpid, dst, now) {
        Some(port) => port,
        None => return flood(event, ports, FloodReason::UnknownDestination),
    };
    if !port_usable(ports, out_port) {
        return flood(event, ports, FloodReason::PortDown);
    }
    if out_port == event.in_port {
        return if config.loop_guard {
            flood(event, ports, FloodReason::Hairpin)
        } else {
            Decision::Drop {
                reason: DropReason::SameSegment,
            }
        };
    }

    let output = PortNumber::try_from(out_port).unwrap_or(PortNumber::NormalPort(out_port));
    let rule = FlowRule {
        mmatch: FlowMatch {
            in_port: Some(event.in_port),
            eth_dst: Some(dst),
            eth_src: if config.match_eth_src { Some(src) } else { None },
        },
        priority: config.flow_priority,
        actions: vec![Action::output(output)],
        idle_timeout: config.flow_idle_timeout,
        hard_timeout: config.flow_hard_timeout,
        cookie: config.flow_cookie,
        table_id: 0,
    };
    Decision::Forward { out_port, rule }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::ethernet::{test_frame, ETH_TYPE_ARP, ETH_TYPE_IPV4, ETH_TYPE_LLDP};
    use crate::ds::flow_match::{Match, OxmField};
    use crate::ds::hw_addr::MacAddr;
    use crate::ds::packet_in::{InReason, NO_BUFFER};
    use crate::ds::ports::test_port;
    use std::time::Duration;

    const S1: u64 = 1;
    const AA: MacAddr = MacAddr([0, 0, 0, 0, 0, 0xaa]);
    const BB: MacAddr = MacAddr([0, 0, 0, 0, 0, 0xbb]);

    fn packet_in(in_port: Option<u32>, frame: Vec<u8>) -> PacketIn {
        let fields = in_port.map(OxmField::InPort).into_iter().collect();
        PacketIn {
            buffer_id: NO_BUFFER,
            total_len: frame.len() as u16,
            reason: InReason::NoMatch,
            table_id: 0,
            cookie: 0,
            mmatch: Match::with_fields(fields),
            ethernet_frame: frame,
        }
    }

    fn event(in_port: u32, src: MacAddr, dst: MacAddr) -> PacketInEvent {
        PacketInEvent::parse(S1, packet_in(Some(in_port), test_frame(dst, src, ETH_TYPE_IPV4)))
            .unwrap()
    }

    fn ports(up: &[u32], down: &[u32]) -> BTreeMap<u32, Port> {
        up.iter()
            .map(|p| test_port(*p, true))
            .chain(down.iter().map(|p| test_port(*p, false)))
            .map(|port| (port.port_no, port))
            .collect()
    }

    fn table() -> MacTable {
        MacTable::new(Duration::from_secs(300))
    }

    #[test]
    fn unknown_destination_floods_all_but_ingress() {
        let mut table = table();
        let now = Instant::now();
        let decision = decide(
            &event(1, AA, BB),
            &mut table,
            &ports(&[1, 2, 3], &[]),
            &ForwardingConfig::default(),
            now,
        );
        assert_eq!(
            decision,
            Decision::Flood {
                scope: FloodScope::Ports(vec![2, 3]),
                reason: FloodReason::UnknownDestination,
            }
        );
        assert_eq!(table.lookup(S1, AA, now), Some(1));
    }

    #[test]
    fn learned_destination_is_forwarded_with_rule() {
        let mut table = table();
        let now = Instant::now();
        let ports = ports(&[1, 2, 3], &[]);
        let config = ForwardingConfig::default();
        decide(&event(1, AA, BB), &mut table, &ports, &config, now);
        let decision = decide(&event(2, BB, AA), &mut table, &ports, &config, now);

        match decision {
            Decision::Forward { out_port, rule } => {
                assert_eq!(out_port, 1);
                assert_eq!(rule.mmatch.in_port, Some(2));
                assert_eq!(rule.mmatch.eth_dst, Some(AA));
                assert_eq!(rule.mmatch.eth_src, None);
                assert_eq!(rule.output_ports().collect::<Vec<_>>(), vec![1]);
                assert_eq!(rule.priority, config.flow_priority);
                assert_eq!(rule.idle_timeout, config.flow_idle_timeout);
                assert!(rule.priority > config.table_miss_priority);
            }
            other => panic!("unexpected decision {:?}", other),
        }
        assert_eq!(table.lookup(S1, BB, now), Some(2));
    }

    #[test]
    fn eth_src_is_matched_when_configured() {
        let mut table = table();
        let now = Instant::now();
        let config = ForwardingConfig {
            match_eth_src: true,
            ..ForwardingConfig::default()
        };
        table.learn(S1, AA, 1, now);
        match decide(&event(2, BB, AA), &mut table, &BTreeMap::new(), &config, now) {
            Decision::Forward { rule, .. } => assert_eq!(rule.mmatch.eth_src, Some(BB)),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn broadcast_always_floods() {
        let mut table = table();
        let now = Instant::now();
        table.learn(S1, MacAddr::BROADCAST, 3, now);
        let decision = decide(
            &event(1, AA, MacAddr::BROADCAST),
            &mut table,
            &BTreeMap::new(),
            &ForwardingConfig::default(),
            now,
        );
        assert_eq!(
            decision,
            Decision::Flood {
                scope: FloodScope::Reserved,
                reason: FloodReason::Broadcast,
            }
        );
    }

    #[test]
    fn destination_on_down_port_floods() {
        let mut table = table();
        let now = Instant::now();
        table.learn(S1, BB, 3, now);
        let decision = decide(
            &event(1, AA, BB),
            &mut table,
            &ports(&[1, 2], &[3]),
            &ForwardingConfig::default(),
            now,
        );
        assert_eq!(
            decision,
            Decision::Flood {
                scope: FloodScope::Ports(vec![2]),
                reason: FloodReason::PortDown,
            }
        );
    }

    #[test]
    fn destination_behind_ingress_floods_with_loop_guard() {
        let mut table = table();
        let now = Instant::now();
        table.learn(S1, BB, 1, now);
        let decision = decide(
            &event(1, AA, BB),
            &mut table,
            &ports(&[1, 2], &[]),
            &ForwardingConfig::default(),
            now,
        );
        assert!(matches!(
            decision,
            Decision::Flood {
                reason: FloodReason::Hairpin,
                ..
            }
        ));
    }

    #[test]
    fn destination_behind_ingress_drops_without_loop_guard() {
        let mut table = table();
        let now = Instant::now();
        table.learn(S1, BB, 1, now);
        let config = ForwardingConfig {
            loop_guard: false,
            ..ForwardingConfig::default()
        };
        let decision = decide(&event(1, AA, BB), &mut table, &BTreeMap::new(), &config, now);
        assert_eq!(
            decision,
            Decision::Drop {
                reason: DropReason::SameSegment
            }
        );
    }

    #[test]
    fn lldp_is_dropped_before_learning() {
        let mut table = table();
        let now = Instant::now();
        let event = PacketInEvent::parse(
            S1,
            packet_in(Some(1), test_frame(BB, AA, ETH_TYPE_LLDP)),
        )
        .unwrap();
        let config = ForwardingConfig::default();
        let decision = decide(&event, &mut table, &BTreeMap::new(), &config, now);
        assert_eq!(decision, Decision::Drop { reason: DropReason::Lldp });
        assert!(table.is_empty());
    }

    #[test]
    fn aged_destination_floods_again() {
        let mut table = table();
        let t0 = Instant::now();
        table.learn(S1, BB, 2, t0);
        let decision = decide(
            &event(1, AA, BB),
            &mut table,
            &BTreeMap::new(),
            &ForwardingConfig::default(),
            t0 + Duration::from_secs(301),
        );
        assert!(decision.is_flood());
    }

    #[test]
    fn packet_in_without_in_port_is_malformed() {
        let err = PacketInEvent::parse(S1, packet_in(None, test_frame(BB, AA, ETH_TYPE_ARP)))
            .unwrap_err();
        match err.kind() {
            ErrorKind::MalformedPacket(_) => (),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn packet_in_with_runt_frame_is_malformed() {
        let err = PacketInEvent::parse(S1, packet_in(Some(1), vec![0; 6])).unwrap_err();
        match err.kind() {
            ErrorKind::MalformedPacket(_) => (),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
