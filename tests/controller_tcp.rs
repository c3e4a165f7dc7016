use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ofctl::config::ControllerConfig;
use ofctl::ctl::controller::Controller;
use ofctl::ctl::serve;
use ofctl::ds::actions::Action;
use ofctl::ds::codec::{self, FrameDecoder};
use ofctl::ds::features::{Capabilities, SwitchFeatures};
use ofctl::ds::flow_match::{Match, OxmField};
use ofctl::ds::flow_mod::FlowModCommand;
use ofctl::ds::hello::Hello;
use ofctl::ds::hw_addr::MacAddr;
use ofctl::ds::multipart::{MultipartFlags, MultipartReply, MultipartReplyBody};
use ofctl::ds::packet_in::{InReason, PacketIn, NO_BUFFER};
use ofctl::ds::ports::{Port, PortConfig, PortFeatures, PortState};
use ofctl::ds::{OfMsg, OfPayload, Type, Version};

const AA: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0xaa]);
const BB: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0xbb]);

fn start() -> (Arc<Controller>, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let controller = Arc::new(Controller::new(ControllerConfig::default()));
    let serving = controller.clone();
    thread::spawn(move || serve(listener, serving));
    (controller, addr)
}

struct FakeSwitch {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl FakeSwitch {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        FakeSwitch {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    fn send(&mut self, xid: u32, payload: OfPayload) {
        let bytes = codec::encode(&OfMsg::generate(Version::V1_3, xid, payload)).unwrap();
        self.stream.write_all(&bytes).unwrap();
    }

    /// Next controller message, skipping keepalives.
    fn recv(&mut self) -> OfMsg {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(msg) = self.decoder.next_frame().unwrap() {
                if msg.header().ttype() == Type::EchoRequest {
                    continue;
                }
                return msg;
            }
            let read = self.stream.read(&mut buf).unwrap();
            assert!(read > 0, "controller closed the connection");
            self.decoder.extend(&buf[..read]);
        }
    }

    fn expect(&mut self, ttype: Type) -> OfMsg {
        let msg = self.recv();
        assert_eq!(msg.header().ttype(), ttype, "got {:?}", msg);
        msg
    }

    fn closed(&mut self) -> bool {
        let mut buf = [0u8; 64];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    }
}

fn port(port_no: u32) -> Port {
    Port {
        port_no,
        hw_addr: MacAddr([0x0a, 0, 0, 0, 0, port_no as u8]),
        name: format!("s1-eth{}", port_no),
        config: PortConfig::empty(),
        state: PortState::LIVE,
        curr: PortFeatures::RATE_1GB_FD,
        advertised: PortFeatures::empty(),
        supported: PortFeatures::empty(),
        peer: PortFeatures::empty(),
        curr_speed: 1_000_000,
        max_speed: 1_000_000,
    }
}

fn packet_in(in_port: u32, src: MacAddr, dst: MacAddr) -> OfPayload {
    let mut frame = Vec::new();
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.resize(60, 0);
    OfPayload::PacketIn(PacketIn {
        buffer_id: NO_BUFFER,
        total_len: frame.len() as u16,
        reason: InReason::NoMatch,
        table_id: 0,
        cookie: 0,
        mmatch: Match::with_fields(vec![OxmField::InPort(in_port)]),
        ethernet_frame: frame,
    })
}

fn output_ports(msg: &OfMsg) -> Vec<u32> {
    match msg.payload() {
        OfPayload::PacketOut(out) => out.actions.iter().filter_map(Action::output_port).collect(),
        other => panic!("expected packet-out, got {:?}", other),
    }
}

/// Handshake up to the table-miss rule.
fn join(switch: &mut FakeSwitch, dpid: u64) {
    switch.expect(Type::Hello);
    switch.send(1, OfPayload::Hello(Hello::with_versions(&[Version::V1_3])));

    let xid = switch.expect(Type::FeaturesRequest).header().xid();
    switch.send(
        xid,
        OfPayload::FeaturesReply(SwitchFeatures {
            datapath_id: dpid,
            n_buffers: 0,
            n_tables: 254,
            auxiliary_id: 0,
            capabilities: Capabilities::FLOW_STATS,
            reserved: 0,
        }),
    );

    let xid = switch.expect(Type::MultipartRequest).header().xid();
    switch.send(
        xid,
        OfPayload::MultipartReply(MultipartReply {
            flags: MultipartFlags::empty(),
            body: MultipartReplyBody::PortDesc(vec![port(1), port(2), port(3)]),
        }),
    );

    switch.expect(Type::SetConfig);
    match switch.expect(Type::FlowMod).payload() {
        OfPayload::FlowMod(flow_mod) => {
            assert_eq!(flow_mod.priority, 0);
            assert!(flow_mod.mmatch.fields().is_empty());
        }
        _ => unreachable!(),
    }
}

#[test]
fn learns_floods_and_installs_over_tcp() {
    let (controller, addr) = start();
    let mut switch = FakeSwitch::connect(addr);
    join(&mut switch, 1);

    // unknown destination: flood to every other port
    switch.send(10, packet_in(1, AA, BB));
    let out = switch.expect(Type::PacketOut);
    assert_eq!(output_ports(&out), vec![2, 3]);

    // reply traffic: install towards port 1, then forward
    switch.send(11, packet_in(2, BB, AA));
    match switch.expect(Type::FlowMod).payload() {
        OfPayload::FlowMod(flow_mod) => {
            assert_eq!(flow_mod.command, FlowModCommand::Add);
            assert_eq!(flow_mod.mmatch.in_port(), Some(2));
            assert_eq!(flow_mod.mmatch.eth_dst(), Some(AA));
        }
        _ => unreachable!(),
    }
    let barrier_xid = switch.expect(Type::BarrierRequest).header().xid();
    let out = switch.expect(Type::PacketOut);
    assert_eq!(output_ports(&out), vec![1]);
    switch.send(barrier_xid, OfPayload::BarrierReply);

    assert_eq!(controller.lookup(1, AA, Instant::now()), Some(1));
    assert_eq!(controller.lookup(1, BB, Instant::now()), Some(2));
    assert_eq!(controller.switch_ids(), vec![1]);
}

#[test]
fn garbage_connection_does_not_disturb_others() {
    let (controller, addr) = start();
    let mut good = FakeSwitch::connect(addr);
    join(&mut good, 7);

    let mut bad = FakeSwitch::connect(addr);
    bad.expect(Type::Hello);
    bad.stream.write_all(&[0xff; 16]).unwrap();
    assert!(bad.closed());

    // the joined switch still gets service
    good.send(20, packet_in(3, AA, BB));
    assert_eq!(output_ports(&good.expect(Type::PacketOut)), vec![1, 2]);
    assert_eq!(controller.switch_ids(), vec![7]);
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn barrier_request_resolves_on_reply() {
    let (controller, addr) = start();
    let mut switch = FakeSwitch::connect(addr);
    join(&mut switch, 3);

    let pending = controller.request_barrier(3).unwrap();
    let xid = switch.expect(Type::BarrierRequest).header().xid();
    switch.send(xid, OfPayload::BarrierReply);
    pending.wait(Duration::from_secs(5)).unwrap();
}

#[test]
fn disconnect_closes_and_forgets_switch() {
    let (controller, addr) = start();
    let mut switch = FakeSwitch::connect(addr);
    join(&mut switch, 4);
    switch.send(30, packet_in(1, AA, BB));
    switch.expect(Type::PacketOut);
    assert_eq!(controller.lookup(4, AA, Instant::now()), Some(1));

    controller.disconnect(4).unwrap();
    assert!(switch.closed());
    assert!(wait_until(|| controller.switch(4).is_none()));
    assert_eq!(controller.lookup(4, AA, Instant::now()), None);
    assert!(controller.disconnect(4).is_err());
}

#[test]
fn reconnect_replaces_old_connection() {
    let (controller, addr) = start();
    let mut old = FakeSwitch::connect(addr);
    join(&mut old, 5);

    let mut new = FakeSwitch::connect(addr);
    join(&mut new, 5);
    let new_addr = new.stream.local_addr().unwrap();

    // the old session is shut down and its leave does not unregister the new one
    assert!(old.closed());
    thread::sleep(Duration::from_millis(200));
    let handle = controller.switch(5).unwrap();
    assert_eq!(handle.connection().peer(), Some(new_addr));
    assert_eq!(controller.switch_ids(), vec![5]);

    new.send(40, packet_in(2, BB, AA));
    assert_eq!(output_ports(&new.expect(Type::PacketOut)), vec![1, 3]);
}

#[test]
fn oversized_flood_keeps_session_up() {
    let (controller, addr) = start();
    let mut switch = FakeSwitch::connect(addr);
    join(&mut switch, 6);

    let mut frame = Vec::new();
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&AA.octets());
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.resize(65490, 0);
    switch.send(
        50,
        OfPayload::PacketIn(PacketIn {
            buffer_id: NO_BUFFER,
            total_len: frame.len() as u16,
            reason: InReason::NoMatch,
            table_id: 0,
            cookie: 0,
            mmatch: Match::with_fields(vec![OxmField::InPort(1)]),
            ethernet_frame: frame,
        }),
    );
    match switch.expect(Type::PacketOut).payload() {
        OfPayload::PacketOut(out) => {
            assert_eq!(out.actions.len(), 1);
            assert_eq!(out.actions[0].output_port(), None);
            assert_eq!(out.data.len(), 65490);
        }
        _ => unreachable!(),
    }
    assert_eq!(controller.switch_ids(), vec![6]);
}
