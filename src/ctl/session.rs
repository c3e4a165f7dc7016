//! One switch connection as a state machine.
//!
//! The session never touches the socket. Inbound messages are fed to
//! [`Session::handle`], time is fed to [`Session::tick`], and everything the
//! session wants to send piles up until [`Session::take_outbox`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use super::super::config::SessionConfig;
use super::super::ds::error_msg::{ErrorMsg, ErrorType, HelloFailedCode};
use super::super::ds::features::SwitchFeatures;
use super::super::ds::flow_removed::FlowRemoved;
use super::super::ds::hello::Hello;
use super::super::ds::multipart::{MultipartReply, MultipartReplyBody, MultipartRequest};
use super::super::ds::packet_in::PacketIn;
use super::super::ds::port_status::{PortReason, PortStatus};
use super::super::ds::ports::Port;
use super::super::ds::{OfMsg, OfPayload, Version};
use super::super::err::*;
use super::switch::ConnectionHandle;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionState {
    Connecting,
    HandshakeSent,
    Established,
    Draining,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A connected switch as the rest of the controller sees it.
#[derive(Getters, CopyGetters, Debug, Clone)]
pub struct SwitchHandle {
    #[getset(get_copy = "pub")]
    datapath_id: u64,
    #[getset(get = "pub")]
    connection: ConnectionHandle,
    #[getset(get_copy = "pub")]
    version: Version,
    #[getset(get = "pub")]
    ports: BTreeMap<u32, Port>,
    #[getset(get_copy = "pub")]
    n_tables: u8,
    #[getset(get_copy = "pub")]
    n_buffers: u32,
}

impl SwitchHandle {
    pub fn update_port(&mut self, status: &PortStatus) {
        apply_port_status(&mut self.ports, status);
    }
}

/// Applies a port-status update to a port list.
pub(crate) fn apply_port_status(ports: &mut BTreeMap<u32, Port>, status: &PortStatus) {
    match status.reason {
        PortReason::Delete => {
            ports.remove(&status.desc.port_no);
        }
        PortReason::Add | PortReason::Modify => {
            ports.insert(status.desc.port_no, status.desc.clone());
        }
    }
}

/// Something the controller core has to react to.
#[derive(Debug)]
pub enum SwitchEvent {
    Joined(SwitchHandle),
    PacketIn(u64, PacketIn),
    PortStatus(u64, PortStatus),
    FlowRemoved(u64, FlowRemoved),
}

/// Completion signal for a barrier request.
#[derive(Debug)]
pub struct PendingBarrier {
    rx: Receiver<Result<()>>,
}

impl PendingBarrier {
    /// Blocks until the barrier reply arrives, the timeout passes or the
    /// session goes away.
    pub fn wait(self, timeout: Duration) -> Result<()> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => bail!(ErrorKind::BarrierTimeout),
            Err(RecvTimeoutError::Disconnected) => bail!(ErrorKind::SessionClosing),
        }
    }
}

/// Builds a pending barrier and the sender that completes it.
pub(crate) fn barrier_channel() -> (Sender<Result<()>>, PendingBarrier) {
    let (tx, rx) = channel();
    (tx, PendingBarrier { rx })
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum RequestKind {
    Features,
    PortDesc,
    Barrier,
}

#[derive(Debug)]
struct Outstanding {
    kind: RequestKind,
    sent_at: Instant,
    reply: Option<Sender<Result<()>>>,
}

pub struct Session {
    config: SessionConfig,
    state: SessionState,
    connection: ConnectionHandle,
    hello_received: bool,
    features: Option<SwitchFeatures>,
    ports: BTreeMap<u32, Port>,
    joined: bool,
    next_xid: u32,
    last_activity: Instant,
    missed_keepalives: u32,
    outstanding: HashMap<u32, Outstanding>,
    outbox: Vec<OfMsg>,
}

impl Session {
    pub fn new(config: SessionConfig, connection: ConnectionHandle, now: Instant) -> Self {
        Session {
            config,
            state: SessionState::Connecting,
            connection,
            hello_received: false,
            features: None,
            ports: BTreeMap::new(),
            joined: false,
            next_xid: 1,
            last_activity: now,
            missed_keepalives: 0,
            outstanding: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn version(&self) -> Version {
        self.config.version()
    }

    pub fn datapath_id(&self) -> Option<u64> {
        self.features.as_ref().map(|f| f.datapath_id)
    }

    /// Ports as last reported by the switch.
    pub fn ports(&self) -> &BTreeMap<u32, Port> {
        &self.ports
    }

    pub fn missed_keepalives(&self) -> u32 {
        self.missed_keepalives
    }

    fn alloc_xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1).max(1);
        xid
    }

    fn queue(&mut self, payload: OfPayload) -> u32 {
        let xid = self.alloc_xid();
        self.queue_with_xid(xid, payload);
        xid
    }

    fn queue_with_xid(&mut self, xid: u32, payload: OfPayload) {
        trace!("Queueing {:?} (xid {}) for {}.", payload.ttype(), xid, self.connection);
        self.outbox
            .push(OfMsg::generate(self.config.version(), xid, payload));
    }

    fn track(
        &mut self,
        xid: u32,
        kind: RequestKind,
        now: Instant,
        reply: Option<Sender<Result<()>>>,
    ) {
        self.outstanding.insert(
            xid,
            Outstanding {
                kind,
                sent_at: now,
                reply,
            },
        );
    }

    /// Sends our HELLO.
    pub fn start(&mut self, now: Instant) -> Result<()> {
        if self.state != SessionState::Connecting {
            bail!(ErrorKind::SessionNotReady(self.state.to_string()));
        }
        let hello = Hello::with_versions(&[self.config.version()]);
        self.queue(OfPayload::Hello(hello));
        self.last_activity = now;
        self.state = SessionState::HandshakeSent;
        debug!("{}: hello sent.", self.connection);
        Ok(())
    }

    fn refusal(&self) -> Option<ErrorKind> {
        match self.state {
            SessionState::Established => None,
            SessionState::Draining | SessionState::Closed => Some(ErrorKind::SessionClosing),
            other => Some(ErrorKind::SessionNotReady(other.to_string())),
        }
    }

    /// Datapath id of an established session. Any other state, draining
    /// included, is `SessionNotReady`.
    pub fn established_datapath(&self) -> Result<u64> {
        self.established_dpid()
            .ok_or_else(|| ErrorKind::SessionNotReady(self.state.to_string()).into())
    }

    /// Queues a message to an established switch and returns its xid.
    pub fn send(&mut self, payload: OfPayload) -> Result<u32> {
        if let Some(kind) = self.refusal() {
            bail!(kind);
        }
        Ok(self.queue(payload))
    }

    /// Sends a barrier request. `reply` receives the outcome, including a
    /// refusal to send.
    pub fn barrier(&mut self, reply: Option<Sender<Result<()>>>, now: Instant) -> Result<u32> {
        if let Some(kind) = self.refusal() {
            if let (Some(reply), Some(copy)) = (reply, self.refusal()) {
                let _ = reply.send(Err(copy.into()));
            }
            bail!(kind);
        }
        let xid = self.queue(OfPayload::BarrierRequest);
        self.track(xid, RequestKind::Barrier, now, reply);
        Ok(xid)
    }

    pub fn request_barrier(&mut self, now: Instant) -> Result<PendingBarrier> {
        let (tx, pending) = barrier_channel();
        self.barrier(Some(tx), now)?;
        Ok(pending)
    }

    pub fn take_outbox(&mut self) -> Vec<OfMsg> {
        std::mem::take(&mut self.outbox)
    }

    /// Feeds one inbound message.
    pub fn handle(&mut self, msg: OfMsg, now: Instant) -> Result<Vec<SwitchEvent>> {
        if matches!(self.state, SessionState::Draining | SessionState::Closed) {
            trace!(
                "{}: ignoring {:?} while {}.",
                self.connection,
                msg.header().ttype(),
                self.state
            );
            return Ok(Vec::new());
        }
        self.last_activity = now;
        self.missed_keepalives = 0;

        let xid = msg.header().xid();
        let header_version = msg.header().version();
        let mut events = Vec::new();
        match msg.into_payload() {
            OfPayload::Hello(hello) => self.on_hello(&hello, header_version, now)?,
            OfPayload::Error(err) => {
                if let Some(handle) = self.on_error(xid, &err)? {
                    events.push(SwitchEvent::Joined(handle));
                }
            }
            OfPayload::EchoRequest(data) => self.queue_with_xid(xid, OfPayload::EchoReply(data)),
            OfPayload::EchoReply(_) => trace!("{}: echo reply (xid {}).", self.connection, xid),
            OfPayload::FeaturesReply(features) => self.on_features(xid, features, now)?,
            OfPayload::MultipartReply(reply) => {
                if let Some(handle) = self.on_multipart(xid, reply)? {
                    events.push(SwitchEvent::Joined(handle));
                }
            }
            OfPayload::BarrierReply => self.on_barrier_reply(xid),
            OfPayload::PacketIn(packet_in) => match self.established_dpid() {
                Some(dpid) => events.push(SwitchEvent::PacketIn(dpid, packet_in)),
                None => debug!("{}: packet-in before handshake, dropped.", self.connection),
            },
            OfPayload::PortStatus(status) => {
                apply_port_status(&mut self.ports, &status);
                if let Some(dpid) = self.established_dpid() {
                    events.push(SwitchEvent::PortStatus(dpid, status));
                }
            }
            OfPayload::FlowRemoved(removed) => {
                if let Some(dpid) = self.established_dpid() {
                    events.push(SwitchEvent::FlowRemoved(dpid, removed));
                }
            }
            other => warn!(
                "{}: unexpected {:?} from switch, ignored.",
                self.connection,
                other.ttype()
            ),
        }
        Ok(events)
    }

    fn established_dpid(&self) -> Option<u64> {
        match self.state {
            SessionState::Established => self.datapath_id(),
            _ => None,
        }
    }

    fn on_hello(&mut self, hello: &Hello, header_version: Version, now: Instant) -> Result<()> {
        if self.state != SessionState::HandshakeSent || self.hello_received {
            debug!("{}: duplicate hello ignored.", self.connection);
            return Ok(());
        }
        self.hello_received = true;
        let ours = self.config.version();
        let negotiated = hello.negotiate(header_version, ours);
        if negotiated != ours {
            let reason = format!("controller requires OpenFlow version 0x{:02x}", ours as u8);
            self.queue(OfPayload::Error(ErrorMsg::hello_failed(
                HelloFailedCode::Incompatible,
                &reason,
            )));
            self.drain();
            bail!(ErrorKind::VersionMismatch(ours as u8, negotiated as u8));
        }
        debug!("{}: negotiated version {:?}.", self.connection, negotiated);
        let xid = self.queue(OfPayload::FeaturesRequest);
        self.track(xid, RequestKind::Features, now, None);
        Ok(())
    }

    fn on_error(&mut self, xid: u32, err: &ErrorMsg) -> Result<Option<SwitchHandle>> {
        let kind = self.outstanding.get(&xid).map(|o| o.kind);
        if self.state == SessionState::HandshakeSent
            && err.error_type() == Some(ErrorType::HelloFailed)
        {
            self.drain();
            bail!(ErrorKind::VersionMismatch(self.config.version() as u8, 0));
        }
        warn!(
            "{}: switch error type {} code {} for xid {}.",
            self.connection, err.ttype, err.code, xid
        );
        if kind == Some(RequestKind::PortDesc) {
            // no port description; continue with an empty port list
            self.outstanding.remove(&xid);
            return Ok(self.establish());
        }
        Ok(None)
    }

    fn on_features(&mut self, xid: u32, features: SwitchFeatures, now: Instant) -> Result<()> {
        let solicited = self
            .outstanding
            .get(&xid)
            .map_or(false, |o| o.kind == RequestKind::Features);
        if !solicited && (self.state != SessionState::HandshakeSent || self.features.is_some()) {
            debug!("{}: unsolicited features reply ignored.", self.connection);
            return Ok(());
        }
        self.outstanding.remove(&xid);
        info!(
            "{}: datapath {:016x} with {} tables and {} buffers.",
            self.connection, features.datapath_id, features.n_tables, features.n_buffers
        );
        self.features = Some(features);
        let xid = self.queue(OfPayload::MultipartRequest(MultipartRequest::PortDesc));
        self.track(xid, RequestKind::PortDesc, now, None);
        Ok(())
    }

    fn on_multipart(&mut self, xid: u32, reply: MultipartReply) -> Result<Option<SwitchHandle>> {
        let more = reply.more();
        let MultipartReplyBody::PortDesc(ports) = reply.body;
        for port in ports {
            self.ports.insert(port.port_no, port);
        }
        let awaited = self
            .outstanding
            .get(&xid)
            .map_or(false, |o| o.kind == RequestKind::PortDesc);
        if !awaited || more {
            return Ok(None);
        }
        self.outstanding.remove(&xid);
        Ok(self.establish())
    }

    fn establish(&mut self) -> Option<SwitchHandle> {
        if self.state != SessionState::HandshakeSent {
            return None;
        }
        let handle = self.handle_snapshot()?;
        self.state = SessionState::Established;
        self.joined = true;
        info!(
            "{}: datapath {:016x} established with {} ports.",
            self.connection,
            handle.datapath_id,
            handle.ports.len()
        );
        Some(handle)
    }

    /// The switch as currently known, once features are in.
    pub fn handle_snapshot(&self) -> Option<SwitchHandle> {
        let features = self.features.as_ref()?;
        Some(SwitchHandle {
            datapath_id: features.datapath_id,
            connection: self.connection.clone(),
            version: self.config.version(),
            ports: self.ports.clone(),
            n_tables: features.n_tables,
            n_buffers: features.n_buffers,
        })
    }

    fn on_barrier_reply(&mut self, xid: u32) {
        match self.outstanding.remove(&xid) {
            Some(Outstanding {
                kind: RequestKind::Barrier,
                reply,
                ..
            }) => {
                trace!("{}: barrier {} confirmed.", self.connection, xid);
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
            }
            Some(other) => {
                warn!("{}: barrier reply for non-barrier xid {}.", self.connection, xid);
                self.outstanding.insert(xid, other);
            }
            None => debug!("{}: unmatched barrier reply {}.", self.connection, xid),
        }
    }

    /// Runs timers: keep-alive echoes, the keep-alive timeout and barrier
    /// timeouts.
    pub fn tick(&mut self, now: Instant) {
        if matches!(self.state, SessionState::Draining | SessionState::Closed) {
            return;
        }

        let silence = now.saturating_duration_since(self.last_activity);
        if silence >= self.config.keepalive_timeout() {
            warn!(
                "{}: no traffic for {:?} after {} missed keep-alives, draining.",
                self.connection, silence, self.missed_keepalives
            );
            self.drain();
            return;
        }

        let interval = self.config.keepalive_interval();
        if !interval.is_zero() {
            let intervals = (silence.as_millis() / interval.as_millis()) as u32;
            if intervals > self.missed_keepalives {
                self.missed_keepalives = intervals;
                debug!(
                    "{}: idle for {:?}, sending echo ({} missed).",
                    self.connection, silence, intervals
                );
                self.queue(OfPayload::EchoRequest(Vec::new()));
            }
        }

        let barrier_timeout = self.config.barrier_timeout();
        let expired: Vec<u32> = self
            .outstanding
            .iter()
            .filter(|(_, o)| {
                o.kind == RequestKind::Barrier
                    && now.saturating_duration_since(o.sent_at) >= barrier_timeout
            })
            .map(|(xid, _)| *xid)
            .collect();
        for xid in expired {
            if let Some(outstanding) = self.outstanding.remove(&xid) {
                warn!("{}: barrier {} timed out.", self.connection, xid);
                if let Some(reply) = outstanding.reply {
                    let _ = reply.send(Err(ErrorKind::BarrierTimeout.into()));
                }
            }
        }
    }

    /// When [`Session::tick`] next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        if matches!(self.state, SessionState::Draining | SessionState::Closed) {
            return None;
        }
        let interval = self.config.keepalive_interval();
        let next_echo = self.last_activity + interval * (self.missed_keepalives + 1);
        let timeout = self.last_activity + self.config.keepalive_timeout();
        let barrier_timeout = self.config.barrier_timeout();
        self.outstanding
            .values()
            .filter(|o| o.kind == RequestKind::Barrier)
            .map(|o| o.sent_at + barrier_timeout)
            .chain(vec![next_echo, timeout])
            .min()
    }

    /// Stops accepting sends and fails everything outstanding.
    pub fn drain(&mut self) {
        if matches!(self.state, SessionState::Draining | SessionState::Closed) {
            return;
        }
        debug!("{}: draining from {}.", self.connection, self.state);
        self.state = SessionState::Draining;
        for (_, outstanding) in self.outstanding.drain() {
            if let Some(reply) = outstanding.reply {
                let _ = reply.send(Err(ErrorKind::SessionClosing.into()));
            }
        }
    }

    /// Moves to `Closed`. Returns the datapath id if the switch had joined.
    pub fn close(&mut self) -> Option<u64> {
        self.drain();
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closed;
        info!("{}: session closed.", self.connection);
        if self.joined {
            self.datapath_id()
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ds::features::Capabilities;
    use crate::ds::multipart::MultipartFlags;
    use crate::ds::ports::test_port;
    use crate::ds::Header;

    pub(crate) fn test_config() -> SessionConfig {
        SessionConfig {
            keepalive_interval_secs: 5,
            keepalive_timeout_secs: 15,
            barrier_timeout_ms: 2000,
            ..SessionConfig::default()
        }
    }

    pub(crate) fn from_switch(xid: u32, payload: OfPayload) -> OfMsg {
        OfMsg::new(Header::new(Version::V1_3, payload.ttype(), 8, xid), payload)
    }

    fn features(dpid: u64) -> SwitchFeatures {
        SwitchFeatures {
            datapath_id: dpid,
            n_buffers: 256,
            n_tables: 254,
            auxiliary_id: 0,
            capabilities: Capabilities::FLOW_STATS,
            reserved: 0,
        }
    }

    fn xid_of(session: &mut Session, ttype: crate::ds::Type) -> u32 {
        session
            .take_outbox()
            .into_iter()
            .find(|m| m.header().ttype() == ttype)
            .map(|m| m.header().xid())
            .unwrap()
    }

    /// Runs a full handshake and returns the established session.
    pub(crate) fn established(dpid: u64, ports: Vec<Port>, now: Instant) -> Session {
        let (connection, _rx) = ConnectionHandle::detached();
        let mut session = Session::new(test_config(), connection, now);
        session.start(now).unwrap();
        session.take_outbox();
        session
            .handle(from_switch(1, OfPayload::Hello(Hello::with_versions(&[Version::V1_3]))), now)
            .unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::FeaturesRequest);
        session
            .handle(from_switch(xid, OfPayload::FeaturesReply(features(dpid))), now)
            .unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::MultipartRequest);
        let events = session
            .handle(
                from_switch(
                    xid,
                    OfPayload::MultipartReply(MultipartReply {
                        flags: MultipartFlags::empty(),
                        body: MultipartReplyBody::PortDesc(ports),
                    }),
                ),
                now,
            )
            .unwrap();
        assert!(matches!(events.as_slice(), [SwitchEvent::Joined(_)]));
        session
    }

    #[test]
    fn handshake_reaches_established() {
        let now = Instant::now();
        let session = established(0x1, vec![test_port(1, true), test_port(2, true)], now);
        assert_eq!(session.state(), SessionState::Established);
        assert_eq!(session.datapath_id(), Some(1));
        assert_eq!(session.ports().len(), 2);
    }

    #[test]
    fn hello_is_sent_on_start() {
        let now = Instant::now();
        let (connection, _rx) = ConnectionHandle::detached();
        let mut session = Session::new(test_config(), connection, now);
        session.start(now).unwrap();
        assert_eq!(session.state(), SessionState::HandshakeSent);
        let outbox = session.take_outbox();
        assert!(matches!(outbox[0].payload(), OfPayload::Hello(_)));
    }

    #[test]
    fn multipart_reply_with_more_waits_for_last_part() {
        let now = Instant::now();
        let (connection, _rx) = ConnectionHandle::detached();
        let mut session = Session::new(test_config(), connection, now);
        session.start(now).unwrap();
        session
            .handle(from_switch(1, OfPayload::Hello(Hello::default())), now)
            .unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::FeaturesRequest);
        session
            .handle(from_switch(xid, OfPayload::FeaturesReply(features(7))), now)
            .unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::MultipartRequest);
        let part = |flags, port| {
            from_switch(
                xid,
                OfPayload::MultipartReply(MultipartReply {
                    flags,
                    body: MultipartReplyBody::PortDesc(vec![test_port(port, true)]),
                }),
            )
        };
        assert!(session.handle(part(MultipartFlags::MORE, 1), now).unwrap().is_empty());
        assert_eq!(session.state(), SessionState::HandshakeSent);
        let events = session.handle(part(MultipartFlags::empty(), 2), now).unwrap();
        match events.as_slice() {
            [SwitchEvent::Joined(handle)] => assert_eq!(handle.ports().len(), 2),
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn port_desc_error_joins_without_ports() {
        let now = Instant::now();
        let (connection, _rx) = ConnectionHandle::detached();
        let mut session = Session::new(test_config(), connection, now);
        session.start(now).unwrap();
        session
            .handle(from_switch(1, OfPayload::Hello(Hello::default())), now)
            .unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::FeaturesRequest);
        session
            .handle(from_switch(xid, OfPayload::FeaturesReply(features(3))), now)
            .unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::MultipartRequest);
        // OFPET_BAD_REQUEST / OFPBRC_BAD_MULTIPART
        let refused = ErrorMsg {
            ttype: 1,
            code: 2,
            data: Vec::new(),
        };
        let events = session
            .handle(from_switch(xid, OfPayload::Error(refused)), now)
            .unwrap();
        match events.as_slice() {
            [SwitchEvent::Joined(handle)] => {
                assert_eq!(handle.datapath_id(), 3);
                assert!(handle.ports().is_empty());
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Established);
    }

    #[test]
    fn version_mismatch_sends_error_and_drains() {
        let now = Instant::now();
        let (connection, _rx) = ConnectionHandle::detached();
        let mut session = Session::new(test_config(), connection, now);
        session.start(now).unwrap();
        session.take_outbox();
        let hello = OfMsg::new(
            Header::new(Version::V1_0, crate::ds::Type::Hello, 8, 3),
            OfPayload::Hello(Hello::default()),
        );
        let err = session.handle(hello, now).unwrap_err();
        match err.kind() {
            ErrorKind::VersionMismatch(4, 1) => (),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Draining);
        let outbox = session.take_outbox();
        match outbox[0].payload() {
            OfPayload::Error(msg) => assert_eq!(msg.error_type(), Some(ErrorType::HelloFailed)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.close(), None);
    }

    #[test]
    fn sends_before_established_are_refused() {
        let now = Instant::now();
        let (connection, _rx) = ConnectionHandle::detached();
        let mut session = Session::new(test_config(), connection, now);
        session.start(now).unwrap();
        match session.send(OfPayload::BarrierRequest).unwrap_err().kind() {
            ErrorKind::SessionNotReady(_) => (),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn echo_request_is_answered_with_same_xid() {
        let now = Instant::now();
        let mut session = established(1, Vec::new(), now);
        session.take_outbox();
        session
            .handle(from_switch(42, OfPayload::EchoRequest(b"hi".to_vec())), now)
            .unwrap();
        let outbox = session.take_outbox();
        assert_eq!(outbox[0].header().xid(), 42);
        assert_eq!(outbox[0].payload(), &OfPayload::EchoReply(b"hi".to_vec()));
    }

    #[test]
    fn silence_sends_echoes_then_drains() {
        let t0 = Instant::now();
        let mut session = established(1, Vec::new(), t0);
        session.take_outbox();

        assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(5)));
        session.tick(t0 + Duration::from_secs(5));
        assert_eq!(session.missed_keepalives(), 1);
        assert!(matches!(session.take_outbox()[0].payload(), OfPayload::EchoRequest(_)));
        // same interval, no second echo
        session.tick(t0 + Duration::from_secs(6));
        assert!(session.take_outbox().is_empty());

        session.tick(t0 + Duration::from_secs(10));
        assert_eq!(session.missed_keepalives(), 2);
        assert_eq!(session.state(), SessionState::Established);

        session.tick(t0 + Duration::from_secs(15));
        assert_eq!(session.state(), SessionState::Draining);
        match session.send(OfPayload::BarrierRequest).unwrap_err().kind() {
            ErrorKind::SessionClosing => (),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(session.close(), Some(1));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn inbound_traffic_resets_keepalive() {
        let t0 = Instant::now();
        let mut session = established(1, Vec::new(), t0);
        session.tick(t0 + Duration::from_secs(5));
        session
            .handle(from_switch(9, OfPayload::EchoReply(Vec::new())), t0 + Duration::from_secs(6))
            .unwrap();
        assert_eq!(session.missed_keepalives(), 0);
        session.tick(t0 + Duration::from_secs(20));
        assert_eq!(session.state(), SessionState::Established);
    }

    #[test]
    fn barrier_reply_completes_pending_barrier() {
        let now = Instant::now();
        let mut session = established(1, Vec::new(), now);
        session.take_outbox();
        let pending = session.request_barrier(now).unwrap();
        let xid = xid_of(&mut session, crate::ds::Type::BarrierRequest);
        session.handle(from_switch(xid, OfPayload::BarrierReply), now).unwrap();
        assert!(pending.wait(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn barrier_times_out_on_timer() {
        let t0 = Instant::now();
        let mut session = established(1, Vec::new(), t0);
        let pending = session.request_barrier(t0).unwrap();
        assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(2)));
        session.tick(t0 + Duration::from_secs(2));
        match pending.wait(Duration::from_millis(10)).unwrap_err().kind() {
            ErrorKind::BarrierTimeout => (),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn closing_fails_pending_barriers() {
        let now = Instant::now();
        let mut session = established(1, Vec::new(), now);
        let pending = session.request_barrier(now).unwrap();
        session.close();
        match pending.wait(Duration::from_secs(1)).unwrap_err().kind() {
            ErrorKind::SessionClosing => (),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn port_status_updates_ports_and_emits_event() {
        let now = Instant::now();
        let mut session = established(1, vec![test_port(1, true), test_port(2, true)], now);
        let status = PortStatus {
            reason: PortReason::Modify,
            desc: test_port(2, false),
        };
        let events = session
            .handle(from_switch(0, OfPayload::PortStatus(status)), now)
            .unwrap();
        assert!(matches!(events.as_slice(), [SwitchEvent::PortStatus(1, _)]));
        assert!(!session.ports()[&2].is_up());

        let status = PortStatus {
            reason: PortReason::Delete,
            desc: test_port(1, true),
        };
        session
            .handle(from_switch(0, OfPayload::PortStatus(status)), now)
            .unwrap();
        assert!(!session.ports().contains_key(&1));
    }
}
