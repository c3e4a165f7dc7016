use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::time::Instant;

use super::super::config::ControllerConfig;
use super::super::ds::codec::{self, MAX_FRAME_LENGTH};
use super::super::ds::actions::Action;
use super::super::ds::flow_removed::FlowRemoved;
use super::super::ds::hw_addr::MacAddr;
use super::super::ds::packet_in::PacketIn;
use super::super::ds::packet_out::PacketOut;
use super::super::ds::port_status::{PortReason, PortStatus};
use super::super::ds::ports::{PortNo, PortNumber};
use super::super::ds::switch_config::{ConfigFlags, SwitchConfig};
use super::super::ds::OfPayload;
use super::super::err::*;
use super::decision::{decide, Decision, PacketInEvent};
use super::installer::{FlowInstaller, FlowRule};
use super::learning::MacTable;
use super::session::{PendingBarrier, Session, SwitchEvent, SwitchHandle};

/// Shared state of the controller: the connected switches, the MAC table
/// and the installed flows.
///
/// Hooks taking a `Session` run on that switch's session thread, so events
/// of one switch are handled in order while switches run in parallel.
pub struct Controller {
    config: ControllerConfig,
    switches: Mutex<HashMap<u64, SwitchHandle>>,
    learning: Mutex<MacTable>,
    flows: Mutex<FlowInstaller>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let aging = config.learning.aging();
        Controller {
            config,
            switches: Mutex::new(HashMap::new()),
            learning: Mutex::new(MacTable::new(aging)),
            flows: Mutex::new(FlowInstaller::new()),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Routes one session event to its hook. Failures are logged, never
    /// propagated to the session.
    pub fn dispatch(&self, session: &mut Session, event: SwitchEvent, now: Instant) {
        match event {
            SwitchEvent::Joined(handle) => {
                let dpid = handle.datapath_id();
                if let Err(err) = self.on_switch_join(session, handle, now) {
                    error!("{:016x}: join setup failed: {}", dpid, err);
                }
            }
            SwitchEvent::PacketIn(dpid, packet_in) => {
                if let Err(err) = self.on_packet_in(session, dpid, packet_in, now) {
                    match err.kind() {
                        ErrorKind::MalformedPacket(_) | ErrorKind::FrameTooLarge(_) => {
                            warn!("{:016x}: dropped packet-in: {}", dpid, err)
                        }
                        _ => error!("{:016x}: packet-in handling failed: {}", dpid, err),
                    }
                }
            }
            SwitchEvent::PortStatus(dpid, status) => {
                if let Err(err) = self.on_port_status(session, dpid, &status) {
                    error!("{:016x}: port status handling failed: {}", dpid, err);
                }
            }
            SwitchEvent::FlowRemoved(dpid, removed) => self.on_flow_removed(dpid, &removed),
        }
    }

    /// Registers the switch, sets its packet-in length and installs the
    /// table-miss rule.
    pub fn on_switch_join(
        &self,
        session: &mut Session,
        handle: SwitchHandle,
        now: Instant,
    ) -> Result<()> {
        let dpid = handle.datapath_id();
        info!(
            "Switch {:016x} joined from {} with {} ports.",
            dpid,
            handle.connection(),
            handle.ports().len()
        );
        let previous = self.switches.lock().insert(dpid, handle);
        if let Some(previous) = previous {
            warn!(
                "Switch {:016x} reconnected, dropping old connection {}.",
                dpid,
                previous.connection()
            );
            let _ = previous.connection().shutdown();
        }
        self.learning.lock().forget_switch(dpid);
        self.flows.lock().forget_switch(dpid);

        session.send(OfPayload::SetConfig(SwitchConfig {
            flags: ConfigFlags::FRAG_NORMAL,
            miss_send_len: self.config.session.miss_send_len,
        }))?;
        self.flows.lock().install(
            session,
            FlowRule::table_miss(self.config.forwarding.table_miss_priority),
            false,
            now,
        )?;
        Ok(())
    }

    /// Forgets a switch whose session closed. A newer connection of the same
    /// datapath is left in place.
    pub fn on_switch_leave(&self, dpid: u64, connection_id: u64) {
        {
            let mut switches = self.switches.lock();
            match switches.get(&dpid) {
                Some(handle) if handle.connection().id() == connection_id => {
                    switches.remove(&dpid);
                }
                _ => {
                    debug!("Switch {:016x}: stale connection {} left.", dpid, connection_id);
                    return;
                }
            }
        }
        let macs = self.learning.lock().forget_switch(dpid);
        let flows = self.flows.lock().forget_switch(dpid);
        info!(
            "Switch {:016x} left; forgot {} MACs and {} flows.",
            dpid, macs, flows
        );
    }

    /// Learns, decides, installs a rule when forwarding, and sends the
    /// packet on its way.
    pub fn on_packet_in(
        &self,
        session: &mut Session,
        dpid: u64,
        packet_in: PacketIn,
        now: Instant,
    ) -> Result<Decision> {
        let event = PacketInEvent::parse(dpid, packet_in)?;
        let decision = {
            let mut table = self.learning.lock();
            decide(
                &event,
                &mut table,
                session.ports(),
                &self.config.forwarding,
                now,
            )
        };

        let actions = match &decision {
            Decision::Flood { scope, reason } => {
                debug!(
                    "{:016x}: flooding {} -> {} from port {} ({:?}).",
                    dpid, event.frame.src, event.frame.dst, event.in_port, reason
                );
                scope.actions()
            }
            Decision::Forward { out_port, rule } => {
                let installed = self.flows.lock().install(
                    session,
                    rule.clone(),
                    self.config.forwarding.barrier_after_install,
                    now,
                );
                match installed {
                    Ok(_) => info!(
                        "{:016x}: installed flow in_port {} dst {} -> port {}.",
                        dpid, event.in_port, event.frame.dst, out_port
                    ),
                    Err(err) => warn!("{:016x}: flow install dropped: {}", dpid, err),
                }
                rule.actions.clone()
            }
            Decision::Drop { reason } => {
                trace!("{:016x}: dropping packet-in ({:?}).", dpid, reason);
                Vec::new()
            }
        };

        if actions.is_empty() {
            if decision.is_flood() {
                debug!("{:016x}: no port to flood to.", dpid);
            }
            // an empty action list releases the switch buffer
            if event.buffer_id.is_some() {
                self.packet_out(session, &event, Vec::new())?;
            }
            return Ok(decision);
        }
        self.packet_out(session, &event, actions)?;
        Ok(decision)
    }

    /// Sends the packet on. A frame too large to carry inline next to an
    /// explicit port list goes out the FLOOD port instead; one that does
    /// not fit at all is refused.
    fn packet_out(
        &self,
        session: &mut Session,
        event: &PacketInEvent,
        actions: Vec<Action>,
    ) -> Result<()> {
        let in_port = PortNumber::try_from(event.in_port)
            .unwrap_or(PortNumber::Reserved(PortNo::Controller));
        let build = |actions: Vec<Action>| {
            OfPayload::PacketOut(PacketOut::for_packet(
                event.buffer_id,
                in_port,
                actions,
                &event.data,
            ))
        };

        let outputs = actions.len();
        let mut payload = build(actions);
        let mut length = codec::encoded_len(&payload)?;
        if length > MAX_FRAME_LENGTH && outputs > 1 {
            warn!(
                "{:016x}: packet-out of {} bytes too large for {} outputs, using FLOOD.",
                event.dpid, length, outputs
            );
            payload = build(vec![Action::output(PortNumber::Reserved(PortNo::Flood))]);
            length = codec::encoded_len(&payload)?;
        }
        if length > MAX_FRAME_LENGTH {
            bail!(ErrorKind::FrameTooLarge(length));
        }
        session.send(payload)?;
        Ok(())
    }

    /// Keeps the port list current. A deleted or downed port loses its
    /// learned MACs and the learned flows towards it.
    pub fn on_port_status(
        &self,
        session: &mut Session,
        dpid: u64,
        status: &PortStatus,
    ) -> Result<()> {
        let port_no = status.desc.port_no;
        if let Some(handle) = self.switches.lock().get_mut(&dpid) {
            handle.update_port(status);
        }
        let gone = status.reason == PortReason::Delete || !status.desc.is_up();
        info!(
            "{:016x}: port {} ({}) {:?}, {}.",
            dpid,
            port_no,
            status.desc.name,
            status.reason,
            if gone { "down" } else { "up" }
        );
        if !gone {
            return Ok(());
        }

        let forgotten = self.learning.lock().forget_port(dpid, port_no);
        if forgotten > 0 {
            info!("{:016x}: forgot {} MACs behind port {}.", dpid, forgotten, port_no);
        }
        if self.config.forwarding.flush_on_port_down {
            let flushed =
                self.flows
                    .lock()
                    .flush_port(session, self.config.forwarding.flow_cookie, port_no)?;
            info!("{:016x}: flushed {} flows towards port {}.", dpid, flushed, port_no);
        }
        Ok(())
    }

    pub fn on_flow_removed(&self, dpid: u64, removed: &FlowRemoved) {
        let known = self.flows.lock().forget(dpid, removed);
        debug!(
            "{:016x}: flow priority {} removed ({:?}, known {}).",
            dpid, removed.priority, removed.reason, known
        );
    }

    /// Evicts stale MAC entries across all switches.
    pub fn age_sweep(&self, now: Instant) -> usize {
        let evicted = self.learning.lock().age_sweep(now);
        if evicted > 0 {
            debug!("Age sweep evicted {} MAC entries.", evicted);
        }
        evicted
    }

    pub fn switch(&self, dpid: u64) -> Option<SwitchHandle> {
        self.switches.lock().get(&dpid).cloned()
    }

    pub fn switch_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.switches.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn lookup(&self, dpid: u64, mac: MacAddr, now: Instant) -> Option<u32> {
        self.learning.lock().lookup(dpid, mac, now)
    }

    pub fn installed_flows(&self, dpid: u64) -> usize {
        self.flows.lock().installed_count(dpid)
    }

    /// Barrier round trip to a switch, resolved on its session thread.
    pub fn request_barrier(&self, dpid: u64) -> Result<PendingBarrier> {
        let connection = self
            .switches
            .lock()
            .get(&dpid)
            .map(|handle| handle.connection().clone())
            .ok_or_else(|| Error::from(ErrorKind::UnknownSwitch(dpid)))?;
        connection.request_barrier()
    }

    /// Asks a switch's session to drain and close.
    pub fn disconnect(&self, dpid: u64) -> Result<()> {
        let connection = self
            .switches
            .lock()
            .get(&dpid)
            .map(|handle| handle.connection().clone())
            .ok_or_else(|| Error::from(ErrorKind::UnknownSwitch(dpid)))?;
        connection.shutdown()
    }
}
