use std::collections::HashMap;
use std::convert::TryFrom;
use std::time::Instant;

use super::super::ds::actions::{Action, CONTROLLER_MAX_LEN_NO_BUFFER};
use super::super::ds::flow_instructions::Instruction;
use super::super::ds::flow_match::{Match, OxmField};
use super::super::ds::flow_mod::{FlowMod, FlowModFlags};
use super::super::ds::flow_removed::FlowRemoved;
use super::super::ds::hw_addr::MacAddr;
use super::super::ds::ports::{PortNo, PortNumber};
use super::super::ds::OfPayload;
use super::super::err::*;
use super::session::{PendingBarrier, Session};

/// Match predicate of a learned flow.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
pub struct FlowMatch {
    pub in_port: Option<u32>,
    pub eth_dst: Option<MacAddr>,
    pub eth_src: Option<MacAddr>,
}

impl FlowMatch {
    pub fn to_match(&self) -> Match {
        let mut mmatch = Match::all();
        if let Some(port) = self.in_port {
            mmatch.push(OxmField::InPort(port));
        }
        if let Some(dst) = self.eth_dst {
            mmatch.push(OxmField::EthDst(dst, None));
        }
        if let Some(src) = self.eth_src {
            mmatch.push(OxmField::EthSrc(src, None));
        }
        mmatch
    }
}

impl<'a> From<&'a Match> for FlowMatch {
    fn from(mmatch: &'a Match) -> Self {
        FlowMatch {
            in_port: mmatch.in_port(),
            eth_dst: mmatch.eth_dst(),
            eth_src: mmatch.eth_src(),
        }
    }
}

/// A flow entry the controller wants on a switch.
#[derive(Debug, PartialEq, Clone)]
pub struct FlowRule {
    pub mmatch: FlowMatch,
    pub priority: u16,
    pub actions: Vec<Action>,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub table_id: u8,
}

impl FlowRule {
    /// Lowest priority rule sending every unmatched packet to the controller
    /// in full.
    pub fn table_miss(priority: u16) -> Self {
        FlowRule {
            mmatch: FlowMatch::default(),
            priority,
            actions: vec![Action::Output {
                port: PortNumber::Reserved(PortNo::Controller),
                max_len: CONTROLLER_MAX_LEN_NO_BUFFER,
            }],
            idle_timeout: 0,
            hard_timeout: 0,
            cookie: 0,
            table_id: 0,
        }
    }

    /// Physical ports the rule outputs to.
    pub fn output_ports(&self) -> impl Iterator<Item = u32> + '_ {
        self.actions.iter().filter_map(Action::output_port)
    }

    /// OFPFC_ADD for this rule. ADD replaces an entry with identical match
    /// and priority, so resending is idempotent.
    pub fn to_flow_mod(&self) -> FlowMod {
        let mut flow_mod = FlowMod::add(
            self.table_id,
            self.priority,
            self.mmatch.to_match(),
            vec![Instruction::ApplyActions(self.actions.clone())],
        );
        flow_mod.cookie = self.cookie;
        flow_mod.idle_timeout = self.idle_timeout;
        flow_mod.hard_timeout = self.hard_timeout;
        flow_mod.flags = FlowModFlags::SEND_FLOW_REM;
        flow_mod
    }
}

/// What an install produced.
#[derive(Debug)]
pub struct PendingInstall {
    /// xid of the FLOW_MOD
    pub xid: u32,
    /// an identical (switch, match, priority) entry was already installed
    pub replaced: bool,
    pub barrier: Option<PendingBarrier>,
}

type RuleKey = (u64, FlowMatch, u16);

/// Sends flow rules and remembers what is installed where.
#[derive(Debug, Default)]
pub struct FlowInstaller {
    installed: HashMap<RuleKey, FlowRule>,
}

impl FlowInstaller {
    pub fn new() -> Self {
        FlowInstaller::default()
    }

    /// Sends `rule` to the session's switch, optionally followed by a
    /// barrier.
    pub fn install(
        &mut self,
        session: &mut Session,
        rule: FlowRule,
        barrier: bool,
        now: Instant,
    ) -> Result<PendingInstall> {
        if let Some(in_port) = rule.mmatch.in_port {
            if rule.output_ports().any(|port| port == in_port) {
                bail!(ErrorKind::LoopingRule(in_port));
            }
        }
        let dpid = session.established_datapath()?;

        let xid = session.send(OfPayload::FlowMod(rule.to_flow_mod()))?;
        let barrier = if barrier {
            Some(session.request_barrier(now)?)
        } else {
            None
        };
        let key = (dpid, rule.mmatch, rule.priority);
        let replaced = self.installed.insert(key, rule).is_some();
        debug!(
            "{:016x}: flow {:?} priority {} sent (xid {}, replaced {}).",
            dpid, key.1, key.2, xid, replaced
        );
        Ok(PendingInstall {
            xid,
            replaced,
            barrier,
        })
    }

    /// Deletes every rule carrying `cookie` that outputs to `port`. Rules
    /// with another cookie are left alone on the switch.
    pub fn flush_port(&mut self, session: &mut Session, cookie: u64, port: u32) -> Result<usize> {
        let dpid = session.established_datapath()?;
        let out_port = PortNumber::try_from(port)?;
        session.send(OfPayload::FlowMod(FlowMod::delete(
            0,
            cookie,
            u64::MAX,
            out_port,
        )))?;

        let before = self.installed.len();
        self.installed.retain(|(rule_dpid, _, _), rule| {
            !(*rule_dpid == dpid && rule.cookie == cookie && rule.output_ports().any(|p| p == port))
        });
        Ok(before - self.installed.len())
    }

    /// Forgets a rule the switch reported removed.
    pub fn forget(&mut self, dpid: u64, removed: &FlowRemoved) -> bool {
        let key = (dpid, FlowMatch::from(&removed.mmatch), removed.priority);
        self.installed.remove(&key).is_some()
    }

    pub fn forget_switch(&mut self, dpid: u64) -> usize {
        let before = self.installed.len();
        self.installed.retain(|(rule_dpid, _, _), _| *rule_dpid != dpid);
        before - self.installed.len()
    }

    pub fn installed(&self, dpid: u64, mmatch: &FlowMatch, priority: u16) -> Option<&FlowRule> {
        self.installed.get(&(dpid, *mmatch, priority))
    }

    pub fn installed_count(&self, dpid: u64) -> usize {
        self.installed
            .keys()
            .filter(|(rule_dpid, _, _)| *rule_dpid == dpid)
            .count()
    }
}
