use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::super::ds::hw_addr::MacAddr;

/// Where a MAC was last seen on one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearningEntry {
    pub port: u32,
    pub last_seen: Instant,
}

/// MAC address to ingress port, per switch, with aging.
///
/// An entry is stale once `now - last_seen` exceeds the aging threshold.
/// Stale entries are evicted by the lookup that finds them or by
/// [`MacTable::age_sweep`].
#[derive(Debug)]
pub struct MacTable {
    entries: HashMap<(u64, MacAddr), LearningEntry>,
    aging: Duration,
}

impl MacTable {
    pub fn new(aging: Duration) -> Self {
        MacTable {
            entries: HashMap::new(),
            aging,
        }
    }

    pub fn aging(&self) -> Duration {
        self.aging
    }

    fn is_stale(&self, entry: &LearningEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) > self.aging
    }

    /// Records `mac` behind `port`, replacing any earlier port. Returns the
    /// previous port when the host moved.
    pub fn learn(&mut self, dpid: u64, mac: MacAddr, port: u32, now: Instant) -> Option<u32> {
        let previous = self.entries.insert(
            (dpid, mac),
            LearningEntry {
                port,
                last_seen: now,
            },
        );
        match previous {
            Some(entry) if entry.port != port => {
                debug!(
                    "{:016x}: {} moved from port {} to {}.",
                    dpid, mac, entry.port, port
                );
                Some(entry.port)
            }
            Some(_) => None,
            None => {
                debug!("{:016x}: learned {} on port {}.", dpid, mac, port);
                None
            }
        }
    }

    pub fn lookup(&mut self, dpid: u64, mac: MacAddr, now: Instant) -> Option<u32> {
        let entry = *self.entries.get(&(dpid, mac))?;
        if self.is_stale(&entry, now) {
            self.entries.remove(&(dpid, mac));
            debug!("{:016x}: {} aged out on lookup.", dpid, mac);
            None
        } else {
            Some(entry.port)
        }
    }

    /// Evicts every stale entry, returning how many went.
    pub fn age_sweep(&mut self, now: Instant) -> usize {
        let aging = self.aging;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= aging);
        before - self.entries.len()
    }

    /// Drops the MACs learned behind a port that went away.
    pub fn forget_port(&mut self, dpid: u64, port: u32) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(entry_dpid, _), entry| !(*entry_dpid == dpid && entry.port == port));
        before - self.entries.len()
    }

    pub fn forget_switch(&mut self, dpid: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(entry_dpid, _), _| *entry_dpid != dpid);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
