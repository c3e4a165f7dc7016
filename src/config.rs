//! Controller configuration.
//!
//! Every value has a default, so an empty or partial TOML file is valid.
//! A file is checked with [`ControllerConfig::validate`] after loading.

use num_traits::FromPrimitive;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::ds::Version;
use super::err::*;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Address the OpenFlow listener binds to.
    pub listen_addr: String,
    pub session: SessionConfig,
    pub learning: LearningConfig,
    pub forwarding: ForwardingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wire version byte. Only 4 (OpenFlow 1.3) is supported.
    pub protocol_version: u8,
    /// Silence after which an echo request is sent.
    pub keepalive_interval_secs: u64,
    /// Silence after which the switch is considered gone.
    pub keepalive_timeout_secs: u64,
    pub barrier_timeout_ms: u64,
    /// Bytes of a table-miss packet the switch sends up. 0xffff = whole
    /// packet, unbuffered.
    pub miss_send_len: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Age after which a learned MAC is forgotten.
    pub aging_secs: u64,
    /// Period of the background sweep. 0 = lookups only.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForwardingConfig {
    pub flow_idle_timeout: u16,
    /// 0 = no hard timeout.
    pub flow_hard_timeout: u16,
    pub flow_priority: u16,
    pub table_miss_priority: u16,
    /// Tags every learned flow so they can be deleted as a group.
    pub flow_cookie: u64,
    /// Flood instead of installing a rule that outputs to its own ingress.
    pub loop_guard: bool,
    /// Match on eth_src as well as in_port and eth_dst.
    pub match_eth_src: bool,
    /// Follow each flow install with a barrier before the packet-out.
    pub barrier_after_install: bool,
    pub ignore_lldp: bool,
    /// Delete learned flows towards a port when it goes down.
    pub flush_on_port_down: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6653".to_string(),
            session: SessionConfig::default(),
            learning: LearningConfig::default(),
            forwarding: ForwardingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol_version: Version::V1_3 as u8,
            keepalive_interval_secs: 5,
            keepalive_timeout_secs: 15,
            barrier_timeout_ms: 2000,
            miss_send_len: 0xffff,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            aging_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            flow_idle_timeout: 30,
            flow_hard_timeout: 0,
            flow_priority: 10,
            table_miss_priority: 0,
            flow_cookie: 0x0f_c7_1000_0000_0001,
            loop_guard: true,
            match_eth_src: false,
            barrier_after_install: true,
            ignore_lldp: true,
            flush_on_port_down: true,
        }
    }
}

impl ControllerConfig {
    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .chain_err(|| format!("could not read config file {}", path.display()))?;
        let config: ControllerConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.protocol_version != Version::V1_3 as u8 {
            bail!(ErrorKind::InvalidConfig(format!(
                "protocol_version {} is not supported, only 4 (OpenFlow 1.3)",
                self.session.protocol_version
            )));
        }
        if self.session.keepalive_interval_secs == 0 {
            bail!(ErrorKind::InvalidConfig(
                "keepalive_interval_secs must be positive".to_string()
            ));
        }
        if self.session.keepalive_timeout_secs <= self.session.keepalive_interval_secs {
            bail!(ErrorKind::InvalidConfig(format!(
                "keepalive_timeout_secs ({}) must exceed keepalive_interval_secs ({})",
                self.session.keepalive_timeout_secs, self.session.keepalive_interval_secs
            )));
        }
        if self.forwarding.flow_priority <= self.forwarding.table_miss_priority {
            bail!(ErrorKind::InvalidConfig(format!(
                "flow_priority ({}) must be above table_miss_priority ({})",
                self.forwarding.flow_priority, self.forwarding.table_miss_priority
            )));
        }
        if self.forwarding.flow_cookie == 0 {
            bail!(ErrorKind::InvalidConfig(
                "flow_cookie 0 is reserved for the table-miss rule".to_string()
            ));
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Configured OpenFlow version. `validate` only lets 1.3 through, which
    /// is also the fallback for an unknown byte.
    pub fn version(&self) -> Version {
        Version::from_u8(self.protocol_version).unwrap_or(Version::V1_3)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_millis(self.barrier_timeout_ms)
    }
}

impl LearningConfig {
    pub fn aging(&self) -> Duration {
        Duration::from_secs(self.aging_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.keepalive_interval(), Duration::from_secs(5));
        assert_eq!(config.forwarding.flow_idle_timeout, 30);
        assert!(config.forwarding.loop_guard);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: ControllerConfig = toml::from_str(
            r#"
            listen_addr = "127.0.0.1:6633"

            [forwarding]
            flow_idle_timeout = 60
            match_eth_src = true
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:6633");
        assert_eq!(config.forwarding.flow_idle_timeout, 60);
        assert!(config.forwarding.match_eth_src);
        assert_eq!(config.forwarding.flow_priority, 10);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn other_protocol_versions_are_rejected() {
        let mut config = ControllerConfig::default();
        config.session.protocol_version = 1;
        match config.validate().unwrap_err().kind() {
            ErrorKind::InvalidConfig(_) => (),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn version_follows_protocol_version() {
        let mut session = SessionConfig::default();
        assert_eq!(session.version(), Version::V1_3);
        session.protocol_version = 1;
        assert_eq!(session.version(), Version::V1_0);
        session.protocol_version = 0x7f;
        assert_eq!(session.version(), Version::V1_3);
    }

    #[test]
    fn keepalive_timeout_must_exceed_interval() {
        let mut config = ControllerConfig::default();
        config.session.keepalive_timeout_secs = config.session.keepalive_interval_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn learned_flows_must_outrank_table_miss() {
        let mut config = ControllerConfig::default();
        config.forwarding.flow_priority = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_parse_errors() {
        let path =
            std::env::temp_dir().join(format!("ofctl-config-test-{}.toml", std::process::id()));
        fs::write(&path, "listen_addr = [").unwrap();
        assert!(ControllerConfig::load(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}
