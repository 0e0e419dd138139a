// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration.
//!
//! Loaded once from a TOML file at startup and never mutated afterwards.

use crate::ber;
use crate::heartbeat::HeartbeatSettings;
use crate::proxy::ProxySettings;
use crate::table::{TransformKind, TranslationRule, TranslationTable};
use crate::trap::TrapSettings;
use serde::{Deserialize, Deserializer, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Smallest datagram every SNMP entity must accept (RFC 3417).
pub const MIN_DATAGRAM_SIZE: usize = 484;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Management station receiving relayed traps.
    pub target_ip: IpAddr,

    /// Local address for the request and trap listeners.
    pub source_ip: IpAddr,

    /// Upstream agent that answers proxied requests.
    pub proxy_lk_ip: IpAddr,

    /// Request port, used for both listening and forwarding.
    #[serde(default = "default_request_port")]
    pub request_port: u16,

    /// Trap port, used for listening, relaying and heartbeats.
    #[serde(default = "default_trap_port")]
    pub trap_port: u16,

    /// Heartbeat destination. Heartbeats are disabled when absent or empty.
    #[serde(
        default,
        deserialize_with = "empty_ip_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub heartbeat_ip: Option<IpAddr>,

    #[serde(default = "default_community")]
    pub heartbeat_community: String,

    /// Heartbeat period (seconds).
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,

    /// Community used on proxied requests.
    #[serde(default = "default_community")]
    pub community: String,

    /// Community used on relayed traps.
    #[serde(default = "default_community")]
    pub trap_community: String,

    /// Upstream round-trip deadline (milliseconds).
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,

    /// Concurrent request datagrams being proxied.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Receive buffer size; longer datagrams are truncated.
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    #[serde(default = "default_true")]
    pub http_enabled: bool,

    #[serde(default = "default_http_bind")]
    pub http_bind: SocketAddr,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Translation rules, matched in declaration order.
    #[serde(default)]
    pub oids: Vec<OidMapping>,
}

fn default_request_port() -> u16 {
    161
}

fn default_trap_port() -> u16 {
    162
}

fn default_community() -> String {
    crate::codec::DEFAULT_COMMUNITY.to_string()
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_forward_timeout_ms() -> u64 {
    5000
}

fn default_max_in_flight() -> usize {
    64
}

fn default_max_datagram_size() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

fn default_http_bind() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 80)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn empty_ip_as_none<'de, D>(deserializer: D) -> Result<Option<IpAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl GatewayConfig {
    /// Minimal configuration with every optional key at its default.
    pub fn new(target_ip: IpAddr, source_ip: IpAddr, proxy_lk_ip: IpAddr) -> Self {
        Self {
            target_ip,
            source_ip,
            proxy_lk_ip,
            request_port: default_request_port(),
            trap_port: default_trap_port(),
            heartbeat_ip: None,
            heartbeat_community: default_community(),
            heartbeat_interval: default_heartbeat_interval(),
            community: default_community(),
            trap_community: default_community(),
            forward_timeout_ms: default_forward_timeout_ms(),
            max_in_flight: default_max_in_flight(),
            max_datagram_size: default_max_datagram_size(),
            http_enabled: true,
            http_bind: default_http_bind(),
            log_level: default_log_level(),
            oids: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_port == 0 {
            return Err(ConfigError::Invalid("request_port must be non-zero".into()));
        }
        if self.trap_port == 0 {
            return Err(ConfigError::Invalid("trap_port must be non-zero".into()));
        }
        if self.heartbeat_ip.is_some() && self.heartbeat_interval == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval must be greater than zero".into(),
            ));
        }
        if self.forward_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "forward_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "max_in_flight must be greater than zero".into(),
            ));
        }
        if self.max_datagram_size < MIN_DATAGRAM_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_datagram_size must be at least {} (got {})",
                MIN_DATAGRAM_SIZE, self.max_datagram_size
            )));
        }

        for (i, mapping) in self.oids.iter().enumerate() {
            mapping.to_rule().map_err(|reason| {
                ConfigError::Invalid(format!("oids[{}]: {}", i, reason))
            })?;
        }

        Ok(())
    }

    /// Translation rules in declaration order.
    pub fn translation_rules(&self) -> Result<Vec<TranslationRule>, ConfigError> {
        self.oids
            .iter()
            .enumerate()
            .map(|(i, m)| {
                m.to_rule()
                    .map_err(|reason| ConfigError::Invalid(format!("oids[{}]: {}", i, reason)))
            })
            .collect()
    }

    /// Build the translation table.
    pub fn translation_table(&self) -> Result<TranslationTable, ConfigError> {
        Ok(TranslationTable::build(self.translation_rules()?))
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            listen: SocketAddr::new(self.source_ip, self.request_port),
            upstream: SocketAddr::new(self.proxy_lk_ip, self.request_port),
            community: self.community.clone(),
            forward_timeout: self.forward_timeout(),
            max_in_flight: self.max_in_flight,
            max_datagram_size: self.max_datagram_size,
        }
    }

    pub fn trap_settings(&self) -> TrapSettings {
        TrapSettings {
            listen: SocketAddr::new(self.source_ip, self.trap_port),
            destination: SocketAddr::new(self.target_ip, self.trap_port),
            community: self.trap_community.clone(),
            max_datagram_size: self.max_datagram_size,
        }
    }

    /// `None` when heartbeats are disabled.
    pub fn heartbeat_settings(&self) -> Option<HeartbeatSettings> {
        self.heartbeat_ip.map(|ip| HeartbeatSettings {
            destination: SocketAddr::new(ip, self.trap_port),
            community: self.heartbeat_community.clone(),
            interval: Duration::from_secs(self.heartbeat_interval),
        })
    }

    /// Example configuration for `gen-config`.
    pub fn example() -> Self {
        let mut config = Self::new(
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
        );
        config.heartbeat_ip = Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        config.oids = vec![
            OidMapping::new("1.3.6.1.4.1.2021.8.1.0", "1.3.6.1.4.1.9999.1.1.0", "voltage"),
            OidMapping::new("1.3.6.1.4.1.2021.8.2.0", "1.3.6.1.4.1.9999.1.2.0", "temp"),
            OidMapping::new("1.3.6.1.4.1.2021.8.3.0", "1.3.6.1.4.1.9999.1.3.0", ""),
        ];
        config
    }
}

/// One `[[oids]]` entry.
///
/// Keys are named from the device's point of view: devices and the upstream
/// agent speak `source_oid`, the management station speaks `target_oid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidMapping {
    /// Identifier as served by the upstream agent and devices.
    pub source_oid: String,

    /// Identifier as seen by the management station.
    pub target_oid: String,

    /// `""`, `"voltage"` or `"temp"`.
    #[serde(default)]
    pub translation_type: String,
}

impl OidMapping {
    pub fn new(
        source_oid: impl Into<String>,
        target_oid: impl Into<String>,
        translation_type: impl Into<String>,
    ) -> Self {
        Self {
            source_oid: source_oid.into(),
            target_oid: target_oid.into(),
            translation_type: translation_type.into(),
        }
    }

    fn to_rule(&self) -> Result<TranslationRule, String> {
        check_oid("source_oid", &self.source_oid)?;
        check_oid("target_oid", &self.target_oid)?;

        let kind = TransformKind::from_config(self.translation_type.trim()).ok_or_else(|| {
            format!(
                "unknown translation_type {:?} (expected \"voltage\", \"temp\" or empty)",
                self.translation_type
            )
        })?;

        // Station requests are the rule's source side.
        let rule = TranslationRule::new(self.target_oid.trim(), self.source_oid.trim(), kind);
        if rule.source_oid == rule.target_oid {
            return Err(format!("source_oid and target_oid are both {}", rule.source_oid));
        }
        Ok(rule)
    }
}

fn check_oid(field: &str, oid: &str) -> Result<(), String> {
    let oid = oid.trim();
    if oid.is_empty() {
        return Err(format!("{} is empty", field));
    }
    ber::encode_oid(oid)
        .map(|_| ())
        .map_err(|_| format!("{} {:?} is not a dotted-numeric OID", field, oid))
}
