// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SNMP Bridge
//!
//! Bidirectional SNMP v2c gateway between a management station and a device
//! population that speak different OID namespaces.
//!
//! # Features
//!
//! - **Request Proxy**: GET/GETNEXT/GETBULK/SET relayed to an upstream agent
//! - **Trap Relay**: device traps (v1, v2c, informs) translated and re-sent to the station
//! - **Value Transforms**: decimal voltage/temperature strings to scaled integers
//! - **Heartbeat**: periodic liveness trap
//! - **HTTP Sink**: vehicle detector webhook
//!
//! # Quick Start
//!
//! ```bash
//! # Write an example configuration
//! snmp-bridge gen-config --output snmp-bridge.toml
//!
//! # Run the gateway
//! snmp-bridge --config snmp-bridge.toml
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! target_ip = "192.168.1.10"
//! source_ip = "0.0.0.0"
//! proxy_lk_ip = "192.168.1.20"
//! request_port = 161
//! trap_port = 162
//! heartbeat_ip = "192.168.1.10"
//! heartbeat_interval = 60
//!
//! [[oids]]
//! source_oid = "1.3.6.1.4.1.2021.8.1.0"
//! target_oid = "1.3.6.1.4.1.9999.1.1.0"
//! translation_type = "voltage"
//! ```
//!
//! `source_oid` is the device-side identifier and `target_oid` the station-side
//! one. Traps and replies match `source_oid` and reach the station as
//! `target_oid`; station requests match `target_oid` and travel upstream as
//! `source_oid`.

pub mod ber;
pub mod codec;
pub mod config;
pub mod gateway;
pub mod heartbeat;
pub mod http_sink;
pub mod proxy;
pub mod stats;
pub mod table;
pub mod translate;
pub mod trap;

pub use codec::{Codec, DecodeError, EncodeError, Packet, PduType, V1TrapHeader, Value, VarBind};
pub use config::{ConfigError, GatewayConfig, OidMapping};
pub use gateway::{Gateway, GatewayError, GatewayHandle};
pub use proxy::{ForwardError, ForwardTimeout, ProxyError, ProxySettings, RequestProxy};
pub use stats::{GatewayStats, GatewayStatsSnapshot};
pub use table::{Direction, TransformKind, TranslationRule, TranslationTable};
pub use translate::{translate, ValueParseError};
pub use trap::{TrapError, TrapRelay, TrapSettings};
