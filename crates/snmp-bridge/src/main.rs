// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SNMP Bridge CLI
//!
//! # Usage
//!
//! ```bash
//! # Run with ./config.toml
//! snmp-bridge
//!
//! # Explicit configuration and verbose logging
//! snmp-bridge --config /etc/snmp-bridge.toml --log-level debug
//!
//! # Generate or check a configuration file
//! snmp-bridge gen-config --output snmp-bridge.toml
//! snmp-bridge validate --config snmp-bridge.toml
//! ```

use clap::{Parser, Subcommand};
use snmp_bridge::{Gateway, GatewayConfig, GatewayStatsSnapshot};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// SNMP Bridge
#[derive(Parser, Debug)]
#[command(name = "snmp-bridge")]
#[command(about = "SNMP gateway - request proxy and trap relay with OID translation")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value = "0")]
    stats_interval: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "snmp-bridge.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = GatewayConfig::from_file(&args.config)
        .map_err(|e| format!("{}: {}", args.config.display(), e))?;
    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    tracing::info!("SNMP Bridge v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Requests {}:{} -> {}:{}, traps {}:{} -> {}:{}",
        config.source_ip,
        config.request_port,
        config.proxy_lk_ip,
        config.request_port,
        config.source_ip,
        config.trap_port,
        config.target_ip,
        config.trap_port
    );

    let handle = Gateway::new(config)?.start().await?;

    if args.stats_interval > 0 {
        let stats = handle.stats();
        let period = Duration::from_secs(args.stats_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                print_stats(&stats.snapshot());
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    let stats = handle.shutdown().await;
    println!("\nFinal Statistics:");
    print_stats(&stats);

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(&GatewayConfig::example())?;

    let content = format!(
        r#"# SNMP Bridge Configuration
# Generated by snmp-bridge gen-config
#
# source_oid is the device-side identifier, target_oid the station-side one.
# Traps and replies match source_oid and are relayed as target_oid.
# Requests match target_oid and are forwarded as source_oid.
# translation_type: "" (identifier only), "voltage" (x100) or "temp" (x10)

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match GatewayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!(
                "Requests:  {}:{} -> {}:{}",
                config.source_ip, config.request_port, config.proxy_lk_ip, config.request_port
            );
            println!(
                "Traps:     {}:{} -> {}:{}",
                config.source_ip, config.trap_port, config.target_ip, config.trap_port
            );
            match config.heartbeat_ip {
                Some(ip) => println!(
                    "Heartbeat: {}:{} every {}s",
                    ip, config.trap_port, config.heartbeat_interval
                ),
                None => println!("Heartbeat: disabled"),
            }
            println!("Rules:     {}", config.oids.len());
            for (i, oid) in config.oids.iter().enumerate() {
                let kind = if oid.translation_type.is_empty() {
                    "-"
                } else {
                    oid.translation_type.as_str()
                };
                println!("  [{}] {} <-> {} ({})", i, oid.source_oid, oid.target_oid, kind);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_stats(stats: &GatewayStatsSnapshot) {
    println!("--- Gateway Statistics ---");
    println!(
        "  Requests: {} received, {} answered ({:.1}/s), {} dropped, {} timed out",
        stats.requests_received,
        stats.requests_forwarded,
        stats.requests_per_second(),
        stats.requests_dropped,
        stats.forward_timeouts
    );
    println!(
        "  Traps:    {} received, {} relayed, {} dropped, {} informs acked",
        stats.traps_received, stats.traps_relayed, stats.traps_dropped, stats.informs_acked
    );
    println!(
        "  Other:    {} heartbeats, {} vehicle events, {} errors, up {}s",
        stats.heartbeats_sent, stats.vehicle_events, stats.errors, stats.uptime_secs
    );
}
