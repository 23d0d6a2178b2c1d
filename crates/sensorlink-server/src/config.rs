//! Command-line / environment configuration

use clap::Parser;
use sensorlink_core::datalog::DEFAULT_LOG_CAPACITY;
use sensorlink_core::protocol::DEFAULT_BAUD_RATE;
use std::net::{IpAddr, Ipv4Addr};

/// Server configuration. Every option has a default; nothing is required.
#[derive(Parser, Debug, Clone)]
#[command(name = "sensorlink", version, about = "Relays serial sensor telemetry to HTTP and WebSocket clients")]
pub struct Config {
    /// Address to bind both listeners to
    #[arg(long, env = "SENSORLINK_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Port for the HTTP query endpoint
    #[arg(long, env = "SENSORLINK_HTTP_PORT", default_value_t = 3001)]
    pub http_port: u16,

    /// Port for the WebSocket subscription channel
    #[arg(long, env = "SENSORLINK_WS_PORT", default_value_t = 3002)]
    pub ws_port: u16,

    /// Serial device to use instead of auto-detection (e.g. /dev/ttyUSB0, COM4)
    #[arg(long, env = "SENSORLINK_DEVICE")]
    pub device: Option<String>,

    /// Serial baud rate
    #[arg(long, env = "SENSORLINK_BAUD_RATE", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,

    /// Number of recent readings kept for the history endpoint
    #[arg(long, env = "SENSORLINK_HISTORY_SIZE", default_value_t = DEFAULT_LOG_CAPACITY)]
    pub history_size: usize,

    /// Log filter used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "SENSORLINK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
