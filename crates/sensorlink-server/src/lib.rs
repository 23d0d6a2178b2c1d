//! SensorLink server
//!
//! HTTP query endpoint, WebSocket subscription channel and the process
//! supervisor that ties them to the serial link.

pub mod config;
pub mod logging;
pub mod routes;
pub mod supervisor;

pub use config::Config;
