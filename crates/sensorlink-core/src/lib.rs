//! # SensorLink Core Library
//!
//! Core functionality for relaying microcontroller telemetry.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial port discovery and device selection
//! - Line framing and JSON frame parsing with noise tolerance
//! - A shared "latest reading" store with partial merges
//! - An auto-reconnecting serial link manager
//! - Subscriber fan-out and a bounded reading log
//!
//! ## Example
//!
//! ```rust,ignore
//! use sensorlink_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! let store = ReadingStore::new();
//! let hub = SubscriberHub::new(store.clone());
//! let manager = LinkManager::new(
//!     SerialBackend,
//!     DeviceLocator::new(),
//!     LinkConfig::default(),
//!     Ingestor::new(hub.clone()),
//! );
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(manager.run(shutdown.clone()));
//!
//! let mut sub = hub.register();
//! while let Some(reading) = sub.recv().await {
//!     println!("bpm={} temp={} ir={}", reading.bpm, reading.temp, reading.ir);
//! }
//! ```

pub mod datalog;
pub mod hub;
pub mod ingest;
pub mod protocol;
pub mod query;
pub mod reading;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::datalog::{LogEntry, ReadingLog};
    pub use crate::hub::{SubscriberHub, SubscriberId, Subscription};
    pub use crate::ingest::Ingestor;
    pub use crate::protocol::{
        parse_line, DeviceBackend, DeviceLocator, Frame, LinkConfig, LinkEvent, LinkManager,
        LinkState, LinkStatus, PortInfo, SerialBackend,
    };
    pub use crate::query::QueryService;
    pub use crate::reading::{Fragment, Reading, ReadingStore};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
