//! Connection management
//!
//! Owns the lifecycle of the link to the sensor device: locate, open, stream
//! lines into the ingest path, and on any failure wait out a fixed delay
//! before trying again. Runs until its cancellation token fires.
//!
//! ```text
//!   Idle ──DeviceFound──▶ Opening ──Opened──▶ Open
//!    ▲                       │                 │
//!    │ NoDevice          OpenFailed           Lost
//!    └──(retry)              ▼                 ▼
//!                         Closed ◀─────────────┘
//!                            │
//!                            └──(retry)──DeviceFound──▶ Opening
//! ```

use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    DeviceBackend, DeviceLocator, DeviceStream, LineCodec, LinkError, PortInfo, DEFAULT_BAUD_RATE,
    LINK_LOST_RETRY_DELAY, NO_DEVICE_RETRY_DELAY, OPEN_FAILURE_RETRY_DELAY,
};
use crate::ingest::Ingestor;

/// Link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No device chosen yet
    Idle,
    /// Device chosen, open in progress
    Opening,
    /// Streaming lines
    Open,
    /// Device vanished, errored or failed to open; retry pending
    Closed,
}

impl LinkState {
    /// Transition function. Events that do not apply in the current state
    /// leave it unchanged.
    pub fn on(self, event: &LinkEvent) -> LinkState {
        use LinkState::*;
        match (self, event) {
            (_, LinkEvent::Shutdown) => Closed,
            (Idle | Closed, LinkEvent::DeviceFound(_)) => Opening,
            (Opening, LinkEvent::Opened) => Open,
            (Opening, LinkEvent::OpenFailed(_)) => Closed,
            (Open, LinkEvent::Lost(_)) => Closed,
            (state, _) => state,
        }
    }
}

/// Why a retry was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCause {
    /// No serial endpoint visible
    NoDevice,
    /// Endpoint present but could not be opened
    OpenFailure,
    /// An open link closed or errored
    LinkLost,
}

/// Everything that moves the link state machine
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Locator chose a port
    DeviceFound(PortInfo),
    /// Locator found nothing
    NoDevice,
    /// Port opened
    Opened,
    /// Port could not be opened
    OpenFailed(String),
    /// Open link failed or reached end of stream
    Lost(String),
    /// The single retry timer was armed
    RetryScheduled {
        /// What failed
        cause: RetryCause,
        /// How long until the next locate
        delay: Duration,
    },
    /// Manager is stopping; the port (if any) is already closed
    Shutdown,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Delay before retrying when no endpoint exists
    pub no_device_delay: Duration,
    /// Delay before retrying after an open failure
    pub open_failure_delay: Duration,
    /// Delay before reconnecting after an established link closes
    pub link_lost_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            no_device_delay: NO_DEVICE_RETRY_DELAY,
            open_failure_delay: OPEN_FAILURE_RETRY_DELAY,
            link_lost_delay: LINK_LOST_RETRY_DELAY,
        }
    }
}

impl LinkConfig {
    /// Fixed delay for a retry cause
    pub fn retry_delay(&self, cause: RetryCause) -> Duration {
        match cause {
            RetryCause::NoDevice => self.no_device_delay,
            RetryCause::OpenFailure => self.open_failure_delay,
            RetryCause::LinkLost => self.link_lost_delay,
        }
    }
}

/// Externally visible link status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    /// Current state
    pub state: LinkState,
    /// Current or most recently chosen port
    pub device: Option<String>,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            device: None,
        }
    }
}

enum StreamEnd {
    Shutdown,
    Lost(String),
}

/// Serial link manager
pub struct LinkManager<B: DeviceBackend> {
    backend: Arc<B>,
    locator: DeviceLocator,
    config: LinkConfig,
    ingest: Ingestor,
    state: LinkState,
    device: Option<String>,
    status_tx: watch::Sender<LinkStatus>,
    events_tx: broadcast::Sender<LinkEvent>,
}

impl<B: DeviceBackend> LinkManager<B> {
    /// Create a manager (not yet running)
    pub fn new(backend: B, locator: DeviceLocator, config: LinkConfig, ingest: Ingestor) -> Self {
        let (status_tx, _) = watch::channel(LinkStatus::default());
        let (events_tx, _) = broadcast::channel(64);
        Self {
            backend: Arc::new(backend),
            locator,
            config,
            ingest,
            state: LinkState::Idle,
            device: None,
            status_tx,
            events_tx,
        }
    }

    /// Watch the link status
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status_tx.subscribe()
    }

    /// Receive every event from now on
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events_tx.subscribe()
    }

    fn apply(&mut self, event: LinkEvent) {
        let previous = self.state;
        self.state = previous.on(&event);

        match &event {
            LinkEvent::DeviceFound(port) => {
                self.device = Some(port.name.clone());
                info!(
                    device = %port.name,
                    manufacturer = port.manufacturer.as_deref().unwrap_or("unknown"),
                    "opening serial device"
                );
            }
            LinkEvent::NoDevice => debug!("no serial device found"),
            LinkEvent::Opened => info!(
                device = self.device.as_deref().unwrap_or_default(),
                baud_rate = self.config.baud_rate,
                "serial link open"
            ),
            LinkEvent::OpenFailed(reason) => warn!(%reason, "failed to open serial device"),
            LinkEvent::Lost(reason) => warn!(%reason, "serial link lost"),
            LinkEvent::RetryScheduled { cause, delay } => {
                debug!(?cause, delay_ms = delay.as_millis() as u64, "retry scheduled")
            }
            LinkEvent::Shutdown => info!("serial link manager stopped"),
        }
        if previous != self.state {
            debug!(from = ?previous, to = ?self.state, "link state changed");
        }

        self.status_tx.send_replace(LinkStatus {
            state: self.state,
            device: self.device.clone(),
        });
        // No observers is fine
        let _ = self.events_tx.send(event);
    }

    /// Arm the retry timer and wait it out. Returns false if shutdown fired
    /// first.
    async fn wait_retry(&mut self, cause: RetryCause, shutdown: &CancellationToken) -> bool {
        let delay = self.config.retry_delay(cause);
        self.apply(LinkEvent::RetryScheduled { cause, delay });
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Enumerate ports on the blocking pool; udev and `/dev` scans can stall.
    async fn list_ports(&self) -> Vec<PortInfo> {
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || backend.list_ports()).await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("port enumeration task failed: {e}");
                Vec::new()
            }
        }
    }

    /// Open `port` on the blocking pool.
    async fn open(&self, port: PortInfo) -> Result<DeviceStream, LinkError> {
        let backend = Arc::clone(&self.backend);
        let baud_rate = self.config.baud_rate;
        tokio::task::spawn_blocking(move || backend.open(&port, baud_rate))
            .await
            .unwrap_or_else(|e| Err(LinkError::SerialError(format!("open task failed: {e}"))))
    }

    /// Read lines until the stream ends, errors, or shutdown fires. The
    /// stream and any partial line are dropped on return.
    async fn pump(&self, stream: DeviceStream, shutdown: &CancellationToken) -> StreamEnd {
        let mut lines = FramedRead::new(stream, LineCodec::new());
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return StreamEnd::Shutdown,
                next = lines.next() => match next {
                    Some(Ok(line)) => {
                        self.ingest.ingest_line(&line);
                    }
                    Some(Err(e)) => return StreamEnd::Lost(e.to_string()),
                    None => return StreamEnd::Lost("device stream closed".to_string()),
                },
            }
        }
    }

    /// Drive the link until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(baud_rate = self.config.baud_rate, "serial link manager started");

        while !shutdown.is_cancelled() {
            let ports = self.list_ports().await;
            let Some(port) = self.locator.select(&ports) else {
                self.apply(LinkEvent::NoDevice);
                if !self.wait_retry(RetryCause::NoDevice, &shutdown).await {
                    break;
                }
                continue;
            };

            self.apply(LinkEvent::DeviceFound(port.clone()));
            let stream = match self.open(port).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.apply(LinkEvent::OpenFailed(e.to_string()));
                    if !self.wait_retry(RetryCause::OpenFailure, &shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            self.apply(LinkEvent::Opened);
            match self.pump(stream, &shutdown).await {
                StreamEnd::Shutdown => break,
                StreamEnd::Lost(reason) => {
                    self.apply(LinkEvent::Lost(reason));
                    if !self.wait_retry(RetryCause::LinkLost, &shutdown).await {
                        break;
                    }
                }
            }
        }

        self.apply(LinkEvent::Shutdown);
    }
}
