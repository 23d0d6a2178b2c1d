use pretty_assertions::assert_eq;
use sensorlink_core::prelude::*;
use sensorlink_core::protocol::{DeviceStream, LinkError, RetryCause};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the next `open` call should produce
enum Script {
    Fail(&'static str),
    Bytes(&'static [u8]),
    Pipe(DuplexStream),
}

/// Scripted device source: a mutable port list and a queue of open outcomes.
/// Once the queue is empty every open fails.
#[derive(Clone, Default)]
struct ScriptedBackend {
    ports: Arc<Mutex<Vec<PortInfo>>>,
    opens: Arc<Mutex<VecDeque<Script>>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    fn with_ports(ports: Vec<PortInfo>) -> Self {
        let backend = Self::default();
        *backend.ports.lock().unwrap() = ports;
        backend
    }

    fn set_ports(&self, ports: Vec<PortInfo>) {
        *self.ports.lock().unwrap() = ports;
    }

    fn push(&self, script: Script) {
        self.opens.lock().unwrap().push_back(script);
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl DeviceBackend for ScriptedBackend {
    fn list_ports(&self) -> Vec<PortInfo> {
        self.ports.lock().unwrap().clone()
    }

    fn open(&self, port: &PortInfo, _baud_rate: u32) -> Result<DeviceStream, LinkError> {
        self.opened.lock().unwrap().push(port.name.clone());
        match self.opens.lock().unwrap().pop_front() {
            Some(Script::Bytes(bytes)) => Ok(Box::new(Cursor::new(bytes))),
            Some(Script::Pipe(pipe)) => Ok(Box::new(pipe)),
            Some(Script::Fail(reason)) => Err(LinkError::SerialError(reason.to_string())),
            None => Err(LinkError::PortNotFound(port.name.clone())),
        }
    }
}

struct Harness {
    store: ReadingStore,
    hub: SubscriberHub,
    events: broadcast::Receiver<LinkEvent>,
    status: tokio::sync::watch::Receiver<LinkStatus>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

fn start(backend: ScriptedBackend, locator: DeviceLocator) -> Harness {
    let store = ReadingStore::new();
    let hub = SubscriberHub::new(store.clone());
    let manager = LinkManager::new(
        backend,
        locator,
        LinkConfig::default(),
        Ingestor::new(hub.clone()),
    );
    let events = manager.events();
    let status = manager.status();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(manager.run(shutdown.clone()));
    Harness {
        store,
        hub,
        events,
        status,
        shutdown,
        task,
    }
}

impl Harness {
    async fn next_event(&mut self) -> LinkEvent {
        self.events.recv().await.expect("event channel closed")
    }

    async fn next_retry(&mut self) -> (RetryCause, Duration) {
        loop {
            if let LinkEvent::RetryScheduled { cause, delay } = self.next_event().await {
                return (cause, delay);
            }
        }
    }

    async fn stop(mut self) -> Vec<LinkEvent> {
        self.shutdown.cancel();
        self.task.await.unwrap();
        let mut rest = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            rest.push(event);
        }
        rest
    }
}

#[tokio::test(start_paused = true)]
async fn test_repeated_open_failures_schedule_one_retry_each() {
    let backend = ScriptedBackend::with_ports(vec![PortInfo::from_path("A")]);
    for _ in 0..3 {
        backend.push(Script::Fail("Permission denied"));
    }
    let mut h = start(backend.clone(), DeviceLocator::new());

    let mut seen = Vec::new();
    let mut retries = Vec::new();
    let mut last_retry_at: Option<Instant> = None;
    while retries.len() < 3 {
        let event = h.next_event().await;
        if let LinkEvent::RetryScheduled { cause, delay } = &event {
            if let Some(previous) = last_retry_at {
                assert!(previous.elapsed() >= Duration::from_secs(5));
            }
            last_retry_at = Some(Instant::now());
            retries.push((*cause, *delay));
        }
        seen.push(event);
    }

    assert_eq!(
        retries,
        vec![(RetryCause::OpenFailure, Duration::from_secs(5)); 3]
    );
    assert!(!seen.contains(&LinkEvent::Opened));

    // Strictly DeviceFound -> OpenFailed -> RetryScheduled, never two
    // retries armed back to back.
    for cycle in seen.chunks(3) {
        assert!(matches!(cycle[0], LinkEvent::DeviceFound(_)));
        assert!(matches!(cycle[1], LinkEvent::OpenFailed(_)));
        assert!(matches!(cycle[2], LinkEvent::RetryScheduled { .. }));
    }
    assert_eq!(h.status.borrow().state, LinkState::Closed);
    assert_eq!(backend.opened(), vec!["A", "A", "A"]);

    let rest = h.stop().await;
    assert_eq!(rest.last(), Some(&LinkEvent::Shutdown));
}

#[tokio::test(start_paused = true)]
async fn test_no_device_stays_idle() {
    let mut h = start(ScriptedBackend::default(), DeviceLocator::new());

    assert_eq!(h.next_event().await, LinkEvent::NoDevice);
    assert_eq!(
        h.next_retry().await,
        (RetryCause::NoDevice, Duration::from_secs(5))
    );
    assert_eq!(h.status.borrow().state, LinkState::Idle);
    assert_eq!(h.next_event().await, LinkEvent::NoDevice);

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_lines_then_reconnect_after_close() {
    let backend = ScriptedBackend::with_ports(vec![PortInfo::from_path("/dev/ttyUSB0")]);
    backend.push(Script::Bytes(
        b"boot banner\n{\"bpm\":80}\n{\"temp\":37.0}\n{\"ir\":512",
    ));
    let mut h = start(backend, DeviceLocator::new());
    let mut sub = h.hub.register();
    assert_eq!(sub.recv().await, Some(Reading::default()));

    assert!(matches!(h.next_event().await, LinkEvent::DeviceFound(_)));
    assert_eq!(h.next_event().await, LinkEvent::Opened);
    assert!(matches!(h.next_event().await, LinkEvent::Lost(_)));
    assert_eq!(
        h.next_retry().await,
        (RetryCause::LinkLost, Duration::from_secs(3))
    );

    // Exactly two merges; the trailing partial line was never applied
    assert_eq!(
        sub.try_recv(),
        Some(Reading {
            bpm: 80,
            temp: 0.0,
            ir: 0
        })
    );
    assert_eq!(
        sub.try_recv(),
        Some(Reading {
            bpm: 80,
            temp: 37.0,
            ir: 0
        })
    );
    assert_eq!(sub.try_recv(), None);
    assert_eq!(h.store.snapshot().ir, 0);

    // Reconnect attempt follows the delay; this one fails
    assert!(matches!(h.next_event().await, LinkEvent::DeviceFound(_)));
    assert!(matches!(h.next_event().await, LinkEvent::OpenFailed(_)));

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_open_link() {
    let (device_side, mut board_side) = tokio::io::duplex(256);
    let backend = ScriptedBackend::with_ports(vec![PortInfo::from_path("/dev/ttyACM0")]);
    backend.push(Script::Pipe(device_side));
    let mut h = start(backend, DeviceLocator::new());
    let mut sub = h.hub.register();
    sub.recv().await;

    assert!(matches!(h.next_event().await, LinkEvent::DeviceFound(_)));
    assert_eq!(h.next_event().await, LinkEvent::Opened);

    board_side.write_all(b"{\"bpm\":66}\n").await.unwrap();
    assert_eq!(sub.recv().await.map(|r| r.bpm), Some(66));
    assert_eq!(h.status.borrow().state, LinkState::Open);

    let status = h.status.clone();
    let rest = h.stop().await;
    assert_eq!(rest, vec![LinkEvent::Shutdown]);
    assert_eq!(status.borrow().state, LinkState::Closed);

    // The manager dropped its end of the link
    let mut failed = false;
    for _ in 0..4 {
        if board_side.write_all(&[b'x'; 128]).await.is_err() {
            failed = true;
            break;
        }
    }
    assert!(failed, "device side still writable after shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_replug_prefers_known_vendor_on_next_cycle() {
    let backend = ScriptedBackend::with_ports(vec![
        PortInfo::from_path("/dev/ttyS0").with_manufacturer("Generic")
    ]);
    let mut h = start(backend.clone(), DeviceLocator::new());

    match h.next_event().await {
        LinkEvent::DeviceFound(port) => assert_eq!(port.name, "/dev/ttyS0"),
        other => panic!("unexpected event {other:?}"),
    }
    h.next_retry().await;

    backend.set_ports(vec![
        PortInfo::from_path("/dev/ttyS0").with_manufacturer("Generic"),
        PortInfo::from_path("/dev/ttyUSB0").with_manufacturer("Silicon Labs CP210x"),
    ]);

    match h.next_event().await {
        LinkEvent::DeviceFound(port) => assert_eq!(port.name, "/dev/ttyUSB0"),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        h.status.borrow().device.as_deref(),
        Some("/dev/ttyUSB0")
    );

    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let mut h = start(ScriptedBackend::default(), DeviceLocator::new());
    h.next_retry().await;

    let started = Instant::now();
    let rest = h.stop().await;
    assert_eq!(rest, vec![LinkEvent::Shutdown]);
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Enumeration waits for the test task to answer; it only gets an answer if
/// the scan is off the runtime thread.
struct HandshakeBackend {
    scanning: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    answer: Mutex<std::sync::mpsc::Receiver<()>>,
    answered: Arc<AtomicBool>,
}

impl DeviceBackend for HandshakeBackend {
    fn list_ports(&self) -> Vec<PortInfo> {
        if let Some(scanning) = self.scanning.lock().unwrap().take() {
            let _ = scanning.send(());
            let got = self
                .answer
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(2))
                .is_ok();
            self.answered.store(got, Ordering::SeqCst);
        }
        Vec::new()
    }

    fn open(&self, port: &PortInfo, _baud_rate: u32) -> Result<DeviceStream, LinkError> {
        Err(LinkError::PortNotFound(port.name.clone()))
    }
}

#[tokio::test]
async fn test_port_scan_runs_off_the_runtime_thread() {
    let (scanning_tx, scanning_rx) = tokio::sync::oneshot::channel();
    let (answer_tx, answer_rx) = std::sync::mpsc::channel();
    let answered = Arc::new(AtomicBool::new(false));
    let backend = HandshakeBackend {
        scanning: Mutex::new(Some(scanning_tx)),
        answer: Mutex::new(answer_rx),
        answered: answered.clone(),
    };

    let hub = SubscriberHub::new(ReadingStore::new());
    let manager = LinkManager::new(
        backend,
        DeviceLocator::new(),
        LinkConfig::default(),
        Ingestor::new(hub),
    );
    let mut events = manager.events();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(manager.run(shutdown.clone()));

    scanning_rx.await.unwrap();
    answer_tx.send(()).unwrap();
    assert_eq!(events.recv().await.unwrap(), LinkEvent::NoDevice);
    assert!(answered.load(Ordering::SeqCst));

    shutdown.cancel();
    task.await.unwrap();
}
