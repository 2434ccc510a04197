//! Scan lifecycle and announcement handling.
//!
//! A [`DiscoverySession`] pulls raw payloads from two channels (devices and
//! points) and applies them to an [`Inventory`] one at a time. Every scan
//! gets a new generation number; an event is only applied while its
//! generation is current and the session state allows it, so cancellation
//! gates mutation rather than display.
//!
//! ```text
//! Idle ──start──▶ Scanning ──feed closed──▶ Completed
//!                    │                          │
//!                    └──cancel / timeout──▶ Canceled
//! ```

mod inventory;

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use inventory::{Announced, Inventory};

use crate::error::CoreError;
use crate::model::{Device, DeviceAnnouncement, DeviceKey, PayloadError, PointAnnouncement};
use crate::registry::default_key_props;
use crate::remote::{RemoteCalls, ScanRequest};

/// How long a scan may run before it is canceled automatically.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Payloads buffered per channel before the stream reader waits.
pub const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Canceled,
}

/// Something a session noticed while waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub generation: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Device(String),
    Point(String),
    /// The device channel closed.
    DevicesDone,
    /// The point channel closed.
    PointsDone,
    TimedOut,
    Canceled,
}

pub struct DiscoverySession {
    state: ScanState,
    generation: u64,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    timeout: Duration,
    current_device: Option<DeviceKey>,
    devices: Option<mpsc::Receiver<String>>,
    points: Option<mpsc::Receiver<String>>,
    platform_uuid: String,
    key_props: Vec<String>,
}

impl DiscoverySession {
    pub fn new(platform_uuid: impl Into<String>) -> Self {
        Self {
            state: ScanState::Idle,
            generation: 0,
            cancel: CancellationToken::new(),
            deadline: None,
            timeout: DEFAULT_SCAN_TIMEOUT,
            current_device: None,
            devices: None,
            points: None,
            platform_uuid: platform_uuid.into(),
            key_props: default_key_props(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Columns new devices start with.
    #[must_use]
    pub fn with_key_props(mut self, key_props: Vec<String>) -> Self {
        self.key_props = key_props;
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_device(&self) -> Option<&DeviceKey> {
        self.current_device.as_ref()
    }

    /// A token that cancels the current scan when triggered from elsewhere.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Ask the proxy to scan, then start collecting from `device_feed`.
    ///
    /// The previous scan, its timer and its inventory are discarded only
    /// once the request is accepted; a rejected request changes nothing.
    pub async fn start<R: RemoteCalls>(
        &mut self,
        inventory: &mut Inventory,
        remote: &R,
        request: &ScanRequest,
        device_feed: mpsc::Receiver<String>,
    ) -> Result<u64, CoreError> {
        remote.start_scan(request).await?;
        self.begin(inventory, device_feed);
        info!(
            generation = self.generation,
            low = ?request.low_device_id,
            high = ?request.high_device_id,
            address = ?request.target_address,
            "scan started"
        );
        Ok(self.generation)
    }

    fn begin(&mut self, inventory: &mut Inventory, device_feed: mpsc::Receiver<String>) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
        self.state = ScanState::Scanning;
        self.deadline = Some(Instant::now() + self.timeout);
        self.current_device = None;
        self.devices = Some(device_feed);
        self.points = None;
        inventory.clear();
    }

    /// Start streaming points for a discovered device.
    ///
    /// The device becomes the target for point announcements; its
    /// registry is emptied so the stream rebuilds it.
    pub async fn configure_device<R: RemoteCalls>(
        &mut self,
        inventory: &mut Inventory,
        remote: &R,
        key: &DeviceKey,
        point_feed: mpsc::Receiver<String>,
    ) -> Result<(), CoreError> {
        if inventory.device(key).is_none() {
            return Err(CoreError::DeviceNotFound {
                identifier: key.to_string(),
            });
        }
        remote.publish_points(key).await?;

        if let Some(previous) = self.current_device.take() {
            if let Some(device) = inventory.device_mut(&previous) {
                device.configuring = false;
            }
        }
        if let Some(device) = inventory.device_mut(key) {
            device.configuring = true;
            device.show_points = true;
            device.registry.load_from_discovery(&[]);
        }
        self.current_device = Some(key.clone());
        self.points = Some(point_feed);
        debug!(device = %key, "configuring device");
        Ok(())
    }

    /// Stop applying events for this scan. Calling it again does nothing.
    pub fn cancel(&mut self) {
        if self.state == ScanState::Scanning || self.state == ScanState::Completed {
            info!(generation = self.generation, "scan canceled");
            self.state = ScanState::Canceled;
        }
        self.cancel.cancel();
        self.deadline = None;
        self.devices = None;
        self.points = None;
    }

    /// Back to `Idle`, keeping the inventory.
    pub fn reset(&mut self) {
        self.cancel();
        self.state = ScanState::Idle;
        self.current_device = None;
    }

    // ── Event pump ───────────────────────────────────────────────────

    /// Wait for the next thing to happen, or `None` when nothing is pending.
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        if self.devices.is_none() && self.points.is_none() && self.deadline.is_none() {
            return None;
        }

        let generation = self.generation;
        let cancel = self.cancel.clone();
        let deadline = self.deadline;

        let kind = tokio::select! {
            biased;
            () = cancel.cancelled() => EventKind::Canceled,
            () = sleep_until(deadline) => EventKind::TimedOut,
            raw = recv(&mut self.devices) => match raw {
                Some(raw) => EventKind::Device(raw),
                None => EventKind::DevicesDone,
            },
            raw = recv(&mut self.points) => match raw {
                Some(raw) => EventKind::Point(raw),
                None => EventKind::PointsDone,
            },
        };

        match kind {
            EventKind::DevicesDone => self.devices = None,
            EventKind::PointsDone => self.points = None,
            EventKind::TimedOut => self.deadline = None,
            _ => {}
        }
        Some(DiscoveryEvent { generation, kind })
    }

    /// Apply an event from [`next_event`](Self::next_event).
    pub fn apply(&mut self, inventory: &mut Inventory, event: DiscoveryEvent) {
        if event.generation != self.generation {
            debug!(
                generation = event.generation,
                current = self.generation,
                "dropping event from superseded scan"
            );
            return;
        }

        match event.kind {
            EventKind::Device(raw) => self.on_device_announced(inventory, &raw),
            EventKind::Point(raw) => self.on_point_announced(inventory, &raw),
            EventKind::DevicesDone => {
                if self.state == ScanState::Scanning {
                    info!(devices = inventory.len(), "scan completed");
                    self.state = ScanState::Completed;
                    self.deadline = None;
                }
            }
            EventKind::PointsDone => self.finish_points(inventory),
            EventKind::TimedOut => {
                warn!(timeout_ms = self.timeout.as_millis(), "scan timed out");
                self.cancel();
            }
            EventKind::Canceled => self.cancel(),
        }
    }

    /// Pump events until nothing is pending.
    pub async fn run(&mut self, inventory: &mut Inventory) -> ScanState {
        while let Some(event) = self.next_event().await {
            self.apply(inventory, event);
        }
        self.state
    }

    // ── Announcements ────────────────────────────────────────────────

    /// Record a device announcement. Ignored unless a scan is running.
    pub fn on_device_announced(&mut self, inventory: &mut Inventory, raw: &str) {
        if self.state != ScanState::Scanning {
            debug!(state = %self.state, "device announcement outside scan ignored");
            return;
        }

        let announcement = match DeviceAnnouncement::parse(raw) {
            Ok(announcement) => announcement,
            Err(PayloadError::NotADevice) => return,
            Err(e) => {
                warn!(error = %e, "dropping device payload");
                return;
            }
        };

        let device = Device::from_announcement(
            announcement,
            &self.platform_uuid,
            self.key_props.clone(),
        );
        inventory.announce(device);
    }

    /// Add a point row to the device being configured.
    pub fn on_point_announced(&mut self, inventory: &mut Inventory, raw: &str) {
        if !matches!(self.state, ScanState::Scanning | ScanState::Completed) {
            debug!(state = %self.state, "point announcement outside scan ignored");
            return;
        }

        let announcement = match PointAnnouncement::parse(raw) {
            Ok(announcement) => announcement,
            Err(e) => {
                warn!(error = %e, "dropping point payload");
                return;
            }
        };

        if announcement.is_complete() {
            self.finish_points(inventory);
            return;
        }

        let Some(key) = self.current_device.clone() else {
            debug!("point announcement with no device being configured");
            return;
        };
        let Some(device) = inventory.device_mut(&key) else {
            return;
        };

        let record = announcement.into_record();
        if record.is_empty() {
            return;
        }
        if device.registry.append_point(&record) {
            debug!(device = %key, points = device.registry.len(), "point added");
        }
    }

    fn finish_points(&mut self, inventory: &mut Inventory) {
        if let Some(key) = &self.current_device {
            if let Some(device) = inventory.device_mut(key) {
                device.configuring = false;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv(feed: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
