//! The platform side of a TUI session, or its absence.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bacreg_core::{
    CoreError, DeviceKey, FetchRequest, Offline, PlatformConnection, PointRecord, RegistryHandoff,
    RegistrySink, RemoteCalls, ScanRequest,
};

/// Either a live platform connection or a file-only session.
pub enum Remote {
    Offline(Offline),
    Platform(PlatformConnection),
}

impl Remote {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Platform(_))
    }

    fn connection(&self) -> Result<&PlatformConnection, CoreError> {
        match self {
            Self::Platform(connection) => Ok(connection),
            Self::Offline(_) => Err(CoreError::Config {
                message: "no platform profile is configured; run `bacreg config init`".into(),
            }),
        }
    }

    pub async fn device_feed(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>, CoreError> {
        self.connection()?.device_feed(cancel).await
    }

    pub async fn point_feed(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>, CoreError> {
        self.connection()?.point_feed(cancel).await
    }
}

impl RemoteCalls for Remote {
    async fn start_scan(&self, request: &ScanRequest) -> Result<(), CoreError> {
        match self {
            Self::Offline(offline) => offline.start_scan(request).await,
            Self::Platform(connection) => connection.start_scan(request).await,
        }
    }

    async fn publish_points(&self, device: &DeviceKey) -> Result<(), CoreError> {
        match self {
            Self::Offline(offline) => offline.publish_points(device).await,
            Self::Platform(connection) => connection.publish_points(device).await,
        }
    }

    async fn fetch_point_details(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<PointRecord>, CoreError> {
        match self {
            Self::Offline(offline) => offline.fetch_point_details(request).await,
            Self::Platform(connection) => connection.fetch_point_details(request).await,
        }
    }
}

impl RegistrySink for Remote {
    async fn save(&self, handoff: &RegistryHandoff) -> Result<(), CoreError> {
        self.connection()?.save(handoff).await
    }
}
