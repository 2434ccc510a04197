// ── Remote collaborators ──
//
// The discovery and editor paths talk to the platform only through these
// traits. `PlatformConnection` is the JSON-RPC implementation; tests supply
// their own fakes.

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bacreg_api::rpc::{
    AgentConfig, DetailsParams, PointQuery, PublishParams, RpcClient, ScanParams,
};
use bacreg_api::stream::{AnnouncementStream, Channel, ReconnectConfig};
use bacreg_api::transport::{TlsMode, TransportConfig};

use crate::codec;
use crate::config::{PlatformConfig, TlsVerification};
use crate::editor::FetchRequest;
use crate::error::CoreError;
use crate::model::{DeviceKey, PointAnnouncement, PointRecord};
use crate::registry::RegistryHandoff;

/// Agent that receives saved registries unless told otherwise.
pub const DEFAULT_DRIVER_AGENT: &str = "platform.driver";

/// Parameters for one device scan. Omitted bounds scan everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    pub low_device_id: Option<u32>,
    pub high_device_id: Option<u32>,
    pub target_address: Option<String>,
    /// Seconds the proxy listens for replies.
    pub scan_length: Option<u32>,
}

/// Request/response calls the discovery and editor paths make.
pub trait RemoteCalls: Send + Sync {
    fn start_scan(
        &self,
        request: &ScanRequest,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Ask the proxy to stream `device`'s points onto the point channel.
    fn publish_points(
        &self,
        device: &DeviceKey,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn fetch_point_details(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Vec<PointRecord>, CoreError>> + Send;
}

/// Where a finished registry goes.
pub trait RegistrySink: Send + Sync {
    fn save(
        &self,
        handoff: &RegistryHandoff,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Told when the platform rejects the session token.
pub trait AuthorizationObserver: Send + Sync {
    fn authorization_expired(&self, message: &str);
}

/// Stand-in for sessions editing local files with no platform attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl Offline {
    fn unavailable() -> CoreError {
        CoreError::Config {
            message: "no platform is configured for this session".into(),
        }
    }
}

impl RemoteCalls for Offline {
    async fn start_scan(&self, _request: &ScanRequest) -> Result<(), CoreError> {
        Err(Self::unavailable())
    }

    async fn publish_points(&self, _device: &DeviceKey) -> Result<(), CoreError> {
        Err(Self::unavailable())
    }

    async fn fetch_point_details(
        &self,
        _request: &FetchRequest,
    ) -> Result<Vec<PointRecord>, CoreError> {
        Err(Self::unavailable())
    }
}

// ── JSON-RPC implementation ──────────────────────────────────────────

/// A session against one platform's JSON-RPC endpoint.
pub struct PlatformConnection {
    client: RpcClient,
    platform_uuid: String,
    proxy_identity: String,
    agent_identity: String,
}

impl PlatformConnection {
    /// Build a connection from a resolved platform config. The token must
    /// already be present; use [`login`](Self::login) to obtain one.
    pub fn new(config: &PlatformConfig) -> Result<Self, CoreError> {
        let client = RpcClient::new(config.url.as_str(), &build_transport(config))?
            .with_token(config.token.clone());
        Ok(Self {
            client,
            platform_uuid: config.platform_uuid.clone(),
            proxy_identity: config.proxy_identity.clone(),
            agent_identity: DEFAULT_DRIVER_AGENT.to_owned(),
        })
    }

    /// Exchange credentials for a session token.
    pub async fn login(
        config: &PlatformConfig,
        username: &str,
        password: &SecretString,
    ) -> Result<SecretString, CoreError> {
        let client = RpcClient::new(config.url.as_str(), &build_transport(config))?;
        let token = client.authenticate(username, password.expose_secret()).await?;
        info!(platform = %config.url, "authorized");
        Ok(token)
    }

    /// Save registries to `identity` instead of the default driver agent.
    #[must_use]
    pub fn with_agent(mut self, identity: impl Into<String>) -> Self {
        self.agent_identity = identity.into();
        self
    }

    pub fn platform_uuid(&self) -> &str {
        &self.platform_uuid
    }

    /// Open the device announcement channel.
    pub async fn device_feed(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>, CoreError> {
        self.open(Channel::Devices, cancel).await
    }

    /// Open the point announcement channel.
    pub async fn point_feed(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>, CoreError> {
        self.open(Channel::Points, cancel).await
    }

    async fn open(
        &self,
        channel: Channel,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>, CoreError> {
        let url = self.client.stream_url(channel)?;
        let stream = AnnouncementStream::connect(url, ReconnectConfig::default(), cancel).await?;
        Ok(stream.into_receiver())
    }
}

impl RemoteCalls for PlatformConnection {
    async fn start_scan(&self, request: &ScanRequest) -> Result<(), CoreError> {
        let params = ScanParams {
            proxy_identity: self.proxy_identity.clone(),
            platform_uuid: self.platform_uuid.clone(),
            low_device_id: request.low_device_id,
            high_device_id: request.high_device_id,
            target_address: request.target_address.clone(),
            scan_length: request.scan_length,
        };
        self.client.start_bacnet_scan(&params).await?;
        Ok(())
    }

    async fn publish_points(&self, device: &DeviceKey) -> Result<(), CoreError> {
        let params = PublishParams {
            proxy_identity: self.proxy_identity.clone(),
            platform_uuid: self.platform_uuid.clone(),
            device_id: device.id.clone(),
            address: device.address.clone(),
        };
        self.client.publish_bacnet_props(&params).await?;
        Ok(())
    }

    async fn fetch_point_details(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<PointRecord>, CoreError> {
        let params = DetailsParams {
            proxy_identity: self.proxy_identity.clone(),
            platform_uuid: self.platform_uuid.clone(),
            device_ids: vec![request.device.id.clone()],
            points: request
                .points
                .iter()
                .map(|p| PointQuery {
                    point_name: p.point_name.clone(),
                    object_type: p.object_type.clone(),
                    index: p.index.clone(),
                })
                .collect(),
        };
        let raw = self.client.fetch_point_details(&params).await?;
        debug!(device = %request.device, records = raw.len(), "point details");

        Ok(decode_details(&request.device, raw))
    }
}

impl RegistrySink for PlatformConnection {
    async fn save(&self, handoff: &RegistryHandoff) -> Result<(), CoreError> {
        let config = AgentConfig {
            platform_uuid: self.platform_uuid.clone(),
            agent_identity: self.agent_identity.clone(),
            config_name: registry_config_name(&handoff.device_id, &handoff.device_address),
            raw_contents: codec::render_handoff(handoff)?,
            config_type: "csv".to_owned(),
        };
        self.client.store_agent_config(&config).await?;
        info!(
            device_id = %handoff.device_id,
            address = %handoff.device_address,
            agent = %self.agent_identity,
            "registry saved"
        );
        Ok(())
    }
}

/// Config store path for a device's registry.
pub fn registry_config_name(device_id: &str, address: &str) -> String {
    format!("registry_configs/{device_id}_{address}.csv")
}

/// Point records from a `fetch_point_details` answer; undecodable entries
/// are logged and skipped.
fn decode_details(device: &DeviceKey, raw: Vec<serde_json::Value>) -> Vec<PointRecord> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<PointAnnouncement>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%device, error = %e, "dropping point detail record");
                None
            }
        })
        .map(PointAnnouncement::into_record)
        .filter(|record| !record.is_empty())
        .collect()
}

fn build_transport(config: &PlatformConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}
