// Platform methods used by discovery, the editor and registry saves.

use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::rpc::client::RpcClient;
use crate::rpc::models::{AgentConfig, Credentials, DetailsParams, PublishParams, ScanParams};

impl RpcClient {
    /// Exchange a username and password for a session token.
    ///
    /// The token is returned, not stored; attach it with
    /// [`with_token`](Self::with_token).
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SecretString, Error> {
        let token: Option<String> = self
            .call("get_authorization", &Credentials { username, password })
            .await
            .map_err(|e| match e {
                Error::Rpc { message, .. } => Error::Unauthorized { message },
                other => other,
            })?;

        match token {
            Some(token) if !token.is_empty() => {
                debug!(username, "session token issued");
                Ok(SecretString::from(token))
            }
            _ => Err(Error::Unauthorized {
                message: "the platform returned no session token".into(),
            }),
        }
    }

    /// Ask the BACnet proxy to broadcast a Who-Is. Devices answer on the
    /// device channel.
    pub async fn start_bacnet_scan(&self, params: &ScanParams) -> Result<Value, Error> {
        self.call("start_bacnet_scan", params).await
    }

    /// Ask the proxy to read a device's object list. Points arrive on the
    /// point channel.
    pub async fn publish_bacnet_props(&self, params: &PublishParams) -> Result<Value, Error> {
        self.call("publish_bacnet_props", params).await
    }

    /// Extended attributes for selected points.
    ///
    /// A `null` result is read as no records.
    pub async fn fetch_point_details(&self, params: &DetailsParams) -> Result<Vec<Value>, Error> {
        let records: Option<Vec<Value>> = self.call("fetch_point_details", params).await?;
        Ok(records.unwrap_or_default())
    }

    /// Store a file in an agent's config store.
    pub async fn store_agent_config(&self, config: &AgentConfig) -> Result<Value, Error> {
        debug!(
            agent = %config.agent_identity,
            name = %config.config_name,
            bytes = config.raw_contents.len(),
            "storing agent config"
        );
        self.call("store_agent_config", config).await
    }
}
