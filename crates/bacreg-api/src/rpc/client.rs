// JSON-RPC client
//
// Wraps `reqwest::Client` with endpoint construction, request ids, token
// injection and envelope unwrapping. Platform methods are implemented as
// inherent methods in sibling files to keep this module focused on
// transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::rpc::models::{JSONRPC_VERSION, RpcRequest, RpcResponse};
use crate::stream::Channel;
use crate::transport::TransportConfig;

const RPC_PATH: &str = "vc/jsonrpc";
const STREAM_PATH: &str = "vc/ws";

/// Raw client for a platform's `/vc/jsonrpc` endpoint.
///
/// Every call carries a fresh request id and, once set, the session token.
/// Methods return the unwrapped `result`; a `{code, message}` error body
/// becomes [`Error::Rpc`] or [`Error::Unauthorized`].
pub struct RpcClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl RpcClient {
    /// Create a client for the platform rooted at `base_url`.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Self::with_client(transport.build_client()?, base_url)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    /// Attach a session token to every subsequent call.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn set_token(&mut self, token: SecretString) {
        self.token = Some(token);
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn endpoint(&self) -> Result<Url, Error> {
        Ok(self.base_url.join(RPC_PATH)?)
    }

    /// WebSocket URL for a discovery channel: `ws(s)://host/vc/ws/{token}/{channel}`.
    pub fn stream_url(&self, channel: Channel) -> Result<Url, Error> {
        let token = self.token.as_ref().ok_or_else(|| Error::Unauthorized {
            message: "no session token for the discovery stream".into(),
        })?;

        let mut url = self.base_url.join(&format!(
            "{STREAM_PATH}/{}/{}",
            token.expose_secret(),
            channel.path()
        ))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot use {scheme} for {url}")))?;
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Call `method` and deserialize its `result`.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, Error>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: Uuid::new_v4().to_string(),
            method,
            params,
            authorization: self.token.as_ref().map(ExposeSecret::expose_secret),
        };

        debug!(method, "POST {}", RPC_PATH);
        let resp = self
            .http
            .post(self.endpoint()?)
            .json(&request)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(method, resp).await
    }

    async fn parse_response<T: DeserializeOwned>(
        method: &str,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized {
                message: format!("{method} rejected the session token"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let envelope: RpcResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: if status.is_success() {
                    e.to_string()
                } else {
                    format!("HTTP {status}: {e}")
                },
                body: body.clone(),
            })?;

        if let Some(error) = envelope.error {
            debug!(method, code = error.code, "remote call failed");
            return Err(Error::from_rpc(error.code, error.message));
        }

        let result = envelope.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
