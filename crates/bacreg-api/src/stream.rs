//! Discovery announcement streams.
//!
//! The platform pushes one JSON record per WebSocket text frame on two
//! channels: device announcements (`iam`) and point announcements
//! (`configure`). [`AnnouncementStream`] connects with exponential backoff
//! and forwards every text frame, unparsed, into a bounded
//! [`tokio::sync::mpsc`] channel. The sender is dropped when the server
//! closes the socket, so the receiver sees `None` at the end of the stream.
//!
//! # Example
//!
//! ```rust,ignore
//! use bacreg_api::stream::{AnnouncementStream, Channel, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = client.stream_url(Channel::Devices)?;
//! let mut rx = AnnouncementStream::connect(url, ReconnectConfig::default(), CancellationToken::new())
//!     .await?
//!     .into_receiver();
//!
//! while let Some(raw) = rx.recv().await {
//!     println!("{raw}");
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames buffered before the reader waits for the consumer.
const ANNOUNCEMENT_CHANNEL_CAPACITY: usize = 256;

// ── Channel ──────────────────────────────────────────────────────────

/// The two discovery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Device announcements (I-Am replies).
    Devices,
    /// Point announcements for the device being configured.
    Points,
}

impl Channel {
    /// Last path segment of the channel's WebSocket URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Devices => "iam",
            Self::Points => "configure",
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff for the initial connection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Retries before giving up. `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(3),
        }
    }
}

// ── AnnouncementStream ───────────────────────────────────────────────

/// A connected discovery channel.
pub struct AnnouncementStream {
    rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl AnnouncementStream {
    /// Connect to `url`, retrying per `reconnect`, and spawn the reader.
    ///
    /// Returns once the socket is open. Triggering `cancel` stops the
    /// reader and closes the channel.
    pub async fn connect(
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let socket = connect_with_retry(&url, &reconnect, &cancel).await?;
        let (tx, rx) = mpsc::channel(ANNOUNCEMENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            read_loop(socket, tx, task_cancel).await;
        });

        Ok(Self { rx, cancel })
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Hand the raw frame receiver to a consumer.
    pub fn into_receiver(self) -> mpsc::Receiver<String> {
        self.rx
    }

    /// Signal the reader to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Connection ───────────────────────────────────────────────────────

async fn connect_with_retry(
    url: &Url,
    reconnect: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Result<Socket, Error> {
    let mut attempt: u32 = 0;

    loop {
        tracing::debug!(channel = url.path(), attempt, "connecting to discovery stream");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::WebSocketConnect("canceled before connecting".into()));
            }
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        let err = match result {
            Ok((socket, _response)) => {
                tracing::info!(channel = url.path(), "discovery stream connected");
                return Ok(socket);
            }
            Err(e) => Error::WebSocketConnect(e.to_string()),
        };

        if reconnect.max_retries.is_some_and(|max| attempt >= max) {
            tracing::warn!(error = %err, attempt, "giving up on discovery stream");
            return Err(err);
        }

        let delay = calculate_backoff(attempt, reconnect);
        tracing::info!(
            error = %err,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(err),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Forward text frames until the socket closes, the consumer goes away,
/// or `cancel` fires. Dropping `tx` on return ends the consumer's stream.
async fn read_loop(mut socket: Socket, tx: mpsc::Sender<String>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if tx.send(text.as_str().to_owned()).await.is_err() {
                        tracing::debug!("announcement consumer dropped");
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(cf) = frame {
                        tracing::debug!(code = %cf.code, reason = %cf.reason, "discovery stream closed");
                    }
                    break;
                }
                Some(Ok(_)) => {
                    // Binary, Ping, Pong -- tungstenite answers pings itself
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "discovery stream error");
                    break;
                }
                None => break,
            },
        }
    }
    tracing::debug!("discovery stream reader exiting");
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_retries, Some(3));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn channel_paths() {
        assert_eq!(Channel::Devices.path(), "iam");
        assert_eq!(Channel::Points.path(), "configure");
    }
}
