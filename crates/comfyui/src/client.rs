//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the connection configuration for a single
//! ComfyUI instance.  Call [`ComfyUIClient::connect`] to establish a
//! live [`ComfyUIConnection`] over WebSocket.

use std::time::Duration;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::config::{ComfyUIConfig, EngineAuth};

/// The raw WebSocket stream type used for ComfyUI channels.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI instance's event channel.
///
/// Stores the WebSocket URL and credentials. Create a
/// [`ComfyUIConnection`] by calling [`connect`](Self::connect).
#[derive(Clone)]
pub struct ComfyUIClient {
    ws_url: String,
    auth: Option<EngineAuth>,
    handshake_timeout: Duration,
}

/// A live WebSocket connection to a ComfyUI instance.
///
/// One connection serves exactly one job; it is never shared between
/// requests.
pub struct ComfyUIConnection {
    /// Client ID sent during the WebSocket handshake. Workflows must be
    /// submitted with the same ID for their events to arrive here.
    pub client_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl ComfyUIClient {
    pub fn new(config: &ComfyUIConfig) -> Self {
        Self {
            ws_url: config.ws_url.clone(),
            auth: config.auth.clone(),
            handshake_timeout: config.http_timeout,
        }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full channel URL for a client ID.
    pub fn channel_url(&self, client_id: &str) -> String {
        format!("{}/ws?clientId={}", self.ws_url, client_id)
    }

    /// Connect to the ComfyUI WebSocket endpoint as `client_id`.
    ///
    /// The ID is appended as a query parameter so that ComfyUI can
    /// address messages back to this specific client. The configured
    /// authorization header is sent with the handshake.
    pub async fn connect(&self, client_id: &str) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = self.channel_url(client_id);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ComfyUIClientError::Connection(format!("Invalid URL {url}: {e}")))?;

        if let Some(auth) = &self.auth {
            let value = HeaderValue::from_str(&auth.header_value()).map_err(|e| {
                ComfyUIClientError::Connection(format!("Invalid authorization header: {e}"))
            })?;
            request.headers_mut().insert("Authorization", value);
        }

        let connected = tokio::time::timeout(self.handshake_timeout, connect_async(request))
            .await
            .map_err(|_| {
                ComfyUIClientError::Connection(format!(
                    "Timed out after {:?} connecting to ComfyUI at {}",
                    self.handshake_timeout, self.ws_url
                ))
            })?;
        let (ws_stream, _response) = connected.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(client_id = %client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id: client_id.to_string(),
            ws_stream,
        })
    }
}

impl ComfyUIConnection {
    /// Close the channel. Errors are logged, not returned: the job's
    /// outcome is already decided by the time the channel closes.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "WebSocket close failed");
        }
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
