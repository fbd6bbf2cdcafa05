//! Connection settings for one ComfyUI engine.
//!
//! Server address and credentials are passed explicitly into
//! [`crate::api::ComfyUIApi`] and [`crate::client::ComfyUIClient`].

use std::time::Duration;

use base64::Engine;

use crate::waiter::WaitConfig;

/// Authorization header attached to every engine call, HTTP and
/// websocket alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAuth {
    /// Sent verbatim as the `Authorization` value (hosted deployments
    /// issue opaque tokens used this way).
    Raw(String),
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic base64(<username>:<password>)`.
    Basic { username: String, password: String },
}

impl EngineAuth {
    /// Build from a scheme name (`raw`, `bearer`, `basic`) and a secret.
    ///
    /// For `basic` the secret must be `username:password`.
    pub fn from_parts(scheme: &str, secret: &str) -> Result<Self, String> {
        match scheme.to_ascii_lowercase().as_str() {
            "raw" | "" => Ok(EngineAuth::Raw(secret.to_string())),
            "bearer" => Ok(EngineAuth::Bearer(secret.to_string())),
            "basic" => {
                let (username, password) = secret
                    .split_once(':')
                    .ok_or_else(|| "basic credentials must be username:password".to_string())?;
                Ok(EngineAuth::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            other => Err(format!("unknown auth scheme '{other}'")),
        }
    }

    /// The full `Authorization` header value.
    pub fn header_value(&self) -> String {
        match self {
            EngineAuth::Raw(value) => value.clone(),
            EngineAuth::Bearer(token) => format!("Bearer {token}"),
            EngineAuth::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
        }
    }
}

/// Engine endpoints, credentials and wait tuning.
#[derive(Debug, Clone)]
pub struct ComfyUIConfig {
    /// HTTP base URL, e.g. `http://127.0.0.1:8188`.
    pub api_url: String,
    /// WebSocket base URL, e.g. `ws://127.0.0.1:8188`.
    pub ws_url: String,
    pub auth: Option<EngineAuth>,
    pub wait: WaitConfig,
    /// Upper bound on any single HTTP call, connect included.
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ComfyUIConfig {
    /// Configuration for an unauthenticated engine at `api_url`, with the
    /// websocket URL derived from it.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let ws_url = derive_ws_url(&api_url);
        Self {
            api_url,
            ws_url,
            auth: None,
            wait: WaitConfig::default(),
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_auth(mut self, auth: EngineAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                   |
    /// |-----------------------------|---------------------------|
    /// | `COMFYUI_URL`               | `http://127.0.0.1:8188`   |
    /// | `COMFYUI_WS_URL`            | derived from `COMFYUI_URL`|
    /// | `COMFYUI_AUTH`              | unset (no header)         |
    /// | `COMFYUI_AUTH_SCHEME`       | `raw`                     |
    /// | `COMFYUI_TIMEOUT_SECS`      | `120`                     |
    /// | `COMFYUI_RECV_TIMEOUT_SECS` | `5`                       |
    /// | `COMFYUI_HISTORY_POLL_SECS` | `5`                       |
    /// | `COMFYUI_HTTP_TIMEOUT_SECS` | `30`                      |
    /// | `COMFYUI_CONNECT_TIMEOUT_SECS` | `10`                   |
    pub fn from_env() -> Self {
        let api_url = std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());
        let mut config = Self::new(api_url);

        if let Ok(ws_url) = std::env::var("COMFYUI_WS_URL") {
            config.ws_url = ws_url.trim_end_matches('/').to_string();
        }

        if let Ok(secret) = std::env::var("COMFYUI_AUTH") {
            if !secret.is_empty() {
                let scheme = std::env::var("COMFYUI_AUTH_SCHEME").unwrap_or_default();
                let auth = EngineAuth::from_parts(&scheme, &secret)
                    .unwrap_or_else(|e| panic!("Invalid COMFYUI_AUTH_SCHEME: {e}"));
                config.auth = Some(auth);
            }
        }

        config.wait = WaitConfig {
            timeout: secs_from_env("COMFYUI_TIMEOUT_SECS", 120),
            recv_timeout: secs_from_env("COMFYUI_RECV_TIMEOUT_SECS", 5),
            history_poll_interval: secs_from_env("COMFYUI_HISTORY_POLL_SECS", 5),
        };
        config.http_timeout = secs_from_env("COMFYUI_HTTP_TIMEOUT_SECS", 30);
        config.connect_timeout = secs_from_env("COMFYUI_CONNECT_TIMEOUT_SECS", 10);

        config
    }
}

fn secs_from_env(key: &str, default: u64) -> Duration {
    let secs: u64 = std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid u64"));
    Duration::from_secs(secs)
}

/// Map an HTTP base URL onto the matching websocket scheme.
///
/// `http://` becomes `ws://`, `https://` becomes `wss://`, and a bare
/// `host:port` is treated as plain `ws://`.
pub fn derive_ws_url(api_url: &str) -> String {
    let trimmed = api_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{trimmed}")
    }
}
