//! Server configuration.
//!
//! Loaded from environment variables (a `.env` file is read in `main` via
//! dotenvy), with CLI flags overriding host and port. Vendor credentials for
//! the realtime path arrive per-session in the WebSocket handshake; the env
//! keys here only feed the HTTP agent endpoint.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("TLS requires both ZAREX_TLS_CERT and ZAREX_TLS_KEY")]
    IncompleteTls,
}

/// TLS configuration for HTTPS and WSS.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the certificate file (PEM).
    pub cert_path: PathBuf,
    /// Path to the private key file (PEM).
    pub key_path: PathBuf,
}

/// Vendor endpoint overrides.
///
/// Defaults are the production vendor URLs; tests point these at local mock
/// servers. `None` means the vendor module's own constant applies.
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    /// AssemblyAI streaming WebSocket base (`wss://...`).
    pub stt_streaming: Option<String>,
    /// AssemblyAI REST base, for batch transcription.
    pub stt_api: Option<String>,
    pub murf: Option<String>,
    pub elevenlabs: Option<String>,
    pub gemini: Option<String>,
    pub serpapi: Option<String>,
    pub weather: Option<String>,
}

impl EndpointConfig {
    fn from_env() -> Self {
        Self {
            stt_streaming: read_opt("ZAREX_STT_STREAMING_URL"),
            stt_api: read_opt("ZAREX_STT_API_URL"),
            murf: read_opt("ZAREX_MURF_URL"),
            elevenlabs: read_opt("ZAREX_ELEVENLABS_URL"),
            gemini: read_opt("ZAREX_GEMINI_URL"),
            serpapi: read_opt("ZAREX_SERPAPI_URL"),
            weather: read_opt("ZAREX_WEATHER_URL"),
        }
    }
}

/// Full server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    /// CORS allowed origins, comma-separated, or "*" for all. `None` disables
    /// the CORS layer.
    pub cors_allowed_origins: Option<String>,

    /// Directory for per-session debug WAV dumps. Disabled when unset.
    pub recordings_dir: Option<PathBuf>,

    /// Cap on stored history entries per session.
    pub max_history_entries: usize,

    /// How long to wait for the handshake message after socket upgrade.
    pub handshake_timeout: Duration,

    /// Shared timeout for vendor REST calls.
    pub http_timeout: Duration,

    /// Env-configured vendor keys for the HTTP agent endpoint only.
    pub assemblyai_api_key: Option<String>,
    pub murf_api_key: Option<String>,
    pub gemini_api_key: Option<String>,

    /// MP3 served with an `X-Error` header when the agent pipeline fails.
    pub fallback_audio_path: Option<PathBuf>,

    pub endpoints: EndpointConfig,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("recordings_dir", &self.recordings_dir)
            .field("max_history_entries", &self.max_history_entries)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("http_timeout", &self.http_timeout)
            .field("assemblyai_api_key", &redact(&self.assemblyai_api_key))
            .field("murf_api_key", &redact(&self.murf_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("fallback_audio_path", &self.fallback_audio_path)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.assemblyai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.murf_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            cors_allowed_origins: None,
            recordings_dir: None,
            max_history_entries: crate::session::DEFAULT_MAX_HISTORY_ENTRIES,
            handshake_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            assemblyai_api_key: None,
            murf_api_key: None,
            gemini_api_key: None,
            fallback_audio_path: None,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match read_opt("ZAREX_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "ZAREX_PORT",
                value: raw,
            })?,
            None => defaults.port,
        };

        let max_history_entries = match read_opt("ZAREX_MAX_HISTORY_ENTRIES") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "ZAREX_MAX_HISTORY_ENTRIES",
                value: raw,
            })?,
            None => defaults.max_history_entries,
        };

        let tls = match (read_opt("ZAREX_TLS_CERT"), read_opt("ZAREX_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        Ok(Self {
            host: read_opt("ZAREX_HOST").unwrap_or_else(|| defaults.host.clone()),
            port,
            tls,
            cors_allowed_origins: read_opt("ZAREX_CORS_ORIGINS"),
            recordings_dir: read_opt("ZAREX_RECORDINGS_DIR").map(PathBuf::from),
            max_history_entries,
            handshake_timeout: defaults.handshake_timeout,
            http_timeout: defaults.http_timeout,
            assemblyai_api_key: read_opt("ASSEMBLYAI_API_KEY"),
            murf_api_key: read_opt("MURF_API_KEY"),
            gemini_api_key: read_opt("GEMINI_API_KEY"),
            fallback_audio_path: read_opt("ZAREX_FALLBACK_AUDIO").map(PathBuf::from),
            endpoints: EndpointConfig::from_env(),
        })
    }

    /// Server address in "host:port" form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

/// Read an env var, treating unset and empty the same.
fn read_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
