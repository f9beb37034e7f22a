//! Configuration for the image-processing server.
//!
//! The worker count is deliberately absent: it is a compile-time
//! constant of the deployment ([`pixwire_core::WORKER_COUNT`]).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pixwire_core::handler::HandlerConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Per-connection limits.
    pub limits: LimitsConfig,
    /// Image encoder settings.
    pub codec: CodecConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind.
    pub bind_address: String,
    /// TCP port to listen on.
    pub port: u16,
}

/// Per-connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted frame in bytes.
    pub max_frame_size: usize,
    /// Seconds to wait for each inbound frame.
    pub read_timeout_secs: u64,
    /// Seconds allowed for writing the response.
    pub write_timeout_secs: u64,
}

/// Image encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: pixwire_core::DEFAULT_PORT,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let handler = HandlerConfig::default();
        Self {
            max_frame_size: handler.max_frame_size,
            read_timeout_secs: handler.read_timeout.as_secs(),
            write_timeout_secs: handler.write_timeout.as_secs(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: pixwire_core::format::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// `host:port` the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.network.bind_address, self.network.port)
    }

    /// Convert the limits into a `HandlerConfig`.
    ///
    /// Zero timeouts would drop every connection immediately, so they are
    /// raised to one second.
    pub fn to_handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            max_frame_size: self
                .limits
                .max_frame_size
                .clamp(1, pixwire_core::MAX_FRAME_SIZE),
            read_timeout: Duration::from_secs(self.limits.read_timeout_secs.max(1)),
            write_timeout: Duration::from_secs(self.limits.write_timeout_secs.max(1)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("port"));
        assert!(text.contains("jpeg_quality"));
        assert!(!text.contains("workers"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 8080);
        assert_eq!(parsed.limits.read_timeout_secs, 30);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: ServerConfig = toml::from_str("[network]\nport = 9000\n").unwrap();
        assert_eq!(parsed.network.port, 9000);
        assert_eq!(parsed.network.bind_address, "0.0.0.0");
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn to_handler_config_clamps() {
        let mut cfg = ServerConfig::default();
        cfg.limits.read_timeout_secs = 0;
        cfg.limits.max_frame_size = usize::MAX;
        let handler = cfg.to_handler_config();
        assert_eq!(handler.read_timeout, Duration::from_secs(1));
        assert_eq!(handler.max_frame_size, pixwire_core::MAX_FRAME_SIZE);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = ServerConfig::load(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.listen_address(), "0.0.0.0:8080");
    }
}
