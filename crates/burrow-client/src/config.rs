// ============================================
// File: crates/burrow-client/src/config.rs
// ============================================
//! # Client Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the tunnel client: where the
//! peer is, which pre-shared key to use, and how to set up the TUN
//! device.
//!
//! ## Main Functionality
//! - `ClientConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Key resolution (inline, file or passphrase)
//! - Peer host resolution (IPv4 only)
//!
//! ## Configuration Sections
//! - `peer`: Peer host and UDP port
//! - `crypto`: Exactly one of `key`, `key_file`, `passphrase`
//! - `tun`: TUN device settings
//! - `handshake`: Handshake timeout
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [peer]
//! host = "vpn.example.com"
//! port = 9000
//!
//! [crypto]
//! key_file = "/etc/burrow/key"
//!
//! [tun]
//! device_name = "tun0"
//! mtu = 1400
//!
//! [handshake]
//! timeout_secs = 10
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `mtu` is bounded by the datagram limit: a full TUN packet plus the
//!   frame header plus the seal overhead must fit in one datagram
//! - Key material never shows up in `Debug` output
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::fmt;
use std::net::{SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use burrow_core::{PresharedKey, FRAME_HEADER_SIZE, MAX_DATAGRAM_SIZE, SEAL_OVERHEAD};

use crate::error::{ClientError, Result};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/burrow/client.toml";

/// Largest TUN MTU whose packets still fit in one sealed datagram.
pub const MAX_TUN_MTU: u16 = (MAX_DATAGRAM_SIZE - FRAME_HEADER_SIZE - SEAL_OVERHEAD) as u16;

/// Smallest MTU an IPv4 host must accept.
pub const MIN_TUN_MTU: u16 = 576;

// ============================================
// ClientConfig
// ============================================

/// Main client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Peer endpoint.
    #[serde(default)]
    pub peer: PeerConfig,

    /// Pre-shared key source.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Tunnel interface.
    #[serde(default)]
    pub tun: DeviceConfig,

    /// Handshake settings.
    #[serde(default)]
    pub handshake: HandshakeConfig,

    /// Log filter.
    #[serde(default)]
    pub logging: LogConfig,
}

impl ClientConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path).await?;
        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Reads a TOML file without validating it, so that command-line
    /// overrides can be applied first.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        toml::from_str(&content).map_err(|e| ClientError::config_load(&path_str, e.to_string()))
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the string cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.peer.validate()?;
        self.crypto.validate()?;
        self.tun.validate()?;
        self.handshake.validate()?;
        Ok(())
    }

    /// The effective configuration as TOML, defaults filled in and key
    /// material replaced by `[REDACTED]`. Printed by `validate`.
    #[must_use]
    pub fn to_toml(&self) -> String {
        let mut redacted = self.clone();
        redacted.crypto = self.crypto.redacted();
        toml::to_string_pretty(&redacted).unwrap_or_default()
    }
}

// ============================================
// PeerConfig
// ============================================

/// Peer configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Host name or IPv4 address of the peer.
    #[serde(default)]
    pub host: String,

    /// UDP port of the peer.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    9000
}

impl PeerConfig {
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::config_invalid("peer.host", "cannot be empty"));
        }

        if self.port == 0 {
            return Err(ClientError::config_invalid("peer.port", "cannot be 0"));
        }

        Ok(())
    }

    /// Resolves the peer to an IPv4 socket address.
    ///
    /// Routing is IPv4 only, so IPv6 results are skipped.
    ///
    /// # Errors
    /// - `Resolve` if the lookup itself fails
    /// - `ConfigInvalid` if the host has no IPv4 address
    pub async fn resolve(&self) -> Result<SocketAddrV4> {
        let host = self.host.trim();

        let addrs = tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|e| ClientError::resolve(host, e.to_string()))?;

        let resolved = addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(v4),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| {
                ClientError::config_invalid("peer.host", format!("'{host}' has no IPv4 address"))
            })?;

        debug!(host = %host, peer = %resolved, "Resolved peer");
        Ok(resolved)
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
        }
    }
}

// ============================================
// CryptoConfig
// ============================================

/// Pre-shared key configuration section.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Base64-encoded 32-byte key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// File holding the base64-encoded key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    /// Passphrase the key is derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl CryptoConfig {
    fn validate(&self) -> Result<()> {
        let sources = [
            self.key.is_some(),
            self.key_file.is_some(),
            self.passphrase.is_some(),
        ]
        .into_iter()
        .filter(|&set| set)
        .count();

        match sources {
            1 => Ok(()),
            0 => Err(ClientError::config_invalid(
                "crypto",
                "one of key, key_file or passphrase is required",
            )),
            _ => Err(ClientError::config_invalid(
                "crypto",
                "only one of key, key_file or passphrase may be set",
            )),
        }
    }

    /// Resolves the configured source into a key.
    ///
    /// # Errors
    /// - `ConfigLoad` if the key file cannot be read
    /// - `ConfigInvalid` if no source is set
    /// - `Core(InvalidKey)` if the key material is unusable
    pub async fn preshared_key(&self) -> Result<PresharedKey> {
        if let Some(key) = &self.key {
            return Ok(PresharedKey::from_base64(key)?);
        }

        if let Some(path) = &self.key_file {
            debug!("Reading key from: {}", path);
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClientError::config_load(path, e.to_string()))?;
            return Ok(PresharedKey::from_base64(&content)?);
        }

        if let Some(passphrase) = &self.passphrase {
            return Ok(PresharedKey::from_passphrase(passphrase)?);
        }

        Err(ClientError::config_invalid("crypto", "no key source configured"))
    }

    /// Short description of the key source, safe to print.
    #[must_use]
    pub fn source(&self) -> String {
        match (&self.key, &self.key_file, &self.passphrase) {
            (Some(_), _, _) => "inline key".to_string(),
            (None, Some(path), _) => format!("key file {path}"),
            (None, None, Some(_)) => "passphrase".to_string(),
            (None, None, None) => "none".to_string(),
        }
    }

    fn redacted(&self) -> Self {
        Self {
            key: self.key.as_ref().map(|_| "[REDACTED]".to_string()),
            key_file: self.key_file.clone(),
            passphrase: self.passphrase.as_ref().map(|_| "[REDACTED]".to_string()),
        }
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("source", &self.source())
            .finish()
    }
}

// ============================================
// DeviceConfig
// ============================================

/// `[tun]`: the interface created once the peer grants an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Interface name, at most 15 bytes (IFNAMSIZ - 1).
    pub device_name: String,
    /// Interface MTU; a full packet plus header and seal overhead must
    /// fit one datagram.
    pub mtu: u16,
}

impl DeviceConfig {
    fn validate(&self) -> Result<()> {
        match self.device_name.len() {
            0 => return Err(ClientError::config_invalid("tun.device_name", "is empty")),
            1..=15 => {}
            len => {
                return Err(ClientError::config_invalid(
                    "tun.device_name",
                    format!("is {len} bytes, interface names hold at most 15"),
                ))
            }
        }

        if !(MIN_TUN_MTU..=MAX_TUN_MTU).contains(&self.mtu) {
            return Err(ClientError::config_invalid(
                "tun.mtu",
                format!(
                    "{} is outside {MIN_TUN_MTU}..={MAX_TUN_MTU} (a full packet must fit one \
                     {MAX_DATAGRAM_SIZE}-byte datagram)",
                    self.mtu
                ),
            ));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: "tun0".into(),
            mtu: 1400,
        }
    }
}

// ============================================
// HandshakeConfig
// ============================================

/// Handshake configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeConfig {
    /// How long to wait for the Accept, in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub timeout_secs: u64,
}

fn default_handshake_timeout() -> u64 {
    10
}

impl HandshakeConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ClientError::config_invalid(
                "handshake.timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_handshake_timeout(),
        }
    }
}

// ============================================
// LogConfig
// ============================================

/// `[logging]`. `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive: `info`, `burrow_client=debug`, ...
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    #[test]
    fn test_default_config_needs_peer_and_key() {
        let config = ClientConfig::default();
        assert_eq!(config.tun.device_name, "tun0");
        assert_eq!(config.tun.mtu, 1400);
        assert_eq!(config.handshake.timeout(), Duration::from_secs(10));

        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("peer.host"));
    }

    #[test]
    fn test_full_config() {
        let toml = format!(
            r#"
            [peer]
            host = "203.0.113.5"
            port = 9100

            [crypto]
            key = "{KEY}"

            [tun]
            device_name = "burrow0"
            mtu = 1380

            [handshake]
            timeout_secs = 3

            [logging]
            level = "debug"
        "#
        );

        let config = ClientConfig::from_str(&toml).unwrap();
        assert_eq!(config.peer.host, "203.0.113.5");
        assert_eq!(config.peer.port, 9100);
        assert_eq!(config.tun.device_name, "burrow0");
        assert_eq!(config.tun.mtu, 1380);
        assert_eq!(config.handshake.timeout_secs, 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml = r#"
            [peer]
            host = "vpn.example.com"

            [crypto]
            passphrase = "correct horse battery staple"
        "#;

        let config = ClientConfig::from_str(toml).unwrap();
        assert_eq!(config.peer.port, 9000);
        assert_eq!(config.tun.device_name, "tun0");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_key_source_rules() {
        let none = r#"
            [peer]
            host = "vpn.example.com"
        "#;
        assert!(ClientConfig::from_str(none).unwrap_err().to_string().contains("crypto"));

        let both = format!(
            r#"
            [peer]
            host = "vpn.example.com"

            [crypto]
            key = "{KEY}"
            passphrase = "secret"
        "#
        );
        assert!(ClientConfig::from_str(&both).unwrap_err().is_config_error());
    }

    #[test]
    fn test_mtu_bounds() {
        let mut config = ClientConfig::default();
        config.peer.host = "vpn.example.com".into();
        config.crypto.passphrase = Some("secret".into());
        assert!(config.validate().is_ok());

        config.tun.mtu = MAX_TUN_MTU;
        assert!(config.validate().is_ok());
        assert_eq!(
            usize::from(MAX_TUN_MTU) + FRAME_HEADER_SIZE + SEAL_OVERHEAD,
            MAX_DATAGRAM_SIZE
        );

        config.tun.mtu = MAX_TUN_MTU + 1;
        assert!(config.validate().is_err());

        config.tun.mtu = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_name_length() {
        let mut config = ClientConfig::default();
        config.peer.host = "vpn.example.com".into();
        config.crypto.passphrase = Some("secret".into());

        config.tun.device_name = "a".repeat(15);
        assert!(config.validate().is_ok());

        config.tun.device_name = "a".repeat(16);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("is 16 bytes"));

        config.tun.device_name.clear();
        assert!(config.validate().unwrap_err().to_string().contains("tun.device_name"));
    }

    #[test]
    fn test_zero_port_and_timeout_rejected() {
        let mut config = ClientConfig::default();
        config.peer.host = "vpn.example.com".into();
        config.crypto.passphrase = Some("secret".into());

        config.peer.port = 0;
        assert!(config.validate().unwrap_err().to_string().contains("peer.port"));

        config.peer.port = 9000;
        config.handshake.timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("handshake.timeout_secs"));
    }

    #[test]
    fn test_key_material_not_exposed() {
        let mut config = ClientConfig::default();
        config.crypto.key = Some(KEY.into());

        assert!(!format!("{config:?}").contains(KEY));
        assert!(!config.to_toml().contains(KEY));
        assert!(config.to_toml().contains("[REDACTED]"));
    }

    #[test]
    fn test_printed_config_fills_defaults() {
        let toml = r#"
            [peer]
            host = "vpn.example.com"

            [crypto]
            key_file = "/etc/burrow/key"
        "#;
        let printed = ClientConfig::from_str(toml).unwrap().to_toml();

        let reparsed: ClientConfig = toml::from_str(&printed).unwrap();
        assert_eq!(reparsed.peer.port, 9000);
        assert_eq!(reparsed.tun.device_name, "tun0");
        assert_eq!(reparsed.tun.mtu, 1400);
        assert_eq!(reparsed.handshake.timeout_secs, 10);
        assert_eq!(reparsed.crypto.key_file.as_deref(), Some("/etc/burrow/key"));
        assert!(reparsed.crypto.key.is_none());
    }

    #[tokio::test]
    async fn test_preshared_key_sources() {
        let inline = CryptoConfig {
            key: Some(KEY.into()),
            ..CryptoConfig::default()
        };
        let key = inline.preshared_key().await.unwrap();
        assert_eq!(key.to_base64(), KEY);

        let passphrase = CryptoConfig {
            passphrase: Some("secret".into()),
            ..CryptoConfig::default()
        };
        assert_eq!(
            passphrase.preshared_key().await.unwrap(),
            PresharedKey::from_passphrase("secret").unwrap()
        );

        let path = std::env::temp_dir().join(format!("burrow-key-{}", std::process::id()));
        tokio::fs::write(&path, format!("{KEY}\n")).await.unwrap();
        let from_file = CryptoConfig {
            key_file: Some(path.display().to_string()),
            ..CryptoConfig::default()
        };
        assert_eq!(from_file.preshared_key().await.unwrap(), key);
        tokio::fs::remove_file(&path).await.unwrap();

        let missing = CryptoConfig {
            key_file: Some("/nonexistent/burrow-key".into()),
            ..CryptoConfig::default()
        };
        assert!(missing.preshared_key().await.unwrap_err().is_config_error());
    }

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let peer = PeerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
        };
        let addr = peer.resolve().await.unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000));

        let v6_only = PeerConfig {
            host: "::1".into(),
            port: 9000,
        };
        assert!(v6_only.resolve().await.unwrap_err().is_config_error());
    }
}
