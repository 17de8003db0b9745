/*
 * MSK Migrator (C) 2024 - 2025 Parseable, Inc.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 *
 */

//! Read side of the migration: the source MSK cluster.

pub mod groups;
pub mod topics;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::error::KafkaError as NativeKafkaError;
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::utils::json::JsonFileError;

#[derive(Debug, thiserror::Error)]
pub enum KafkaError {
    #[error("no bootstrap servers configured (set MSK_BOOTSTRAP_SERVERS or pass --cluster-arn)")]
    NoBootstrapServers,
    #[error("invalid security configuration: {0}")]
    InvalidSecurity(String),
    #[error("{0} auth is not supported for extraction; use --broker-auth tls or sasl-scram, or pass --bootstrap-servers")]
    UnsupportedAuth(String),
    #[error("Kafka error {0}")]
    NativeError(#[from] NativeKafkaError),
    #[error("failed to describe configs for topic {topic}: {reason}")]
    DescribeConfigs { topic: String, reason: String },
    #[error(transparent)]
    File(#[from] JsonFileError),
    #[error("Kafka admin task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Args)]
pub struct KafkaConfig {
    #[arg(
        long = "bootstrap-servers",
        env = "MSK_BOOTSTRAP_SERVERS",
        value_name = "bootstrap-servers",
        required = false,
        help = "Comma-separated list of MSK bootstrap servers"
    )]
    pub bootstrap_servers: Option<String>,

    #[arg(
        long = "client-id",
        env = "MSK_CLIENT_ID",
        required = false,
        default_value_t = String::from("msk-migrator"),
        value_name = "client_id",
        help = "Client ID for the Kafka connection"
    )]
    pub client_id: String,

    #[arg(
        long = "request-timeout",
        env = "MSK_REQUEST_TIMEOUT",
        value_parser = humantime::parse_duration,
        default_value = "30s",
        value_name = "duration",
        help = "Timeout for metadata and admin requests"
    )]
    pub request_timeout: Duration,

    #[command(flatten)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Args)]
pub struct SecurityConfig {
    #[arg(
        value_enum,
        long = "security-protocol",
        env = "MSK_SECURITY_PROTOCOL",
        required = false,
        default_value_t = SecurityProtocol::Plaintext,
        help = "Security protocol"
    )]
    pub protocol: SecurityProtocol,

    #[arg(
        long = "ssl-ca-location",
        env = "MSK_SSL_CA_LOCATION",
        required = false,
        help = "CA certificate file path"
    )]
    pub ssl_ca_location: Option<PathBuf>,

    #[arg(
        long = "ssl-certificate-location",
        env = "MSK_SSL_CERTIFICATE_LOCATION",
        required = false,
        help = "Client certificate file path (mTLS)"
    )]
    pub ssl_certificate_location: Option<PathBuf>,

    #[arg(
        long = "ssl-key-location",
        env = "MSK_SSL_KEY_LOCATION",
        required = false,
        help = "Client key file path (mTLS)"
    )]
    pub ssl_key_location: Option<PathBuf>,

    #[arg(
        long = "ssl-key-password",
        env = "MSK_SSL_KEY_PASSWORD",
        required = false,
        help = "SSL key password"
    )]
    pub ssl_key_password: Option<String>,

    #[arg(
        value_enum,
        long = "sasl-mechanism",
        env = "MSK_SASL_MECHANISM",
        required = false,
        help = "SASL mechanism"
    )]
    pub sasl_mechanism: Option<SaslMechanism>,

    #[arg(
        long = "sasl-username",
        env = "MSK_SASL_USERNAME",
        required = false,
        help = "SASL username"
    )]
    pub sasl_username: Option<String>,

    #[arg(
        long = "sasl-password",
        env = "MSK_SASL_PASSWORD",
        required = false,
        help = "SASL password"
    )]
    pub sasl_password: Option<String>,
}

impl KafkaConfig {
    /// Bootstrap servers, falling back to `resolved` (from the MSK API)
    /// when none were configured.
    pub fn with_bootstrap_servers(mut self, resolved: Option<String>) -> Self {
        if self.bootstrap_servers.is_none() {
            self.bootstrap_servers = resolved;
        }
        self
    }

    pub fn to_rdkafka_config(&self) -> Result<ClientConfig, KafkaError> {
        let servers = self
            .bootstrap_servers
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(KafkaError::NoBootstrapServers)?;

        self.security.validate()?;

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", servers)
            .set("client.id", &self.client_id)
            .set(
                "socket.timeout.ms",
                self.request_timeout.as_millis().to_string(),
            );
        self.security.apply_to_config(&mut config);

        Ok(config)
    }

    pub fn admin_client(&self) -> Result<AdminClient<DefaultClientContext>, KafkaError> {
        let admin = self.to_rdkafka_config()?.create()?;
        Ok(admin)
    }
}

impl SecurityConfig {
    fn apply_to_config(&self, config: &mut ClientConfig) {
        config.set("security.protocol", self.protocol.to_string());

        if matches!(
            self.protocol,
            SecurityProtocol::Ssl | SecurityProtocol::SaslSsl
        ) {
            if let Some(ref path) = self.ssl_ca_location {
                config.set("ssl.ca.location", path.to_string_lossy().to_string());
            }
            if let Some(ref path) = self.ssl_certificate_location {
                config.set(
                    "ssl.certificate.location",
                    path.to_string_lossy().to_string(),
                );
            }
            if let Some(ref path) = self.ssl_key_location {
                config.set("ssl.key.location", path.to_string_lossy().to_string());
            }
            if let Some(ref password) = self.ssl_key_password {
                config.set("ssl.key.password", password);
            }
        }

        if matches!(
            self.protocol,
            SecurityProtocol::SaslSsl | SecurityProtocol::SaslPlaintext
        ) {
            if let Some(ref mechanism) = self.sasl_mechanism {
                config.set("sasl.mechanism", mechanism.to_string());
            }
            if let Some(ref username) = self.sasl_username {
                config.set("sasl.username", username);
            }
            if let Some(ref password) = self.sasl_password {
                config.set("sasl.password", password);
            }
        }
    }

    fn validate(&self) -> Result<(), KafkaError> {
        let invalid = |msg: &str| Err(KafkaError::InvalidSecurity(msg.to_string()));

        match self.protocol {
            SecurityProtocol::SaslSsl | SecurityProtocol::SaslPlaintext => {
                if self.sasl_mechanism.is_none() {
                    return invalid("SASL mechanism is required when SASL is enabled");
                }
                if self.sasl_username.is_none() || self.sasl_password.is_none() {
                    return invalid("SASL username and password are required");
                }
            }
            SecurityProtocol::Ssl => {
                // MSK presents a publicly trusted certificate, so a CA file
                // is optional. A client certificate needs its key though.
                if self.ssl_certificate_location.is_some() != self.ssl_key_location.is_some() {
                    return invalid("client certificate and key must be given together");
                }
            }
            SecurityProtocol::Plaintext => {}
        }
        Ok(())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslSsl,
    SaslPlaintext,
}

impl std::fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityProtocol::Plaintext => write!(f, "PLAINTEXT"),
            SecurityProtocol::Ssl => write!(f, "SSL"),
            SecurityProtocol::SaslSsl => write!(f, "SASL_SSL"),
            SecurityProtocol::SaslPlaintext => write!(f, "SASL_PLAINTEXT"),
        }
    }
}

// MSK supports SCRAM for SASL; PLAIN is kept for self-managed sources
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaslMechanism::Plain => write!(f, "PLAIN"),
            SaslMechanism::ScramSha256 => write!(f, "SCRAM-SHA-256"),
            SaslMechanism::ScramSha512 => write!(f, "SCRAM-SHA-512"),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            protocol: SecurityProtocol::Plaintext,
            ssl_ca_location: None,
            ssl_certificate_location: None,
            ssl_key_location: None,
            ssl_key_password: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: None,
            client_id: "msk-migrator".to_string(),
            request_timeout: Duration::from_secs(30),
            security: SecurityConfig::default(),
        }
    }
}
