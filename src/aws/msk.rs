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

use aws_config::SdkConfig;
use aws_sdk_kafka::operation::get_bootstrap_brokers::GetBootstrapBrokersOutput;
use clap::{Args, ValueEnum};
use tracing::info;

use super::AwsError;
use crate::kafka::{SaslMechanism, SecurityProtocol};

/// Listener of the MSK cluster to connect through.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrokerAuth {
    Plaintext,
    #[default]
    Tls,
    SaslScram,
    SaslIam,
}

impl BrokerAuth {
    pub fn security_protocol(&self) -> SecurityProtocol {
        match self {
            BrokerAuth::Plaintext => SecurityProtocol::Plaintext,
            BrokerAuth::Tls => SecurityProtocol::Ssl,
            BrokerAuth::SaslScram | BrokerAuth::SaslIam => SecurityProtocol::SaslSsl,
        }
    }

    /// MSK only offers SCRAM-SHA-512 on its SCRAM listener.
    pub fn sasl_mechanism(&self) -> Option<SaslMechanism> {
        match self {
            BrokerAuth::SaslScram => Some(SaslMechanism::ScramSha512),
            _ => None,
        }
    }
}

impl std::fmt::Display for BrokerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerAuth::Plaintext => write!(f, "plaintext"),
            BrokerAuth::Tls => write!(f, "tls"),
            BrokerAuth::SaslScram => write!(f, "sasl-scram"),
            BrokerAuth::SaslIam => write!(f, "sasl-iam"),
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct MskArgs {
    #[arg(
        long = "cluster-arn",
        env = "MSK_CLUSTER_ARN",
        required = false,
        help = "ARN of the MSK cluster, used to look up bootstrap brokers"
    )]
    pub cluster_arn: Option<String>,

    #[arg(
        value_enum,
        long = "broker-auth",
        env = "MSK_BROKER_AUTH",
        default_value_t = BrokerAuth::Tls,
        help = "Which MSK listener to resolve bootstrap brokers for"
    )]
    pub auth: BrokerAuth,
}

/// Looks up the bootstrap broker string of `cluster_arn` for `auth`.
pub async fn bootstrap_brokers(
    config: &SdkConfig,
    cluster_arn: &str,
    auth: BrokerAuth,
) -> Result<String, AwsError> {
    let client = aws_sdk_kafka::Client::new(config);
    let output = client
        .get_bootstrap_brokers()
        .cluster_arn(cluster_arn)
        .send()
        .await
        .map_err(aws_sdk_kafka::Error::from)?;

    let brokers = select(&output, auth)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AwsError::MissingBrokers {
            cluster_arn: cluster_arn.to_string(),
            auth: auth.to_string(),
        })?;

    info!("resolved {auth} bootstrap brokers for {cluster_arn}: {brokers}");
    Ok(brokers.to_string())
}

fn select(output: &GetBootstrapBrokersOutput, auth: BrokerAuth) -> Option<&str> {
    match auth {
        BrokerAuth::Plaintext => output.bootstrap_broker_string(),
        BrokerAuth::Tls => output.bootstrap_broker_string_tls(),
        BrokerAuth::SaslScram => output.bootstrap_broker_string_sasl_scram(),
        BrokerAuth::SaslIam => output.bootstrap_broker_string_sasl_iam(),
    }
}
