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

//! AWS side of the migration: MSK cluster discovery and the Glue schema
//! registry.

pub mod glue;
pub mod msk;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use clap::Args;
use tracing::debug;

use crate::utils::json::JsonFileError;

#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("MSK API error: {0}")]
    Msk(#[from] aws_sdk_kafka::Error),
    #[error("Glue API error: {0}")]
    Glue(#[from] aws_sdk_glue::Error),
    #[error("cluster {cluster_arn} has no {auth} bootstrap brokers")]
    MissingBrokers { cluster_arn: String, auth: String },
    #[error("Glue returned schema {0} without a definition")]
    MissingDefinition(String),
    #[error(transparent)]
    File(#[from] JsonFileError),
}

#[derive(Debug, Clone, Default, Args)]
pub struct AwsArgs {
    #[arg(
        long = "aws-region",
        env = "AWS_REGION",
        required = false,
        help = "AWS region of the MSK cluster and Glue registry"
    )]
    pub region: Option<String>,

    #[arg(
        long = "aws-profile",
        env = "AWS_PROFILE",
        required = false,
        help = "Named profile from the shared AWS config"
    )]
    pub profile: Option<String>,

    #[arg(
        long = "aws-endpoint-url",
        env = "AWS_ENDPOINT_URL",
        value_parser = crate::option::validation::url,
        required = false,
        help = "Override the AWS endpoint (LocalStack and similar)"
    )]
    pub endpoint: Option<url::Url>,
}

impl AwsArgs {
    /// Loads the shared SDK configuration, letting explicit arguments win
    /// over the default provider chain.
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint.as_str());
        }

        let config = loader.load().await;
        debug!("loaded AWS config for region {:?}", config.region());
        config
    }
}
