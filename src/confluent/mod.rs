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

//! Write side of the migration: Confluent Cloud.

pub mod crn;
pub mod iam;
pub mod kafka_rest;
pub mod schema_registry;
#[cfg(test)]
pub(crate) mod test_server;

use std::fmt;

use clap::Args;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::utils::join_url;
use crate::HTTP_CLIENT;

pub const DEFAULT_CLOUD_URL: &str = "https://api.confluent.cloud";

#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("Network Error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{method} {url} returned {status}: {body}")]
    UnexpectedStatus {
        method: &'static str,
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("Serde Error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("`{0}` cannot be used as a base URL")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Default, Args)]
pub struct CloudConfig {
    #[arg(
        long = "cloud-url",
        env = "CC_CLOUD_URL",
        default_value = DEFAULT_CLOUD_URL,
        value_parser = crate::option::validation::url,
        help = "Confluent Cloud API base URL"
    )]
    pub cloud_url: Option<url::Url>,

    #[arg(
        long = "cloud-api-key",
        env = "CC_CLOUD_API_KEY",
        required = false,
        help = "Cloud API key (IAM endpoints)"
    )]
    pub cloud_api_key: Option<String>,

    #[arg(
        long = "cloud-api-secret",
        env = "CC_CLOUD_API_SECRET",
        required = false,
        help = "Cloud API secret"
    )]
    pub cloud_api_secret: Option<String>,

    #[arg(
        long = "organization-id",
        env = "CC_ORGANIZATION_ID",
        required = false,
        help = "Confluent Cloud organization id"
    )]
    pub organization_id: Option<String>,

    #[arg(
        long = "environment-id",
        env = "CC_ENVIRONMENT_ID",
        required = false,
        help = "Confluent Cloud environment id (env-xxxxx)"
    )]
    pub environment_id: Option<String>,

    #[arg(
        long = "cluster-id",
        env = "CC_CLUSTER_ID",
        required = false,
        help = "Target Kafka cluster id (lkc-xxxxx)"
    )]
    pub cluster_id: Option<String>,

    #[arg(
        long = "kafka-rest-endpoint",
        env = "CC_KAFKA_REST_ENDPOINT",
        value_parser = crate::option::validation::url,
        required = false,
        help = "REST endpoint of the target cluster"
    )]
    pub kafka_rest_endpoint: Option<url::Url>,

    #[arg(
        long = "kafka-api-key",
        env = "CC_KAFKA_API_KEY",
        required = false,
        help = "Cluster API key"
    )]
    pub kafka_api_key: Option<String>,

    #[arg(
        long = "kafka-api-secret",
        env = "CC_KAFKA_API_SECRET",
        required = false,
        help = "Cluster API secret"
    )]
    pub kafka_api_secret: Option<String>,

    #[arg(
        long = "schema-registry-url",
        env = "CC_SCHEMA_REGISTRY_URL",
        value_parser = crate::option::validation::url,
        required = false,
        help = "Schema Registry endpoint"
    )]
    pub schema_registry_url: Option<url::Url>,

    #[arg(
        long = "schema-registry-api-key",
        env = "CC_SCHEMA_REGISTRY_API_KEY",
        required = false,
        help = "Schema Registry API key"
    )]
    pub schema_registry_api_key: Option<String>,

    #[arg(
        long = "schema-registry-api-secret",
        env = "CC_SCHEMA_REGISTRY_API_SECRET",
        required = false,
        help = "Schema Registry API secret"
    )]
    pub schema_registry_api_secret: Option<String>,

    #[arg(
        long = "dry-run",
        env = "CC_DRY_RUN",
        default_value_t = false,
        help = "Log the requests that would be sent without sending them"
    )]
    pub dry_run: bool,
}

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, CloudError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or(CloudError::MissingConfig(name))
}

impl CloudConfig {
    /// Client for the organization wide IAM API.
    pub fn iam_api(&self) -> Result<ApiClient, CloudError> {
        let base = self
            .cloud_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_else(|| DEFAULT_CLOUD_URL.to_string());
        Ok(ApiClient {
            base,
            key: require(&self.cloud_api_key, "CC_CLOUD_API_KEY")?.to_string(),
            secret: require(&self.cloud_api_secret, "CC_CLOUD_API_SECRET")?.to_string(),
        })
    }

    pub fn kafka_rest_api(&self) -> Result<ApiClient, CloudError> {
        let base = self
            .kafka_rest_endpoint
            .as_ref()
            .ok_or(CloudError::MissingConfig("CC_KAFKA_REST_ENDPOINT"))?;
        Ok(ApiClient {
            base: base.to_string(),
            key: require(&self.kafka_api_key, "CC_KAFKA_API_KEY")?.to_string(),
            secret: require(&self.kafka_api_secret, "CC_KAFKA_API_SECRET")?.to_string(),
        })
    }

    pub fn schema_registry_api(&self) -> Result<ApiClient, CloudError> {
        let base = self
            .schema_registry_url
            .as_ref()
            .ok_or(CloudError::MissingConfig("CC_SCHEMA_REGISTRY_URL"))?;
        Ok(ApiClient {
            base: base.to_string(),
            key: require(&self.schema_registry_api_key, "CC_SCHEMA_REGISTRY_API_KEY")?.to_string(),
            secret: require(
                &self.schema_registry_api_secret,
                "CC_SCHEMA_REGISTRY_API_SECRET",
            )?
            .to_string(),
        })
    }

    pub fn cluster_id(&self) -> Result<&str, CloudError> {
        require(&self.cluster_id, "CC_CLUSTER_ID")
    }

    /// Fails unless every API the requested pushes talk to is configured.
    /// A dry run only needs the ids that end up in the logged requests.
    pub fn preflight(&self, rbac: bool, topics: bool, schemas: bool) -> Result<(), CloudError> {
        if topics {
            self.cluster_id()?;
        }
        if rbac {
            self.crn_scope()?;
        }
        if self.dry_run {
            return Ok(());
        }
        if rbac {
            self.iam_api()?;
        }
        if topics {
            self.kafka_rest_api()?;
        }
        if schemas {
            self.schema_registry_api()?;
        }
        Ok(())
    }

    pub fn crn_scope(&self) -> Result<crn::CrnScope, CloudError> {
        Ok(crn::CrnScope {
            organization_id: require(&self.organization_id, "CC_ORGANIZATION_ID")?.to_string(),
            environment_id: require(&self.environment_id, "CC_ENVIRONMENT_ID")?.to_string(),
            cluster_id: self.cluster_id()?.to_string(),
        })
    }
}

/// Base URL plus the key/secret pair one Confluent API accepts.
#[derive(Clone)]
pub struct ApiClient {
    base: String,
    key: String,
    secret: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base, path)
    }

    /// Appends `segments` to the base URL, percent encoding each one.
    /// Topic and subject names always go through here.
    pub fn url_for(&self, segments: &[&str]) -> Result<String, CloudError> {
        let invalid = || CloudError::InvalidUrl(self.base.clone());
        let mut url = url::Url::parse(&self.base).map_err(|_| invalid())?;
        {
            let mut path = url.path_segments_mut().map_err(|_| invalid())?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url.to_string())
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        HTTP_CLIENT
            .get(url)
            .basic_auth(&self.key, Some(&self.secret))
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        HTTP_CLIENT
            .post(url)
            .basic_auth(&self.key, Some(&self.secret))
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        HTTP_CLIENT
            .put(url)
            .basic_auth(&self.key, Some(&self.secret))
    }
}

/// Turns a non success response into [`CloudError::UnexpectedStatus`],
/// keeping the body for the log.
pub async fn check_status(
    method: &'static str,
    response: Response,
) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(CloudError::UnexpectedStatus {
        method,
        url,
        status,
        body,
    })
}

/// What happened to one item pushed to Confluent Cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Existing,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PushSummary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Existing => self.existing += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Records the result of pushing `item`, logging failures.
    pub fn record_result(&mut self, item: &str, result: Result<Outcome, CloudError>) {
        match result {
            Ok(outcome) => self.record(outcome),
            Err(err) => {
                warn!("failed to push {item}: {err}");
                self.record(Outcome::Failed);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.existing + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_failures_without_aborting() {
        let mut summary = PushSummary::default();
        summary.record(Outcome::Created);
        summary.record_result("orders", Ok(Outcome::Existing));
        summary.record_result("payments", Err(CloudError::MissingConfig("CC_CLUSTER_ID")));
        summary.record(Outcome::Skipped);

        assert_eq!(
            summary,
            PushSummary {
                created: 1,
                existing: 1,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let config = CloudConfig {
            cloud_api_key: Some("key".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.iam_api(),
            Err(CloudError::MissingConfig("CC_CLOUD_API_SECRET"))
        ));
        assert!(matches!(
            config.kafka_rest_api(),
            Err(CloudError::MissingConfig("CC_KAFKA_REST_ENDPOINT"))
        ));
    }

    #[test]
    fn iam_api_defaults_to_public_endpoint() {
        let config = CloudConfig {
            cloud_api_key: Some("key".into()),
            cloud_api_secret: Some("secret".into()),
            ..Default::default()
        };
        let api = config.iam_api().unwrap();
        assert_eq!(
            api.url("/iam/v2/service-accounts"),
            "https://api.confluent.cloud/iam/v2/service-accounts"
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        let api = ApiClient {
            base: "https://psrc-1.example/".into(),
            key: "KEY".into(),
            secret: "SECRET".into(),
        };
        assert_eq!(
            api.url_for(&["subjects", "orders#v2", "versions"]).unwrap(),
            "https://psrc-1.example/subjects/orders%23v2/versions"
        );
        assert_eq!(
            api.url_for(&["config", "a/b"]).unwrap(),
            "https://psrc-1.example/config/a%2Fb"
        );
    }

    #[test]
    fn preflight_reports_missing_endpoint_before_any_push() {
        let config = CloudConfig {
            cloud_api_key: Some("key".into()),
            cloud_api_secret: Some("secret".into()),
            organization_id: Some("org-1".into()),
            environment_id: Some("env-1".into()),
            cluster_id: Some("lkc-1".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.preflight(true, true, false),
            Err(CloudError::MissingConfig("CC_KAFKA_REST_ENDPOINT"))
        ));
        assert!(config.preflight(true, false, false).is_ok());

        let dry_run = CloudConfig {
            dry_run: true,
            ..config
        };
        assert!(dry_run.preflight(true, true, true).is_ok());
    }

    #[test]
    fn debug_hides_secret() {
        let api = ApiClient {
            base: "https://sr.example".into(),
            key: "KEY".into(),
            secret: "hunter2".into(),
        };
        assert!(!format!("{api:?}").contains("hunter2"));
    }
}
