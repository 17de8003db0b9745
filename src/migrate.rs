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

//! End to end migration: extract everything from MSK and Glue into an
//! output directory, convert the ACLs and optionally push the result to
//! Confluent Cloud.

use std::path::{Path, PathBuf};

use aws_config::SdkConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::acl::{self, AclError};
use crate::aws::glue::{self, GlueArgs, GlueSchema, SchemaExport};
use crate::aws::msk::{self, BrokerAuth, MskArgs};
use crate::aws::{AwsArgs, AwsError};
use crate::confluent::{iam, kafka_rest, schema_registry, CloudConfig, CloudError, PushSummary};
use crate::kafka::groups::{self, ConsumerGroupExport};
use crate::kafka::topics::{self, TopicExport, TopicFilter, TopicInfo};
use crate::kafka::{KafkaConfig, KafkaError, SecurityProtocol};
use crate::rbac::{self, ConversionReport};
use crate::utils::json::{self, JsonFileError};

pub const ACLS_FILE: &str = "msk-acls.json";
pub const RBAC_FILE: &str = "cc-rbac.json";
pub const TOPICS_FILE: &str = "msk-topics.json";
pub const GROUPS_FILE: &str = "msk-consumer-groups.json";
pub const SCHEMAS_FILE: &str = "glue-schemas.json";
pub const SUMMARY_FILE: &str = "migration-summary.json";

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error(transparent)]
    Kafka(#[from] KafkaError),
    #[error(transparent)]
    Aws(#[from] AwsError),
    #[error(transparent)]
    Acl(#[from] AclError),
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error(transparent)]
    File(#[from] JsonFileError),
}

/// Everything `migrate` needs, independent of how it was parsed.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub output_dir: PathBuf,
    pub acls: Option<(PathBuf, acl::AclFormat)>,
    pub topic_filter: TopicFilter,
    pub skip_schemas: bool,
    pub subject_suffix: Option<String>,
    pub apply: bool,
    pub kafka: KafkaConfig,
    pub aws: AwsArgs,
    pub msk: MskArgs,
    pub glue: GlueArgs,
    pub cloud: CloudConfig,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    pub output_dir: PathBuf,
    pub topics: usize,
    pub consumer_groups: usize,
    pub inactive_consumer_groups: usize,
    pub schemas: usize,
    pub acls: usize,
    pub role_bindings: usize,
    pub service_accounts: usize,
    pub notes: usize,
    /// Push results in the order they ran; empty without `--apply`.
    pub pushes: Vec<(&'static str, PushSummary)>,
}

impl MigrationSummary {
    pub fn failed(&self) -> usize {
        self.pushes.iter().map(|(_, s)| s.failed).sum()
    }
}

/// Fills in the bootstrap servers from the MSK API when only a cluster ARN
/// is configured. The security protocol follows the chosen listener unless
/// one was set explicitly.
pub async fn resolve_kafka_config(
    mut kafka: KafkaConfig,
    sdk: Option<&SdkConfig>,
    msk_args: &MskArgs,
) -> Result<KafkaConfig, MigrateError> {
    if kafka.bootstrap_servers.is_some() {
        return Ok(kafka);
    }
    // librdkafka has no AWS_MSK_IAM mechanism.
    if msk_args.auth == BrokerAuth::SaslIam {
        return Err(KafkaError::UnsupportedAuth(msk_args.auth.to_string()).into());
    }
    let (Some(sdk), Some(arn)) = (sdk, msk_args.cluster_arn.as_deref()) else {
        return Err(KafkaError::NoBootstrapServers.into());
    };

    let brokers = msk::bootstrap_brokers(sdk, arn, msk_args.auth).await?;
    kafka = kafka.with_bootstrap_servers(Some(brokers));

    if kafka.security.protocol == SecurityProtocol::Plaintext {
        kafka.security.protocol = msk_args.auth.security_protocol();
        if kafka.security.sasl_mechanism.is_none() {
            kafka.security.sasl_mechanism = msk_args.auth.sasl_mechanism();
        }
    }
    Ok(kafka)
}

pub async fn run(plan: MigrationPlan) -> Result<MigrationSummary, MigrateError> {
    let out = &plan.output_dir;
    let mut summary = MigrationSummary {
        output_dir: out.clone(),
        ..Default::default()
    };

    if plan.apply {
        plan.cloud.preflight(plan.acls.is_some(), true, false)?;
    }

    let needs_aws = plan.kafka.bootstrap_servers.is_none() || !plan.skip_schemas;
    let sdk = if needs_aws {
        Some(plan.aws.load().await)
    } else {
        None
    };

    let kafka = resolve_kafka_config(plan.kafka.clone(), sdk.as_ref(), &plan.msk).await?;

    let topics = topics::extract(&kafka, &plan.topic_filter).await?;
    TopicExport::new(topics.clone()).write(&out.join(TOPICS_FILE))?;
    summary.topics = topics.len();

    let consumer_groups = groups::extract(&kafka).await?;
    summary.consumer_groups = consumer_groups.len();
    summary.inactive_consumer_groups = groups::inactive(&consumer_groups).count();
    ConsumerGroupExport::new(consumer_groups).write(&out.join(GROUPS_FILE))?;

    let schemas = match (&sdk, plan.skip_schemas) {
        (Some(sdk), false) => extract_schemas(sdk, &plan.glue, &out.join(SCHEMAS_FILE)).await,
        _ => vec![],
    };
    summary.schemas = schemas.len();

    let report = match &plan.acls {
        Some((path, format)) => Some(convert_acls(path, *format, out)?),
        None => {
            warn!("no ACL file given, skipping the RBAC conversion");
            None
        }
    };
    if let Some(report) = &report {
        let meta = &report.conversion_metadata;
        summary.acls = meta.total_acls;
        summary.role_bindings = meta.role_bindings;
        summary.service_accounts = meta.service_accounts;
        summary.notes = meta.notes.len();
    }

    if plan.apply {
        summary.pushes = apply(&plan, &topics, &schemas, report.as_ref()).await?;
    } else {
        info!("extraction finished, pass --apply to push to Confluent Cloud");
    }

    json::write_pretty(&out.join(SUMMARY_FILE), &summary)?;
    Ok(summary)
}

/// Glue is optional for a migration, a failure leaves the schemas out.
async fn extract_schemas(sdk: &SdkConfig, args: &GlueArgs, path: &Path) -> Vec<GlueSchema> {
    let schemas = match glue::extract(sdk, args).await {
        Ok(schemas) => schemas,
        Err(err) => {
            warn!("schema extraction failed, continuing without schemas: {err}");
            return vec![];
        }
    };
    if let Err(err) = SchemaExport::new(schemas.clone()).write(path) {
        warn!("{err}");
    }
    schemas
}

fn convert_acls(
    path: &Path,
    format: acl::AclFormat,
    out: &Path,
) -> Result<ConversionReport, MigrateError> {
    let acls = format.load(path)?;
    info!("loaded {} ACLs from {}", acls.len(), path.display());
    acl::write_export(&out.join(ACLS_FILE), &acls)?;
    Ok(rbac::convert_to_file(&acls, &out.join(RBAC_FILE))?)
}

/// Service accounts first since role bindings need their ids, and topics
/// and schemas before the bindings that grant access to them.
async fn apply(
    plan: &MigrationPlan,
    topics: &[TopicInfo],
    schemas: &[GlueSchema],
    report: Option<&ConversionReport>,
) -> Result<Vec<(&'static str, PushSummary)>, MigrateError> {
    let cloud = &plan.cloud;
    cloud.preflight(report.is_some(), true, !schemas.is_empty())?;
    let mut pushes = Vec::new();

    let ids = match report {
        Some(report) => {
            let (ids, accounts) = iam::create_service_accounts(cloud, report).await?;
            pushes.push(("service accounts", accounts));
            Some(ids)
        }
        None => None,
    };

    pushes.push(("topics", kafka_rest::create_topics(cloud, topics).await?));

    if !schemas.is_empty() {
        let summary =
            schema_registry::migrate(cloud, schemas, plan.subject_suffix.as_deref()).await?;
        pushes.push(("schemas", summary));
    }

    if let (Some(report), Some(ids)) = (report, ids) {
        let summary = iam::create_role_bindings(cloud, report, &ids).await?;
        pushes.push(("role bindings", summary));
    }

    Ok(pushes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confluent::test_server::TestServer;

    #[tokio::test]
    async fn explicit_servers_skip_msk_lookup() {
        let kafka = KafkaConfig {
            bootstrap_servers: Some("b-1:9092".into()),
            ..Default::default()
        };
        let resolved = resolve_kafka_config(kafka, None, &MskArgs::default())
            .await
            .unwrap();
        assert_eq!(resolved.bootstrap_servers.as_deref(), Some("b-1:9092"));
    }

    #[tokio::test]
    async fn no_servers_and_no_cluster_fails_fast() {
        let result = resolve_kafka_config(KafkaConfig::default(), None, &MskArgs::default()).await;
        assert!(matches!(
            result,
            Err(MigrateError::Kafka(KafkaError::NoBootstrapServers))
        ));
    }

    #[tokio::test]
    async fn iam_broker_auth_is_rejected_up_front() {
        let msk_args = MskArgs {
            cluster_arn: Some("arn:aws:kafka:us-east-1:123456789012:cluster/demo/abc".into()),
            auth: BrokerAuth::SaslIam,
        };
        let result = resolve_kafka_config(KafkaConfig::default(), None, &msk_args).await;
        let Err(MigrateError::Kafka(err)) = result else {
            panic!("expected a Kafka error");
        };
        assert!(matches!(err, KafkaError::UnsupportedAuth(_)));
        assert!(err.to_string().contains("sasl-iam auth is not supported"));
    }

    #[test]
    fn listing_acls_are_exported_and_converted() {
        let dir = tempfile::tempdir().unwrap();
        let listing = dir.path().join("acls.txt");
        std::fs::write(
            &listing,
            "Current ACLs for resource `ResourcePattern(resourceType=TOPIC, name=orders, patternType=LITERAL)`: \n \t(principal=User:alice, host=*, operation=READ, permissionType=ALLOW)\n",
        )
        .unwrap();

        let out = dir.path().join("out");
        let report = convert_acls(&listing, acl::AclFormat::Listing, &out).unwrap();
        assert_eq!(report.role_bindings.len(), 1);
        assert_eq!(acl::read_export(&out.join(ACLS_FILE)).unwrap().len(), 1);
        assert!(out.join(RBAC_FILE).exists());
    }

    #[tokio::test]
    async fn dry_run_apply_pushes_in_order() {
        let plan = MigrationPlan {
            cloud: CloudConfig {
                dry_run: true,
                organization_id: Some("org-1".into()),
                environment_id: Some("env-1".into()),
                cluster_id: Some("lkc-1".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let report = rbac::convert(&[acl::AclBinding {
            principal: "User:alice".into(),
            host: "*".into(),
            operation: "READ".into(),
            permission_type: "ALLOW".into(),
            resource_type: "TOPIC".into(),
            resource_name: "orders".into(),
            pattern_type: "LITERAL".into(),
        }]);
        let topics = vec![TopicInfo {
            name: "orders".into(),
            partitions: 1,
            replication_factor: 3,
            configs: Default::default(),
        }];

        let pushes = apply(&plan, &topics, &[], Some(&report)).await.unwrap();
        let names: Vec<&str> = pushes.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["service accounts", "topics", "role bindings"]);
        assert!(pushes.iter().all(|(_, s)| s.failed == 0));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_before_any_push() {
        let server = TestServer::start(|_| (201, r#"{"id":"sa-1","display_name":"alice"}"#.into()));
        let plan = MigrationPlan {
            cloud: CloudConfig {
                kafka_rest_endpoint: None,
                ..server.cloud_config()
            },
            ..Default::default()
        };
        let report = rbac::convert(&[acl::AclBinding {
            principal: "User:alice".into(),
            host: "*".into(),
            operation: "READ".into(),
            permission_type: "ALLOW".into(),
            resource_type: "TOPIC".into(),
            resource_name: "orders".into(),
            pattern_type: "LITERAL".into(),
        }]);

        let result = apply(&plan, &[], &[], Some(&report)).await;
        assert!(matches!(
            result,
            Err(MigrateError::Cloud(CloudError::MissingConfig(
                "CC_KAFKA_REST_ENDPOINT"
            )))
        ));
        assert!(server.requests().is_empty());
    }
}
