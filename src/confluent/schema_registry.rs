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

//! Schema migration from Glue into Confluent Schema Registry.

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{check_status, ApiClient, CloudConfig, CloudError, Outcome, PushSummary};
use crate::aws::glue::{GlueSchema, SchemaVersion};

const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Schema Registry compatibility level for a Glue compatibility mode.
pub fn compatibility(glue: &str) -> Option<&'static str> {
    let level = match glue.trim().to_ascii_uppercase().as_str() {
        "NONE" | "DISABLED" => "NONE",
        "BACKWARD" => "BACKWARD",
        "BACKWARD_ALL" => "BACKWARD_TRANSITIVE",
        "FORWARD" => "FORWARD",
        "FORWARD_ALL" => "FORWARD_TRANSITIVE",
        "FULL" => "FULL",
        "FULL_ALL" => "FULL_TRANSITIVE",
        _ => return None,
    };
    Some(level)
}

/// `schemaType` to register with. Avro is the registry default and is
/// left out.
pub fn schema_type(data_format: &str) -> Option<&'static str> {
    match data_format.trim().to_ascii_uppercase().as_str() {
        "JSON" => Some("JSON"),
        "PROTOBUF" => Some("PROTOBUF"),
        _ => None,
    }
}

pub fn subject(schema_name: &str, suffix: Option<&str>) -> String {
    format!("{schema_name}{}", suffix.unwrap_or_default())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RegisterSchema<'a> {
    pub schema: &'a str,
    #[serde(rename = "schemaType", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct SetCompatibility {
    compatibility: &'static str,
}

#[derive(Debug, Deserialize)]
struct RegisteredSchema {
    id: i64,
}

/// Sets the subject compatibility, then registers every version of
/// `schemas` oldest first. A version that fails stops the remaining
/// versions of that subject so the order is never broken.
pub async fn migrate(
    config: &CloudConfig,
    schemas: &[GlueSchema],
    subject_suffix: Option<&str>,
) -> Result<PushSummary, CloudError> {
    let api = if config.dry_run {
        None
    } else {
        Some(config.schema_registry_api()?)
    };

    let mut summary = PushSummary::default();
    for schema in schemas {
        let subject = subject(&schema.schema_name, subject_suffix);
        let schema_type = schema_type(&schema.data_format);
        let level = compatibility(&schema.compatibility);
        if level.is_none() {
            warn!(
                "subject {subject}: unknown Glue compatibility `{}`, keeping the registry default",
                schema.compatibility
            );
        }

        let Some(api) = &api else {
            info!(
                "[dry-run] would register {} versions of {subject} ({}) with compatibility {}",
                schema.versions.len(),
                schema.data_format,
                level.unwrap_or("default")
            );
            summary.skipped += schema.versions.len();
            continue;
        };

        // Before any version, so older history is checked under the Glue mode.
        if let Some(level) = level {
            if let Err(err) = set_compatibility(api, &subject, level).await {
                warn!("failed to set compatibility {level} on {subject}: {err}");
            }
        }

        let mut versions = schema.versions.iter().collect::<Vec<_>>();
        versions.sort_by_key(|v| v.version_number);

        let mut broken = false;
        for version in versions {
            let item = format!("{subject} v{}", version.version_number);
            if broken {
                warn!("skipping {item}: an earlier version failed");
                summary.record(Outcome::Skipped);
                continue;
            }
            let result = register(api, &subject, version, schema_type).await;
            broken = result.is_err();
            summary.record_result(&item, result);
        }
    }

    info!(
        "schemas: {} versions registered, {} existing, {} skipped, {} failed",
        summary.created, summary.existing, summary.skipped, summary.failed
    );
    Ok(summary)
}

async fn register(
    api: &ApiClient,
    subject: &str,
    version: &SchemaVersion,
    schema_type: Option<&'static str>,
) -> Result<Outcome, CloudError> {
    let body = RegisterSchema {
        schema: &version.definition,
        schema_type,
    };

    // POST /subjects/{subject} answers 200 when the exact schema is
    // already registered under the subject.
    let lookup = api
        .post(&api.url_for(&["subjects", subject])?)
        .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
        .json(&body)
        .send()
        .await?;
    if lookup.status() == StatusCode::OK {
        debug!("{subject} v{} already registered", version.version_number);
        return Ok(Outcome::Existing);
    }

    let response = api
        .post(&api.url_for(&["subjects", subject, "versions"])?)
        .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
        .json(&body)
        .send()
        .await?;
    let registered: RegisteredSchema = check_status("POST", response).await?.json().await?;
    info!(
        "registered {subject} v{} as schema id {}",
        version.version_number, registered.id
    );
    Ok(Outcome::Created)
}

async fn set_compatibility(
    api: &ApiClient,
    subject: &str,
    level: &'static str,
) -> Result<(), CloudError> {
    let response = api
        .put(&api.url_for(&["config", subject])?)
        .header(CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
        .json(&SetCompatibility {
            compatibility: level,
        })
        .send()
        .await?;
    check_status("PUT", response).await?;
    debug!("set compatibility {level} on {subject}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;
    use crate::confluent::test_server::TestServer;

    #[rstest]
    #[case("DISABLED", Some("NONE"))]
    #[case("NONE", Some("NONE"))]
    #[case("BACKWARD", Some("BACKWARD"))]
    #[case("BACKWARD_ALL", Some("BACKWARD_TRANSITIVE"))]
    #[case("FORWARD_ALL", Some("FORWARD_TRANSITIVE"))]
    #[case("full_all", Some("FULL_TRANSITIVE"))]
    #[case("SOMETHING_NEW", None)]
    fn glue_compatibility(#[case] glue: &str, #[case] expected: Option<&str>) {
        assert_eq!(compatibility(glue), expected);
    }

    #[test]
    fn avro_omits_schema_type() {
        let body = RegisterSchema {
            schema: r#"{"type":"string"}"#,
            schema_type: schema_type("AVRO"),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"schema": "{\"type\":\"string\"}"})
        );

        let body = RegisterSchema {
            schema: "syntax = \"proto3\";",
            schema_type: schema_type("PROTOBUF"),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap()["schemaType"],
            "PROTOBUF"
        );
    }

    #[test]
    fn subject_suffix() {
        assert_eq!(subject("orders", None), "orders");
        assert_eq!(subject("orders", Some("-value")), "orders-value");
    }

    #[tokio::test]
    async fn dry_run_counts_every_version() {
        let config = CloudConfig {
            dry_run: true,
            ..Default::default()
        };
        let schema = GlueSchema {
            registry: "default-registry".into(),
            schema_name: "orders".into(),
            data_format: "AVRO".into(),
            compatibility: "BACKWARD".into(),
            versions: vec![
                SchemaVersion {
                    version_number: 1,
                    definition: "\"string\"".into(),
                },
                SchemaVersion {
                    version_number: 2,
                    definition: "\"bytes\"".into(),
                },
            ],
        };

        let summary = migrate(&config, &[schema], None).await.unwrap();
        assert_eq!(summary.skipped, 2);
    }

    fn glue_schema(name: &str, versions: &[i64]) -> GlueSchema {
        GlueSchema {
            registry: "default-registry".into(),
            schema_name: name.into(),
            data_format: "AVRO".into(),
            compatibility: "FORWARD".into(),
            versions: versions
                .iter()
                .map(|&version_number| SchemaVersion {
                    version_number,
                    definition: format!(
                        r#"{{"type":"record","name":"v{version_number}","fields":[]}}"#
                    ),
                })
                .collect(),
        }
    }

    fn registry(fail_versions_post: usize) -> TestServer {
        let posts = AtomicUsize::new(0);
        TestServer::start(move |req| match (req.method.as_str(), req.path.as_str()) {
            ("PUT", _) => (200, r#"{"compatibility":"FORWARD"}"#.into()),
            ("POST", path) if path.ends_with("/versions") => {
                if posts.fetch_add(1, Ordering::SeqCst) + 1 == fail_versions_post {
                    (500, r#"{"error_code":50001,"message":"store error"}"#.into())
                } else {
                    (200, r#"{"id":7}"#.into())
                }
            }
            _ => (404, r#"{"error_code":40401,"message":"Subject not found"}"#.into()),
        })
    }

    #[tokio::test]
    async fn compatibility_is_set_before_the_first_version() {
        let server = registry(0);
        let schemas = [glue_schema("orders", &[2, 1])];

        let summary = migrate(&server.cloud_config(), &schemas, None)
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(
            server.lines(),
            [
                "PUT /config/orders",
                "POST /subjects/orders",
                "POST /subjects/orders/versions",
                "POST /subjects/orders",
                "POST /subjects/orders/versions",
            ]
        );
        let first = &server.requests()[2];
        assert!(first.body.contains("v1"));
    }

    #[tokio::test]
    async fn subject_names_are_escaped_in_paths() {
        let server = registry(0);
        let schemas = [glue_schema("orders#v2", &[1])];

        let summary = migrate(&server.cloud_config(), &schemas, None)
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(
            server.lines(),
            [
                "PUT /config/orders%23v2",
                "POST /subjects/orders%23v2",
                "POST /subjects/orders%23v2/versions",
            ]
        );
    }

    #[tokio::test]
    async fn failed_version_stops_the_rest_of_its_subject() {
        let server = registry(1);
        let schemas = [glue_schema("orders", &[1, 2, 3]), glue_schema("users", &[1])];

        let summary = migrate(&server.cloud_config(), &schemas, None)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.created, 1);
        let lines = server.lines();
        assert_eq!(
            lines
                .iter()
                .filter(|line| line.starts_with("POST /subjects/orders/versions"))
                .count(),
            1
        );
        assert!(lines.contains(&"POST /subjects/users/versions".to_string()));
    }

    #[tokio::test]
    async fn already_registered_version_counts_as_existing() {
        let server = TestServer::start(|req| match req.line().as_str() {
            "POST /subjects/orders" => (200, r#"{"subject":"orders","version":1,"id":3}"#.into()),
            _ => (200, "{}".into()),
        });
        let schemas = [glue_schema("orders", &[1])];

        let summary = migrate(&server.cloud_config(), &schemas, None)
            .await
            .unwrap();

        assert_eq!(summary.existing, 1);
        assert!(!server
            .lines()
            .contains(&"POST /subjects/orders/versions".to_string()));
    }
}
