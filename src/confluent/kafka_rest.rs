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

//! Topic creation through the Kafka REST v3 API of the target cluster.

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{check_status, ApiClient, CloudConfig, CloudError, Outcome, PushSummary};
use crate::kafka::topics::TopicInfo;

/// Topic configs Confluent Cloud lets a client set. Anything else is
/// dropped with a warning.
pub const ALLOWED_TOPIC_CONFIGS: &[&str] = &[
    "cleanup.policy",
    "compression.type",
    "delete.retention.ms",
    "max.compaction.lag.ms",
    "max.message.bytes",
    "message.timestamp.after.max.ms",
    "message.timestamp.before.max.ms",
    "message.timestamp.difference.max.ms",
    "message.timestamp.type",
    "min.compaction.lag.ms",
    "min.insync.replicas",
    "retention.bytes",
    "retention.ms",
    "segment.bytes",
    "segment.ms",
];

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TopicConfig {
    pub name: String,
    pub value: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CreateTopic {
    pub topic_name: String,
    pub partitions_count: i32,
    pub configs: Vec<TopicConfig>,
}

/// Request body for `topic` plus the names of the configs that were left
/// out. Replication is managed by Confluent Cloud and not sent.
pub fn topic_request(topic: &TopicInfo) -> (CreateTopic, Vec<String>) {
    let (allowed, dropped): (Vec<_>, Vec<_>) = topic
        .configs
        .iter()
        .partition(|(name, _)| ALLOWED_TOPIC_CONFIGS.contains(&name.as_str()));

    let request = CreateTopic {
        topic_name: topic.name.clone(),
        partitions_count: topic.partitions.max(1),
        configs: allowed
            .into_iter()
            .map(|(name, value)| TopicConfig {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    };
    let dropped = dropped.into_iter().map(|(name, _)| name.clone()).collect();
    (request, dropped)
}

/// Creates `topics` on the target cluster, skipping the ones that are
/// already there.
pub async fn create_topics(
    config: &CloudConfig,
    topics: &[TopicInfo],
) -> Result<PushSummary, CloudError> {
    let cluster_id = config.cluster_id()?;
    let api = if config.dry_run {
        None
    } else {
        Some(config.kafka_rest_api()?)
    };

    let mut summary = PushSummary::default();
    for topic in topics {
        let (request, dropped) = topic_request(topic);
        if !dropped.is_empty() {
            warn!(
                "topic {}: configs not allowed on Confluent Cloud dropped: {}",
                topic.name,
                dropped.join(", ")
            );
        }

        let Some(api) = &api else {
            info!(
                "[dry-run] would create topic {} with {} partitions and {} configs",
                request.topic_name,
                request.partitions_count,
                request.configs.len()
            );
            summary.record(Outcome::Skipped);
            continue;
        };

        summary.record_result(&topic.name, create_topic(api, cluster_id, &request).await);
    }

    info!(
        "topics: {} created, {} existing, {} skipped, {} failed",
        summary.created, summary.existing, summary.skipped, summary.failed
    );
    Ok(summary)
}

async fn create_topic(
    api: &ApiClient,
    cluster_id: &str,
    request: &CreateTopic,
) -> Result<Outcome, CloudError> {
    let topics = api.url_for(&["kafka", "v3", "clusters", cluster_id, "topics"])?;
    let topic = api.url_for(&[
        "kafka",
        "v3",
        "clusters",
        cluster_id,
        "topics",
        &request.topic_name,
    ])?;

    let lookup = api.get(&topic).send().await?;
    match lookup.status() {
        StatusCode::OK => {
            debug!("topic {} already exists", request.topic_name);
            return Ok(Outcome::Existing);
        }
        StatusCode::NOT_FOUND => {}
        _ => {
            check_status("GET", lookup).await?;
        }
    }

    let response = api.post(&topics).json(request).send().await?;
    if response.status() == StatusCode::CONFLICT {
        return Ok(Outcome::Existing);
    }
    check_status("POST", response).await?;
    info!(
        "created topic {} ({} partitions)",
        request.topic_name, request.partitions_count
    );
    Ok(Outcome::Created)
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::*;
    use crate::confluent::test_server::TestServer;

    #[test]
    fn only_allowed_configs_are_forwarded() {
        let topic = TopicInfo {
            name: "orders".into(),
            partitions: 12,
            replication_factor: 3,
            configs: btreemap! {
                "retention.ms".to_string() => "604800000".to_string(),
                "cleanup.policy".to_string() => "compact".to_string(),
                "unclean.leader.election.enable".to_string() => "true".to_string(),
                "message.downconversion.enable".to_string() => "false".to_string(),
            },
        };

        let (request, dropped) = topic_request(&topic);
        assert_eq!(request.topic_name, "orders");
        assert_eq!(request.partitions_count, 12);
        assert_eq!(
            request.configs,
            vec![
                TopicConfig {
                    name: "cleanup.policy".into(),
                    value: "compact".into()
                },
                TopicConfig {
                    name: "retention.ms".into(),
                    value: "604800000".into()
                },
            ]
        );
        assert_eq!(
            dropped,
            vec!["message.downconversion.enable", "unclean.leader.election.enable"]
        );
    }

    #[test]
    fn request_body_shape() {
        let topic = TopicInfo {
            name: "events".into(),
            partitions: 3,
            replication_factor: 2,
            configs: Default::default(),
        };
        let body = serde_json::to_value(topic_request(&topic).0).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"topic_name": "events", "partitions_count": 3, "configs": []})
        );
    }

    #[tokio::test]
    async fn dry_run_needs_no_credentials() {
        let config = CloudConfig {
            dry_run: true,
            cluster_id: Some("lkc-123".into()),
            ..Default::default()
        };
        let topics = vec![TopicInfo {
            name: "events".into(),
            partitions: 3,
            replication_factor: 3,
            configs: Default::default(),
        }];

        let summary = create_topics(&config, &topics).await.unwrap();
        assert_eq!(summary.skipped, 1);
    }

    fn topic(name: &str) -> TopicInfo {
        TopicInfo {
            name: name.into(),
            partitions: 6,
            replication_factor: 3,
            configs: btreemap! {
                "retention.ms".to_string() => "86400000".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn existing_topics_are_not_posted() {
        let server = TestServer::start(|req| match req.line().as_str() {
            "GET /kafka/v3/clusters/lkc-1/topics/orders" => {
                (200, r#"{"topic_name":"orders"}"#.into())
            }
            "GET /kafka/v3/clusters/lkc-1/topics/events" => (404, "{}".into()),
            "POST /kafka/v3/clusters/lkc-1/topics" => (201, r#"{"topic_name":"events"}"#.into()),
            _ => (500, "{}".into()),
        });

        let summary = create_topics(&server.cloud_config(), &[topic("orders"), topic("events")])
            .await
            .unwrap();

        assert_eq!(summary.existing, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(
            server.lines(),
            [
                "GET /kafka/v3/clusters/lkc-1/topics/orders",
                "GET /kafka/v3/clusters/lkc-1/topics/events",
                "POST /kafka/v3/clusters/lkc-1/topics",
            ]
        );
        let body: serde_json::Value =
            serde_json::from_str(&server.requests()[2].body).unwrap();
        assert_eq!(body["topic_name"], "events");
        assert_eq!(body["partitions_count"], 6);
    }

    #[tokio::test]
    async fn conflict_counts_as_existing_and_errors_as_failed() {
        let server = TestServer::start(|req| match req.line().as_str() {
            line if line.starts_with("GET ") => (404, "{}".into()),
            _ if req.body.contains(r#""topic_name":"raced""#) => (409, "{}".into()),
            _ => (500, r#"{"error_code":500,"message":"broken"}"#.into()),
        });

        let summary = create_topics(&server.cloud_config(), &[topic("raced"), topic("broken")])
            .await
            .unwrap();

        assert_eq!(summary.existing, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 0);
    }

    #[tokio::test]
    async fn topic_names_are_escaped_in_paths() {
        let server = TestServer::start(|_| (200, "{}".into()));

        let summary = create_topics(&server.cloud_config(), &[topic("a#b")])
            .await
            .unwrap();

        assert_eq!(summary.existing, 1);
        assert_eq!(
            server.lines(),
            ["GET /kafka/v3/clusters/lkc-1/topics/a%23b"]
        );
    }
}
