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

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rdkafka::admin::{AdminOptions, ConfigSource, ResourceSpecifier};
use rdkafka::metadata::MetadataTopic;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{KafkaConfig, KafkaError};
use crate::utils::json;

// DescribeConfigs is sent in batches of this many topics
const DESCRIBE_CONFIGS_BATCH: usize = 100;
const INTERNAL_TOPIC_PREFIX: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    /// Only configs that were set explicitly on the topic or the brokers.
    #[serde(default)]
    pub configs: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicExport {
    pub exported_at: Option<DateTime<Utc>>,
    pub topics: Vec<TopicInfo>,
}

impl TopicExport {
    pub fn new(topics: Vec<TopicInfo>) -> Self {
        Self {
            exported_at: Some(Utc::now()),
            topics,
        }
    }

    pub fn read(path: &Path) -> Result<Self, KafkaError> {
        Ok(json::read(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), KafkaError> {
        json::write_pretty(path, self)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    pub include_internal: bool,
    /// Empty means every topic.
    pub names: Vec<String>,
}

impl TopicFilter {
    fn accepts(&self, name: &str) -> bool {
        if !self.include_internal && name.starts_with(INTERNAL_TOPIC_PREFIX) {
            return false;
        }
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }
}

/// Lists topics on the source cluster together with their non default
/// configuration.
pub async fn extract(
    config: &KafkaConfig,
    filter: &TopicFilter,
) -> Result<Vec<TopicInfo>, KafkaError> {
    // fetch_metadata blocks until the brokers answer
    let (admin, mut topics) = {
        let config = config.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || -> Result<_, KafkaError> {
            let admin = config.admin_client()?;
            let metadata = admin
                .inner()
                .fetch_metadata(None, config.request_timeout)?;

            let topics: Vec<TopicInfo> = metadata
                .topics()
                .iter()
                .filter(|topic| filter.accepts(topic.name()))
                .filter_map(|topic| {
                    if let Some(err) = topic.error() {
                        warn!("skipping topic {}: metadata error {err:?}", topic.name());
                        return None;
                    }
                    Some(topic_info(topic))
                })
                .collect();
            Ok((admin, topics))
        })
        .await??
    };
    topics.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        "found {} topics on {}",
        topics.len(),
        config.bootstrap_servers.as_deref().unwrap_or_default()
    );

    let opts = AdminOptions::new().request_timeout(Some(config.request_timeout));
    for batch in topics.chunks_mut(DESCRIBE_CONFIGS_BATCH) {
        let names: Vec<String> = batch.iter().map(|t| t.name.clone()).collect();
        let specifiers: Vec<ResourceSpecifier> = names
            .iter()
            .map(|name| ResourceSpecifier::Topic(name.as_str()))
            .collect();

        let results = admin.describe_configs(&specifiers, &opts).await?;
        for (name, result) in names.iter().zip(results) {
            let resource = match result {
                Ok(resource) => resource,
                Err(code) => {
                    warn!(
                        "{}",
                        KafkaError::DescribeConfigs {
                            topic: name.clone(),
                            reason: format!("{code:?}"),
                        }
                    );
                    continue;
                }
            };
            let Some(topic) = batch.iter_mut().find(|t| &t.name == name) else {
                continue;
            };

            topic.configs = resource
                .entries
                .iter()
                .filter(|entry| is_overridden(&entry.source) && !entry.is_sensitive)
                .filter_map(|entry| {
                    entry
                        .value
                        .as_ref()
                        .map(|value| (entry.name.clone(), value.clone()))
                })
                .collect();
            debug!("topic {name} has {} overridden configs", topic.configs.len());
        }
    }

    Ok(topics)
}

fn topic_info(topic: &MetadataTopic) -> TopicInfo {
    let partitions = topic.partitions();
    TopicInfo {
        name: topic.name().to_string(),
        partitions: partitions.len() as i32,
        replication_factor: partitions
            .first()
            .map(|p| p.replicas().len() as i32)
            .unwrap_or_default(),
        configs: BTreeMap::new(),
    }
}

/// Broker defaults are not worth carrying over, the target cluster has its own.
fn is_overridden(source: &ConfigSource) -> bool {
    matches!(
        source,
        ConfigSource::DynamicTopic | ConfigSource::DynamicBroker | ConfigSource::StaticBroker
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_skips_internal_topics_by_default() {
        let filter = TopicFilter::default();
        assert!(!filter.accepts("__consumer_offsets"));
        assert!(!filter.accepts("__amazon_msk_canary"));
        assert!(filter.accepts("orders"));

        let filter = TopicFilter {
            include_internal: true,
            ..Default::default()
        };
        assert!(filter.accepts("__consumer_offsets"));
    }

    #[test]
    fn filter_restricts_to_named_topics() {
        let filter = TopicFilter {
            include_internal: false,
            names: vec!["orders".into(), "payments".into()],
        };
        assert!(filter.accepts("payments"));
        assert!(!filter.accepts("audit"));
    }

    #[test]
    fn only_explicit_configs_are_kept() {
        assert!(is_overridden(&ConfigSource::DynamicTopic));
        assert!(!is_overridden(&ConfigSource::Default));
        assert!(!is_overridden(&ConfigSource::DynamicDefaultBroker));
    }

    #[test]
    fn export_tolerates_missing_configs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topics.json");
        std::fs::write(
            &path,
            r#"{"topics":[{"name":"orders","partitions":6,"replication_factor":3}]}"#,
        )
        .unwrap();

        let export = TopicExport::read(&path).unwrap();
        assert_eq!(export.topics[0].partitions, 6);
        assert!(export.topics[0].configs.is_empty());
        assert!(export.exported_at.is_none());
    }
}
