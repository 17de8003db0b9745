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

use std::path::Path;

use chrono::{DateTime, Utc};
use rdkafka::groups::GroupInfo;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{KafkaConfig, KafkaError};
use crate::utils::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerGroupInfo {
    pub group_id: String,
    pub state: String,
    pub protocol_type: String,
    pub protocol: String,
    pub members: usize,
}

impl From<&GroupInfo> for ConsumerGroupInfo {
    fn from(group: &GroupInfo) -> Self {
        Self {
            group_id: group.name().to_string(),
            state: group.state().to_string(),
            protocol_type: group.protocol_type().to_string(),
            protocol: group.protocol().to_string(),
            members: group.members().len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConsumerGroupExport {
    pub exported_at: Option<DateTime<Utc>>,
    pub consumer_groups: Vec<ConsumerGroupInfo>,
}

impl ConsumerGroupExport {
    pub fn new(consumer_groups: Vec<ConsumerGroupInfo>) -> Self {
        Self {
            exported_at: Some(Utc::now()),
            consumer_groups,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), KafkaError> {
        json::write_pretty(path, self)?;
        Ok(())
    }
}

/// Lists the consumer groups known to the source cluster. Connect workers
/// and other non consumer protocols are kept; the protocol type tells them
/// apart.
pub async fn extract(config: &KafkaConfig) -> Result<Vec<ConsumerGroupInfo>, KafkaError> {
    let config = config.clone();
    let mut groups = tokio::task::spawn_blocking(move || -> Result<Vec<_>, KafkaError> {
        let admin = config.admin_client()?;
        let list = admin
            .inner()
            .fetch_group_list(None, config.request_timeout)?;
        Ok(list.groups().iter().map(ConsumerGroupInfo::from).collect())
    })
    .await??;
    groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));

    info!("found {} consumer groups", groups.len());
    Ok(groups)
}

/// Groups without members: their offsets can be migrated while no
/// consumer is running.
pub fn inactive(groups: &[ConsumerGroupInfo]) -> impl Iterator<Item = &ConsumerGroupInfo> {
    groups
        .iter()
        .filter(|g| g.members == 0 || g.state.eq_ignore_ascii_case("empty"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, state: &str, members: usize) -> ConsumerGroupInfo {
        ConsumerGroupInfo {
            group_id: id.to_string(),
            state: state.to_string(),
            protocol_type: "consumer".to_string(),
            protocol: "range".to_string(),
            members,
        }
    }

    #[test]
    fn inactive_groups() {
        let groups = vec![
            group("billing", "Stable", 3),
            group("reports", "Empty", 0),
            group("legacy", "Dead", 0),
        ];

        let ids: Vec<&str> = inactive(&groups).map(|g| g.group_id.as_str()).collect();
        assert_eq!(ids, vec!["reports", "legacy"]);
    }

    #[test]
    fn export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        ConsumerGroupExport::new(vec![group("billing", "Stable", 3)])
            .write(&path)
            .unwrap();

        let back: ConsumerGroupExport = json::read(&path).unwrap();
        assert_eq!(back.consumer_groups[0].group_id, "billing");
        assert!(back.exported_at.is_some());
    }
}
