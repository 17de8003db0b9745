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

use crate::acl::{PatternType, ResourceType};
use crate::rbac::RoleBinding;

const CRN_AUTHORITY: &str = "crn://confluent.cloud";

/// Organization, environment and cluster a role binding is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrnScope {
    pub organization_id: String,
    pub environment_id: String,
    pub cluster_id: String,
}

impl CrnScope {
    pub fn cluster(&self) -> String {
        format!(
            "{CRN_AUTHORITY}/organization={}/environment={}/cloud-cluster={}",
            self.organization_id, self.environment_id, self.cluster_id
        )
    }

    fn kafka(&self) -> String {
        format!("{}/kafka={}", self.cluster(), self.cluster_id)
    }
}

/// CRN pattern a role binding is created on.
///
/// Cluster scoped roles bind to the cloud cluster itself. Other roles on
/// the `Cluster` resource bind to the Kafka cluster inside it. Returns
/// `None` for resource types Confluent Cloud has no CRN for.
pub fn pattern(scope: &CrnScope, binding: &RoleBinding) -> Option<String> {
    if binding.role.is_cluster_scoped() {
        return Some(scope.cluster());
    }

    let segment = match binding.resource() {
        ResourceType::Cluster => return Some(scope.kafka()),
        ResourceType::Topic => "topic",
        ResourceType::Group => "group",
        ResourceType::TransactionalId => "transactional-id",
        ResourceType::DelegationToken | ResourceType::Unknown(_) => return None,
    };

    let wildcard = match binding.pattern() {
        PatternType::Prefixed => "*",
        PatternType::Literal => "",
    };
    Some(format!(
        "{}/{segment}={}{wildcard}",
        scope.kafka(),
        binding.resource_name
    ))
}
