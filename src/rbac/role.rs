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

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::acl::{Operation, ResourceType};

/// Confluent Cloud roles an MSK ACL can translate to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    DeveloperRead,
    DeveloperWrite,
    DeveloperManage,
    ResourceOwner,
    ClusterAdmin,
}

impl Role {
    /// Name of the role in the Confluent Cloud IAM API.
    pub fn cloud_name(&self) -> &'static str {
        match self {
            Role::DeveloperRead => "DeveloperRead",
            Role::DeveloperWrite => "DeveloperWrite",
            Role::DeveloperManage => "DeveloperManage",
            Role::ResourceOwner => "ResourceOwner",
            Role::ClusterAdmin => "CloudClusterAdmin",
        }
    }

    /// Cluster scoped roles bind to the cluster itself rather than to a
    /// resource inside it.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, Role::ClusterAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::DeveloperRead => "DeveloperRead",
            Role::DeveloperWrite => "DeveloperWrite",
            Role::DeveloperManage => "DeveloperManage",
            Role::ResourceOwner => "ResourceOwner",
            Role::ClusterAdmin => "ClusterAdmin",
        };
        write!(f, "{name}")
    }
}

/// Role granted for `operation` on a resource of `resource_type`.
///
/// Resource specific overrides are consulted before the operation table.
/// `None` means the ACL has no RBAC equivalent.
pub fn map(resource_type: &ResourceType, operation: &Operation) -> Option<Role> {
    if !resource_type.is_supported() {
        return None;
    }

    let role = match (resource_type, operation) {
        (ResourceType::Topic, Operation::All) => Role::ResourceOwner,
        (ResourceType::Topic, Operation::Describe | Operation::DescribeConfigs) => {
            Role::DeveloperRead
        }

        (ResourceType::Group, Operation::Read | Operation::Describe) => Role::DeveloperRead,
        (ResourceType::Group, Operation::Delete | Operation::All) => Role::ResourceOwner,

        (
            ResourceType::Cluster,
            Operation::All | Operation::Alter | Operation::AlterConfigs | Operation::ClusterAction,
        ) => Role::ClusterAdmin,
        (ResourceType::Cluster, Operation::Create) => Role::DeveloperManage,

        (_, operation) => return operation_role(operation),
    };

    Some(role)
}

fn operation_role(operation: &Operation) -> Option<Role> {
    match operation {
        Operation::Read | Operation::Describe | Operation::DescribeConfigs => {
            Some(Role::DeveloperRead)
        }
        Operation::Write | Operation::IdempotentWrite => Some(Role::DeveloperWrite),
        Operation::Create | Operation::Delete | Operation::Alter | Operation::AlterConfigs => {
            Some(Role::DeveloperManage)
        }
        Operation::ClusterAction => Some(Role::ClusterAdmin),
        Operation::All => Some(Role::ResourceOwner),
        Operation::Unknown(_) => None,
    }
}
