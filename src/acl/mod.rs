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

//! Kafka ACL bindings as exported from an MSK cluster.
//!
//! Bindings are kept as plain strings so that an export round trips
//! untouched. The typed views ([`Operation`], [`ResourceType`],
//! [`PatternType`], [`PermissionType`]) are derived on demand and are
//! lenient about spelling, since exports come from several tools.

pub mod listing;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::json::{self, JsonFileError};

pub const EXPORT_SOURCE: &str = "msk";

#[derive(Debug, thiserror::Error)]
pub enum AclError {
    #[error(transparent)]
    File(#[from] JsonFileError),
    #[error("failed to read ACL listing `{}`: {source}", path.display())]
    ReadListing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Listing { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclBinding {
    pub principal: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub operation: String,
    pub permission_type: String,
    pub resource_type: String,
    pub resource_name: String,
    #[serde(default = "default_pattern_type")]
    pub pattern_type: String,
}

fn default_host() -> String {
    "*".to_string()
}

fn default_pattern_type() -> String {
    "LITERAL".to_string()
}

impl AclBinding {
    pub fn operation(&self) -> Operation {
        Operation::parse(&self.operation)
    }

    pub fn resource_type(&self) -> ResourceType {
        ResourceType::parse(&self.resource_type)
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::parse(&self.pattern_type)
    }

    pub fn permission_type(&self) -> PermissionType {
        PermissionType::parse(&self.permission_type)
    }
}

/// Normalizes `DESCRIBE_CONFIGS`, `DescribeConfigs` and `describe-configs`
/// to the same key.
fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
    Unknown(String),
}

impl Operation {
    pub fn parse(value: &str) -> Self {
        match squash(value).as_str() {
            "all" => Operation::All,
            "read" => Operation::Read,
            "write" => Operation::Write,
            "create" => Operation::Create,
            "delete" => Operation::Delete,
            "alter" => Operation::Alter,
            "describe" => Operation::Describe,
            "clusteraction" => Operation::ClusterAction,
            "describeconfigs" => Operation::DescribeConfigs,
            "alterconfigs" => Operation::AlterConfigs,
            "idempotentwrite" => Operation::IdempotentWrite,
            _ => Operation::Unknown(value.trim().to_string()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::All => write!(f, "ALL"),
            Operation::Read => write!(f, "READ"),
            Operation::Write => write!(f, "WRITE"),
            Operation::Create => write!(f, "CREATE"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::Alter => write!(f, "ALTER"),
            Operation::Describe => write!(f, "DESCRIBE"),
            Operation::ClusterAction => write!(f, "CLUSTER_ACTION"),
            Operation::DescribeConfigs => write!(f, "DESCRIBE_CONFIGS"),
            Operation::AlterConfigs => write!(f, "ALTER_CONFIGS"),
            Operation::IdempotentWrite => write!(f, "IDEMPOTENT_WRITE"),
            Operation::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Topic,
    Group,
    Cluster,
    TransactionalId,
    DelegationToken,
    Unknown(String),
}

impl ResourceType {
    pub fn parse(value: &str) -> Self {
        match squash(value).as_str() {
            "topic" => ResourceType::Topic,
            "group" | "consumergroup" => ResourceType::Group,
            "cluster" | "kafkacluster" => ResourceType::Cluster,
            "transactionalid" => ResourceType::TransactionalId,
            "delegationtoken" => ResourceType::DelegationToken,
            _ => ResourceType::Unknown(value.trim().to_string()),
        }
    }

    /// Whether Confluent Cloud role bindings can be scoped to this resource.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            ResourceType::Topic
                | ResourceType::Group
                | ResourceType::Cluster
                | ResourceType::TransactionalId
        )
    }
}

// Confluent Cloud spelling
impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Topic => write!(f, "Topic"),
            ResourceType::Group => write!(f, "Group"),
            ResourceType::Cluster => write!(f, "Cluster"),
            ResourceType::TransactionalId => write!(f, "TransactionalId"),
            ResourceType::DelegationToken => write!(f, "DelegationToken"),
            ResourceType::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    Literal,
    Prefixed,
}

impl PatternType {
    /// `MATCH`, `ANY` and unknown values fall back to [`PatternType::Literal`].
    pub fn parse(value: &str) -> Self {
        if squash(value) == "prefixed" {
            PatternType::Prefixed
        } else {
            PatternType::Literal
        }
    }

    pub fn is_exact(value: &str) -> bool {
        matches!(squash(value).as_str(), "literal" | "prefixed")
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Literal => write!(f, "LITERAL"),
            PatternType::Prefixed => write!(f, "PREFIXED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionType {
    Allow,
    Deny,
    Unknown,
}

impl PermissionType {
    pub fn parse(value: &str) -> Self {
        match squash(value).as_str() {
            "allow" => PermissionType::Allow,
            "deny" => PermissionType::Deny,
            _ => PermissionType::Unknown,
        }
    }
}

/// On-disk shape of an ACL export.
///
/// Older exports are a bare array of bindings, newer ones wrap them in an
/// object together with some provenance.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AclExportFile {
    Wrapped { acls: Vec<AclBinding> },
    Bare(Vec<AclBinding>),
}

#[derive(Debug, Serialize)]
struct AclExport<'a> {
    source: &'static str,
    exported_at: DateTime<Utc>,
    acl_count: usize,
    acls: &'a [AclBinding],
}

pub fn read_export(path: &Path) -> Result<Vec<AclBinding>, AclError> {
    Ok(match json::read::<AclExportFile>(path)? {
        AclExportFile::Wrapped { acls } => acls,
        AclExportFile::Bare(acls) => acls,
    })
}

pub fn write_export(path: &Path, acls: &[AclBinding]) -> Result<(), AclError> {
    let export = AclExport {
        source: EXPORT_SOURCE,
        exported_at: Utc::now(),
        acl_count: acls.len(),
        acls,
    };
    json::write_pretty(path, &export)?;
    Ok(())
}

/// Reads the saved output of `kafka-acls.sh --list`.
pub fn read_listing(path: &Path) -> Result<Vec<AclBinding>, AclError> {
    let text = fs::read_to_string(path).map_err(|source| AclError::ReadListing {
        path: path.to_path_buf(),
        source,
    })?;
    listing::parse(&text)
}

/// Shape of an ACL file on disk.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AclFormat {
    /// JSON export, either bare or wrapped in `{"acls": [...]}`
    #[default]
    Json,
    /// Saved output of `kafka-acls.sh --list`
    Listing,
}

impl AclFormat {
    pub fn load(&self, path: &Path) -> Result<Vec<AclBinding>, AclError> {
        match self {
            AclFormat::Json => read_export(path),
            AclFormat::Listing => read_listing(path),
        }
    }
}
