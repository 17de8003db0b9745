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

//! Translation of MSK ACLs into Confluent Cloud role bindings.

pub mod principal;
pub mod role;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::about;
use crate::acl::{self, AclBinding, AclError, PatternType, PermissionType, ResourceType};
use crate::utils::json::{self, JsonFileError};

use self::role::Role;

/// Resource name Confluent Cloud uses for cluster scoped bindings.
pub const CLUSTER_RESOURCE_NAME: &str = "kafka-cluster";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    /// `User:<service account name>`
    pub principal: String,
    pub role: Role,
    pub resource_type: String,
    pub resource_name: String,
    pub pattern_type: String,
    pub service_account: String,
    pub source_principal: String,
}

impl RoleBinding {
    fn key(&self) -> (String, Role, String, String, String) {
        (
            self.principal.clone(),
            self.role,
            self.resource_type.clone(),
            self.resource_name.clone(),
            self.pattern_type.clone(),
        )
    }

    pub fn pattern(&self) -> PatternType {
        PatternType::parse(&self.pattern_type)
    }

    pub fn resource(&self) -> ResourceType {
        ResourceType::parse(&self.resource_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub name: String,
    pub description: String,
    pub source_principals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionMetadata {
    pub source: String,
    #[serde(default)]
    pub tool_version: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub total_acls: usize,
    pub converted_acls: usize,
    pub skipped_deny: usize,
    pub skipped_wildcard_group: usize,
    pub skipped_unsupported: usize,
    pub role_bindings: usize,
    pub service_accounts: usize,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub role_bindings: Vec<RoleBinding>,
    pub service_accounts: Vec<ServiceAccount>,
    pub conversion_metadata: ConversionMetadata,
}

impl ConversionReport {
    pub fn read(path: &Path) -> Result<Self, JsonFileError> {
        json::read(path)
    }

    pub fn write(&self, path: &Path) -> Result<(), JsonFileError> {
        json::write_pretty(path, self)
    }
}

/// Accumulates notes without repeating the same one.
#[derive(Default)]
struct Notes {
    seen: HashSet<String>,
    notes: Vec<String>,
}

impl Notes {
    fn push(&mut self, note: String) {
        if self.seen.insert(note.clone()) {
            self.notes.push(note);
        }
    }
}

/// Converts ACL bindings into role bindings and service accounts.
///
/// DENY and `Group:*` entries are dropped, everything else goes through
/// [`role::map`]. Role bindings are unique on principal, role and resource
/// pattern; service accounts are unique on their sanitized name. Output
/// order follows first occurrence in `acls`.
pub fn convert(acls: &[AclBinding]) -> ConversionReport {
    let mut meta = ConversionMetadata {
        source: crate::acl::EXPORT_SOURCE.to_string(),
        tool_version: about::version_string(),
        generated_at: Some(Utc::now()),
        total_acls: acls.len(),
        ..Default::default()
    };
    let mut notes = Notes::default();

    let mut role_bindings: Vec<RoleBinding> = Vec::new();
    let mut binding_keys = HashSet::new();
    let mut service_accounts: Vec<ServiceAccount> = Vec::new();
    let mut account_index: HashMap<String, usize> = HashMap::new();

    for acl in acls {
        match acl.permission_type() {
            PermissionType::Allow => {}
            PermissionType::Deny => {
                meta.skipped_deny += 1;
                continue;
            }
            PermissionType::Unknown => {
                meta.skipped_unsupported += 1;
                notes.push(format!(
                    "skipped ACL for {} with unknown permission type `{}`",
                    acl.principal, acl.permission_type
                ));
                continue;
            }
        }

        let parsed = principal::parse(&acl.principal);
        if parsed.is_wildcard_group() {
            meta.skipped_wildcard_group += 1;
            continue;
        }

        let Some(identity) = principal::extract(&acl.principal) else {
            meta.skipped_unsupported += 1;
            notes.push(format!(
                "skipped ACL for principal `{}`: wildcard or empty principals have no service account",
                acl.principal
            ));
            continue;
        };

        let resource_type = acl.resource_type();
        let operation = acl.operation();
        let Some(role) = role::map(&resource_type, &operation) else {
            meta.skipped_unsupported += 1;
            notes.push(format!(
                "skipped {} {} on {}:{}: no Confluent Cloud role equivalent",
                acl.principal, acl.operation, acl.resource_type, acl.resource_name
            ));
            continue;
        };

        if !PatternType::is_exact(&acl.pattern_type) {
            notes.push(format!(
                "pattern type `{}` on {}:{} treated as LITERAL",
                acl.pattern_type, acl.resource_type, acl.resource_name
            ));
        }
        if acl.host.trim() != "*" {
            notes.push(format!(
                "host restriction `{}` for {} dropped: role bindings are not host scoped",
                acl.host, acl.principal
            ));
        }

        let account_name = principal::sanitize(&identity);
        match account_index.get(&account_name) {
            Some(&idx) => {
                let account = &mut service_accounts[idx];
                if !account.source_principals.contains(&acl.principal) {
                    notes.push(format!(
                        "principals {} and {} share service account `{}`",
                        account.source_principals[0], acl.principal, account_name
                    ));
                    account.source_principals.push(acl.principal.clone());
                }
            }
            None => {
                account_index.insert(account_name.clone(), service_accounts.len());
                service_accounts.push(ServiceAccount {
                    name: account_name.clone(),
                    description: format!("Migrated from MSK principal {}", acl.principal),
                    source_principals: vec![acl.principal.clone()],
                });
            }
        }

        let binding = if role.is_cluster_scoped() {
            RoleBinding {
                principal: format!("User:{account_name}"),
                role,
                resource_type: ResourceType::Cluster.to_string(),
                resource_name: CLUSTER_RESOURCE_NAME.to_string(),
                pattern_type: PatternType::Literal.to_string(),
                service_account: account_name,
                source_principal: acl.principal.clone(),
            }
        } else {
            RoleBinding {
                principal: format!("User:{account_name}"),
                role,
                resource_type: resource_type.to_string(),
                resource_name: acl.resource_name.clone(),
                pattern_type: acl.pattern_type().to_string(),
                service_account: account_name,
                source_principal: acl.principal.clone(),
            }
        };

        meta.converted_acls += 1;
        if binding_keys.insert(binding.key()) {
            role_bindings.push(binding);
        } else {
            debug!(
                "duplicate role binding {} {} on {}:{}",
                binding.principal, binding.role, binding.resource_type, binding.resource_name
            );
        }
    }

    if meta.skipped_deny > 0 {
        notes.push(format!(
            "{} DENY ACLs skipped: Confluent Cloud RBAC only grants permissions",
            meta.skipped_deny
        ));
    }
    if meta.skipped_wildcard_group > 0 {
        notes.push(format!(
            "{} Group:* ACLs skipped: wildcard group principals are not allowed",
            meta.skipped_wildcard_group
        ));
    }

    meta.role_bindings = role_bindings.len();
    meta.service_accounts = service_accounts.len();
    meta.notes = notes.notes;

    ConversionReport {
        role_bindings,
        service_accounts,
        conversion_metadata: meta,
    }
}

/// Reads an ACL export from `input`, converts it and writes the report to
/// `output`.
pub fn convert_file(input: &Path, output: &Path) -> Result<ConversionReport, AclError> {
    let acls = acl::read_export(input)?;
    info!("read {} ACLs from {}", acls.len(), input.display());
    Ok(convert_to_file(&acls, output)?)
}

/// Converts `acls` and writes the report to `output`.
pub fn convert_to_file(
    acls: &[AclBinding],
    output: &Path,
) -> Result<ConversionReport, JsonFileError> {
    let report = convert(acls);
    report.write(output)?;

    let meta = &report.conversion_metadata;
    info!(
        "converted {}/{} ACLs into {} role bindings for {} service accounts",
        meta.converted_acls, meta.total_acls, meta.role_bindings, meta.service_accounts
    );
    for note in &meta.notes {
        warn!("{note}");
    }

    Ok(report)
}
