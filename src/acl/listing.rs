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

//! Parser for the text printed by `kafka-acls.sh --list`.
//!
//! Two layouts are understood. Kafka 2.0 and later print
//!
//! ```text
//! Current ACLs for resource `ResourcePattern(resourceType=TOPIC, name=orders, patternType=LITERAL)`:
//!     (principal=User:alice, host=*, operation=READ, permissionType=ALLOW)
//! ```
//!
//! while older brokers print
//!
//! ```text
//! Current ACLs for resource `Topic:LITERAL:orders`:
//!     User:alice has Allow permission for operations: Read from hosts: *
//! ```

use super::{AclBinding, AclError};

const RESOURCE_HEADER: &str = "Current ACLs for resource `";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Resource {
    resource_type: String,
    name: String,
    pattern_type: String,
}

pub fn parse(text: &str) -> Result<Vec<AclBinding>, AclError> {
    let mut acls = Vec::new();
    let mut current: Option<Resource> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(RESOURCE_HEADER) {
            let end = rest.find('`').ok_or_else(|| listing_err(line_no, "unterminated resource"))?;
            current = Some(parse_resource(&rest[..end]).map_err(|r| listing_err(line_no, r))?);
            continue;
        }

        let Some(resource) = current.as_ref() else {
            // kafka-acls.sh prints a banner before the first resource
            tracing::debug!("skipping line {line_no} outside of any resource block");
            continue;
        };

        let entries = if line.starts_with('(') {
            vec![parse_entry(line).map_err(|r| listing_err(line_no, r))?]
        } else if line.contains(" has ") {
            parse_legacy_entry(line).map_err(|r| listing_err(line_no, r))?
        } else {
            return Err(listing_err(line_no, "unrecognized ACL entry"));
        };

        acls.extend(entries.into_iter().map(|entry| AclBinding {
            principal: entry.principal,
            host: entry.host,
            operation: entry.operation,
            permission_type: entry.permission_type,
            resource_type: resource.resource_type.clone(),
            resource_name: resource.name.clone(),
            pattern_type: resource.pattern_type.clone(),
        }));
    }

    Ok(acls)
}

fn listing_err(line: usize, reason: impl Into<String>) -> AclError {
    AclError::Listing {
        line,
        reason: reason.into(),
    }
}

fn parse_resource(raw: &str) -> Result<Resource, String> {
    if let Some(body) = raw
        .strip_prefix("ResourcePattern(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let values = key_values(body, &["resourceType", "name", "patternType"])?;
        let [resource_type, name, pattern_type] = values;
        return Ok(Resource {
            resource_type,
            name,
            pattern_type,
        });
    }

    // legacy `Type:name` or `Type:PATTERN:name`
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ty), Some(pattern), Some(name))
            if matches!(pattern, "LITERAL" | "PREFIXED") =>
        {
            Ok(Resource {
                resource_type: ty.to_string(),
                name: name.to_string(),
                pattern_type: pattern.to_string(),
            })
        }
        (Some(ty), Some(first), rest) => {
            let name = match rest {
                Some(rest) => format!("{first}:{rest}"),
                None => first.to_string(),
            };
            Ok(Resource {
                resource_type: ty.to_string(),
                name,
                pattern_type: "LITERAL".to_string(),
            })
        }
        _ => Err(format!("cannot parse resource `{raw}`")),
    }
}

struct Entry {
    principal: String,
    host: String,
    operation: String,
    permission_type: String,
}

fn parse_entry(line: &str) -> Result<Entry, String> {
    let body = line
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| "ACL entry is not parenthesized".to_string())?;

    let [principal, host, operation, permission_type] =
        key_values(body, &["principal", "host", "operation", "permissionType"])?;

    Ok(Entry {
        principal,
        host,
        operation,
        permission_type,
    })
}

/// `User:alice has Allow permission for operations: Read,Write from hosts: *`
fn parse_legacy_entry(line: &str) -> Result<Vec<Entry>, String> {
    let (principal, rest) = line
        .split_once(" has ")
        .ok_or_else(|| "missing `has`".to_string())?;
    let (permission, rest) = rest
        .split_once(" permission for operations: ")
        .ok_or_else(|| "missing permission clause".to_string())?;
    let (operations, hosts) = rest
        .split_once(" from hosts: ")
        .ok_or_else(|| "missing hosts clause".to_string())?;

    let mut entries = Vec::new();
    for operation in operations.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        for host in hosts.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            entries.push(Entry {
                principal: principal.trim().to_string(),
                host: host.to_string(),
                operation: operation.to_string(),
                permission_type: permission.trim().to_uppercase(),
            });
        }
    }

    if entries.is_empty() {
        return Err("no operations or hosts listed".to_string());
    }
    Ok(entries)
}

/// Splits `k1=v1, k2=v2, ...` where values may themselves contain commas
/// (distinguished names do). Keys must appear in the given order.
fn key_values<const N: usize>(body: &str, keys: &[&str; N]) -> Result<[String; N], String> {
    let mut values: [String; N] = std::array::from_fn(|_| String::new());
    let mut rest = body;

    for (i, key) in keys.iter().enumerate() {
        let prefix = format!("{key}=");
        rest = rest
            .strip_prefix(&prefix)
            .ok_or_else(|| format!("expected `{key}=`"))?;

        let value_end = match keys.get(i + 1) {
            Some(next) => rest
                .find(&format!(", {next}="))
                .ok_or_else(|| format!("expected `{next}=` after `{key}`"))?,
            None => rest.len(),
        };

        values[i] = rest[..value_end].trim().to_string();
        rest = rest[value_end..].trim_start_matches(", ");
    }

    Ok(values)
}
