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

//! Kafka principal handling.

const MAX_SERVICE_ACCOUNT_NAME: usize = 64;
const UNNAMED_SERVICE_ACCOUNT: &str = "sa-unnamed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub kind: String,
    pub name: String,
}

impl Principal {
    /// `Group:*` cannot be expressed as a Confluent Cloud role binding.
    pub fn is_wildcard_group(&self) -> bool {
        self.kind.eq_ignore_ascii_case("group") && self.name == "*"
    }
}

/// Splits `User:alice` into its type and name. A principal without a type
/// prefix is taken to be a user.
pub fn parse(raw: &str) -> Principal {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((kind, name)) if is_principal_kind(kind) => Principal {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        _ => Principal {
            kind: "User".to_string(),
            name: raw.to_string(),
        },
    }
}

fn is_principal_kind(kind: &str) -> bool {
    !kind.is_empty()
        && !kind.eq_ignore_ascii_case("arn")
        && kind.chars().all(|c| c.is_ascii_alphabetic())
}

/// Identity behind a principal, as it should be named on Confluent Cloud.
///
/// Handles plain names, mTLS distinguished names (the CN is used) and AWS
/// IAM role or user ARNs (the role or user name is used). Returns `None`
/// for wildcard principals and empty names.
pub fn extract(raw: &str) -> Option<String> {
    let principal = parse(raw);
    let name = principal.name.trim();

    if name.is_empty() || name == "*" {
        return None;
    }

    if name.starts_with("arn:") {
        return iam_name(name);
    }

    if let Some(cn) = common_name(name) {
        return Some(cn);
    }

    Some(name.to_string())
}

/// `CN=client1,OU=eng,O=corp` -> `client1`
fn common_name(dn: &str) -> Option<String> {
    if !dn.contains('=') {
        return None;
    }

    dn.split(',')
        .filter_map(|rdn| rdn.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("cn"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `arn:aws:iam::123:role/path/app-role` -> `app-role`
/// `arn:aws:sts::123:assumed-role/app-role/session` -> `app-role`
fn iam_name(arn: &str) -> Option<String> {
    // arn:partition:service:region:account:resource
    let resource = arn.splitn(6, ':').nth(5)?;
    let mut segments = resource.split('/').filter(|s| !s.is_empty());
    let kind = segments.next()?;
    let rest: Vec<&str> = segments.collect();

    let name = match kind {
        "assumed-role" => rest.first(),
        _ => rest.last(),
    };

    name.map(|n| n.to_string())
        .or_else(|| Some(kind.to_string()))
        .filter(|n| !n.is_empty())
}

/// Restricts a service account name to `[a-z0-9-]`.
pub fn sanitize(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && sanitized.ends_with('-') {
            continue;
        }
        sanitized.push(c);
    }

    let trimmed = sanitized.trim_matches('-');
    let truncated: String = trimmed.chars().take(MAX_SERVICE_ACCOUNT_NAME).collect();
    let truncated = truncated.trim_end_matches('-');

    if truncated.is_empty() {
        UNNAMED_SERVICE_ACCOUNT.to_string()
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("User:alice", Some("alice"))]
    #[case("alice", Some("alice"))]
    #[case("User:CN=client1,OU=eng,O=corp", Some("client1"))]
    #[case("User:O=corp,CN=late-cn", Some("late-cn"))]
    #[case("User:arn:aws:iam::123456789012:role/app-role", Some("app-role"))]
    #[case("User:arn:aws:iam::123456789012:role/team/app-role", Some("app-role"))]
    #[case("User:arn:aws:sts::123456789012:assumed-role/app-role/i-0abc", Some("app-role"))]
    #[case("User:arn:aws:iam::123456789012:user/deployer", Some("deployer"))]
    #[case("Group:analytics", Some("analytics"))]
    #[case("User:*", None)]
    #[case("User:", None)]
    fn extracts_identity(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract(raw).as_deref(), expected);
    }

    #[test]
    fn detects_wildcard_group() {
        assert!(parse("Group:*").is_wildcard_group());
        assert!(parse("GROUP:*").is_wildcard_group());
        assert!(!parse("Group:analytics").is_wildcard_group());
        assert!(!parse("User:*").is_wildcard_group());
    }

    #[test]
    fn arn_without_type_prefix_is_a_user() {
        let principal = parse("arn:aws:iam::1:role/x");
        assert_eq!(principal.kind, "User");
        assert_eq!(principal.name, "arn:aws:iam::1:role/x");
    }

    #[rstest]
    #[case("Alice", "alice")]
    #[case("svc.orders_writer", "svc-orders-writer")]
    #[case("--weird__name--", "weird-name")]
    #[case("a  b", "a-b")]
    #[case("Ünïcode", "n-code")]
    #[case("___", "sa-unnamed")]
    #[case("", "sa-unnamed")]
    fn sanitizes_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize(raw), expected);
    }

    #[test]
    fn sanitized_names_fit_display_name_limit() {
        let long = format!("{}-{}", "a".repeat(63), "tail");
        let name = sanitize(&long);
        assert_eq!(name.len(), 63);
        assert!(!name.ends_with('-'));
    }
}
