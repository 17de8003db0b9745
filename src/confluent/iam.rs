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

//! Service accounts and role bindings through the Confluent Cloud IAM v2 API.

use std::collections::HashMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::crn::{self, CrnScope};
use super::{check_status, ApiClient, CloudConfig, CloudError, Outcome, PushSummary};
use crate::rbac::{ConversionReport, RoleBinding, ServiceAccount};

const SERVICE_ACCOUNTS_PATH: &str = "/iam/v2/service-accounts";
const ROLE_BINDINGS_PATH: &str = "/iam/v2/role-bindings";
const PAGE_SIZE: usize = 100;

/// Placeholder id for accounts that a dry run did not create.
pub const DRY_RUN_ID_PREFIX: &str = "dry-run:";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountResource {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ListMetadata {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    metadata: Option<ListMetadata>,
}

#[derive(Debug, Serialize)]
struct CreateServiceAccount<'a> {
    display_name: &'a str,
    description: &'a str,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CreateRoleBinding {
    pub principal: String,
    pub role_name: String,
    pub crn_pattern: String,
}

/// Every service account in the organization, following `metadata.next`.
pub async fn list_service_accounts(api: &ApiClient) -> Result<Vec<ServiceAccountResource>, CloudError> {
    let mut accounts = Vec::new();
    let mut next = Some(format!(
        "{}?page_size={PAGE_SIZE}",
        api.url(SERVICE_ACCOUNTS_PATH)
    ));

    while let Some(url) = next.take() {
        let response = api.get(&url).send().await?;
        let page: ListResponse<ServiceAccountResource> =
            check_status("GET", response).await?.json().await?;

        debug!("fetched {} service accounts", page.data.len());
        accounts.extend(page.data);
        next = page
            .metadata
            .and_then(|m| m.next)
            .filter(|n| !n.is_empty());
    }
    Ok(accounts)
}

/// Creates the service accounts of `report` that do not exist yet.
///
/// Returns the display name to id map of every account the report names,
/// including the ones that already existed.
pub async fn create_service_accounts(
    config: &CloudConfig,
    report: &ConversionReport,
) -> Result<(HashMap<String, String>, PushSummary), CloudError> {
    let mut summary = PushSummary::default();
    let mut ids = HashMap::new();

    if config.dry_run {
        for account in &report.service_accounts {
            info!("[dry-run] would create service account {}", account.name);
            ids.insert(
                account.name.clone(),
                format!("{DRY_RUN_ID_PREFIX}{}", account.name),
            );
            summary.record(Outcome::Skipped);
        }
        return Ok((ids, summary));
    }

    let api = config.iam_api()?;
    let existing: HashMap<String, String> = list_service_accounts(&api)
        .await?
        .into_iter()
        .map(|sa| (sa.display_name, sa.id))
        .collect();

    for account in &report.service_accounts {
        if let Some(id) = existing.get(&account.name) {
            debug!("service account {} already exists as {id}", account.name);
            ids.insert(account.name.clone(), id.clone());
            summary.record(Outcome::Existing);
            continue;
        }

        match create_service_account(&api, account).await {
            Ok(created) => {
                info!("created service account {} ({})", account.name, created.id);
                ids.insert(account.name.clone(), created.id);
                summary.record(Outcome::Created);
            }
            Err(err) => summary.record_result(&account.name, Err(err)),
        }
    }

    Ok((ids, summary))
}

async fn create_service_account(
    api: &ApiClient,
    account: &ServiceAccount,
) -> Result<ServiceAccountResource, CloudError> {
    let body = CreateServiceAccount {
        display_name: &account.name,
        description: &account.description,
    };
    let response = api
        .post(&api.url(SERVICE_ACCOUNTS_PATH))
        .json(&body)
        .send()
        .await?;
    Ok(check_status("POST", response).await?.json().await?)
}

/// Name to id map for the accounts `report` names, for binding roles
/// without creating accounts first.
pub async fn service_account_ids(
    config: &CloudConfig,
    report: &ConversionReport,
) -> Result<HashMap<String, String>, CloudError> {
    if config.dry_run {
        return Ok(report
            .service_accounts
            .iter()
            .map(|a| (a.name.clone(), format!("{DRY_RUN_ID_PREFIX}{}", a.name)))
            .collect());
    }

    let api = config.iam_api()?;
    let wanted: Vec<&str> = report.service_accounts.iter().map(|a| a.name.as_str()).collect();
    Ok(list_service_accounts(&api)
        .await?
        .into_iter()
        .filter(|sa| wanted.contains(&sa.display_name.as_str()))
        .map(|sa| (sa.display_name, sa.id))
        .collect())
}

/// Request body for `binding`, with the principal rewritten to the service
/// account id Confluent Cloud assigned.
pub fn role_binding_request(
    scope: &CrnScope,
    binding: &RoleBinding,
    service_account_id: &str,
) -> Option<CreateRoleBinding> {
    Some(CreateRoleBinding {
        principal: format!("User:{service_account_id}"),
        role_name: binding.role.cloud_name().to_string(),
        crn_pattern: crn::pattern(scope, binding)?,
    })
}

/// Creates the role bindings of `report`. `ids` maps service account
/// names to their Confluent Cloud ids; bindings whose account is missing
/// from it are skipped.
pub async fn create_role_bindings(
    config: &CloudConfig,
    report: &ConversionReport,
    ids: &HashMap<String, String>,
) -> Result<PushSummary, CloudError> {
    let scope = config.crn_scope()?;
    let api = if config.dry_run {
        None
    } else {
        Some(config.iam_api()?)
    };

    let mut summary = PushSummary::default();
    for binding in &report.role_bindings {
        let Some(id) = ids.get(&binding.service_account) else {
            warn!(
                "no service account id for {}, skipping {} binding on {}",
                binding.service_account, binding.role, binding.resource_name
            );
            summary.record(Outcome::Skipped);
            continue;
        };
        let Some(request) = role_binding_request(&scope, binding, id) else {
            warn!(
                "no CRN for resource type {}, skipping binding for {}",
                binding.resource_type, binding.service_account
            );
            summary.record(Outcome::Skipped);
            continue;
        };

        let Some(api) = &api else {
            info!(
                "[dry-run] would bind {} to {} on {}",
                request.principal, request.role_name, request.crn_pattern
            );
            summary.record(Outcome::Skipped);
            continue;
        };

        let item = format!("{} {}", request.role_name, request.crn_pattern);
        summary.record_result(&item, create_role_binding(api, &request).await);
    }

    info!(
        "role bindings: {} created, {} existing, {} skipped, {} failed",
        summary.created, summary.existing, summary.skipped, summary.failed
    );
    Ok(summary)
}

async fn create_role_binding(
    api: &ApiClient,
    request: &CreateRoleBinding,
) -> Result<Outcome, CloudError> {
    let response = api
        .post(&api.url(ROLE_BINDINGS_PATH))
        .json(request)
        .send()
        .await?;

    if response.status() == StatusCode::CONFLICT {
        debug!(
            "role binding {} on {} already exists",
            request.role_name, request.crn_pattern
        );
        return Ok(Outcome::Existing);
    }
    check_status("POST", response).await?;
    Ok(Outcome::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confluent::test_server::TestServer;
    use crate::rbac::role::Role;

    fn scope() -> CrnScope {
        CrnScope {
            organization_id: "org-1".into(),
            environment_id: "env-abc".into(),
            cluster_id: "lkc-123".into(),
        }
    }

    fn admin_binding() -> RoleBinding {
        RoleBinding {
            principal: "User:ops".into(),
            role: Role::ClusterAdmin,
            resource_type: "Cluster".into(),
            resource_name: "kafka-cluster".into(),
            pattern_type: "LITERAL".into(),
            service_account: "ops".into(),
            source_principal: "User:CN=ops,O=corp".into(),
        }
    }

    #[test]
    fn role_binding_uses_account_id_and_cloud_role_name() {
        let request = role_binding_request(&scope(), &admin_binding(), "sa-9xy").unwrap();
        assert_eq!(
            request,
            CreateRoleBinding {
                principal: "User:sa-9xy".into(),
                role_name: "CloudClusterAdmin".into(),
                crn_pattern:
                    "crn://confluent.cloud/organization=org-1/environment=env-abc/cloud-cluster=lkc-123"
                        .into(),
            }
        );
    }

    #[test]
    fn list_page_parses_next_link() {
        let page: ListResponse<ServiceAccountResource> = serde_json::from_str(
            r#"{
                "api_version": "iam/v2",
                "kind": "ServiceAccountList",
                "metadata": {"next": "https://api.confluent.cloud/iam/v2/service-accounts?page_token=abc"},
                "data": [{"id": "sa-1", "display_name": "orders-app", "description": "x"}]
            }"#,
        )
        .unwrap();
        assert_eq!(page.data[0].display_name, "orders-app");
        assert!(page.metadata.unwrap().next.unwrap().ends_with("page_token=abc"));
    }

    #[tokio::test]
    async fn dry_run_sends_nothing() {
        let config = CloudConfig {
            dry_run: true,
            organization_id: Some("org-1".into()),
            environment_id: Some("env-abc".into()),
            cluster_id: Some("lkc-123".into()),
            ..Default::default()
        };
        let report = crate::rbac::convert(&[crate::acl::AclBinding {
            principal: "User:ops".into(),
            host: "*".into(),
            operation: "ALL".into(),
            permission_type: "ALLOW".into(),
            resource_type: "CLUSTER".into(),
            resource_name: "kafka-cluster".into(),
            pattern_type: "LITERAL".into(),
        }]);

        let (ids, accounts) = create_service_accounts(&config, &report).await.unwrap();
        assert_eq!(ids["ops"], "dry-run:ops");
        assert_eq!(accounts.skipped, 1);

        let bindings = create_role_bindings(&config, &report, &ids).await.unwrap();
        assert_eq!(bindings.skipped, 1);
        assert_eq!(bindings.created, 0);
    }

    fn account(name: &str) -> ServiceAccount {
        ServiceAccount {
            name: name.into(),
            description: format!("Migrated from MSK principal User:{name}"),
            source_principals: vec![format!("User:{name}")],
        }
    }

    fn binding_for(account: &str) -> RoleBinding {
        RoleBinding {
            service_account: account.into(),
            principal: format!("User:{account}"),
            source_principal: format!("User:{account}"),
            ..admin_binding()
        }
    }

    fn iam_server() -> TestServer {
        TestServer::start(|req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/iam/v2/service-accounts?page_size=100") => (
                200,
                format!(
                    r#"{{"metadata":{{"next":"{}/iam/v2/service-accounts?page_token=2"}},
                        "data":[{{"id":"sa-1","display_name":"ops"}}]}}"#,
                    req.base
                ),
            ),
            ("GET", "/iam/v2/service-accounts?page_token=2") => (
                200,
                r#"{"metadata":{"next":null},"data":[{"id":"sa-2","display_name":"orders-app"}]}"#
                    .into(),
            ),
            ("POST", "/iam/v2/service-accounts") => (
                201,
                r#"{"id":"sa-3","display_name":"billing","description":""}"#.into(),
            ),
            ("POST", "/iam/v2/role-bindings") if req.body.contains("User:sa-2") => {
                (409, r#"{"errors":[{"status":"409"}]}"#.into())
            }
            ("POST", "/iam/v2/role-bindings") if req.body.contains("User:sa-3") => {
                (500, r#"{"errors":[{"status":"500"}]}"#.into())
            }
            ("POST", "/iam/v2/role-bindings") => (201, r#"{"id":"rb-1"}"#.into()),
            _ => (404, "{}".into()),
        })
    }

    #[tokio::test]
    async fn accounts_on_later_pages_count_as_existing() {
        let server = iam_server();
        let report = ConversionReport {
            service_accounts: vec![account("ops"), account("orders-app"), account("billing")],
            ..Default::default()
        };

        let (ids, summary) = create_service_accounts(&server.cloud_config(), &report)
            .await
            .unwrap();

        assert_eq!(summary.existing, 2);
        assert_eq!(summary.created, 1);
        assert_eq!(ids["ops"], "sa-1");
        assert_eq!(ids["orders-app"], "sa-2");
        assert_eq!(ids["billing"], "sa-3");
        assert_eq!(
            server.lines(),
            [
                "GET /iam/v2/service-accounts",
                "GET /iam/v2/service-accounts",
                "POST /iam/v2/service-accounts",
            ]
        );
        let created: serde_json::Value =
            serde_json::from_str(&server.requests()[2].body).unwrap();
        assert_eq!(created["display_name"], "billing");
    }

    #[tokio::test]
    async fn binding_conflict_counts_as_existing() {
        let server = iam_server();
        let report = ConversionReport {
            role_bindings: vec![
                binding_for("ops"),
                binding_for("orders-app"),
                binding_for("billing"),
                binding_for("ghost"),
            ],
            ..Default::default()
        };
        let ids = HashMap::from([
            ("ops".to_string(), "sa-1".to_string()),
            ("orders-app".to_string(), "sa-2".to_string()),
            ("billing".to_string(), "sa-3".to_string()),
        ]);

        let summary = create_role_bindings(&server.cloud_config(), &report, &ids)
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.existing, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        let first: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(first["principal"], "User:sa-1");
        assert_eq!(first["role_name"], "CloudClusterAdmin");
        assert_eq!(
            first["crn_pattern"],
            "crn://confluent.cloud/organization=org-1/environment=env-1/cloud-cluster=lkc-1"
        );
    }

    #[tokio::test]
    async fn ids_are_looked_up_across_pages() {
        let server = iam_server();
        let report = ConversionReport {
            service_accounts: vec![account("orders-app"), account("billing")],
            ..Default::default()
        };

        let ids = service_account_ids(&server.cloud_config(), &report)
            .await
            .unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(ids["orders-app"], "sa-2");
    }
}
