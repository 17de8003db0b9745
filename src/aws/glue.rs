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

use aws_config::SdkConfig;
use aws_sdk_glue::types::{RegistryId, SchemaId, SchemaVersionNumber};
use aws_sdk_glue::Client;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AwsError;
use crate::utils::json;

#[derive(Debug, Clone, Default, Args)]
pub struct GlueArgs {
    #[arg(
        long = "glue-registries",
        env = "AWS_GLUE_REGISTRIES",
        value_delimiter = ',',
        required = false,
        help = "Glue registries to read (comma separated, default all)"
    )]
    pub registries: Vec<String>,

    #[arg(
        long = "glue-all-versions",
        env = "AWS_GLUE_ALL_VERSIONS",
        default_value_t = false,
        help = "Read every schema version instead of only the latest"
    )]
    pub all_versions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub version_number: i64,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlueSchema {
    pub registry: String,
    pub schema_name: String,
    /// AVRO, JSON or PROTOBUF
    pub data_format: String,
    pub compatibility: String,
    /// Ascending by version number.
    pub versions: Vec<SchemaVersion>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SchemaExport {
    pub exported_at: Option<DateTime<Utc>>,
    pub schemas: Vec<GlueSchema>,
}

impl SchemaExport {
    pub fn new(schemas: Vec<GlueSchema>) -> Self {
        Self {
            exported_at: Some(Utc::now()),
            schemas,
        }
    }

    pub fn read(path: &Path) -> Result<Self, AwsError> {
        Ok(json::read(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), AwsError> {
        json::write_pretty(path, self)?;
        Ok(())
    }
}

/// Reads schemas out of the Glue registries selected by `args`.
///
/// A schema that fails to load is logged and left out; listing failures
/// abort since nothing useful can be produced without them.
pub async fn extract(config: &SdkConfig, args: &GlueArgs) -> Result<Vec<GlueSchema>, AwsError> {
    let client = Client::new(config);

    let registries = if args.registries.is_empty() {
        list_registries(&client).await?
    } else {
        args.registries.clone()
    };

    let mut schemas = Vec::new();
    for registry in &registries {
        let listed = list_schemas(&client, registry).await?;
        debug!("registry {registry} has {} schemas", listed.len());

        for (name, arn) in listed {
            match read_schema(&client, registry, &name, &arn, args.all_versions).await {
                Ok(schema) => schemas.push(schema),
                Err(err) => warn!("skipping schema {registry}/{name}: {err}"),
            }
        }
    }

    info!(
        "read {} schemas from {} Glue registries",
        schemas.len(),
        registries.len()
    );
    Ok(schemas)
}

async fn list_registries(client: &Client) -> Result<Vec<String>, AwsError> {
    let mut names = Vec::new();
    let mut next_token = None;
    loop {
        let page = client
            .list_registries()
            .set_next_token(next_token)
            .send()
            .await
            .map_err(aws_sdk_glue::Error::from)?;

        names.extend(
            page.registries()
                .iter()
                .filter_map(|r| r.registry_name().map(str::to_string)),
        );

        next_token = page.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }
    Ok(names)
}

/// `(schema name, schema arn)` pairs of one registry.
async fn list_schemas(client: &Client, registry: &str) -> Result<Vec<(String, String)>, AwsError> {
    let registry_id = RegistryId::builder().registry_name(registry).build();
    let mut schemas = Vec::new();
    let mut next_token = None;
    loop {
        let page = client
            .list_schemas()
            .registry_id(registry_id.clone())
            .set_next_token(next_token)
            .send()
            .await
            .map_err(aws_sdk_glue::Error::from)?;

        schemas.extend(page.schemas().iter().filter_map(|s| {
            Some((s.schema_name()?.to_string(), s.schema_arn()?.to_string()))
        }));

        next_token = page.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }
    Ok(schemas)
}

async fn read_schema(
    client: &Client,
    registry: &str,
    name: &str,
    arn: &str,
    all_versions: bool,
) -> Result<GlueSchema, AwsError> {
    let schema_id = SchemaId::builder().schema_arn(arn).build();
    let schema = client
        .get_schema()
        .schema_id(schema_id.clone())
        .send()
        .await
        .map_err(aws_sdk_glue::Error::from)?;

    let numbers = if all_versions {
        list_version_numbers(client, &schema_id).await?
    } else {
        vec![]
    };

    let mut versions = Vec::new();
    if numbers.is_empty() {
        let selector = SchemaVersionNumber::builder().latest_version(true).build();
        versions.push(read_version(client, &schema_id, selector, name).await?);
    } else {
        for number in numbers {
            let selector = SchemaVersionNumber::builder().version_number(number).build();
            versions.push(read_version(client, &schema_id, selector, name).await?);
        }
    }
    versions.sort_by_key(|v| v.version_number);

    Ok(GlueSchema {
        registry: registry.to_string(),
        schema_name: name.to_string(),
        data_format: schema
            .data_format()
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| "AVRO".to_string()),
        compatibility: schema
            .compatibility()
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| "BACKWARD".to_string()),
        versions,
    })
}

async fn list_version_numbers(client: &Client, schema_id: &SchemaId) -> Result<Vec<i64>, AwsError> {
    let mut numbers = Vec::new();
    let mut next_token = None;
    loop {
        let page = client
            .list_schema_versions()
            .schema_id(schema_id.clone())
            .set_next_token(next_token)
            .send()
            .await
            .map_err(aws_sdk_glue::Error::from)?;

        numbers.extend(page.schemas().iter().filter_map(|v| v.version_number()));

        next_token = page.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

async fn read_version(
    client: &Client,
    schema_id: &SchemaId,
    selector: SchemaVersionNumber,
    name: &str,
) -> Result<SchemaVersion, AwsError> {
    let version = client
        .get_schema_version()
        .schema_id(schema_id.clone())
        .schema_version_number(selector)
        .send()
        .await
        .map_err(aws_sdk_glue::Error::from)?;

    let definition = version
        .schema_definition()
        .ok_or_else(|| AwsError::MissingDefinition(name.to_string()))?;

    Ok(SchemaVersion {
        version_number: version.version_number().unwrap_or(1),
        definition: definition.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_keeps_version_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemas").join("glue.json");

        let schema = GlueSchema {
            registry: "default-registry".into(),
            schema_name: "orders-value".into(),
            data_format: "AVRO".into(),
            compatibility: "BACKWARD_ALL".into(),
            versions: vec![
                SchemaVersion {
                    version_number: 1,
                    definition: r#"{"type":"string"}"#.into(),
                },
                SchemaVersion {
                    version_number: 2,
                    definition: r#"{"type":"bytes"}"#.into(),
                },
            ],
        };
        SchemaExport::new(vec![schema.clone()]).write(&path).unwrap();

        let back = SchemaExport::read(&path).unwrap();
        assert_eq!(back.schemas, vec![schema]);
    }
}
