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

//! One handler per subcommand. Handlers log what they did and return
//! `anyhow` errors for `main` to print.

use anyhow::Context;
use tracing::{info, warn};

use crate::acl;
use crate::aws::glue::{self, SchemaExport};
use crate::aws::msk;
use crate::banner;
use crate::cli::{
    Command, ConvertAclsArgs, CreateTopicsArgs, ExtractGroupsArgs, ExtractSchemasArgs,
    ExtractTopicsArgs, ImportAclsArgs, MigrateArgs, MigrateSchemasArgs, RbacPushArgs,
    ResolveBrokersArgs, SourceClusterArgs,
};
use crate::confluent::{iam, kafka_rest, schema_registry, PushSummary};
use crate::kafka::groups::{self, ConsumerGroupExport};
use crate::kafka::topics::{self, TopicExport};
use crate::kafka::KafkaConfig;
use crate::migrate::{self, MigrationPlan};
use crate::rbac::{self, ConversionReport};

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::ConvertAcls(args) => convert_acls(args),
        Command::ImportAcls(args) => import_acls(args),
        Command::ExtractTopics(args) => extract_topics(args).await,
        Command::ExtractGroups(args) => extract_groups(args).await,
        Command::ExtractSchemas(args) => extract_schemas(args).await,
        Command::ResolveBrokers(args) => resolve_brokers(args).await,
        Command::CreateServiceAccounts(args) => create_service_accounts(args).await,
        Command::CreateTopics(args) => create_topics(args).await,
        Command::MigrateSchemas(args) => migrate_schemas(args).await,
        Command::CreateRoleBindings(args) => create_role_bindings(args).await,
        Command::Migrate(args) => run_migration(args).await,
    }
}

fn convert_acls(args: ConvertAclsArgs) -> anyhow::Result<()> {
    let acls = args.format.load(&args.input)?;
    rbac::convert_to_file(&acls, &args.output)?;
    info!("wrote conversion report to {}", args.output.display());
    Ok(())
}

fn import_acls(args: ImportAclsArgs) -> anyhow::Result<()> {
    let acls = acl::read_listing(&args.input)?;
    acl::write_export(&args.output, &acls)?;
    info!("wrote {} ACLs to {}", acls.len(), args.output.display());
    Ok(())
}

async fn source_kafka_config(source: SourceClusterArgs) -> anyhow::Result<KafkaConfig> {
    let sdk = match (&source.kafka.bootstrap_servers, &source.msk.cluster_arn) {
        (None, Some(_)) => Some(source.aws.load().await),
        _ => None,
    };
    Ok(migrate::resolve_kafka_config(source.kafka, sdk.as_ref(), &source.msk).await?)
}

async fn extract_topics(args: ExtractTopicsArgs) -> anyhow::Result<()> {
    let kafka = source_kafka_config(args.source).await?;
    let topics = topics::extract(&kafka, &args.filter.into()).await?;
    TopicExport::new(topics).write(&args.output)?;
    info!("wrote topics to {}", args.output.display());
    Ok(())
}

async fn extract_groups(args: ExtractGroupsArgs) -> anyhow::Result<()> {
    let kafka = source_kafka_config(args.source).await?;
    let consumer_groups = groups::extract(&kafka).await?;
    let inactive = groups::inactive(&consumer_groups).count();
    if inactive > 0 {
        info!("{inactive} consumer groups have no active members");
    }
    ConsumerGroupExport::new(consumer_groups).write(&args.output)?;
    info!("wrote consumer groups to {}", args.output.display());
    Ok(())
}

async fn extract_schemas(args: ExtractSchemasArgs) -> anyhow::Result<()> {
    let sdk = args.aws.load().await;
    let schemas = glue::extract(&sdk, &args.glue).await?;
    SchemaExport::new(schemas).write(&args.output)?;
    info!("wrote schemas to {}", args.output.display());
    Ok(())
}

async fn resolve_brokers(args: ResolveBrokersArgs) -> anyhow::Result<()> {
    let arn = args
        .msk
        .cluster_arn
        .as_deref()
        .context("--cluster-arn (MSK_CLUSTER_ARN) is required")?;
    let sdk = args.aws.load().await;
    let brokers = msk::bootstrap_brokers(&sdk, arn, args.msk.auth).await?;
    println!("{brokers}");
    Ok(())
}

fn read_report(args: &RbacPushArgs) -> anyhow::Result<ConversionReport> {
    ConversionReport::read(&args.input)
        .with_context(|| format!("reading conversion report {}", args.input.display()))
}

async fn create_service_accounts(args: RbacPushArgs) -> anyhow::Result<()> {
    let report = read_report(&args)?;
    let (_, summary) = iam::create_service_accounts(&args.cloud, &report).await?;
    finish("service accounts", summary)
}

async fn create_role_bindings(args: RbacPushArgs) -> anyhow::Result<()> {
    let report = read_report(&args)?;
    let ids = iam::service_account_ids(&args.cloud, &report).await?;
    let missing = report
        .service_accounts
        .iter()
        .filter(|a| !ids.contains_key(&a.name))
        .count();
    if missing > 0 {
        warn!("{missing} service accounts do not exist yet, run create-service-accounts first");
    }
    let summary = iam::create_role_bindings(&args.cloud, &report, &ids).await?;
    finish("role bindings", summary)
}

async fn create_topics(args: CreateTopicsArgs) -> anyhow::Result<()> {
    let export = TopicExport::read(&args.input)?;
    let summary = kafka_rest::create_topics(&args.cloud, &export.topics).await?;
    finish("topics", summary)
}

async fn migrate_schemas(args: MigrateSchemasArgs) -> anyhow::Result<()> {
    let export = SchemaExport::read(&args.input)?;
    let summary =
        schema_registry::migrate(&args.cloud, &export.schemas, args.subject_suffix.as_deref())
            .await?;
    finish("schemas", summary)
}

async fn run_migration(args: MigrateArgs) -> anyhow::Result<()> {
    let plan = MigrationPlan::from(args);
    banner::print_start(plan.apply, plan.cloud.dry_run);

    let summary = migrate::run(plan).await?;
    banner::print_summary(&summary);

    if summary.failed() > 0 {
        anyhow::bail!("{} items failed to migrate, see the log above", summary.failed());
    }
    Ok(())
}

/// Push commands fail the process when any item failed, after every item
/// was attempted.
fn finish(what: &str, summary: PushSummary) -> anyhow::Result<()> {
    if summary.failed > 0 {
        anyhow::bail!("{} of {} {what} failed", summary.failed, summary.total());
    }
    Ok(())
}
