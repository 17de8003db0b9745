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

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::acl::AclFormat;
use crate::aws::glue::GlueArgs;
use crate::aws::msk::MskArgs;
use crate::aws::AwsArgs;
use crate::confluent::CloudConfig;
use crate::kafka::topics::TopicFilter;
use crate::kafka::KafkaConfig;
use crate::migrate::MigrationPlan;
use crate::option::validation;

pub const DEFAULT_OUTPUT_DIR: &str = "./migration-output";

#[derive(Parser)]
#[command(
    name = "msk-migrator",
    bin_name = "msk-migrator",
    about = "Migrate ACLs, topics and schemas from Amazon MSK to Confluent Cloud.",
    long_about = r#"
Migrate ACLs, topics and schemas from Amazon MSK to Confluent Cloud.

Usage:
msk-migrator [command] [options..]


Help:
msk-migrator [command] --help

"#,
    arg_required_else_help = true,
    color = clap::ColorChoice::Always,
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true,
    next_line_help = false,
    help_template = r#"{name} v{version}
{about}

{all-args}
        "#,
    subcommand_required = true,
)]
pub struct Cli {
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "MIGRATOR_CONFIG_FILE",
        help = "TOML file whose keys are exported as environment variables"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long,
        short = 'v',
        global = true,
        env = "MIGRATOR_VERBOSE",
        default_value = "false",
        help = "Log at debug level unless RUST_LOG says otherwise"
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert MSK ACLs into Confluent Cloud role bindings
    #[command(name = "convert-acls")]
    ConvertAcls(ConvertAclsArgs),

    /// Turn saved `kafka-acls.sh --list` output into an ACL export
    #[command(name = "import-acls")]
    ImportAcls(ImportAclsArgs),

    #[command(name = "extract-topics")]
    ExtractTopics(ExtractTopicsArgs),

    #[command(name = "extract-groups")]
    ExtractGroups(ExtractGroupsArgs),

    /// Read schemas from the Glue schema registry
    #[command(name = "extract-schemas")]
    ExtractSchemas(ExtractSchemasArgs),

    /// Print the bootstrap brokers of an MSK cluster
    #[command(name = "resolve-brokers")]
    ResolveBrokers(ResolveBrokersArgs),

    #[command(name = "create-service-accounts")]
    CreateServiceAccounts(RbacPushArgs),

    #[command(name = "create-topics")]
    CreateTopics(CreateTopicsArgs),

    #[command(name = "migrate-schemas")]
    MigrateSchemas(MigrateSchemasArgs),

    /// Bind roles to service accounts that already exist in Confluent Cloud
    #[command(name = "create-role-bindings")]
    CreateRoleBindings(RbacPushArgs),

    /// Run the whole migration
    Migrate(MigrateArgs),
}

#[derive(Args, Debug)]
pub struct ConvertAclsArgs {
    #[arg(
        long,
        short = 'i',
        env = "MSK_ACL_FILE",
        value_parser = validation::file_path,
        help = "ACL file exported from MSK"
    )]
    pub input: PathBuf,

    #[arg(
        value_enum,
        long = "format",
        env = "MSK_ACL_FORMAT",
        default_value_t = AclFormat::Json,
        help = "Format of the ACL file"
    )]
    pub format: AclFormat,

    #[arg(
        long,
        short = 'o',
        default_value = "cc-rbac.json",
        help = "Where to write the conversion report"
    )]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportAclsArgs {
    #[arg(
        long,
        short = 'i',
        value_parser = validation::file_path,
        help = "Saved output of kafka-acls.sh --list"
    )]
    pub input: PathBuf,

    #[arg(long, short = 'o', default_value = "msk-acls.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SourceClusterArgs {
    #[command(flatten)]
    pub kafka: KafkaConfig,

    #[command(flatten)]
    pub aws: AwsArgs,

    #[command(flatten)]
    pub msk: MskArgs,
}

#[derive(Args, Debug, Clone)]
pub struct TopicFilterArgs {
    #[arg(
        long,
        env = "MSK_INCLUDE_INTERNAL_TOPICS",
        default_value = "false",
        help = "Also extract topics starting with __"
    )]
    pub include_internal: bool,

    #[arg(
        long = "topics",
        env = "MSK_TOPICS",
        value_delimiter = ',',
        help = "Only extract these topics (comma separated)"
    )]
    pub topics: Vec<String>,
}

impl From<TopicFilterArgs> for TopicFilter {
    fn from(args: TopicFilterArgs) -> Self {
        TopicFilter {
            include_internal: args.include_internal,
            names: args.topics,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExtractTopicsArgs {
    #[command(flatten)]
    pub source: SourceClusterArgs,

    #[command(flatten)]
    pub filter: TopicFilterArgs,

    #[arg(long, short = 'o', default_value = "msk-topics.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExtractGroupsArgs {
    #[command(flatten)]
    pub source: SourceClusterArgs,

    #[arg(long, short = 'o', default_value = "msk-consumer-groups.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExtractSchemasArgs {
    #[command(flatten)]
    pub aws: AwsArgs,

    #[command(flatten)]
    pub glue: GlueArgs,

    #[arg(long, short = 'o', default_value = "glue-schemas.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ResolveBrokersArgs {
    #[command(flatten)]
    pub aws: AwsArgs,

    #[command(flatten)]
    pub msk: MskArgs,
}

#[derive(Args, Debug)]
pub struct RbacPushArgs {
    #[arg(
        long,
        short = 'i',
        value_parser = validation::file_path,
        default_value = "cc-rbac.json",
        help = "Conversion report written by convert-acls"
    )]
    pub input: PathBuf,

    #[command(flatten)]
    pub cloud: CloudConfig,
}

#[derive(Args, Debug)]
pub struct CreateTopicsArgs {
    #[arg(
        long,
        short = 'i',
        value_parser = validation::file_path,
        default_value = "msk-topics.json",
        help = "Topic export written by extract-topics"
    )]
    pub input: PathBuf,

    #[command(flatten)]
    pub cloud: CloudConfig,
}

#[derive(Args, Debug)]
pub struct MigrateSchemasArgs {
    #[arg(
        long,
        short = 'i',
        value_parser = validation::file_path,
        default_value = "glue-schemas.json",
        help = "Schema export written by extract-schemas"
    )]
    pub input: PathBuf,

    #[arg(
        long,
        env = "CC_SUBJECT_SUFFIX",
        help = "Appended to every schema name to form the subject, e.g. -value"
    )]
    pub subject_suffix: Option<String>,

    #[command(flatten)]
    pub cloud: CloudConfig,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[arg(
        long,
        short = 'o',
        env = "MIGRATOR_OUTPUT_DIR",
        default_value = DEFAULT_OUTPUT_DIR,
        value_parser = validation::output_dir,
        help = "Directory for every extracted and converted file"
    )]
    pub output_dir: PathBuf,

    #[arg(
        long = "acls",
        env = "MSK_ACL_FILE",
        value_parser = validation::file_path,
        help = "ACL export or kafka-acls.sh listing to convert"
    )]
    pub acls: Option<PathBuf>,

    #[arg(
        value_enum,
        long = "acl-format",
        env = "MSK_ACL_FORMAT",
        default_value_t = AclFormat::Json
    )]
    pub acl_format: AclFormat,

    #[arg(
        long,
        env = "MIGRATOR_SKIP_SCHEMAS",
        default_value = "false",
        help = "Do not read the Glue schema registry"
    )]
    pub skip_schemas: bool,

    #[arg(
        long,
        env = "MIGRATOR_APPLY",
        default_value = "false",
        help = "Push the converted resources to Confluent Cloud"
    )]
    pub apply: bool,

    #[arg(long, env = "CC_SUBJECT_SUFFIX")]
    pub subject_suffix: Option<String>,

    #[command(flatten)]
    pub source: SourceClusterArgs,

    #[command(flatten)]
    pub filter: TopicFilterArgs,

    #[command(flatten)]
    pub glue: GlueArgs,

    #[command(flatten)]
    pub cloud: CloudConfig,
}

impl From<MigrateArgs> for MigrationPlan {
    fn from(args: MigrateArgs) -> Self {
        MigrationPlan {
            output_dir: args.output_dir,
            acls: args.acls.map(|path| (path, args.acl_format)),
            topic_filter: args.filter.into(),
            skip_schemas: args.skip_schemas,
            subject_suffix: args.subject_suffix,
            apply: args.apply,
            kafka: args.source.kafka,
            aws: args.source.aws,
            msk: args.source.msk,
            glue: args.glue,
            cloud: args.cloud,
        }
    }
}
