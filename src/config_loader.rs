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

use std::{
    collections::BTreeMap,
    env as std_env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::{error::ErrorKind, Error, Parser};
#[cfg(test)]
use once_cell::sync::Lazy;
use serde::Deserialize;
use toml::Value;

use crate::cli::Cli;

/// Name of the default config file that will be auto-discovered in the
/// working directory when present.
const DEFAULT_CONFIG_FILENAME: &str = "msk-migrator.toml";

const CONFIG_FILE_ENV: &str = "MIGRATOR_CONFIG_FILE";

/// Parses the CLI after exporting the config file's keys as environment
/// variables, so clap's `env` fallbacks pick them up.
pub fn parse_cli_with_config() -> Cli {
    let raw_args: Vec<OsString> = std_env::args_os().collect();
    if let Err(err) = apply_config(&raw_args) {
        Error::raw(ErrorKind::Io, format!("{err:#}\n")).exit()
    }

    Cli::parse_from(raw_args)
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    env: BTreeMap<String, Value>,
    #[serde(flatten)]
    #[serde(default)]
    inline_env: BTreeMap<String, Value>,
}

// Only called from main before the tokio runtime starts, or under
// TEST_ENV_GUARD in tests.
fn set_env_var<K: AsRef<OsStr>, V: AsRef<OsStr>>(key: K, value: V) {
    std_env::set_var(key, value)
}

#[cfg(test)]
fn remove_env_var<K: AsRef<OsStr>>(key: K) {
    std_env::remove_var(key)
}

/// Ensures our tests do not fight over global environment state.
#[cfg(test)]
static TEST_ENV_GUARD: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// Returns the config file that was applied, if any.
fn apply_config(args: &[OsString]) -> Result<Option<PathBuf>> {
    let Some((config_path, source)) = locate_config_file(args)? else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&config_path).with_context(|| {
        format!(
            "Failed to read config file `{}` (source: {:?})",
            config_path.display(),
            source,
        )
    })?;

    let FileConfig {
        mut env,
        inline_env,
    } = toml::from_str::<FileConfig>(&contents).with_context(|| {
        format!(
            "Failed to parse config file `{}` (source: {:?})",
            config_path.display(),
            source,
        )
    })?;

    env.extend(inline_env);
    apply_env_overrides(&config_path, env);

    if std_env::var_os(CONFIG_FILE_ENV).is_none() {
        set_env_var(CONFIG_FILE_ENV, &config_path);
    }

    Ok(Some(config_path))
}

#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    Cli,
    Env,
    Default,
}

fn locate_config_file(args: &[OsString]) -> Result<Option<(PathBuf, ConfigSource)>> {
    if let Some(path) = config_from_args(args)? {
        return Ok(Some((path, ConfigSource::Cli)));
    }

    if let Some(env_path) = std_env::var_os(CONFIG_FILE_ENV) {
        let path = PathBuf::from(env_path);
        return Ok(Some((path, ConfigSource::Env)));
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_FILENAME);
    if default_path.is_file() {
        return Ok(Some((default_path, ConfigSource::Default)));
    }

    Ok(None)
}

fn config_from_args(args: &[OsString]) -> Result<Option<PathBuf>> {
    let mut iter = args.iter();
    // skip binary name
    iter.next();

    while let Some(raw_arg) = iter.next() {
        let arg = raw_arg.to_string_lossy();
        if arg == "--config-file" || arg == "-c" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("`{arg}` expects a file path to follow"))?;
            return Ok(Some(PathBuf::from(value)));
        }

        if let Some(path) = arg.strip_prefix("--config-file=") {
            return Ok(Some(PathBuf::from(path)));
        }

        if let Some(path) = arg.strip_prefix("-c=") {
            return Ok(Some(PathBuf::from(path)));
        }
    }

    Ok(None)
}

fn apply_env_overrides(config_path: &Path, env_map: BTreeMap<String, Value>) {
    for (key, value) in env_map {
        if !looks_like_env_var(&key) {
            eprintln!(
                "Warning: Ignoring key `{}` in `{}` because it does not look like an env variable",
                key,
                config_path.display()
            );
            continue;
        }
        if std_env::var_os(&key).is_some() {
            continue;
        }
        match value_to_env_string(value) {
            Some(serialized) => set_env_var(&key, serialized),
            None => eprintln!(
                "Warning: Ignoring key `{}` in `{}` because nested tables are not supported",
                key,
                config_path.display()
            ),
        }
    }
}

fn value_to_env_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        // comma separated, which is what the list options split on
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(value_to_env_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Table(_) => None,
    }
}

fn looks_like_env_var(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
