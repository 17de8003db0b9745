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

use std::env::consts::{ARCH, OS};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn commit_hash() -> &'static str {
    option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
}

pub fn build_timestamp() -> &'static str {
    option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
}

/// `0.1.0 (1a2b3c4)`
pub fn version_string() -> String {
    format!("{VERSION} ({})", commit_hash())
}

// User Agent for Confluent Cloud API calls
// Format: msk-migrator/<version>/<commit_hash> (<OS>; <arch>)
pub fn user_agent() -> String {
    format!("{NAME}/{VERSION}/{} ({OS}; {ARCH})", commit_hash())
}
