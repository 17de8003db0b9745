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

pub mod about;
pub mod acl;
pub mod aws;
pub mod banner;
pub mod cli;
pub mod commands;
pub mod config_loader;
pub mod confluent;
pub mod kafka;
pub mod migrate;
pub mod option;
pub mod rbac;
pub mod utils;

use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};

// A single HTTP client for every Confluent Cloud request
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10)) // set a timeout of 10s for each connection setup
        .timeout(Duration::from_secs(60)) // set a timeout of 60s for each request
        .pool_idle_timeout(Duration::from_secs(90)) // set a timeout of 90s for each idle connection
        .gzip(true) // gzip compress for all requests
        .brotli(true) // brotli compress for all requests
        .use_rustls_tls() // use only the rustls backend
        .user_agent(about::user_agent())
        .build()
        .unwrap_or_else(|_| Client::new())
});
