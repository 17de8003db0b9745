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

//! A tiny blocking HTTP/1.1 server that answers from a closure and records
//! every request it sees, in order. Each response closes its connection so
//! the shared client never reuses a socket across test runtimes.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use super::CloudConfig;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    /// Raw request target, percent encoding and query included.
    pub path: String,
    pub body: String,
    /// `http://127.0.0.1:<port>`, for responses that link back.
    pub base: String,
}

impl Request {
    /// `METHOD /path` without the query string.
    pub fn line(&self) -> String {
        let path = self.path.split('?').next().unwrap_or_default();
        format!("{} {path}", self.method)
    }
}

pub struct TestServer {
    pub url: String,
    seen: Arc<Mutex<Vec<Request>>>,
}

impl TestServer {
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(&Request) -> (u16, String) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let base = url.clone();
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let Some(request) = read_request(&stream, &base) else {
                    continue;
                };
                let (status, body) = respond(&request);
                log.lock().unwrap().push(request);
                write_response(&stream, status, &body);
            }
        });

        Self { url, seen }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.requests().iter().map(Request::line).collect()
    }

    /// Every Confluent endpoint pointed at this server, fully credentialed.
    pub fn cloud_config(&self) -> CloudConfig {
        let url = url::Url::parse(&self.url).unwrap();
        CloudConfig {
            cloud_url: Some(url.clone()),
            cloud_api_key: Some("cloud-key".into()),
            cloud_api_secret: Some("cloud-secret".into()),
            organization_id: Some("org-1".into()),
            environment_id: Some("env-1".into()),
            cluster_id: Some("lkc-1".into()),
            kafka_rest_endpoint: Some(url.clone()),
            kafka_api_key: Some("kafka-key".into()),
            kafka_api_secret: Some("kafka-secret".into()),
            schema_registry_url: Some(url),
            schema_registry_api_key: Some("sr-key".into()),
            schema_registry_api_secret: Some("sr-secret".into()),
            dry_run: false,
        }
    }
}

fn read_request(stream: &TcpStream, base: &str) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut start = String::new();
    reader.read_line(&mut start).ok()?;
    let mut parts = start.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(Request {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
        base: base.to_string(),
    })
}

fn write_response(mut stream: &TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
