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

pub mod validation {
    use std::{
        env, io,
        path::{Path, PathBuf},
    };

    use path_clean::PathClean;

    pub fn file_path(s: &str) -> Result<PathBuf, String> {
        if s.is_empty() {
            return Err("empty path".to_owned());
        }

        let path = PathBuf::from(s);

        if !path.is_file() {
            return Err("path specified does not point to an accessible file".to_string());
        }

        Ok(path)
    }

    pub fn absolute_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = path.as_ref();

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir()?.join(path)
        }
        .clean();

        Ok(absolute_path)
    }

    /// Output directories may not exist yet; only resolve them.
    pub fn output_dir(s: &str) -> Result<PathBuf, String> {
        if s.trim().is_empty() {
            return Err("empty path".to_owned());
        }
        let path = absolute_path(s).map_err(|err| err.to_string())?;
        if path.is_file() {
            return Err("output path points to an existing file".to_string());
        }
        Ok(path)
    }

    pub fn url(s: &str) -> Result<url::Url, String> {
        let url = url::Url::parse(s).map_err(|_| "Invalid URL provided".to_string())?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(format!("unsupported URL scheme `{scheme}`")),
        }
    }

}
