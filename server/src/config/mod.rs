/*
 * Created on Thu Feb 23 2023
 *
 * This file is a part of Ferrite
 * Ferrite is a free and open-source Redis-compatible in-memory database
 * implemented in Rust, aiming to stay faithful to the Redis 1.0 wire
 * protocol while keeping the engine small and predictable.
 *
 * Copyright (c) 2023, the Ferrite developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Parsing of the directive-per-line configuration file
//!
//! The grammar is the classic redis.conf one: blank lines and `#`-prefixed
//! lines are comments, every other line splits on the first space into a
//! directive name and its value. `include` pulls in another file (glob
//! patterns allowed, resolved relative to the including file); including a
//! file that is already being processed is a fatal cycle, as is any unknown
//! directive.

use crate::diskstore::SyncPolicy;
use std::fmt;
use std::fs;
use std::io::Error as IoError;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_DATABASE_COUNT: usize = 16;
const DEFAULT_AOF_PATH: &str = "./redis.aof";

/// The resolved server configuration
#[derive(Debug, Clone)]
pub struct ConfigurationSet {
    pub host: IpAddr,
    pub port: u16,
    pub databases: usize,
    pub requirepass: Option<String>,
    pub appendonly: bool,
    pub appendfsync: SyncPolicy,
    pub appenddirname: PathBuf,
    /// every directive as it appeared, in file order, for `CONFIG GET`
    pub snapshot: Vec<(String, String)>,
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        ConfigurationSet {
            host: DEFAULT_IPV4,
            port: DEFAULT_PORT,
            databases: DEFAULT_DATABASE_COUNT,
            requirepass: None,
            appendonly: false,
            appendfsync: SyncPolicy::Always,
            appenddirname: PathBuf::from(DEFAULT_AOF_PATH),
            snapshot: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, IoError),
    Syntax { file: PathBuf, line: usize },
    UnknownDirective { file: PathBuf, directive: String },
    BadValue { directive: String, value: String },
    CyclicInclude(PathBuf),
    BadInclude(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "failed to read '{}': {}", path.display(), e),
            Self::Syntax { file, line } => {
                write!(f, "invalid directive at {}:{}", file.display(), line)
            }
            Self::UnknownDirective { file, directive } => {
                write!(f, "unknown directive '{}' in {}", directive, file.display())
            }
            Self::BadValue { directive, value } => {
                write!(f, "invalid value '{}' for directive '{}'", value, directive)
            }
            Self::CyclicInclude(path) => {
                write!(f, "cyclic include of '{}'", path.display())
            }
            Self::BadInclude(pattern) => write!(f, "invalid include pattern '{}'", pattern),
        }
    }
}

type ConfigResult<T> = Result<T, ConfigError>;

/// Load and resolve a configuration file
pub fn load(path: &Path) -> ConfigResult<ConfigurationSet> {
    let mut directives = Vec::new();
    let mut include_stack = Vec::new();
    read_file(path, &mut include_stack, &mut directives)?;
    build(directives)
}

/// Read one file's directives in order, recursing into includes. The stack
/// holds the canonical paths currently being processed: re-entering one is a
/// cycle
fn read_file(
    path: &Path,
    include_stack: &mut Vec<PathBuf>,
    out: &mut Vec<(PathBuf, String, String)>,
) -> ConfigResult<()> {
    let canonical = fs::canonicalize(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
    if include_stack.contains(&canonical) {
        return Err(ConfigError::CyclicInclude(canonical));
    }
    include_stack.push(canonical);
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
    for (index, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (directive, value) = match line.split_once(' ') {
            Some((directive, value)) => (directive, value.trim()),
            None => {
                return Err(ConfigError::Syntax {
                    file: path.to_owned(),
                    line: index + 1,
                })
            }
        };
        if directive == "include" {
            include(path, value, include_stack, out)?;
        } else {
            out.push((path.to_owned(), directive.to_owned(), value.to_owned()));
        }
    }
    include_stack.pop();
    Ok(())
}

fn include(
    from: &Path,
    pattern: &str,
    include_stack: &mut Vec<PathBuf>,
    out: &mut Vec<(PathBuf, String, String)>,
) -> ConfigResult<()> {
    // paths are resolved relative to the file carrying the directive
    let base = from.parent().unwrap_or_else(|| Path::new("."));
    let resolved = base.join(pattern);
    let resolved = resolved.to_string_lossy();
    let matches =
        glob::glob(&resolved).map_err(|_| ConfigError::BadInclude(pattern.to_owned()))?;
    let mut matched_any = false;
    for entry in matches {
        let target = entry.map_err(|e| ConfigError::Io(e.path().to_owned(), e.into_error()))?;
        matched_any = true;
        read_file(&target, include_stack, out)?;
    }
    if !matched_any {
        return Err(ConfigError::BadInclude(pattern.to_owned()));
    }
    Ok(())
}

fn build(directives: Vec<(PathBuf, String, String)>) -> ConfigResult<ConfigurationSet> {
    let mut cfg = ConfigurationSet::default();
    for (file, directive, value) in directives {
        match directive.as_str() {
            "port" => {
                cfg.port = value.parse().map_err(|_| bad_value(&directive, &value))?;
            }
            "databases" => {
                cfg.databases = match value.parse() {
                    Ok(count) if count >= 1 => count,
                    _ => return Err(bad_value(&directive, &value)),
                };
            }
            "requirepass" => {
                // an empty password keeps authn disabled
                cfg.requirepass = if value.is_empty() {
                    None
                } else {
                    Some(value.clone())
                };
            }
            "save" => {
                // reserved; kept in the snapshot for CONFIG GET
            }
            "appendonly" => {
                cfg.appendonly =
                    parse_yes_no(&value).ok_or_else(|| bad_value(&directive, &value))?;
            }
            "appendfsync" => {
                cfg.appendfsync = SyncPolicy::from_directive(&value)
                    .ok_or_else(|| bad_value(&directive, &value))?;
            }
            "appenddirname" => {
                cfg.appenddirname = PathBuf::from(&value);
            }
            _ => {
                return Err(ConfigError::UnknownDirective { file, directive });
            }
        }
        cfg.snapshot.push((directive, value));
    }
    Ok(cfg)
}

fn bad_value(directive: &str, value: &str) -> ConfigError {
    ConfigError::BadValue {
        directive: directive.to_owned(),
        value: value.to_owned(),
    }
}

fn parse_yes_no(value: &str) -> Option<bool> {
    match value {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}
