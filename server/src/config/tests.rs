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

use super::{load, ConfigError};
use crate::diskstore::SyncPolicy;
use std::fs;
use std::path::PathBuf;

/// A scratch directory that is removed when the test is done
struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("ferrite-cfgtest-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        Scratch { dir }
    }
    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

#[test]
fn parses_every_directive() {
    let scratch = Scratch::new("all");
    let path = scratch.file(
        "redis.conf",
        "# a comment\n\
         \n\
         port 7878\n\
         databases 4\n\
         requirepass hunter2\n\
         save 3600 1\n\
         save 300 100\n\
         appendonly yes\n\
         appendfsync everysec\n\
         appenddirname ./data.aof\n",
    );
    let cfg = load(&path).unwrap();
    assert_eq!(cfg.port, 7878);
    assert_eq!(cfg.databases, 4);
    assert_eq!(cfg.requirepass.as_deref(), Some("hunter2"));
    assert!(cfg.appendonly);
    assert_eq!(cfg.appendfsync, SyncPolicy::EverySecond);
    assert_eq!(cfg.appenddirname, PathBuf::from("./data.aof"));
    // `save` may appear multiple times and both land in the snapshot
    let saves: Vec<_> = cfg
        .snapshot
        .iter()
        .filter(|(name, _)| name == "save")
        .collect();
    assert_eq!(saves.len(), 2);
}

#[test]
fn defaults_without_directives() {
    let scratch = Scratch::new("defaults");
    let path = scratch.file("redis.conf", "# nothing but comments\n");
    let cfg = load(&path).unwrap();
    assert_eq!(cfg.port, 6379);
    assert_eq!(cfg.databases, 16);
    assert_eq!(cfg.requirepass, None);
    assert!(!cfg.appendonly);
    assert_eq!(cfg.appendfsync, SyncPolicy::Always);
}

#[test]
fn unknown_directives_are_fatal() {
    let scratch = Scratch::new("unknown");
    let path = scratch.file("redis.conf", "maxmemoryy 100mb\n");
    match load(&path) {
        Err(ConfigError::UnknownDirective { directive, .. }) => {
            assert_eq!(directive, "maxmemoryy")
        }
        other => panic!("expected an unknown-directive error, got {:?}", other),
    }
}

#[test]
fn a_directive_without_a_value_is_a_syntax_error() {
    let scratch = Scratch::new("syntax");
    let path = scratch.file("redis.conf", "port 6379\nappendonly\n");
    match load(&path) {
        Err(ConfigError::Syntax { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn include_pulls_relative_files_in_order() {
    let scratch = Scratch::new("include");
    scratch.file("first.conf", "port 7000\n");
    scratch.file("second.conf", "port 7001\n");
    let path = scratch.file("redis.conf", "include first.conf\ninclude second.conf\n");
    let cfg = load(&path).unwrap();
    // the later include wins for a single-valued directive
    assert_eq!(cfg.port, 7001);
}

#[test]
fn include_expands_globs() {
    let scratch = Scratch::new("glob");
    scratch.file("10-port.conf", "port 7100\n");
    scratch.file("20-dbs.conf", "databases 2\n");
    let path = scratch.file("redis.conf", "include *-*.conf\n");
    let cfg = load(&path).unwrap();
    assert_eq!(cfg.port, 7100);
    assert_eq!(cfg.databases, 2);
}

#[test]
fn cyclic_includes_are_fatal() {
    let scratch = Scratch::new("cycle");
    scratch.file("a.conf", "include b.conf\n");
    scratch.file("b.conf", "include a.conf\n");
    let path = scratch.file("redis.conf", "include a.conf\n");
    match load(&path) {
        Err(ConfigError::CyclicInclude(_)) => {}
        other => panic!("expected a cyclic-include error, got {:?}", other),
    }
}

#[test]
fn include_that_matches_nothing_is_fatal() {
    let scratch = Scratch::new("nomatch");
    let path = scratch.file("redis.conf", "include does-not-exist.conf\n");
    match load(&path) {
        Err(ConfigError::BadInclude(pattern)) => assert_eq!(pattern, "does-not-exist.conf"),
        other => panic!("expected a bad-include error, got {:?}", other),
    }
}

#[test]
fn bad_values_are_fatal() {
    let scratch = Scratch::new("badvalue");
    for content in [
        "port notaport\n",
        "databases 0\n",
        "appendonly maybe\n",
        "appendfsync sometimes\n",
    ] {
        let path = scratch.file("redis.conf", content);
        assert!(
            matches!(load(&path), Err(ConfigError::BadValue { .. })),
            "expected a bad-value error for {content:?}"
        );
    }
}
