/*
 * Created on Tue Mar 14 2023
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

//! End-to-end tests for the string, generic and server command families

use super::tools::{start_server, TestClient};
use crate::config::ConfigurationSet;
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn set_get_del_roundtrip() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["SET", "hello", "world"]).await, "+OK\r\n");
    assert_eq!(con.run(&["GET", "hello"]).await, "$5\r\nworld\r\n");
    assert_eq!(con.run(&["EXISTS", "hello"]).await, ":1\r\n");
    assert_eq!(con.run(&["DEL", "hello"]).await, ":1\r\n");
    assert_eq!(con.run(&["GET", "hello"]).await, "$0\r\n\r\n");
    assert_eq!(con.run(&["EXISTS", "hello"]).await, ":0\r\n");
    server.stop().await;
}

#[tokio::test]
async fn del_counts_only_existing_keys() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "key1", "Hello"]).await;
    con.run(&["SET", "key2", "World"]).await;
    assert_eq!(con.run(&["DEL", "key1", "key2", "key3"]).await, ":2\r\n");
    server.stop().await;
}

#[tokio::test]
async fn counters() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["INCR", "counter"]).await, ":1\r\n");
    assert_eq!(con.run(&["INCR", "counter"]).await, ":2\r\n");
    assert_eq!(con.run(&["DECRBY", "counter", "5"]).await, ":-3\r\n");
    assert_eq!(con.run(&["INCRBY", "counter", "10"]).await, ":7\r\n");
    assert_eq!(con.run(&["DECR", "counter"]).await, ":6\r\n");
    assert_eq!(con.run(&["GET", "counter"]).await, "$1\r\n6\r\n");
    server.stop().await;
}

#[tokio::test]
async fn counters_reject_non_integers() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "k", "not a number"]).await;
    let wire_err = "-ERR value is not an integer or out of range\r\n";
    assert_eq!(con.run(&["INCR", "k"]).await, wire_err);
    assert_eq!(con.run(&["INCRBY", "c", "twelve"]).await, wire_err);
    server.stop().await;
}

#[tokio::test]
async fn setnx_sets_only_once() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["SETNX", "mykey", "Hello"]).await, ":1\r\n");
    assert_eq!(con.run(&["SETNX", "mykey", "World"]).await, ":0\r\n");
    assert_eq!(con.run(&["GET", "mykey"]).await, "$5\r\nHello\r\n");
    server.stop().await;
}

#[tokio::test]
async fn mget_returns_values_in_order() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "k1", "a"]).await;
    con.run(&["SET", "k2", "b"]).await;
    assert_eq!(
        con.run(&["MGET", "k1", "k2"]).await,
        "*2\r\n$1\r\na\r\n$1\r\nb\r\n"
    );
    // a missing key aborts the multi-get with the missing-read outcome
    assert_eq!(con.run(&["MGET", "k1", "nonexisting"]).await, "$0\r\n\r\n");
    server.stop().await;
}

#[tokio::test]
async fn substr_is_inclusive_and_clamped() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "mykey", "This is a string"]).await;
    assert_eq!(con.run(&["SUBSTR", "mykey", "0", "3"]).await, "$4\r\nThis\r\n");
    assert_eq!(con.run(&["SUBSTR", "mykey", "-3", "-1"]).await, "$3\r\ning\r\n");
    assert_eq!(
        con.run(&["SUBSTR", "mykey", "0", "-1"]).await,
        "$16\r\nThis is a string\r\n"
    );
    assert_eq!(
        con.run(&["SUBSTR", "mykey", "10", "100"]).await,
        "$6\r\nstring\r\n"
    );
    // start > end and start past the length both yield the empty bulk
    assert_eq!(con.run(&["SUBSTR", "mykey", "5", "2"]).await, "$0\r\n\r\n");
    assert_eq!(con.run(&["SUBSTR", "mykey", "99", "100"]).await, "$0\r\n\r\n");
    server.stop().await;
}

#[tokio::test]
async fn ping_and_echo() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["PING"]).await, "+PONG\r\n");
    assert_eq!(
        con.run(&["PING", "hello", "world"]).await,
        "$11\r\nhello world\r\n"
    );
    assert_eq!(
        con.run(&["ECHO", "hello", "awesome", "world"]).await,
        "$19\r\nhello awesome world\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn inline_ping_without_framing() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.send_raw(b"PING\r\n").await;
    assert_eq!(con.read_reply().await, "+PONG\r\n");
    // the connection stays usable afterwards
    assert_eq!(con.run(&["PING"]).await, "+PONG\r\n");
    server.stop().await;
}

#[tokio::test]
async fn select_isolates_databases() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["SELECT", "1"]).await, "+OK\r\n");
    assert_eq!(con.run(&["SET", "k", "v"]).await, "+OK\r\n");
    assert_eq!(con.run(&["SELECT", "0"]).await, "+OK\r\n");
    assert_eq!(con.run(&["GET", "k"]).await, "$0\r\n\r\n");
    assert_eq!(con.run(&["SELECT", "1"]).await, "+OK\r\n");
    assert_eq!(con.run(&["GET", "k"]).await, "$1\r\nv\r\n");
    // out-of-range and non-numeric indices
    assert_eq!(
        con.run(&["SELECT", "16"]).await,
        "-ERR DB index is out of range\r\n"
    );
    assert_eq!(
        con.run(&["SELECT", "one"]).await,
        "-ERR value is not an integer or out of range\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn move_between_databases() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "k", "v"]).await;
    assert_eq!(con.run(&["MOVE", "k", "1"]).await, ":1\r\n");
    assert_eq!(con.run(&["EXISTS", "k"]).await, ":0\r\n");
    con.run(&["SELECT", "1"]).await;
    assert_eq!(con.run(&["GET", "k"]).await, "$1\r\nv\r\n");
    // the destination already holds the key: no-op
    con.run(&["SELECT", "0"]).await;
    con.run(&["SET", "k", "other"]).await;
    assert_eq!(con.run(&["MOVE", "k", "1"]).await, ":0\r\n");
    // moving onto the selected database is a no-op too
    assert_eq!(con.run(&["MOVE", "k", "0"]).await, ":0\r\n");
    // and a bad destination index is an error
    assert_eq!(
        con.run(&["MOVE", "k", "99"]).await,
        "-ERR DB index is out of range\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn rename_and_randomkey() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["RANDOMKEY"]).await, "$-1\r\n");
    con.run(&["SET", "old", "v"]).await;
    assert_eq!(con.run(&["RENAME", "old", "new"]).await, "+OK\r\n");
    assert_eq!(con.run(&["EXISTS", "old"]).await, ":0\r\n");
    assert_eq!(con.run(&["GET", "new"]).await, "$1\r\nv\r\n");
    assert_eq!(con.run(&["RANDOMKEY"]).await, "$3\r\nnew\r\n");
    server.stop().await;
}

#[tokio::test]
async fn dbsize_and_flush() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "a", "1"]).await;
    con.run(&["SET", "b", "2"]).await;
    assert_eq!(con.run(&["DBSIZE"]).await, ":2\r\n");
    assert_eq!(con.run(&["FLUSHDB"]).await, "+OK\r\n");
    assert_eq!(con.run(&["DBSIZE"]).await, ":0\r\n");
    // FLUSHALL clears every database
    con.run(&["SET", "a", "1"]).await;
    con.run(&["SELECT", "2"]).await;
    con.run(&["SET", "b", "2"]).await;
    assert_eq!(con.run(&["FLUSHALL"]).await, "+OK\r\n");
    assert_eq!(con.run(&["DBSIZE"]).await, ":0\r\n");
    con.run(&["SELECT", "0"]).await;
    assert_eq!(con.run(&["DBSIZE"]).await, ":0\r\n");
    server.stop().await;
}

#[tokio::test]
async fn expire_and_ttl() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["TTL", "missing"]).await, ":-2\r\n");
    con.run(&["SET", "k", "v"]).await;
    assert_eq!(con.run(&["TTL", "k"]).await, ":-1\r\n");
    assert_eq!(con.run(&["EXPIRE", "k", "100"]).await, ":1\r\n");
    let ttl = con.run(&["TTL", "k"]).await;
    let remaining: i64 = ttl
        .trim_start_matches(':')
        .trim_end()
        .parse()
        .expect("TTL must reply an integer");
    assert!((0..=100).contains(&remaining), "ttl was {remaining}");
    // a plain overwrite discards the deadline
    con.run(&["SET", "k", "v2"]).await;
    assert_eq!(con.run(&["TTL", "k"]).await, ":-1\r\n");
    assert_eq!(con.run(&["EXPIRE", "missing", "5"]).await, ":0\r\n");
    server.stop().await;
}

#[tokio::test]
async fn expired_keys_are_reaped() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.run(&["SET", "volatile", "v"]).await;
    assert_eq!(con.run(&["EXPIRE", "volatile", "1"]).await, ":1\r\n");
    // the reaper ticks once a second; give it some slack past the deadline
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(con.run(&["EXISTS", "volatile"]).await, ":0\r\n");
    assert_eq!(con.run(&["TTL", "volatile"]).await, ":-2\r\n");
    server.stop().await;
}

#[tokio::test]
async fn config_get() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(
        con.run(&["CONFIG", "GET", "save"]).await,
        "*2\r\n$4\r\nsave\r\n$23\r\n3600 1 300 100 60 10000\r\n"
    );
    assert_eq!(
        con.run(&["CONFIG", "GET", "appendonly"]).await,
        "*2\r\n$10\r\nappendonly\r\n$2\r\nno\r\n"
    );
    // unconfigured directives come back with an empty value
    assert_eq!(
        con.run(&["CONFIG", "GET", "port"]).await,
        "*2\r\n$4\r\nport\r\n$0\r\n\r\n"
    );
    assert_eq!(
        con.run(&["CONFIG", "SET", "port"]).await,
        "-ERR unknown subcommand 'SET'.\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn unknown_command() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(
        con.run(&["DERP", "x"]).await,
        "-ERR unknown command 'DERP'\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn wrong_arity() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(
        con.run(&["GET"]).await,
        "-ERR wrong number of arguments for 'get' command\r\n"
    );
    assert_eq!(
        con.run(&["SET", "just-a-key"]).await,
        "-ERR wrong number of arguments for 'set' command\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn quit_closes_the_connection() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(con.run(&["QUIT"]).await, "+OK\r\n");
    assert!(con.read_eof().await);
    server.stop().await;
}

#[tokio::test]
async fn garbage_input_aborts_the_connection() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    con.send_raw(b"THIS IS NOT RESP\r\n").await;
    assert_eq!(con.read_reply().await, "-ERR Protocol error\r\n");
    assert!(con.read_eof().await);
    server.stop().await;
}
