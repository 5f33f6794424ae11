/*
 * Created on Thu Mar 16 2023
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

//! End-to-end tests for the authentication gate

use super::tools::{start_server, TestClient};
use crate::config::ConfigurationSet;

fn cfg_with_password(password: &str) -> ConfigurationSet {
    ConfigurationSet {
        requirepass: Some(password.to_owned()),
        ..Default::default()
    }
}

#[tokio::test]
async fn everything_is_gated_until_auth() {
    let server = start_server(cfg_with_password("test-password-1234")).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(
        con.run(&["PING"]).await,
        "-NOAUTH Authentication required\r\n"
    );
    assert_eq!(
        con.run(&["SET", "k", "v"]).await,
        "-NOAUTH Authentication required\r\n"
    );
    assert_eq!(
        con.run(&["AUTH", "invalid-password"]).await,
        "-WRONGPASS invalid username-password pair or user is disabled.\r\n"
    );
    assert_eq!(con.run(&["AUTH", "test-password-1234"]).await, "+OK\r\n");
    assert_eq!(con.run(&["PING"]).await, "+PONG\r\n");
    server.stop().await;
}

#[tokio::test]
async fn authentication_is_per_connection() {
    let server = start_server(cfg_with_password("sekrit")).await;
    let mut first = TestClient::connect(server.addr).await;
    assert_eq!(first.run(&["AUTH", "sekrit"]).await, "+OK\r\n");
    assert_eq!(first.run(&["PING"]).await, "+PONG\r\n");
    // a second connection still has to authenticate
    let mut second = TestClient::connect(server.addr).await;
    assert_eq!(
        second.run(&["PING"]).await,
        "-NOAUTH Authentication required\r\n"
    );
    server.stop().await;
}

#[tokio::test]
async fn auth_without_a_configured_password() {
    let server = start_server(ConfigurationSet::default()).await;
    let mut con = TestClient::connect(server.addr).await;
    assert_eq!(
        con.run(&["AUTH", "whatever"]).await,
        "-ERR AUTH <password> called without any password configured for the default user. Are you sure your configuration is correct?\r\n"
    );
    // the session is unaffected
    assert_eq!(con.run(&["PING"]).await, "+PONG\r\n");
    server.stop().await;
}
