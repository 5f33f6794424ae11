/*
 * Created on Mon Mar 13 2023
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

//! The in-process test harness: a real server on an ephemeral port and a
//! small raw-RESP client

use crate::auth::AuthProvider;
use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::dbnet::{self, Terminator};
use crate::diskstore::{self, AppendOnlyFile};
use crate::services;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    signal: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

/// Boot a full server (storage, AOF replay, reaper, listener) on a
/// kernel-assigned port
pub async fn start_server(cfg: ConfigurationSet) -> TestServer {
    let db = Corestore::new(cfg.databases, cfg.snapshot.clone());
    let auth = AuthProvider::new(cfg.requirepass.clone());
    if cfg.appendonly {
        diskstore::replay(&db, &cfg.appenddirname)
            .await
            .expect("AOF replay failed");
        let aof = Arc::new(
            AppendOnlyFile::open(&cfg.appenddirname, cfg.appendfsync).expect("AOF open failed"),
        );
        db.install_aof(aof);
    }
    let (signal, _) = broadcast::channel(1);
    let reaper = tokio::spawn(services::expiry_reaper(
        db.clone(),
        Terminator::new(signal.subscribe()),
    ));
    let mut server = dbnet::connect(cfg.host, 0, 64, db, auth, signal.clone())
        .await
        .expect("failed to bind the test listener");
    let addr = server.base.local_addr().unwrap();
    let mut stop = signal.subscribe();
    let server_task = tokio::spawn(async move {
        tokio::select! {
            _ = server.run() => {}
            _ = stop.recv() => {}
        }
        server.finish_with_termsig().await;
    });
    TestServer {
        addr,
        signal,
        handles: vec![reaper, server_task],
    }
}

impl TestServer {
    /// Signal shutdown and wait for every task to drain
    pub async fn stop(self) {
        let TestServer {
            signal, handles, ..
        } = self;
        let _ = signal.send(());
        drop(signal);
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// A raw-RESP test client. Replies come back as lossy strings so that tests
/// can compare against wire literals
pub struct TestClient {
    stream: TcpStream,
    buffer: BytesMut,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        TestClient {
            stream: TcpStream::connect(addr)
                .await
                .expect("failed to connect to the test server"),
            buffer: BytesMut::new(),
        }
    }
    /// Send one command as a RESP array of bulk strings and read one reply
    pub async fn run(&mut self, args: &[&str]) -> String {
        let mut out = Vec::new();
        out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
        for arg in args {
            out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
            out.extend_from_slice(arg.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        self.stream.write_all(&out).await.unwrap();
        self.read_reply().await
    }
    /// Send pre-encoded bytes (for inline/garbage input tests)
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }
    /// Read exactly one reply frame off the socket
    pub async fn read_reply(&mut self) -> String {
        loop {
            if let Some(len) = frame_len(&self.buffer) {
                let frame = self.buffer.split_to(len);
                return String::from_utf8_lossy(&frame).into_owned();
            }
            let read = self.stream.read_buf(&mut self.buffer).await.unwrap();
            assert!(read > 0, "connection closed while waiting for a reply");
        }
    }
    /// True once the server has closed this connection
    pub async fn read_eof(&mut self) -> bool {
        self.stream.read_buf(&mut self.buffer).await.unwrap() == 0
    }
}

/// The length of the first complete frame in `buf`, or `None` if more bytes
/// are needed
fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }
    match buf[0] {
        b'+' | b'-' | b':' => line_end(buf, 1),
        b'$' => {
            let header_end = line_end(buf, 1)?;
            let len = leading_int(&buf[1..]);
            if len < 0 {
                return Some(header_end);
            }
            let total = header_end + len as usize + 2;
            (buf.len() >= total).then_some(total)
        }
        b'*' => {
            let mut cursor = line_end(buf, 1)?;
            let count = leading_int(&buf[1..]);
            for _ in 0..count.max(0) {
                cursor += frame_len(&buf[cursor..])?;
            }
            Some(cursor)
        }
        tag => panic!("unexpected reply tag {:?}", tag as char),
    }
}

fn line_end(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..]
        .iter()
        .position(|byte| *byte == b'\n')
        .map(|idx| from + idx + 1)
}

fn leading_int(buf: &[u8]) -> i64 {
    let mut value = 0i64;
    let mut negative = false;
    for &byte in buf {
        match byte {
            b'-' => negative = true,
            b'0'..=b'9' => value = value * 10 + (byte - b'0') as i64,
            _ => break,
        }
    }
    if negative {
        -value
    } else {
        value
    }
}

/// A scratch directory for persistence tests
pub struct ScratchDir {
    pub dir: std::path::PathBuf,
}

impl ScratchDir {
    pub fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "ferrite-test-{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u32>()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        ScratchDir { dir }
    }
    pub fn path(&self, file: &str) -> std::path::PathBuf {
        self.dir.join(file)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
