/*
 * Created on Mon Feb 27 2023
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

//! # Database networking
//!
//! One task runs the accept loop, one task is spawned per connection, and
//! every task loop watches the server-wide shutdown broadcast. Per-connection
//! ordering is strict: a reply is fully written (and flushed) before the next
//! command is read off the socket.

use crate::actions::ActionError;
use crate::auth::AuthProvider;
use crate::corestore::Corestore;
use crate::protocol::responses::groups;
use crate::protocol::Query;
use crate::queryengine;
use crate::IoResult;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time;

mod listener;
mod tcp;

pub use listener::{connect, BaseListener};
pub use tcp::{Connection, Listener};

/// The hard ceiling on concurrently connected clients
pub const MAXIMUM_CONNECTION_LIMIT: usize = 50000;

/// This is a "marker trait" that ensures that no silly types are passed into
/// the [`Connection`] type
pub trait BufferedSocketStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl BufferedSocketStream for TcpStream {}

/// Result of [`Connection::read_query`]
pub enum QueryResult {
    /// A [`Query`] ready to be run
    Q(Query),
    /// The frame is malformed; the connection must be aborted
    BadFrame,
    /// The client disconnected cleanly at a frame boundary
    Disconnected,
}

/// A wrapper around the shutdown broadcast receiver that latches once a
/// signal has been seen
pub struct Terminator {
    terminate: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    /// Create a new `Terminator` instance
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Terminator {
            terminate: false,
            signal,
        }
    }
    /// Wait to receive a shutdown signal
    pub async fn receive_signal(&mut self) {
        if self.terminate {
            return;
        }
        let _ = self.signal.recv().await;
        self.terminate = true;
    }
}

/// A backoff implementation that is meant to be used in connection loops
pub(self) struct NetBackoff {
    c: AtomicU8,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    /// Create a new [`NetBackoff`] instance
    pub const fn new() -> Self {
        Self { c: AtomicU8::new(1) }
    }
    /// Wait for the current backoff duration
    pub async fn spin(&self) {
        let c = self.c.load(Ordering::Relaxed);
        time::sleep(Duration::from_secs(c as _)).await;
        self.c.store(c << 1, Ordering::Relaxed);
    }
    /// Should we disconnect the stream?
    pub fn should_disconnect(&self) -> bool {
        self.c.load(Ordering::Relaxed) > Self::MAX_BACKOFF
    }
}

pub struct AuthProviderHandle {
    /// the source authentication provider
    provider: AuthProvider,
    /// authenticated
    auth_good: bool,
}

impl AuthProviderHandle {
    pub fn new(provider: AuthProvider) -> Self {
        let auth_good = !provider.is_enabled();
        Self {
            provider,
            auth_good,
        }
    }
    /// This returns `true` if:
    /// 1. Authn is disabled
    /// 2. The connection has authenticated itself
    pub const fn authenticated(&self) -> bool {
        self.auth_good
    }
    pub fn set_auth(&mut self) {
        self.auth_good = true;
    }
    pub fn provider(&self) -> &AuthProvider {
        &self.provider
    }
}

/// Per-connection state: the authentication handle, the selected database
/// and whether a QUIT was requested
pub struct Session {
    pub auth: AuthProviderHandle,
    /// zero-based index of the selected database
    pub cur_db: usize,
    pub quit_requested: bool,
}

impl Session {
    pub fn new(provider: AuthProvider) -> Self {
        Session {
            auth: AuthProviderHandle::new(provider),
            cur_db: 0,
            quit_requested: false,
        }
    }
}

/// A generic connection handler: one per client, driving the
/// read → execute → write loop until EOF, QUIT, a protocol error or server
/// shutdown
pub struct ConnectionHandler<T> {
    /// an atomic reference to the shared in-memory engine
    db: Corestore,
    /// the connection
    con: Connection<T>,
    /// this client's session
    sess: Session,
    /// the semaphore used to impose limits on the number of connections
    climit: Arc<Semaphore>,
    /// check for termination signals
    termination_signal: broadcast::Receiver<()>,
    /// the sender that we drop when we're done with handling a connection
    /// (used for graceful exit)
    _term_sig_tx: mpsc::Sender<()>,
}

impl<T> ConnectionHandler<T>
where
    T: BufferedSocketStream,
{
    pub fn new(
        db: Corestore,
        con: Connection<T>,
        auth_data: AuthProvider,
        climit: Arc<Semaphore>,
        termination_signal: broadcast::Receiver<()>,
        _term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            db,
            con,
            sess: Session::new(auth_data),
            climit,
            termination_signal,
            _term_sig_tx,
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        log::debug!("ConnectionHandler initialized to handle a remote client");
        loop {
            let packet = tokio::select! {
                pkt = self.con.read_query() => pkt,
                _ = self.termination_signal.recv() => {
                    return Ok(());
                }
            };
            match packet? {
                QueryResult::Q(query) => {
                    match queryengine::execute_simple(
                        &self.db,
                        &mut self.con,
                        &mut self.sess,
                        query,
                    )
                    .await
                    {
                        Ok(()) => {}
                        Err(ActionError::ActionError(e)) => self.con.write_response(e).await?,
                        Err(ActionError::OwnedError(e)) => self.con.write_response(e).await?,
                        Err(ActionError::IoError(e)) => return Err(e),
                    }
                    self.con.flush_stream().await?;
                    if self.sess.quit_requested {
                        return Ok(());
                    }
                }
                QueryResult::BadFrame => {
                    log::debug!("Failed to read query; aborting the connection");
                    self.con.write_response(groups::PROTOCOL_ERROR).await?;
                    self.con.flush_stream().await?;
                    return Ok(());
                }
                QueryResult::Disconnected => return Ok(()),
            }
        }
    }
}

impl<T> Drop for ConnectionHandler<T> {
    fn drop(&mut self) {
        // Make sure that the permit is returned to the semaphore
        // in the case that there is a panic inside
        self.climit.add_permits(1);
    }
}
