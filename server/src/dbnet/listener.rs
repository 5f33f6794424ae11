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

use super::Listener;
use crate::auth::AuthProvider;
use crate::corestore::Corestore;
use crate::util::{Error, FerResult};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};

/// The base TCP listener
pub struct BaseListener {
    /// An atomic reference to the shared in-memory engine
    pub db: Corestore,
    /// The auth provider
    pub auth: AuthProvider,
    /// The incoming connection listener (binding)
    pub listener: TcpListener,
    /// The maximum number of connections
    pub climit: Arc<Semaphore>,
    /// The shutdown broadcaster
    pub signal: broadcast::Sender<()>,
    // When all `Sender`s are dropped - the `Receiver` gets a `None` value
    // We send a clone of `terminate_tx` to each connection handler
    pub terminate_tx: mpsc::Sender<()>,
    pub terminate_rx: mpsc::Receiver<()>,
}

impl BaseListener {
    pub async fn init(
        db: &Corestore,
        auth: AuthProvider,
        host: IpAddr,
        port: u16,
        semaphore: Arc<Semaphore>,
        signal: broadcast::Sender<()>,
    ) -> FerResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::ioerror_extra(e, format!("binding to port {port}")))?;
        Ok(Self {
            db: db.clone(),
            auth,
            listener,
            climit: semaphore,
            signal,
            terminate_tx,
            terminate_rx,
        })
    }
    /// The address this listener actually bound to. With port 0 the kernel
    /// picks a free port, which tests rely on
    pub fn local_addr(&self) -> FerResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::ioerror_extra(e, "reading the bound address"))
    }
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

/// Initialize the database networking
pub async fn connect(
    host: IpAddr,
    port: u16,
    maxcon: usize,
    db: Corestore,
    auth: AuthProvider,
    signal: broadcast::Sender<()>,
) -> FerResult<Listener> {
    let climit = Arc::new(Semaphore::new(maxcon));
    let base = BaseListener::init(&db, auth, host, port, climit, signal).await?;
    let addr = base.local_addr()?;
    log::info!("Server started on ferrite://{addr}");
    Ok(Listener::new(base))
}
