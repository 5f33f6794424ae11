/*
 * Created on Fri Mar 10 2023
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

//! Wires the whole server together: storage, AOF replay, the background
//! services, the listener and signal-driven shutdown

use crate::auth::AuthProvider;
use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::dbnet::{self, Terminator, MAXIMUM_CONNECTION_LIMIT};
use crate::diskstore::{self, AppendOnlyFile, SyncPolicy};
use crate::services;
use crate::util::FerResult;
use std::sync::Arc;
use tokio::sync::broadcast;

#[cfg(unix)]
use core::{future::Future, pin::Pin, task::Context, task::Poll};
#[cfg(unix)]
use tokio::signal::unix::{signal as fnsignal, Signal, SignalKind};

#[cfg(unix)]
/// Object to bind to unix-specific signals
pub struct UnixTerminationSignal {
    sigterm: Signal,
}

#[cfg(unix)]
impl UnixTerminationSignal {
    pub fn init() -> FerResult<Self> {
        let sigterm = fnsignal(SignalKind::terminate())
            .map_err(|e| crate::util::Error::ioerror_extra(e, "binding to SIGTERM"))?;
        Ok(Self { sigterm })
    }
}

#[cfg(unix)]
impl Future for UnixTerminationSignal {
    type Output = Option<()>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sigterm.poll_recv(ctx)
    }
}

/// Start the server and wait for incoming connections or a termsig
pub async fn run(cfg: ConfigurationSet) -> FerResult<()> {
    // Initialize the broadcast channel
    let (signal, _) = broadcast::channel(1);
    let db = Corestore::new(cfg.databases, cfg.snapshot.clone());
    let auth = AuthProvider::new(cfg.requirepass.clone());

    // restore state and only then arm the append only file, so that the
    // replay itself is never re-recorded
    let mut aof_handle = None;
    if cfg.appendonly {
        diskstore::replay(&db, &cfg.appenddirname).await?;
        let aof = Arc::new(AppendOnlyFile::open(&cfg.appenddirname, cfg.appendfsync)?);
        db.install_aof(aof.clone());
        aof_handle = Some(aof);
    }

    // initialize the background services
    let reaper_handle = tokio::spawn(services::expiry_reaper(
        db.clone(),
        Terminator::new(signal.subscribe()),
    ));
    let mut aof_sync_handle = None;
    if let Some(aof) = &aof_handle {
        if aof.policy() == SyncPolicy::EverySecond {
            aof_sync_handle = Some(tokio::spawn(services::aof_sync_scheduler(
                aof.clone(),
                Terminator::new(signal.subscribe()),
            )));
        }
    }

    // bind the ctrlc handler
    let sig = tokio::signal::ctrl_c();

    // start the listener
    let mut server = dbnet::connect(
        cfg.host,
        cfg.port,
        MAXIMUM_CONNECTION_LIMIT,
        db.clone(),
        auth,
        signal.clone(),
    )
    .await?;

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = server.run() => {}
            _ = sig => {}
        }
    }
    #[cfg(unix)]
    {
        let sigterm = UnixTerminationSignal::init()?;
        // apart from CTRLC, the only other thing we care about is SIGTERM
        tokio::select! {
            _ = server.run() => {},
            _ = sig => {},
            _ = sigterm => {}
        }
    }

    log::info!("Signalling all workers to shut down");
    // drop the signal and let others exit
    drop(signal);
    server.finish_with_termsig().await;

    // wait for the background services to terminate
    let _ = reaper_handle.await;
    if let Some(handle) = aof_sync_handle {
        let _ = handle.await;
    }
    // park the AOF buffers on disk before exiting
    if let Some(aof) = aof_handle {
        if let Err(e) = aof.sync_now() {
            log::error!("Failed to sync the append only file at exit: {e}");
        }
    }
    Ok(())
}
