/*
 * Created on Wed Mar 08 2023
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

//! Replaying the append only file on startup
//!
//! The AOF is a RESP stream identical to live client input, so replay simply
//! impersonates a client: a [`ReplayStream`] reads from the file and plays
//! the socket's role, and every recorded command goes through the regular
//! dispatch path with a pre-authenticated synthetic session. The stream's
//! write half never stores anything; it only watches for an error reply
//! (`-` tag), which aborts the replay and with it the startup.

use crate::actions::ActionError;
use crate::auth::AuthProvider;
use crate::corestore::Corestore;
use crate::dbnet::{BufferedSocketStream, Connection, QueryResult, Session};
use crate::queryengine;
use crate::util::{Error, FerResult};
use std::io::ErrorKind;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// The AOF file pretending to be a client socket
pub struct ReplayStream {
    file: File,
    /// the first error reply the dispatcher produced, if any
    failure: Option<String>,
}

impl ReplayStream {
    fn new(file: File) -> Self {
        ReplayStream {
            file,
            failure: None,
        }
    }
    fn failure(&self) -> Option<&String> {
        self.failure.as_ref()
    }
}

impl AsyncRead for ReplayStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_read(cx, buf)
    }
}

impl AsyncWrite for ReplayStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let slf = self.get_mut();
        if slf.failure.is_none() && buf.first() == Some(&b'-') {
            let message = String::from_utf8_lossy(&buf[1..]);
            slf.failure = Some(message.trim_end().to_owned());
        }
        Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl BufferedSocketStream for ReplayStream {}

/// Stream the AOF at `path` through the dispatcher. A missing file is not an
/// error (there is simply nothing to restore); any command that fails to
/// replay is
pub async fn replay(handle: &Corestore, path: &std::path::Path) -> FerResult<()> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::ioerror_extra(
                e,
                format!("opening the append only file '{}'", path.display()),
            ))
        }
    };
    let mut con = Connection::new(ReplayStream::new(file));
    // the synthetic session starts out authenticated
    let mut sess = Session::new(AuthProvider::new(None));
    let mut replayed = 0usize;
    loop {
        let packet = con
            .read_query()
            .await
            .map_err(|e| Error::ioerror_extra(e, "reading the append only file"))?;
        match packet {
            QueryResult::Q(query) => {
                match queryengine::execute_simple(handle, &mut con, &mut sess, query).await {
                    Ok(()) => {}
                    Err(ActionError::ActionError(e)) => return Err(replay_failure(e)),
                    Err(ActionError::OwnedError(e)) => return Err(replay_failure(&e)),
                    Err(ActionError::IoError(e)) => {
                        return Err(Error::ioerror_extra(e, "replaying the append only file"))
                    }
                }
                con.flush_stream()
                    .await
                    .map_err(|e| Error::ioerror_extra(e, "replaying the append only file"))?;
                if let Some(message) = con.inner_ref().failure() {
                    return Err(Error::Aof(format!(
                        "stopping the import of the append only file: {message}"
                    )));
                }
                replayed += 1;
            }
            QueryResult::BadFrame => {
                return Err(Error::Aof("the append only file is corrupted".to_owned()))
            }
            QueryResult::Disconnected => break,
        }
    }
    if replayed > 0 {
        log::info!("Restored {replayed} commands from the append only file");
    }
    Ok(())
}

fn replay_failure(payload: &[u8]) -> Error {
    let message = String::from_utf8_lossy(payload);
    let message = message.trim_end().trim_start_matches('-');
    Error::Aof(format!(
        "stopping the import of the append only file: {message}"
    ))
}
