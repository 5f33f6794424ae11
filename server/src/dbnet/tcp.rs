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

use super::{BufferedSocketStream, ConnectionHandler, NetBackoff, QueryResult};
use crate::dbnet::listener::BaseListener;
use crate::protocol::{ParseError, Parser};
use crate::resp::Writable;
use crate::IoResult;
use bytes::{Buf, BytesMut};
use libferrite::BUF_CAP;
use std::io::{Error as IoError, ErrorKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// A TCP/stream connection wrapping a buffered writer and a read buffer
pub struct Connection<T> {
    /// the stream
    pub(crate) stream: BufWriter<T>,
    /// the read buffer
    pub(crate) buffer: BytesMut,
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl<T> Connection<T>
where
    T: BufferedSocketStream,
{
    pub fn new(stream: T) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(BUF_CAP),
        }
    }
    /// Read a query off the stream
    ///
    /// This asynchronously waits until a full frame is buffered. A clean EOF
    /// at a frame boundary signals session end; an EOF inside a frame is a
    /// connection reset.
    pub async fn read_query(&mut self) -> IoResult<QueryResult> {
        loop {
            if !self.buffer.is_empty() {
                match Parser::parse(&self.buffer) {
                    Ok((query, forward_by)) => {
                        self.buffer.advance(forward_by);
                        return Ok(QueryResult::Q(query));
                    }
                    Err(ParseError::NotEnough) => {}
                    Err(ParseError::UnexpectedByte) | Err(ParseError::BadPacket) => {
                        return Ok(QueryResult::BadFrame);
                    }
                }
            }
            if self.stream.get_mut().read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(QueryResult::Disconnected);
                }
                return Err(IoError::from(ErrorKind::ConnectionReset));
            }
        }
    }
    /// Write a response to the stream
    pub async fn write_response(&mut self, streamer: impl Writable + Send) -> IoResult<()> {
        streamer.write(&mut self.stream).await
    }
    /// Write raw bytes to the stream, without any framing
    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.stream.write_all(bytes).await
    }
    pub async fn flush_stream(&mut self) -> IoResult<()> {
        self.stream.flush().await
    }
    /// A shared reference to the wrapped stream
    pub(crate) fn inner_ref(&self) -> &T {
        self.stream.get_ref()
    }
}

/// A TCP listener: wraps the base listener with the accept-spawn loop
pub struct Listener {
    pub base: BaseListener,
}

impl Listener {
    pub fn new(base: BaseListener) -> Self {
        Self { base }
    }
    /// Accept an incoming connection
    async fn accept(&mut self) -> IoResult<TcpStream> {
        let backoff = NetBackoff::new();
        loop {
            match self.base.listener.accept().await {
                // We don't need the bindaddr
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        // Too many retries, goodbye user
                        return Err(e);
                    }
                }
            }
            // spin to wait for the backoff duration
            backoff.spin().await;
        }
    }
    /// Run the server
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            // Take the permit first, but we won't use it right now
            // that's why we will forget it
            self.base.climit.acquire().await.unwrap().forget();
            let stream = self.accept().await?;
            let mut chandle = ConnectionHandler::new(
                self.base.db.clone(),
                Connection::new(stream),
                self.base.auth.clone(),
                self.base.climit.clone(),
                self.base.signal.subscribe(),
                self.base.terminate_tx.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = chandle.run().await {
                    log::error!("Error: {}", e);
                }
            });
        }
    }
    /// Signal the listener to shut down and only return after every
    /// connection task has drained
    pub async fn finish_with_termsig(self) {
        self.base.release_self().await
    }
}
