/*
 * Created on Thu Feb 16 2023
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

//! This module provides deserialization primitives for RESP request frames
//!
//! A request is a RESP array of bulk strings: `*<n>\r\n` followed by `n`
//! elements of the form `$<len>\r\n<payload>\r\n`. The parser works over the
//! connection's read buffer and never blocks: if the buffer holds an
//! incomplete frame it returns [`ParseError::NotEnough`] so that the caller
//! can read more bytes off the socket and try again.
//!
//! One deliberate deviation from the frame grammar: the literal token
//! `PING\r\n` without any framing is accepted and treated as the `PING`
//! command, since redis-benchmark sends exactly that on its handshake path.

use crate::corestore::Data;

pub mod responses;

/// A parsed request: the command name followed by its arguments
#[derive(Debug, PartialEq)]
pub struct Query {
    args: Vec<Data>,
}

impl Query {
    pub fn new(args: Vec<Data>) -> Self {
        Query { args }
    }
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
    pub fn as_slice(&self) -> &[Data] {
        &self.args
    }
}

#[derive(Debug, PartialEq)]
/// Outcome of attempting to parse the read buffer
pub enum ParseError {
    /// More data needs to be read before a full frame is available
    NotEnough,
    /// The first byte is not one this server accepts at a frame boundary
    UnexpectedByte,
    /// The frame is structurally invalid
    BadPacket,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// The query parser
///
/// [`Parser::parse`] returns the parsed query and the number of bytes that the
/// caller should discard from the front of its buffer, since those have been
/// consumed by this frame.
pub struct Parser<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Parser<'a> {
    pub fn parse(buf: &'a [u8]) -> ParseResult<(Query, usize)> {
        let mut slf = Parser { buf, cursor: 0 };
        match slf.peek()? {
            b'*' => {
                let query = slf.parse_array()?;
                Ok((query, slf.cursor))
            }
            b'P' => {
                slf.parse_inline_ping()?;
                Ok((
                    Query::new(vec![Data::from_static(b"PING")]),
                    slf.cursor,
                ))
            }
            _ => Err(ParseError::UnexpectedByte),
        }
    }
    fn peek(&self) -> ParseResult<u8> {
        self.buf.get(self.cursor).copied().ok_or(ParseError::NotEnough)
    }
    fn step(&mut self) -> ParseResult<u8> {
        let byte = self.peek()?;
        self.cursor += 1;
        Ok(byte)
    }
    fn read_exact(&mut self, count: usize) -> ParseResult<&'a [u8]> {
        match self.buf.get(self.cursor..self.cursor + count) {
            Some(slice) => {
                self.cursor += count;
                Ok(slice)
            }
            None => Err(ParseError::NotEnough),
        }
    }
    /// Read `\r\n`, also accepting a lone `\n`
    fn read_terminator(&mut self) -> ParseResult<()> {
        match self.step()? {
            b'\n' => Ok(()),
            b'\r' => {
                if self.step()? == b'\n' {
                    Ok(())
                } else {
                    Err(ParseError::BadPacket)
                }
            }
            _ => Err(ParseError::BadPacket),
        }
    }
    /// Read a decimal length, digit by digit, up to and including the line
    /// terminator
    fn read_length(&mut self) -> ParseResult<usize> {
        let mut length = 0usize;
        let mut read_any = false;
        loop {
            let byte = self.step()?;
            match byte {
                b'0'..=b'9' => {
                    read_any = true;
                    length = length
                        .checked_mul(10)
                        .and_then(|len| len.checked_add((byte - b'0') as usize))
                        .ok_or(ParseError::BadPacket)?;
                }
                b'\n' if read_any => return Ok(length),
                b'\r' if read_any => {
                    if self.step()? == b'\n' {
                        return Ok(length);
                    }
                    return Err(ParseError::BadPacket);
                }
                _ => return Err(ParseError::BadPacket),
            }
        }
    }
    fn parse_array(&mut self) -> ParseResult<Query> {
        self.cursor += 1; // skip the '*'
        let element_count = self.read_length()?;
        if element_count == 0 {
            // an empty request has no command to dispatch on
            return Err(ParseError::BadPacket);
        }
        let mut args = Vec::with_capacity(element_count);
        for _ in 0..element_count {
            if self.step()? != b'$' {
                return Err(ParseError::BadPacket);
            }
            let blob_len = self.read_length()?;
            let blob = self.read_exact(blob_len)?;
            args.push(Data::copy_from_slice(blob));
            self.read_terminator()?;
        }
        Ok(Query::new(args))
    }
    fn parse_inline_ping(&mut self) -> ParseResult<()> {
        const TOKEN: &[u8] = b"PING\r\n";
        for want in TOKEN {
            if self.step()? != *want {
                return Err(ParseError::UnexpectedByte);
            }
        }
        Ok(())
    }
}
