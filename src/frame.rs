// Copyright (C) 2026 The lumberjack-tracing Authors
//
// This file is part of lumberjack-tracing.
//
// lumberjack-tracing is free software: you can redistribute it and/or modify it under the terms of
// the GNU General Public License as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// lumberjack-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// lumberjack-tracing.  If not, see <http://www.gnu.org/licenses/>.

//! Lumberjack data frames
//!
//! A data frame carries one [`LogEvent`] as a flat list of string key/value pairs:
//!
//! ```text
//! byte    version         = 1
//! byte    frame type      = 'D'
//! byte[4] sequence number (big-endian, low 32 bits)
//! byte    field count
//! repeated field count times:
//!   byte[4] key length   + key bytes
//!   byte[4] value length + value bytes
//! ```
//!
//! The fields always begin with `logger`, `offset`, `host`, `line`, `level` & `eventTimestamp`,
//! followed by `exceptionMessage` & `exceptionStack` when the event carries an error, followed by
//! the event's properties in the order the event lists them.
//!
//! [`FrameEncoder`] produces [`Frame`]s; [`decode`] reverses the process, which is handy for
//! collectors written in Rust & for tests.

use crate::{
    config::LumberjackConfig,
    error::{Error, Result},
    event::LogEvent,
};

use backtrace::Backtrace;
use bytes::{Buf, BufMut};

use std::{fmt::Write, ops::Deref};

/// Protocol version marker
pub const VERSION: u8 = 1;
/// Frame type marker for data frames
pub const DATA_FRAME: u8 = b'D';
/// Fields every frame carries
pub const FIXED_FIELDS: usize = 6;
/// Fields added when the event carries an error
pub const ERROR_FIELDS: usize = 2;
/// The field count is a single byte
pub const MAX_FIELDS: usize = u8::MAX as usize;

const HEADER_LEN: usize = 7;

/// An encoded frame.
///
/// The only way to get one is from a [`FrameEncoder`], so anything handed to a
/// [`Transport`](crate::transport::Transport) as a `Frame` is well-formed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Deref for Frame {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Figure-out a value for the `host` field.
///
/// Tries [gethostname()] first, then the address of the local interface. It cannot fail; if
/// neither can be found it settles for "-".
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|hn| hn.into_string().ok())
        .filter(|hn| !hn.is_empty())
        .or_else(|| local_ip_address::local_ip().ok().map(|ip| ip.to_string()))
        .unwrap_or_else(|| "-".to_string())
}

/// Turns [`LogEvent`]s into [`Frame`]s.
#[derive(Clone, Debug)]
pub struct FrameEncoder {
    hostname: String,
    encoding: &'static encoding_rs::Encoding,
    timestamp_format: String,
}

impl FrameEncoder {
    pub fn new(config: &LumberjackConfig) -> FrameEncoder {
        FrameEncoder {
            hostname: config
                .hostname()
                .map(str::to_string)
                .unwrap_or_else(local_hostname),
            encoding: config.encoding(),
            timestamp_format: config.timestamp_format().to_string(),
        }
    }

    /// Encode `event` under sequence number `sequence` (only the low 32 bits go on the wire).
    pub fn encode(&self, sequence: u64, event: &LogEvent) -> Result<Frame> {
        let count = FIXED_FIELDS
            + if event.error.is_some() { ERROR_FIELDS } else { 0 }
            + event.properties.len();
        if count > MAX_FIELDS {
            return Err(Error::TooManyFields {
                count,
                back: Backtrace::new(),
            });
        }

        let mut buf = Vec::with_capacity(256);
        buf.put_u8(VERSION);
        buf.put_u8(DATA_FRAME);
        buf.put_u32(sequence as u32);
        buf.put_u8(count as u8);

        let mut timestamp = String::new();
        write!(timestamp, "{}", event.timestamp.format(&self.timestamp_format)).map_err(|_| {
            Error::BadConfig {
                what: format!("can't render a timestamp as '{}'", self.timestamp_format),
                back: Backtrace::new(),
            }
        })?;
        self.put_pair(&mut buf, "logger", &event.logger)?;
        self.put_pair(&mut buf, "offset", "0")?;
        self.put_pair(&mut buf, "host", &self.hostname)?;
        self.put_pair(&mut buf, "line", &event.line)?;
        self.put_pair(&mut buf, "level", &event.level)?;
        self.put_pair(&mut buf, "eventTimestamp", &timestamp)?;
        if let Some(error) = &event.error {
            self.put_pair(&mut buf, "exceptionMessage", &error.message)?;
            self.put_pair(&mut buf, "exceptionStack", &error.stack)?;
        }
        for (key, value) in &event.properties {
            self.put_pair(&mut buf, key, value)?;
        }
        Ok(Frame(buf))
    }

    fn put_pair(&self, buf: &mut Vec<u8>, key: &str, value: &str) -> Result<()> {
        self.put_string(buf, key)?;
        self.put_string(buf, value)
    }

    fn put_string(&self, buf: &mut Vec<u8>, text: &str) -> Result<()> {
        let (bytes, _, _) = self.encoding.encode(text);
        let len = u32::try_from(bytes.len()).map_err(|_| Error::BadFrame {
            what: "field longer than 4GiB",
            back: Backtrace::new(),
        })?;
        buf.put_u32(len);
        buf.put_slice(&bytes);
        Ok(())
    }
}

/// A frame read back off the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub sequence: u32,
    pub fields: Vec<(String, String)>,
}

impl DecodedFrame {
    /// Look up the first field named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn bad_frame(what: &'static str) -> Error {
    Error::BadFrame {
        what,
        back: Backtrace::new(),
    }
}

fn take_string(buf: &mut &[u8]) -> Result<Option<String>> {
    if buf.remaining() < 4 {
        return Ok(None);
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Ok(None);
    }
    let text = std::str::from_utf8(&(*buf)[..len])
        .map_err(|_| bad_frame("field is not UTF-8"))?
        .to_string();
    buf.advance(len);
    Ok(Some(text))
}

/// Decode one UTF-8 data frame from the front of `input`.
///
/// Returns the frame along with the number of bytes it occupied, or `None` if `input` doesn't
/// yet hold a complete frame.
pub fn decode(input: &[u8]) -> Result<Option<(DecodedFrame, usize)>> {
    let mut buf = input;
    if buf.remaining() < HEADER_LEN {
        return Ok(None);
    }
    if buf.get_u8() != VERSION {
        return Err(bad_frame("unknown protocol version"));
    }
    if buf.get_u8() != DATA_FRAME {
        return Err(bad_frame("not a data frame"));
    }
    let sequence = buf.get_u32();
    let count = buf.get_u8() as usize;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let key = match take_string(&mut buf)? {
            Some(key) => key,
            None => return Ok(None),
        };
        let value = match take_string(&mut buf)? {
            Some(value) => value,
            None => return Ok(None),
        };
        fields.push((key, value));
    }
    let used = input.len() - buf.remaining();
    Ok(Some((DecodedFrame { sequence, fields }, used)))
}
