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
//! [lumberjack-tracing](crate) errors

use backtrace::Backtrace;

/// [lumberjack-tracing](crate) error type
///
/// Like its cousins in the syslog world, this crate eschews libraries like [thiserror] & [anyhow]
/// in favor of a straightforward enumeration whose arms are chosen on the basis of what the caller
/// will need to do in response: a [`Connect`](Error::Connect) failure means the collector is
/// unreachable, a [`Write`](Error::Write) failure means a live connection just died (and the
/// suppression window has opened), and so on.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
#[non_exhaustive]
pub enum Error {
    /// A configuration value was rejected
    BadConfig { what: String, back: Backtrace },
    /// The configured certificate fingerprint isn't hex of a supported digest length
    BadFingerprint { text: String, back: Backtrace },
    /// The configured text encoding label isn't known to `encoding_rs`
    BadEncoding { label: String, back: Backtrace },
    /// The configured host is neither a DNS name nor an IP address
    BadServerName { host: String, back: Backtrace },
    /// Failed to open the TCP connection to the collector
    Connect {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// The TLS handshake failed (including fingerprint mismatches)
    Handshake {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
    /// A frame would carry more fields than its one-byte field count can express
    TooManyFields { count: usize, back: Backtrace },
    /// A frame was malformed (only ever produced by the decoder)
    BadFrame { what: &'static str, back: Backtrace },
    /// Failed to push a frame onto a live connection
    Write {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadConfig { what, .. } => write!(f, "Bad lumberjack configuration: {}", what),
            Error::BadFingerprint { text, .. } => write!(
                f,
                "'{}' is not a hex-encoded SHA-1 or SHA-256 certificate fingerprint",
                text
            ),
            Error::BadEncoding { label, .. } => {
                write!(f, "'{}' does not name a known text encoding", label)
            }
            Error::BadServerName { host, .. } => {
                write!(f, "'{}' is not a valid TLS server name", host)
            }
            Error::Connect { source, .. } => {
                write!(f, "While connecting to the collector, got {}", source)
            }
            Error::Handshake { source, .. } => {
                write!(f, "While negotiating TLS with the collector, got {}", source)
            }
            Error::TooManyFields { count, .. } => write!(
                f,
                "A lumberjack frame can carry at most 255 fields; this event needs {}",
                count
            ),
            Error::BadFrame { what, .. } => write!(f, "Malformed lumberjack frame: {}", what),
            Error::Write { source, .. } => {
                write!(f, "While sending a lumberjack frame, got {}", source)
            }
            _ => write!(f, "Other lumberjack-tracing error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::BadConfig { back, .. }
            | Error::BadFingerprint { back, .. }
            | Error::BadEncoding { back, .. }
            | Error::BadServerName { back, .. }
            | Error::Connect { back, .. }
            | Error::Handshake { back, .. }
            | Error::TooManyFields { back, .. }
            | Error::BadFrame { back, .. }
            | Error::Write { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "lumberjack-tracing error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connect { source, .. }
            | Error::Handshake { source, .. }
            | Error::Write { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
