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

//! Collector configuration.
//!
//! [`LumberjackConfig`] is built via [`LumberjackConfig::builder`]; only the host is required:
//!
//! ```rust
//! use lumberjack_tracing::config::LumberjackConfig;
//! let config = LumberjackConfig::builder("logs.example.com")
//!     .port(5044)
//!     .fingerprint("08:98:32:F9:43:A7:90:64:9F:FF:69:66:FA:82:37:5C:E3:8B:F3:0C")
//!     .unwrap()
//!     .build();
//! assert_eq!(config.port(), 5044);
//! ```

use crate::error::{Error, Result};

use backtrace::Backtrace;
use chrono::format::{Item, StrftimeItems};

use std::time::Duration;

/// Default collector port
pub const DEFAULT_PORT: u16 = 5000;
/// Default bound on TCP connect & the TLS handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on a single frame write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long writes stay suppressed after a failure
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_secs(60);
/// Culture-invariant "general" short date & time
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Digest used to compute a certificate fingerprint; implied by the fingerprint's length.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FingerprintDigest {
    Sha1,
    Sha256,
}

/// A pinned certificate fingerprint: lower-case hex, separators removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    hex: String,
    digest: FingerprintDigest,
}

impl Fingerprint {
    /// Parse a hex fingerprint; case is ignored, as are `:` and whitespace separators.
    pub fn new(text: &str) -> Result<Fingerprint> {
        let hex: String = text
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let digest = match hex.len() {
            40 => FingerprintDigest::Sha1,
            64 => FingerprintDigest::Sha256,
            _ => {
                return Err(Error::BadFingerprint {
                    text: text.to_string(),
                    back: Backtrace::new(),
                })
            }
        };
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::BadFingerprint {
                text: text.to_string(),
                back: Backtrace::new(),
            });
        }
        Ok(Fingerprint { hex, digest })
    }
    pub fn digest(&self) -> FingerprintDigest {
        self.digest
    }
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
    /// True if `hex` (of any case) names this fingerprint.
    pub fn matches(&self, hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(hex)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Oldest TLS protocol version the client will negotiate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

/// Everything needed to reach & talk to one collector.
#[derive(Clone, Debug)]
pub struct LumberjackConfig {
    host: String,
    port: u16,
    fingerprint: Option<Fingerprint>,
    encoding: &'static encoding_rs::Encoding,
    min_tls_version: TlsVersion,
    connect_timeout: Duration,
    write_timeout: Duration,
    suppression_window: Duration,
    suppress_on_connect_failure: bool,
    timestamp_format: String,
    hostname: Option<String>,
}

impl LumberjackConfig {
    pub fn builder(host: impl Into<String>) -> LumberjackConfigBuilder {
        LumberjackConfigBuilder {
            imp: LumberjackConfig {
                host: host.into(),
                port: DEFAULT_PORT,
                fingerprint: None,
                encoding: encoding_rs::UTF_8,
                min_tls_version: TlsVersion::Tls12,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                write_timeout: DEFAULT_WRITE_TIMEOUT,
                suppression_window: DEFAULT_SUPPRESSION_WINDOW,
                suppress_on_connect_failure: false,
                timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
                hostname: None,
            },
        }
    }
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }
    pub fn encoding(&self) -> &'static encoding_rs::Encoding {
        self.encoding
    }
    pub fn min_tls_version(&self) -> TlsVersion {
        self.min_tls_version
    }
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
    pub fn suppression_window(&self) -> Duration {
        self.suppression_window
    }
    pub fn suppress_on_connect_failure(&self) -> bool {
        self.suppress_on_connect_failure
    }
    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }
    /// The `host` field override, if any; `None` means "discover it".
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

pub struct LumberjackConfigBuilder {
    imp: LumberjackConfig,
}

impl LumberjackConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.imp.port = port;
        self
    }
    pub fn fingerprint(mut self, text: &str) -> Result<Self> {
        self.imp.fingerprint = Some(Fingerprint::new(text)?);
        Ok(self)
    }
    /// Select the text encoding by its WHATWG label ("utf-8", "windows-1252", ...).
    pub fn encoding(mut self, label: &str) -> Result<Self> {
        self.imp.encoding =
            encoding_rs::Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::BadEncoding {
                label: label.to_string(),
                back: Backtrace::new(),
            })?;
        Ok(self)
    }
    pub fn min_tls_version(mut self, version: TlsVersion) -> Self {
        self.imp.min_tls_version = version;
        self
    }
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.imp.connect_timeout = timeout;
        self
    }
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.imp.write_timeout = timeout;
        self
    }
    pub fn suppression_window(mut self, window: Duration) -> Self {
        self.imp.suppression_window = window;
        self
    }
    /// Open the suppression window on connection failures too, not only on write failures.
    pub fn suppress_on_connect_failure(mut self, suppress: bool) -> Self {
        self.imp.suppress_on_connect_failure = suppress;
        self
    }
    /// Set the `strftime`-style format for the `eventTimestamp` field.
    ///
    /// Formats chrono can't parse are refused here rather than failing every event later.
    pub fn timestamp_format(mut self, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::BadConfig {
                what: format!("'{}' is not a valid timestamp format", format),
                back: Backtrace::new(),
            });
        }
        self.imp.timestamp_format = format;
        Ok(self)
    }
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.imp.hostname = Some(hostname.into());
        self
    }
    pub fn build(self) -> LumberjackConfig {
        self.imp
    }
}
