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

//! Test shipping events to a lumberjack collector on port 5000 of the local host.
//!
//! Set `LUMBERJACK_FINGERPRINT` to pin the collector's certificate.

use lumberjack_tracing::{config::LumberjackConfig, layer::Layer};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

pub fn main() {
    let mut config = LumberjackConfig::builder("localhost");
    if let Ok(fingerprint) = std::env::var("LUMBERJACK_FINGERPRINT") {
        config = config.fingerprint(&fingerprint).unwrap();
    }
    // Setup the real subsriber...
    let subscriber = Registry::default().with(Layer::new(&config.build()).unwrap());
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    trace!(target: "tls-test", "你好, lumberjack.");
    debug!(target: "tls-test", "你好, lumberjack.");
    info!(target: "tls-test", user = "alice", "你好, lumberjack.");
    warn!(target: "tls-test", attempt = 2, "你好, lumberjack.");
    error!(target: "tls-test", "你好, lumberjack.");
}
