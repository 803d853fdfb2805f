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

//! The write path.
//!
//! [`LumberjackTarget`] is what callers hand [`LogEvent`]s to. It frames each event, obtains the
//! shared connection from its [`ConnectionManager`], & writes the frame under a lock so that
//! frames from concurrent producers never interleave on the wire. Encoding happens before that
//! lock is taken, so frames land in the order their writers won the lock; the sequence number in
//! each frame is the only ordering the collector can rely on.
//!
//! # Suppression
//!
//! When a write fails, the target records the time, forgets the connection & returns the error.
//! For the next sixty seconds (by default) every [`submit`] returns `Ok(())` without framing
//! anything or touching the network; that includes submissions that were already on their way to
//! the write lock when the failure happened. The first submission after that window reconnects.
//! Failures to *connect* are returned as well, but only open the window when the target was
//! configured with [`suppress_on_connect_failure`].
//!
//! [`submit`]: LumberjackTarget::submit
//! [`suppress_on_connect_failure`]: crate::config::LumberjackConfigBuilder::suppress_on_connect_failure

use crate::{
    clock::{Clock, SystemClock},
    config::LumberjackConfig,
    error::Result,
    event::LogEvent,
    frame::FrameEncoder,
    transport::{lock, ConnectionManager, Connector, TlsConnector, Transport},
};

use tracing::{error, trace};

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Ships [`LogEvent`]s to one collector over one shared connection.
pub struct LumberjackTarget<C: Connector = TlsConnector> {
    encoder: FrameEncoder,
    connections: ConnectionManager<C>,
    // Held around exactly one frame's write.
    write_lock: Mutex<()>,
    last_failure: Mutex<Option<Instant>>,
    suppression_window: Duration,
    suppress_on_connect_failure: bool,
    clock: Arc<dyn Clock>,
}

impl LumberjackTarget<TlsConnector> {
    /// Construct a target that will speak TLS to the collector named in `config`.
    ///
    /// Nothing is connected until the first event is submitted.
    pub fn new(config: &LumberjackConfig) -> Result<Self> {
        Ok(LumberjackTarget::with_connector(
            config,
            TlsConnector::new(config)?,
        ))
    }
}

impl<C: Connector> LumberjackTarget<C> {
    /// Construct a target with a custom [`Connector`].
    pub fn with_connector(config: &LumberjackConfig, connector: C) -> Self {
        LumberjackTarget {
            encoder: FrameEncoder::new(config),
            connections: ConnectionManager::new(connector),
            write_lock: Mutex::new(()),
            last_failure: Mutex::new(None),
            suppression_window: config.suppression_window(),
            suppress_on_connect_failure: config.suppress_on_connect_failure(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn connections(&self) -> &ConnectionManager<C> {
        &self.connections
    }

    /// True if a recent failure is suppressing writes.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed_at(self.clock.now())
    }

    fn suppressed_at(&self, now: Instant) -> bool {
        lock(&self.last_failure).map_or(false, |at| {
            now.saturating_duration_since(at) < self.suppression_window
        })
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let mut last = lock(&self.last_failure);
        *last = Some(last.map_or(now, |prev| prev.max(now)));
    }

    /// Frame `event` & write it to the collector.
    ///
    /// Returns `Ok(())` without doing anything while writes are suppressed.
    pub fn submit(&self, event: &LogEvent) -> Result<()> {
        if self.suppressed_at(self.clock.now()) {
            trace!("Dropping event #{} inside the suppression window", event.sequence);
            return Ok(());
        }

        let frame = self.encoder.encode(event.sequence, event)?;

        // Another writer may have failed since the check above; the connection manager asks again
        // under its own lock, so nothing reconnects inside the window.
        let transport = match self
            .connections
            .acquire_unless(|| self.suppressed_at(self.clock.now()))
        {
            Ok(Some(transport)) => transport,
            Ok(None) => {
                trace!("Dropping event #{} inside the suppression window", event.sequence);
                return Ok(());
            }
            Err(err) => {
                if self.suppress_on_connect_failure {
                    self.record_failure();
                }
                return Err(err);
            }
        };

        let sent = {
            let _guard = lock(&self.write_lock);
            if self.suppressed_at(self.clock.now()) {
                trace!("Dropping event #{} inside the suppression window", event.sequence);
                return Ok(());
            }
            transport.send(&frame)
        };
        if let Err(err) = sent {
            error!("{}; suppressing writes for {:?}", err, self.suppression_window);
            self.record_failure();
            self.connections.discard(&transport);
            return Err(err);
        }
        Ok(())
    }

    /// Close the connection, if there is one. The next submission will reconnect.
    pub fn close(&self) {
        self.connections.release();
    }
}

impl<C: Connector> Drop for LumberjackTarget<C> {
    fn drop(&mut self) {
        self.connections.release();
    }
}
