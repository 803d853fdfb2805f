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

//! [lumberjack-tracing](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! Each [`tracing`] [`Event`] becomes one [`LogEvent`]:
//!
//! - the logger is the event's target
//! - the level is one of `Trace`, `Debug`, `Info`, `Warn` or `Error`
//! - the line is the event's "message" field
//! - the first field recorded as an error becomes the associated error
//! - every other field becomes a property
//!
//! Events emitted by this crate itself are never shipped; they would only feed back into the
//! connection whose trouble they report.
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html

use crate::{
    config::LumberjackConfig,
    error::Result,
    event::{next_sequence, EventError, LogEvent},
    target::LumberjackTarget,
    transport::{Connector, TlsConnector},
};

use chrono::prelude::*;
use tracing::Event;
use tracing_subscriber::layer::Context;

// When the tracing-log feature is enabled, use NormalizeEvent to recover the metadata of events
// that originated from the `log` crate, as tracing-subscriber's fmt layer does.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

use std::sync::Arc;

const OWN_TARGET: &str = "lumberjack_tracing";

fn level_name(level: &tracing::Level) -> &'static str {
    match *level {
        tracing::Level::TRACE => "Trace",
        tracing::Level::DEBUG => "Debug",
        tracing::Level::INFO => "Info",
        tracing::Level::WARN => "Warn",
        tracing::Level::ERROR => "Error",
    }
}

#[derive(Default)]
struct LogEventVisitor {
    message: Option<String>,
    error: Option<EventError>,
    properties: Vec<(String, String)>,
}

impl LogEventVisitor {
    fn push_property(&mut self, field: &tracing::field::Field, value: String) {
        // Events bridged from the `log` crate carry their metadata as `log.*` fields; it's
        // already been folded into the normalized metadata.
        if cfg!(feature = "tracing-log") && field.name().starts_with("log.") {
            return;
        }
        self.properties.push((field.name().to_string(), value));
    }
}

impl tracing::field::Visit for LogEventVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push_property(field, value.to_string());
        }
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        if self.error.is_none() {
            self.error = Some(EventError::from_error(value));
        } else {
            self.push_property(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        // The tracing macros pre-format the "message" field into an `Arguments`, whose `Debug`
        // output carries no enclosing quotes.
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push_property(field, format!("{:?}", value));
        }
    }
}

/// A [`tracing-subscriber`]-compliant [`Layer`] that ships [`Event`]s to a lumberjack collector.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct Layer<C: Connector = TlsConnector> {
    target: Arc<LumberjackTarget<C>>,
}

impl Layer<TlsConnector> {
    /// Construct a [`Layer`] that will ship events over TLS to the collector in `config`.
    pub fn new(config: &LumberjackConfig) -> Result<Self> {
        Ok(Layer {
            target: Arc::new(LumberjackTarget::new(config)?),
        })
    }
}

impl<C: Connector> Layer<C> {
    /// Construct a [`Layer`] that submits to an existing target.
    pub fn with_target(target: Arc<LumberjackTarget<C>>) -> Self {
        Layer { target }
    }
    pub fn target(&self) -> &Arc<LumberjackTarget<C>> {
        &self.target
    }
}

impl<S, C> tracing_subscriber::layer::Layer<S> for Layer<C>
where
    S: tracing::Subscriber,
    C: Connector,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        if meta.target().starts_with(OWN_TARGET) {
            return;
        }

        let mut visitor = LogEventVisitor::default();
        event.record(&mut visitor);
        let log_event = LogEvent {
            sequence: next_sequence(),
            logger: meta.target().to_string(),
            line: visitor.message.unwrap_or_default(),
            level: level_name(meta.level()).to_string(),
            timestamp: Local::now(),
            error: visitor.error,
            properties: visitor.properties,
        };
        if let Err(err) = self.target.submit(&log_event) {
            ::tracing::error!("lumberjack-tracing failed to ship an event: {}", err);
        }
    }
}
