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

//! The log events this crate ships.
//!
//! A [`LogEvent`] is an already-rendered record: whatever produced it (the [`Layer`], or a caller
//! driving a [`LumberjackTarget`] directly) has decided on the logger name, the level name & the
//! message text. The frame encoder only ever reads it.
//!
//! [`Layer`]: crate::layer::Layer
//! [`LumberjackTarget`]: crate::target::LumberjackTarget

use chrono::prelude::*;

use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Hand out the next process-wide sequence number.
pub fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// An error associated with a [`LogEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventError {
    pub message: String,
    pub stack: String,
}

impl EventError {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> EventError {
        EventError {
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// Capture `err`; its chain of sources, one per line, stands in for the stack text.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> EventError {
        let mut stack = Vec::new();
        let mut cause = err.source();
        while let Some(inner) = cause {
            stack.push(format!("caused by: {}", inner));
            cause = inner.source();
        }
        EventError {
            message: err.to_string(),
            stack: stack.join("\n"),
        }
    }
}

/// One structured log event, ready to be framed.
#[derive(Clone, Debug)]
pub struct LogEvent {
    pub sequence: u64,
    pub logger: String,
    pub line: String,
    pub level: String,
    pub timestamp: DateTime<Local>,
    pub error: Option<EventError>,
    pub properties: Vec<(String, String)>,
}

impl LogEvent {
    /// Stamp a new event with the next sequence number & the current local time.
    pub fn new(
        logger: impl Into<String>,
        level: impl Into<String>,
        line: impl Into<String>,
    ) -> LogEvent {
        LogEvent {
            sequence: next_sequence(),
            logger: logger.into(),
            line: line.into(),
            level: level.into(),
            timestamp: Local::now(),
            error: None,
            properties: Vec::new(),
        }
    }
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }
    pub fn with_error(mut self, error: EventError) -> Self {
        self.error = Some(error);
        self
    }
    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.push((key.into(), value.to_string()));
        self
    }
}
