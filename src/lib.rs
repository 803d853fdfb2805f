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
//! A [`tracing-subscriber`] [`Layer`] implementation for shipping [`tracing`] [`Event`]s to a
//! [Lumberjack] collector
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [Lumberjack]: https://github.com/elastic/logstash-forwarder/blob/master/PROTOCOL.md
//!
//! # Introduction
//!
//! Lumberjack is a small binary protocol for pushing log events to a collector. Each event travels
//! as one "data frame": a short header followed by a list of string key/value pairs. This crate
//! speaks the client side of it over a single, long-lived TLS connection.
//!
//! Note that the frames written here carry a *one-byte* pair count, where the protocol linked
//! above (& hence Logstash's lumberjack input) expects four bytes. The collector on the other end
//! must read the one-byte form; [`frame::decode`] does.
//!
//! The work happens in three stages:
//!
//! 1. a [`LogEvent`](event::LogEvent) is encoded to a [`Frame`](frame::Frame) by the
//!    [`FrameEncoder`](frame::FrameEncoder)
//!
//! 2. the [`LumberjackTarget`](target::LumberjackTarget) fetches the shared connection from its
//!    [`ConnectionManager`](transport::ConnectionManager), opening it if need be
//!
//! 3. the frame is written under a lock, so concurrent producers never interleave on the wire
//!
//! A background thread drains whatever the collector sends back; nothing it sends is
//! interpreted, so delivery is not guaranteed.
//!
//! When a write fails the connection is dropped & further writes are silently skipped for a
//! minute, so that a struggling collector can't stall the application.
//!
//! # Usage
//!
//! ```no_run
//! use tracing::info;
//! use lumberjack_tracing::{config::LumberjackConfig, layer::Layer};
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! let config = LumberjackConfig::builder("logs.example.com")
//!     .fingerprint("089832f943a790649fff6966fa82375ce38bf30c")
//!     .unwrap()
//!     .build();
//! let subscriber = Registry::default().with(Layer::new(&config).unwrap());
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! info!(user = "alice", "Hello, world!");
//! ```
//!
//! Callers with their own event pipeline can drive a
//! [`LumberjackTarget`](target::LumberjackTarget) directly:
//!
//! ```no_run
//! use lumberjack_tracing::{config::LumberjackConfig, event::LogEvent, target::LumberjackTarget};
//!
//! let target = LumberjackTarget::new(&LumberjackConfig::builder("localhost").build()).unwrap();
//! target
//!     .submit(&LogEvent::new("App", "Info", "hello").with_property("user", "alice"))
//!     .unwrap();
//! ```

pub mod clock;
pub mod config;
mod drain;
pub mod error;
pub mod event;
pub mod frame;
pub mod layer;
pub mod target;
pub mod transport;
