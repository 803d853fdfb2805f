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

//! Ship frames to an in-process TLS collector.

use lumberjack_tracing::{
    config::LumberjackConfig,
    error::Error,
    event::{EventError, LogEvent},
    frame::{decode, DecodedFrame},
    target::LumberjackTarget,
    transport::{Connector, TlsConnector, Transport},
};

use rustls::{ServerConfig, ServerConnection, StreamOwned};

use std::{
    collections::HashSet,
    io::{Read, Write},
    net::{SocketAddr, TcpListener},
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};

const CERT_PEM: &str = include_str!("data/collector.crt");
const KEY_PEM: &str = include_str!("data/collector.key");
const SHA1_FINGERPRINT: &str = "089832F943A790649FFF6966FA82375CE38BF30C";
const SHA256_FINGERPRINT: &str =
    "DF:FA:7A:70:6E:F3:A4:23:CF:6B:8F:32:3C:6F:E0:BA:2C:B8:19:62:2D:9A:CA:EE:5D:DB:54:30:AF:55:4A:C5";

fn server_config() -> Arc<ServerConfig> {
    let certs = rustls_pemfile::certs(&mut CERT_PEM.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut KEY_PEM.as_bytes())
        .unwrap()
        .unwrap();
    Arc::new(
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .unwrap(),
    )
}

/// Accept one connection, complete the handshake & collect up to `expect` frames.
///
/// The frames read are sent down the returned channel once `expect` have arrived or the connection
/// dies, whichever comes first; the connection is then dropped.
fn spawn_collector(expect: usize) -> (SocketAddr, mpsc::Receiver<Vec<DecodedFrame>>) {
    spawn_chatty_collector(expect, 0)
}

/// As [`spawn_collector`], but push `chatter` bytes at the client before reading anything.
fn spawn_chatty_collector(
    expect: usize,
    chatter: usize,
) -> (SocketAddr, mpsc::Receiver<Vec<DecodedFrame>>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        let conn = ServerConnection::new(server_config()).unwrap();
        let mut stream = StreamOwned::new(conn, tcp);
        let mut frames = Vec::new();
        while stream.conn.is_handshaking() {
            if stream.conn.complete_io(&mut stream.sock).is_err() {
                let _ = tx.send(frames);
                return;
            }
        }
        if chatter > 0
            && (stream.write_all(&vec![b'A'; chatter]).is_err() || stream.flush().is_err())
        {
            let _ = tx.send(frames);
            return;
        }
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = [0u8; 4096];
        while frames.len() < expect {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
            }
            while let Some((frame, used)) = decode(&pending).unwrap() {
                frames.push(frame);
                pending.drain(..used);
            }
        }
        let _ = tx.send(frames);
    });
    (addr, rx)
}

fn config(addr: SocketAddr) -> lumberjack_tracing::config::LumberjackConfigBuilder {
    LumberjackConfig::builder(addr.ip().to_string())
        .port(addr.port())
        .hostname("bree.local")
        .connect_timeout(Duration::from_secs(2))
}

fn recv(rx: &mpsc::Receiver<Vec<DecodedFrame>>) -> Vec<DecodedFrame> {
    rx.recv_timeout(Duration::from_secs(10))
        .expect("collector result")
}

#[test]
fn single_event_scenario() {
    let (addr, rx) = spawn_collector(1);
    let target = LumberjackTarget::new(&config(addr).build()).unwrap();
    target
        .submit(&LogEvent::new("App", "Info", "hello"))
        .unwrap();

    let frames = recv(&rx);
    assert_eq!(frames.len(), 1);
    let pairs: Vec<(&str, &str)> = frames[0]
        .fields
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(pairs.len(), 6);
    assert_eq!(pairs[0], ("logger", "App"));
    assert_eq!(pairs[1], ("offset", "0"));
    assert_eq!(pairs[2], ("host", "bree.local"));
    assert_eq!(pairs[3], ("line", "hello"));
    assert_eq!(pairs[4], ("level", "Info"));
    assert_eq!(pairs[5].0, "eventTimestamp");
}

#[test]
fn matching_fingerprints_are_accepted() {
    for fingerprint in [
        SHA1_FINGERPRINT.to_string(),
        SHA1_FINGERPRINT.to_lowercase(),
        SHA256_FINGERPRINT.to_string(),
    ] {
        let (addr, rx) = spawn_collector(1);
        let target = LumberjackTarget::new(
            &config(addr).fingerprint(&fingerprint).unwrap().build(),
        )
        .unwrap();
        target
            .submit(
                &LogEvent::new("App", "Error", "pinned")
                    .with_error(EventError::new("oops", "at main")),
            )
            .unwrap();
        let frames = recv(&rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].fields.len(), 8);
        assert_eq!(frames[0].get("exceptionMessage"), Some("oops"));
    }
}

#[test]
fn mismatched_fingerprints_are_refused() {
    let (addr, rx) = spawn_collector(1);
    let target = LumberjackTarget::new(
        &config(addr)
            .fingerprint("0000000000000000000000000000000000000000")
            .unwrap()
            .build(),
    )
    .unwrap();
    assert!(matches!(
        target.submit(&LogEvent::new("App", "Info", "secret")),
        Err(Error::Handshake { .. })
    ));
    assert!(!target.connections().is_connected());
    assert!(recv(&rx).is_empty());
}

#[test]
fn refused_connections_are_reported() {
    let addr = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap()
    };
    let target = LumberjackTarget::new(&config(addr).build()).unwrap();
    assert!(matches!(
        target.submit(&LogEvent::new("App", "Info", "nobody home")),
        Err(Error::Connect { .. })
    ));
    assert!(!target.is_suppressed());
}

#[test]
fn concurrent_producers_share_one_connection() {
    const THREADS: usize = 4;
    const EVENTS: usize = 25;
    let (addr, rx) = spawn_collector(THREADS * EVENTS);
    let target = Arc::new(LumberjackTarget::new(&config(addr).build()).unwrap());
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let target = target.clone();
            thread::spawn(move || {
                for i in 0..EVENTS {
                    target
                        .submit(
                            &LogEvent::new("App", "Info", format!("{}/{}", t, i))
                                .with_property("producer", t),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let frames = recv(&rx);
    assert_eq!(frames.len(), THREADS * EVENTS);
    let lines: HashSet<&str> = frames.iter().filter_map(|f| f.get("line")).collect();
    assert_eq!(lines.len(), THREADS * EVENTS);
    let sequences: HashSet<u32> = frames.iter().map(|f| f.sequence).collect();
    assert_eq!(sequences.len(), THREADS * EVENTS);
    for frame in &frames {
        assert_eq!(frame.fields.len(), 7);
    }
}

#[test]
fn shutdown_stops_the_drain_thread() {
    let (addr, rx) = spawn_collector(1);
    let connector = TlsConnector::new(&config(addr).build()).unwrap();
    let transport = connector.connect().unwrap();
    assert!(transport.is_draining());
    transport.shutdown();
    assert!(!transport.is_draining());
    transport.shutdown();
    assert!(recv(&rx).is_empty());
}

#[test]
fn drain_thread_exits_when_the_collector_hangs_up() {
    let (addr, rx) = spawn_collector(0);
    let connector = TlsConnector::new(&config(addr).build()).unwrap();
    let transport = connector.connect().unwrap();
    assert!(recv(&rx).is_empty());
    let deadline = Instant::now() + Duration::from_secs(10);
    while transport.is_draining() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!transport.is_draining());
}

#[test]
fn closing_the_target_drops_the_connection() {
    let (addr, rx) = spawn_collector(1);
    let target = LumberjackTarget::new(&config(addr).build()).unwrap();
    target.submit(&LogEvent::new("App", "Info", "one")).unwrap();
    assert_eq!(recv(&rx).len(), 1);
    target.close();
    assert!(!target.connections().is_connected());
    target.close();
}

#[test]
fn a_chatty_collector_does_not_stall_a_large_write() {
    const CHATTER: usize = 16 << 20;
    let (addr, rx) = spawn_chatty_collector(1, CHATTER);
    let target = LumberjackTarget::new(
        &config(addr)
            .write_timeout(Duration::from_secs(30))
            .build(),
    )
    .unwrap();
    let line = "x".repeat(16 << 20);
    target
        .submit(&LogEvent::new("App", "Info", line.clone()))
        .unwrap();
    let frames = recv(&rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].get("line").map(str::len), Some(line.len()));
    assert!(!target.is_suppressed());
}
