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

//! Draining the collector's side of a connection.
//!
//! Collectors answer data frames with acknowledgements we never look at. Left unread, they would
//! eventually fill the socket's receive buffer. Each connection therefore gets a thread that reads
//! & discards whatever arrives until the connection dies. The ciphertext is read without holding
//! any lock; only feeding it to the TLS state machine briefly takes the lock the writers share.
//! This thread never writes: replies the TLS state machine queues (key updates, say) go out with
//! the next frame.

use crate::transport::lock;

use rustls::ClientConnection;
use tracing::{warn, Span};

use std::{
    io::{self, Read},
    net::TcpStream,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

pub const DRAIN_BUFFER_SIZE: usize = 512;

/// Start draining `socket` on a new thread.
///
/// The thread runs until a read fails or the collector closes the connection, then logs the reason
/// at WARN & exits.
pub fn spawn(
    peer: String,
    socket: TcpStream,
    tls: Arc<Mutex<ClientConnection>>,
) -> io::Result<JoinHandle<()>> {
    // Log from within whatever span opened the connection.
    let span = Span::current();
    thread::Builder::new()
        .name("lumberjack-drain".to_string())
        .spawn(move || {
            let _entered = span.enter();
            let reason = drain(socket, &tls);
            warn!("Unable to drain the connection to {}: {}", peer, reason);
        })
}

fn drain(mut socket: TcpStream, tls: &Mutex<ClientConnection>) -> io::Error {
    let mut buf = [0u8; DRAIN_BUFFER_SIZE];
    let mut plaintext = [0u8; DRAIN_BUFFER_SIZE];
    loop {
        let n = match socket.read(&mut buf) {
            Ok(0) => {
                return io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "the connection was closed",
                )
            }
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return err,
        };

        let mut tls = lock(tls);
        let mut incoming = &buf[..n];
        while !incoming.is_empty() {
            if let Err(err) = tls.read_tls(&mut incoming) {
                return err;
            }
            if let Err(err) = tls.process_new_packets() {
                return io::Error::new(io::ErrorKind::InvalidData, err);
            }
            loop {
                match tls.reader().read(&mut plaintext) {
                    Ok(0) => {
                        return io::Error::new(
                            io::ErrorKind::ConnectionAborted,
                            "the collector sent close_notify",
                        )
                    }
                    Ok(_) => continue,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(err) => return err,
                }
            }
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use rustls::{ClientConfig, RootCertStore};
    use tracing_test::traced_test;

    use std::net::TcpListener;

    fn client() -> ClientConnection {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(RootCertStore::empty())
        .with_no_client_auth();
        ClientConnection::new(Arc::new(config), "localhost".try_into().unwrap()).unwrap()
    }

    #[test]
    #[traced_test]
    fn hang_ups_are_logged_at_warn() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let socket = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (collector, _) = listener.accept().unwrap();
        drop(collector);

        let handle = spawn(
            "collector:5000".to_string(),
            socket,
            Arc::new(Mutex::new(client())),
        )
        .unwrap();
        handle.join().unwrap();

        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| {
                    line.contains("WARN")
                        && line.contains("Unable to drain the connection to collector:5000")
                })
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one WARN line for the hang-up, got {}", n)),
            }
        });
    }
}
