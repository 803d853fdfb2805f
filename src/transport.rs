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

//! The lumberjack transport layer.
//!
//! This module defines the [`Transport`] trait (one live link to a collector) & the [`Connector`]
//! trait (a way of opening new ones), along with the TLS implementation of both. It also holds
//! the [`ConnectionManager`], which keeps at most one [`Transport`] alive at a time.
//!
//! # Certificate trust
//!
//! [`TlsConnector`] does *not* do certificate-authority validation. If a [`Fingerprint`] is
//! configured, the handshake succeeds only if the hash of the collector's certificate matches it;
//! if none is configured, any certificate is accepted.
//!
//! [`Fingerprint`]: crate::config::Fingerprint

use crate::{
    config::{Fingerprint, FingerprintDigest, LumberjackConfig, TlsVersion},
    drain,
    error::{Error, Result},
    frame::Frame,
};

use backtrace::Backtrace;
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, ServerName, UnixTime},
    CertificateError, ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme,
    SupportedProtocolVersion,
};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::{debug, warn};

use std::{
    io::{self, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
    time::Duration,
};

/// Lock `mutex`, carrying on if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
pub trait Transport: Send + Sync + 'static {
    /// Push one frame onto the wire, in its entirety.
    ///
    /// Implementations needn't serialize concurrent callers; the [`LumberjackTarget`] holds its
    /// write lock around each call.
    ///
    /// [`LumberjackTarget`]: crate::target::LumberjackTarget
    fn send(&self, frame: &Frame) -> Result<()>;
    /// Close the link. Must be idempotent.
    fn shutdown(&self);
}

/// Something that can open new [`Transport`]s to a collector.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;
    fn connect(&self) -> Result<Self::Transport>;
}

/// Hex-encoded hash of a DER-encoded certificate.
pub fn certificate_fingerprint(der: &[u8], digest: FingerprintDigest) -> String {
    match digest {
        FingerprintDigest::Sha1 => hex::encode(Sha1::digest(der)),
        FingerprintDigest::Sha256 => hex::encode(Sha256::digest(der)),
    }
}

/// Certificate verifier implementing fingerprint pinning (or no verification at all).
///
/// Handshake signatures are still checked, so the peer must hold the key for the certificate it
/// presents.
#[derive(Debug)]
struct PinnedCertVerifier {
    fingerprint: Option<Fingerprint>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let expected = match &self.fingerprint {
            Some(fingerprint) => fingerprint,
            None => return Ok(ServerCertVerified::assertion()),
        };
        let actual = certificate_fingerprint(end_entity.as_ref(), expected.digest());
        if expected.matches(&actual) {
            Ok(ServerCertVerified::assertion())
        } else {
            warn!(
                "Collector certificate fingerprint {} does not match the pinned {}",
                actual, expected
            );
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Opens TLS connections to one collector.
pub struct TlsConnector {
    host: String,
    port: u16,
    server_name: ServerName<'static>,
    tls_config: Arc<ClientConfig>,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TlsConnector {
    pub fn new(config: &LumberjackConfig) -> Result<TlsConnector> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = PinnedCertVerifier {
            fingerprint: config.fingerprint().cloned(),
            algorithms: provider.signature_verification_algorithms,
        };
        let versions: &[&'static SupportedProtocolVersion] = match config.min_tls_version() {
            TlsVersion::Tls12 => &[&rustls::version::TLS13, &rustls::version::TLS12],
            TlsVersion::Tls13 => &[&rustls::version::TLS13],
        };
        let tls_config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(versions)
            .map_err(|err| Error::BadConfig {
                what: err.to_string(),
                back: Backtrace::new(),
            })?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();
        let server_name =
            ServerName::try_from(config.host().to_string()).map_err(|_| Error::BadServerName {
                host: config.host().to_string(),
                back: Backtrace::new(),
            })?;
        Ok(TlsConnector {
            host: config.host().to_string(),
            port: config.port(),
            server_name,
            tls_config: Arc::new(tls_config),
            connect_timeout: config.connect_timeout(),
            write_timeout: config.write_timeout(),
        })
    }

    fn connect_tcp(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}:{} resolved to no addresses", self.host, self.port),
            )
        }))
    }

    fn handshake(&self, socket: &TcpStream) -> io::Result<ClientConnection> {
        let mut conn = ClientConnection::new(self.tls_config.clone(), self.server_name.clone())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        // Frames are written whole, whatever their size.
        conn.set_buffer_limit(None);
        socket.set_read_timeout(Some(self.connect_timeout))?;
        socket.set_write_timeout(Some(self.connect_timeout))?;
        let mut io = socket;
        while conn.is_handshaking() {
            conn.complete_io(&mut io)?;
        }
        socket.set_read_timeout(None)?;
        socket.set_write_timeout(Some(self.write_timeout))?;
        Ok(conn)
    }
}

impl Connector for TlsConnector {
    type Transport = TlsTransport;
    fn connect(&self) -> Result<TlsTransport> {
        let peer = format!("{}:{}", self.host, self.port);
        let socket = self.connect_tcp().map_err(|err| Error::Connect {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        let conn = self.handshake(&socket).map_err(|err| Error::Handshake {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        let tls = Arc::new(Mutex::new(conn));
        let reader = socket.try_clone().map_err(|err| Error::Connect {
            source: Box::new(err),
            back: Backtrace::new(),
        })?;
        let drain = drain::spawn(peer.clone(), reader, tls.clone()).map_err(|err| {
            Error::Connect {
                source: Box::new(err),
                back: Backtrace::new(),
            }
        })?;
        debug!("Connected to lumberjack collector at {}", peer);
        Ok(TlsTransport {
            peer,
            socket,
            tls,
            writing: Mutex::new(()),
            drain: Mutex::new(Some(drain)),
        })
    }
}

/// One TLS connection to a collector, along with its drain thread.
///
/// The TLS state is shared with the drain thread, but the lock on it is only ever held while
/// records are sealed or opened, never across socket I/O. A writer stuck on a full send buffer
/// therefore never keeps the drain thread from emptying the receive buffer.
pub struct TlsTransport {
    peer: String,
    socket: TcpStream,
    tls: Arc<Mutex<ClientConnection>>,
    // Held from sealing a record until it's on the socket, so records go out in sealed order.
    writing: Mutex<()>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl TlsTransport {
    /// True while the drain thread is still running.
    pub fn is_draining(&self) -> bool {
        lock(&self.drain)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Run `fill` against the TLS state & collect the resulting ciphertext.
    ///
    /// Anything the drain thread left queued (key update replies, say) goes out ahead of it.
    fn seal(
        &self,
        fill: impl FnOnce(&mut ClientConnection) -> io::Result<()>,
    ) -> io::Result<Vec<u8>> {
        let mut tls = lock(&self.tls);
        fill(&mut *tls)?;
        let mut sealed = Vec::new();
        while tls.wants_write() {
            tls.write_tls(&mut sealed)?;
        }
        Ok(sealed)
    }
}

impl Transport for TlsTransport {
    fn send(&self, frame: &Frame) -> Result<()> {
        let _writing = lock(&self.writing);
        // `Write` is implemented for `&TcpStream`, so a shared reference will do as a writer.
        let mut socket: &TcpStream = &self.socket;
        self.seal(|tls| tls.writer().write_all(frame))
            .and_then(|sealed| socket.write_all(&sealed))
            .map_err(|err| Error::Write {
                source: Box::new(err),
                back: Backtrace::new(),
            })
    }

    fn shutdown(&self) {
        {
            let _writing = lock(&self.writing);
            let mut socket: &TcpStream = &self.socket;
            let close_notify = self.seal(|tls| {
                tls.send_close_notify();
                Ok(())
            });
            if let Ok(sealed) = close_notify {
                let _ = socket.write_all(&sealed);
            }
        }
        let _ = self.socket.shutdown(Shutdown::Both);
        let drain = lock(&self.drain).take();
        if let Some(handle) = drain {
            if handle.join().is_err() {
                warn!("The drain thread for {} panicked", self.peer);
            }
        }
        debug!("Closed the connection to {}", self.peer);
    }
}

impl Drop for TlsTransport {
    fn drop(&mut self) {
        // An abandoned connection still has a drain thread blocked on the socket; closing it
        // lets that thread exit.
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      connection management                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Owns the (at most one) live [`Transport`] produced by a [`Connector`].
pub struct ConnectionManager<C: Connector> {
    connector: C,
    live: Mutex<Option<Arc<C::Transport>>>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> ConnectionManager<C> {
        ConnectionManager {
            connector,
            live: Mutex::new(None),
        }
    }

    /// Return the live transport, connecting first if there is none.
    ///
    /// Concurrent callers queue on the lock while a connection attempt is in flight, then share
    /// its result.
    pub fn acquire(&self) -> Result<Arc<C::Transport>> {
        let mut live = lock(&self.live);
        self.live_or_connect(&mut *live)
    }

    /// As [`acquire`], but first evaluate `skip` under the connection lock; if it returns true,
    /// return `None` without connecting.
    ///
    /// [`acquire`]: ConnectionManager::acquire
    pub fn acquire_unless(
        &self,
        skip: impl FnOnce() -> bool,
    ) -> Result<Option<Arc<C::Transport>>> {
        let mut live = lock(&self.live);
        if skip() {
            return Ok(None);
        }
        self.live_or_connect(&mut *live).map(Some)
    }

    fn live_or_connect(
        &self,
        live: &mut Option<Arc<C::Transport>>,
    ) -> Result<Arc<C::Transport>> {
        if let Some(transport) = live.as_ref() {
            return Ok(transport.clone());
        }
        let transport = Arc::new(self.connector.connect()?);
        *live = Some(transport.clone());
        Ok(transport)
    }

    /// Close & forget the live transport, if any.
    pub fn release(&self) {
        let mut live = lock(&self.live);
        if let Some(transport) = live.take() {
            transport.shutdown();
        }
    }

    /// Forget `stale` without closing it, provided it's still the live transport.
    ///
    /// The transport goes away once its last holder drops it; the next [`acquire`] connects
    /// afresh.
    ///
    /// [`acquire`]: ConnectionManager::acquire
    pub fn discard(&self, stale: &Arc<C::Transport>) {
        let mut live = lock(&self.live);
        if live
            .as_ref()
            .map_or(false, |transport| Arc::ptr_eq(transport, stale))
        {
            *live = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.live).is_some()
    }
}


#[cfg(test)]
mod test {

    use super::mock::*;
    use super::*;

    use std::sync::atomic::Ordering;

    #[test]
    fn acquire_reuses_the_live_transport() {
        let wire = Arc::new(Wire::default());
        let manager = ConnectionManager::new(MockConnector(wire.clone()));
        let a = manager.acquire().unwrap();
        let b = manager.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(wire.connects(), 1);
    }

    #[test]
    fn concurrent_acquires_connect_once() {
        let wire = Arc::new(Wire::default());
        let manager = Arc::new(ConnectionManager::new(MockConnector(wire.clone())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    manager.acquire().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(wire.connects(), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let wire = Arc::new(Wire::default());
        let manager = ConnectionManager::new(MockConnector(wire.clone()));
        manager.release();
        manager.acquire().unwrap();
        manager.release();
        manager.release();
        assert_eq!(wire.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!manager.is_connected());
        manager.acquire().unwrap();
        assert_eq!(wire.connects(), 2);
    }

    #[test]
    fn failed_connects_store_nothing() {
        let wire = Arc::new(Wire::default());
        wire.fail_connect.store(true, Ordering::SeqCst);
        let manager = ConnectionManager::new(MockConnector(wire.clone()));
        assert!(matches!(manager.acquire(), Err(Error::Connect { .. })));
        assert!(!manager.is_connected());
    }

    #[test]
    fn discard_only_forgets_the_live_transport() {
        let wire = Arc::new(Wire::default());
        let manager = ConnectionManager::new(MockConnector(wire.clone()));
        let stale = manager.acquire().unwrap();
        manager.discard(&stale);
        assert!(!manager.is_connected());
        assert_eq!(wire.shutdowns.load(Ordering::SeqCst), 0);

        let fresh = manager.acquire().unwrap();
        manager.discard(&stale);
        assert!(manager.is_connected());
        assert!(Arc::ptr_eq(&fresh, &manager.acquire().unwrap()));
    }

    #[test]
    fn acquire_unless_can_decline_without_connecting() {
        let wire = Arc::new(Wire::default());
        let manager = ConnectionManager::new(MockConnector(wire.clone()));
        assert!(manager.acquire_unless(|| true).unwrap().is_none());
        assert_eq!(wire.connects(), 0);
        assert!(!manager.is_connected());

        let first = manager.acquire_unless(|| false).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &manager.acquire().unwrap()));
        assert!(manager.acquire_unless(|| true).unwrap().is_none());
        assert_eq!(wire.connects(), 1);
    }

    #[test]
    fn fingerprints_of_der() {
        let der = b"not really a certificate";
        assert_eq!(
            certificate_fingerprint(der, FingerprintDigest::Sha1).len(),
            40
        );
        assert_eq!(
            certificate_fingerprint(der, FingerprintDigest::Sha256).len(),
            64
        );
    }

    #[test]
    fn bad_server_names() {
        let config = LumberjackConfig::builder("not a host name").build();
        assert!(matches!(
            TlsConnector::new(&config),
            Err(Error::BadServerName { .. })
        ));
    }
}
