/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::net::Shutdown;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls::pki_types::ServerName;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::constants::BIND_NS;
use super::constants::CLIENT_PORT;
use super::error::XmppClientError;
use super::jid::Jid;
use super::protocol::StreamEngine;
use super::protocol::StreamEngineBuilder;
use super::protocol::StreamEvent;
use super::stanza::ErrorCondition;
use super::stanza::Stanza;
use super::stanza::StanzaError;
use super::stanza::StanzaKind;
use super::stanza::StanzaType;

pub struct XmppClientBuilder {
    engine: StreamEngineBuilder,
    server: Option<String>,
    connection_timeout: Duration,
    debug: bool,
}

impl XmppClientBuilder {
    pub fn new(jid: Jid) -> Self {
        XmppClientBuilder {
            engine: StreamEngine::builder(jid),
            server: None,
            connection_timeout: Duration::from_secs(30),
            debug: false,
        }
    }

    /// Host to connect to instead of the domain of the Jid, with an
    /// optional port.
    pub fn server(mut self, server: Option<String>) -> Self {
        self.server = server;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Logs the raw traffic.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.engine = self.engine.password(password);
        self
    }

    pub fn resource(mut self, resource: &str) -> Self {
        self.engine = self.engine.resource(resource);
        self
    }

    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.engine = self.engine.use_tls(use_tls);
        self
    }

    /// Any other engine setting, handlers included.
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(StreamEngineBuilder) -> StreamEngineBuilder,
    {
        self.engine = configure(self.engine);
        self
    }

    pub fn connect(self) -> Result<XmppClient, XmppClientError> {
        let domain = self.engine.config().jid.domainpart().to_string();
        let host = match &self.server {
            Some(server) => server.as_str(),
            None => domain.as_str(),
        };
        // Rust resolver does require a port number but does NOT provide
        // a way to provide a default one :(
        let column_pos = host.find(':');
        let bracket_pos = host.find(']');
        let need_port = match (column_pos, bracket_pos) {
            (None, None) | (None, Some(_)) => true,
            (Some(_), None) => false,
            (Some(column), Some(bracket)) => column < bracket,
        };
        let mut addresses = if need_port {
            (host, CLIENT_PORT).to_socket_addrs()
        } else {
            host.to_socket_addrs()
        }?;
        let address = addresses.next().ok_or_else(|| {
            std::io::Error::new(ErrorKind::NotFound, format!("no address for {host}"))
        })?;
        info!(%address, "connecting");
        let tcp_stream = TcpStream::connect_timeout(&address, self.connection_timeout)?;

        let mut client = XmppClient {
            engine: self.engine.build(),
            transport: Transport::Tcp(tcp_stream),
            domain,
            read_buffer: vec![0; 4096],
            pending: VecDeque::new(),
            debug: self.debug,
        };
        client.engine.initiate();
        client.flush()?;
        Ok(client)
    }
}

enum Transport {
    None,
    Tcp(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// Blocking driver of a `StreamEngine` over TCP, upgraded to TLS when the
/// server offers it.
pub struct XmppClient {
    engine: StreamEngine,
    transport: Transport,
    domain: String,
    read_buffer: Vec<u8>,
    // Events read while waiting for something else
    pending: VecDeque<StreamEvent>,
    debug: bool,
}

impl XmppClient {
    pub fn build(jid: Jid) -> XmppClientBuilder {
        XmppClientBuilder::new(jid)
    }

    /// The engine, for registering handlers and issuing requests through
    /// its session. Call `flush` afterwards to write what they queued.
    pub fn engine(&mut self) -> &mut StreamEngine {
        &mut self.engine
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), XmppClientError> {
        if self.debug {
            debug!(data = %String::from_utf8_lossy(bytes), "sending");
        }
        match &mut self.transport {
            Transport::Tcp(stream) => stream.write_all(bytes)?,
            Transport::Tls(stream) => {
                stream.write_all(bytes)?;
                stream.flush()?;
            }
            Transport::None => return Err(XmppClientError::Disconnected),
        }
        Ok(())
    }

    fn read_bytes(&mut self) -> Result<usize, XmppClientError> {
        let nr_read = match &mut self.transport {
            Transport::Tcp(stream) => stream.read(&mut self.read_buffer)?,
            Transport::Tls(stream) => stream.read(&mut self.read_buffer)?,
            Transport::None => return Err(XmppClientError::Disconnected),
        };
        if self.debug {
            debug!(
                data = %String::from_utf8_lossy(&self.read_buffer[..nr_read]),
                "received"
            );
        }
        Ok(nr_read)
    }

    fn start_tls(&mut self) -> Result<(), XmppClientError> {
        let Transport::Tcp(tcp_stream) = std::mem::replace(&mut self.transport, Transport::None)
        else {
            return Err(XmppClientError::Disconnected);
        };
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let server_name = ServerName::try_from(self.domain.clone())
            .map_err(|_| XmppClientError::InvalidServerName(self.domain.clone()))?;
        let connection = ClientConnection::new(Arc::new(config), server_name)?;
        let mut stream = StreamOwned::new(connection, tcp_stream);
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }
        info!(domain = %self.domain, "TLS handshake completed");
        self.transport = Transport::Tls(Box::new(stream));
        self.engine.tls_established();
        Ok(())
    }

    /// Writes queued output and performs transport upgrades. Other events
    /// are kept for `next_event`.
    pub fn flush(&mut self) -> Result<(), XmppClientError> {
        while let Some(event) = self.engine.poll_event() {
            match event {
                StreamEvent::Send(bytes) => self.write_bytes(&bytes)?,
                StreamEvent::StartTls => self.start_tls()?,
                StreamEvent::End => {
                    self.close_transport();
                    self.pending.push_back(StreamEvent::End);
                }
                other => self.pending.push_back(other),
            }
        }
        Ok(())
    }

    fn close_transport(&mut self) {
        let transport = std::mem::replace(&mut self.transport, Transport::None);
        let tcp_stream = match transport {
            Transport::Tcp(stream) => stream,
            Transport::Tls(mut stream) => {
                stream.conn.send_close_notify();
                if let Err(err) = stream.conn.complete_io(&mut stream.sock) {
                    debug!(%err, "close notify not delivered");
                }
                stream.sock
            }
            Transport::None => return,
        };
        if let Err(err) = tcp_stream.shutdown(Shutdown::Both) {
            debug!(%err, "socket shutdown failed");
        }
    }

    /// Next event that is not handled by the driver itself, reading from
    /// the network as needed.
    pub fn next_event(&mut self) -> Result<StreamEvent, XmppClientError> {
        loop {
            self.flush()?;
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            let nr_read = self.read_bytes()?;
            if nr_read == 0 {
                warn!("connection closed by peer");
                self.close_transport();
                self.engine.terminate();
                for event in self.engine.events() {
                    if !matches!(event, StreamEvent::Send(_)) {
                        self.pending.push_back(event);
                    }
                }
                continue;
            }
            let received = self.read_buffer[..nr_read].to_vec();
            if let Err(err) = self.engine.receive_bytes(&received) {
                self.flush()?;
                return Err(err.into());
            }
        }
    }

    /// Runs the negotiation until a resource is bound.
    ///
    /// Roster and stanza events seen on the way stay queued for
    /// `next_event`.
    pub fn login(&mut self) -> Result<Jid, XmppClientError> {
        let mut seen = VecDeque::new();
        let result = loop {
            match self.next_event() {
                Ok(StreamEvent::Bound(jid)) => break Ok(jid),
                Ok(StreamEvent::AuthFailed(err)) => {
                    self.terminate()?;
                    break Err(err.into());
                }
                Ok(StreamEvent::StreamFault(fault)) => break Err(fault.into()),
                Ok(StreamEvent::End) => break Err(XmppClientError::Disconnected),
                Ok(StreamEvent::Stanza(stanza)) if is_bind_error(&stanza) => {
                    let err = stanza
                        .error()
                        .unwrap_or_else(|| StanzaError::new(ErrorCondition::UndefinedCondition));
                    self.terminate()?;
                    break Err(XmppClientError::BindFailed(err));
                }
                Ok(other) => seen.push_back(other),
                Err(err) => break Err(err),
            }
        };
        seen.append(&mut self.pending);
        self.pending = seen;
        result
    }

    /// Waits for the next stanza no handler took.
    pub fn wait_for_stanza(&mut self) -> Result<Stanza, XmppClientError> {
        loop {
            match self.next_event()? {
                StreamEvent::Stanza(stanza) => return Ok(stanza),
                StreamEvent::StreamFault(fault) => return Err(fault.into()),
                StreamEvent::End => return Err(XmppClientError::Disconnected),
                other => debug!(?other, "skipping event"),
            }
        }
    }

    pub fn send(&mut self, stanza: &Stanza) -> Result<(), XmppClientError> {
        self.engine.send(stanza);
        self.flush()
    }

    /// Closes the stream and the connection.
    pub fn terminate(&mut self) -> Result<(), XmppClientError> {
        self.engine.terminate();
        self.flush()
    }
}

fn is_bind_error(stanza: &Stanza) -> bool {
    stanza.kind() == StanzaKind::Iq
        && stanza.stanza_type() == Some(StanzaType::Error)
        && stanza.find_child("bind", BIND_NS).is_some()
}
