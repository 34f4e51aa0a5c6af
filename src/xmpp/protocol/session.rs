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

use tracing::debug;

use crate::Element;
use crate::xmpp::constants::CLIENT_NS;
use crate::xmpp::dispatch::Dispatch;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::dispatch::DispatchRegistry;
use crate::xmpp::error::StreamFault;
use crate::xmpp::extensions::roster::RosterItem;
use crate::xmpp::jid::Jid;
use crate::xmpp::sasl::Mechanism;
use crate::xmpp::sasl::SaslError;
use crate::xmpp::stanza::Stanza;

use super::config::SessionConfig;

#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash)]
pub enum Status {
    Disconnected,
    Connected,
    Authenticated,
    Bound,
}

/// Negotiation progress of one connection.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct SessionState {
    pub(super) status: Status,
    pub(super) jid: Option<Jid>,
    pub(super) mechanism: Option<Mechanism>,
    pub(super) tls_active: bool,
}

impl SessionState {
    fn new() -> SessionState {
        SessionState {
            status: Status::Disconnected,
            jid: None,
            mechanism: None,
            tls_active: false,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Full Jid assigned by the server at bind time.
    pub fn jid(&self) -> Option<&Jid> {
        self.jid.as_ref()
    }

    pub fn mechanism(&self) -> Option<Mechanism> {
        self.mechanism
    }

    pub fn tls_active(&self) -> bool {
        self.tls_active
    }
}

/// Output of the engine, consumed in order by the transport driver.
#[derive(Debug, PartialEq, Clone)]
pub enum StreamEvent {
    /// Bytes to write to the transport.
    Send(Vec<u8>),
    /// The server accepted StartTLS. The driver upgrades the transport and
    /// calls `tls_established`.
    StartTls,
    Bound(Jid),
    /// Answer to the roster request made after binding.
    Roster(Vec<RosterItem>),
    /// Items changed by a server roster push.
    RosterPush(Vec<RosterItem>),
    /// The server changed the privacy list with this name. Fetch it again
    /// to see the new items.
    PrivacyPush(String),
    /// A stanza no handler took.
    Stanza(Stanza),
    AuthFailed(SaslError),
    StreamFault(StreamFault),
    /// The stream is closed, the driver should close the transport.
    End,
}

pub type BoundCallback = Box<dyn FnOnce(&mut Session) + Send>;

#[derive(Debug, Default)]
pub(super) struct SaslState {
    pub(super) expected_rspauth: Option<String>,
    pub(super) verified: bool,
    pub(super) failed: bool,
}

/// The context passed to every handler.
///
/// Handlers use it to queue outbound data, to register further handlers
/// and to look at the negotiation state.
pub struct Session {
    config: SessionConfig,
    registry: DispatchRegistry<Session>,
    pub(super) state: SessionState,
    events: VecDeque<StreamEvent>,
    pub(super) sasl: SaslState,
    pub(super) reset_requested: bool,
    pub(super) session_offered: bool,
    pub(super) on_bound: Option<BoundCallback>,
    pub(super) stream_id: Option<String>,
    closed: bool,
}

impl Session {
    pub(super) fn new(
        config: SessionConfig,
        registry: DispatchRegistry<Session>,
        on_bound: Option<BoundCallback>,
    ) -> Session {
        Session {
            config,
            registry,
            state: SessionState::new(),
            events: VecDeque::new(),
            sasl: SaslState::default(),
            reset_requested: false,
            session_offered: false,
            on_bound,
            stream_id: None,
            closed: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Id the server gave to the current stream.
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn send(&mut self, stanza: &Stanza) {
        self.send_raw(stanza.to_bytes());
    }

    pub fn send_element(&mut self, element: &Element) {
        self.send_raw(element.to_stream_string(CLIENT_NS).into_bytes());
    }

    pub(crate) fn send_raw(&mut self, bytes: Vec<u8>) {
        if self.closed {
            debug!(len = bytes.len(), "dropping output on a closed stream");
            return;
        }
        self.events.push_back(StreamEvent::Send(bytes));
    }

    /// Queues an event for the driver.
    pub fn emit(&mut self, event: StreamEvent) {
        self.events.push_back(event);
    }

    pub fn register<F>(&mut self, key: DispatchKey, callback: F, once: bool)
    where
        F: FnMut(&mut Session, &Element) + Send + 'static,
    {
        self.registry.register(key, callback, once);
    }

    pub fn unregister(&mut self, key: &DispatchKey) -> bool {
        self.registry.unregister(key)
    }

    pub(super) fn pop_event(&mut self) -> Option<StreamEvent> {
        self.events.pop_front()
    }

    /// Ends the session: drops pending handlers without calling them and
    /// tells the driver to close the transport.
    pub(super) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.state.status = Status::Disconnected;
        self.closed = true;
        self.registry.clear();
        self.on_bound = None;
        self.events.push_back(StreamEvent::End);
    }
}

impl Dispatch for Session {
    fn registry(&mut self) -> &mut DispatchRegistry<Session> {
        &mut self.registry
    }
}
