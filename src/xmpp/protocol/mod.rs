/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod config;
mod negotiation;
mod session;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::Element;
use crate::xmpp::StreamElement;
use crate::xmpp::StreamError;
use crate::xmpp::StreamParser;
use crate::xmpp::constants::CLIENT_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::dispatch::DispatchRegistry;
use crate::xmpp::dispatch::dispatch;
use crate::xmpp::extensions;
use crate::xmpp::jid::Jid;
use crate::xmpp::stanza::ErrorCondition;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaError;
use crate::xmpp::stanza::StanzaKind;
use crate::xmpp::stanza::StanzaType;

pub use config::DiscoIdentity;
pub use config::SessionConfig;
pub use config::SoftwareVersion;
pub use session::BoundCallback;
pub use session::Session;
pub use session::SessionState;
pub use session::Status;
pub use session::StreamEvent;

/// Sans-IO client side of one XMPP connection.
///
/// The engine never touches the network. The driver writes the bytes of
/// every `StreamEvent::Send` to the transport, feeds whatever it reads to
/// `receive_bytes`, and reacts to the other events in the order they are
/// queued.
///
/// # Examples
///
/// ```
/// use iks_xmpp::{Jid, StreamEngine, StreamEvent, Status};
///
/// let mut engine = StreamEngine::builder(Jid::new("juliet@example.com").unwrap())
///     .password("r0m30")
///     .build();
/// engine.initiate();
/// assert!(matches!(engine.poll_event(), Some(StreamEvent::Send(_))));
/// engine
///     .receive_bytes(b"<stream:stream xmlns='jabber:client' \
///                      xmlns:stream='http://etherx.jabber.org/streams' id='s1'>")
///     .unwrap();
/// assert_eq!(engine.state().status(), Status::Connected);
/// ```
pub struct StreamEngine {
    session: Session,
    parser: StreamParser,
}

impl StreamEngine {
    pub fn builder(jid: Jid) -> StreamEngineBuilder {
        StreamEngineBuilder::new(jid)
    }

    pub fn new(config: SessionConfig) -> StreamEngine {
        StreamEngine {
            parser: StreamParser::with_max_element_size(config.max_element_size),
            session: Session::new(config, DispatchRegistry::new(), None),
        }
    }

    /// Registers the negotiation handlers and sends the stream header.
    ///
    /// The status stays `Disconnected` until the server's header arrives.
    pub fn initiate(&mut self) {
        negotiation::register_stream_handlers(&mut self.session);
        extensions::register_default_handlers(&mut self.session);
        let header = negotiation::stream_header(self.session.config());
        info!(domain = self.session.config().jid.domainpart(), "opening stream");
        self.session.send_raw(header);
    }

    /// The driver finished the TLS handshake, restart the stream over it.
    pub fn tls_established(&mut self) {
        info!("TLS established");
        self.session.state.tls_active = true;
        let header = negotiation::stream_header(self.session.config());
        self.session.send_raw(header);
    }

    /// Processes incoming bytes.
    ///
    /// A syntax error sends `xml-not-well-formed`, ends the session and is
    /// returned. Input after the end of the session is ignored.
    pub fn receive_bytes(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        if self.session.is_closed() {
            debug!(len = bytes.len(), "ignoring input on a closed stream");
            return Ok(());
        }
        self.parser.feed(bytes);
        while !self.session.is_closed() {
            let element = match self.parser.next_element() {
                Ok(Some(element)) => element,
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "malformed stream");
                    self.session.send_raw(negotiation::stream_error(err.condition()));
                    self.session.close();
                    return Err(err);
                }
            };
            match element {
                StreamElement::Start(header) => {
                    self.session.stream_id = header.attribute("id").map(|id| id.to_string());
                    if self.session.state.status == Status::Disconnected {
                        self.session.state.status = Status::Connected;
                    }
                    debug!(id = self.session.stream_id(), "stream opened by server");
                }
                StreamElement::Element(element) => {
                    route(&mut self.session, element);
                    if self.session.reset_requested {
                        self.session.reset_requested = false;
                        self.parser.reset();
                    }
                }
                StreamElement::End => {
                    info!("server closed the stream");
                    negotiation::close_stream(&mut self.session);
                }
            }
        }
        Ok(())
    }

    /// Next queued event, if any.
    pub fn poll_event(&mut self) -> Option<StreamEvent> {
        self.session.pop_event()
    }

    /// Drains the queued events.
    pub fn events(&mut self) -> impl Iterator<Item = StreamEvent> + '_ {
        std::iter::from_fn(move || self.poll_event())
    }

    /// Ends the session from our side.
    ///
    /// Sends an unavailable presence if a resource is bound, then the
    /// closing tag. Pending handlers are dropped without being called.
    pub fn terminate(&mut self) {
        if self.session.is_closed() {
            return;
        }
        info!("closing stream");
        if self.session.state.status == Status::Bound {
            let presence =
                Stanza::unchecked(StanzaKind::Presence, Some(StanzaType::Unavailable));
            self.session.send(&presence);
        }
        negotiation::close_stream(&mut self.session);
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn send(&mut self, stanza: &Stanza) {
        self.session.send(stanza);
    }

    pub fn register<F>(&mut self, key: DispatchKey, callback: F, once: bool)
    where
        F: FnMut(&mut Session, &Element) + Send + 'static,
    {
        self.session.register(key, callback, once);
    }

    pub fn unregister(&mut self, key: &DispatchKey) -> bool {
        self.session.unregister(key)
    }
}

/// Builds a `StreamEngine` and its initial registration table.
pub struct StreamEngineBuilder {
    config: SessionConfig,
    registry: DispatchRegistry<Session>,
    on_bound: Option<BoundCallback>,
}

impl StreamEngineBuilder {
    pub fn new(jid: Jid) -> Self {
        StreamEngineBuilder {
            config: SessionConfig::new(jid),
            registry: DispatchRegistry::new(),
            on_bound: None,
        }
    }

    pub fn password(mut self, password: &str) -> Self {
        self.config.password = Some(password.to_string());
        self
    }

    pub fn authzid(mut self, authzid: &str) -> Self {
        self.config.authzid = Some(authzid.to_string());
        self
    }

    /// Token for X-GOOGLE-TOKEN.
    pub fn token(mut self, token: &str) -> Self {
        self.config.token = Some(token.to_string());
        self
    }

    pub fn anonymous(mut self, anonymous: bool) -> Self {
        self.config.anonymous = anonymous;
        self
    }

    pub fn resource(mut self, resource: &str) -> Self {
        self.config.resource = Some(resource.to_string());
        self
    }

    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.config.use_tls = use_tls;
        self
    }

    pub fn allow_plain_without_tls(mut self, allow: bool) -> Self {
        self.config.allow_plain_without_tls = allow;
        self
    }

    pub fn lang(mut self, lang: &str) -> Self {
        self.config.lang = Some(lang.to_string());
        self
    }

    pub fn priority(mut self, priority: i8) -> Self {
        self.config.priority = Some(priority);
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.config.status = Some(status.to_string());
        self
    }

    /// Largest incoming top level element, bigger ones end the stream
    /// with `policy-violation`.
    pub fn max_element_size(mut self, max: usize) -> Self {
        self.config.max_element_size = max;
        self
    }

    pub fn initial_presence(mut self, send: bool) -> Self {
        self.config.initial_presence = send;
        self
    }

    /// Answers version queries with this software identity.
    pub fn software(mut self, name: &str, version: &str, os: Option<&str>) -> Self {
        self.config.software = Some(SoftwareVersion {
            name: name.to_string(),
            version: version.to_string(),
            os: os.map(|os| os.to_string()),
        });
        self
    }

    /// Answers disco#info queries with this identity.
    pub fn identity(mut self, category: &str, kind: &str, name: Option<&str>) -> Self {
        self.config.identity = Some(DiscoIdentity {
            category: category.to_string(),
            kind: kind.to_string(),
            name: name.map(|name| name.to_string()),
        });
        self
    }

    /// Adds a feature namespace to the disco#info answer.
    pub fn feature(mut self, namespace: &str) -> Self {
        self.config.features.push(namespace.to_string());
        self
    }

    pub fn handler<F>(mut self, key: DispatchKey, callback: F, once: bool) -> Self
    where
        F: FnMut(&mut Session, &Element) + Send + 'static,
    {
        self.registry.register(key, callback, once);
        self
    }

    /// Called once, right after the resource is bound and the roster
    /// request and initial presence are sent.
    pub fn on_bound<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        self.on_bound = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn build(self) -> StreamEngine {
        StreamEngine {
            parser: StreamParser::with_max_element_size(self.config.max_element_size),
            session: Session::new(self.config, self.registry, self.on_bound),
        }
    }
}

/// Handler keys tried for a stanza, most specific first.
///
/// IQ results and errors are first looked up by id alone, so both share
/// the correlation of their request. Then each child is tried by name and
/// namespace refined by stanza type and sender, and finally the stanza
/// itself.
pub fn lookup_keys(stanza: &Element) -> Vec<DispatchKey> {
    let kind = stanza.name();
    let stanza_type = stanza.attribute("type");
    let sender = stanza.attribute("from").and_then(|from| Jid::new(from).ok());
    let mut keys = Vec::new();

    if kind == StanzaKind::Iq.as_str() && matches!(stanza_type, Some("result") | Some("error")) {
        if let Some(id) = stanza.attribute("id") {
            keys.push(DispatchKey::iq_response(id));
        }
    }
    for child in stanza.children() {
        let base = DispatchKey::new(child.name(), child.namespace().unwrap_or(CLIENT_NS));
        push_refined(&mut keys, base, stanza_type, sender.as_ref());
    }
    push_refined(
        &mut keys,
        DispatchKey::new(kind, CLIENT_NS),
        stanza_type,
        sender.as_ref(),
    );
    keys
}

fn push_refined(
    keys: &mut Vec<DispatchKey>,
    base: DispatchKey,
    stanza_type: Option<&str>,
    sender: Option<&Jid>,
) {
    if let Some(stanza_type) = stanza_type {
        if let Some(sender) = sender {
            keys.push(base.clone().with_type(stanza_type).with_sender(sender));
        }
        keys.push(base.clone().with_type(stanza_type));
    }
    if let Some(sender) = sender {
        keys.push(base.clone().with_sender(sender));
    }
    keys.push(base);
}

fn is_stanza(element: &Element) -> bool {
    matches!(element.namespace(), None | Some(CLIENT_NS))
        && StanzaKind::from_name(element.name()).is_some()
}

fn route(session: &mut Session, element: Element) {
    if !is_stanza(&element) {
        let key = DispatchKey::new(element.name(), element.namespace().unwrap_or(CLIENT_NS));
        if !dispatch(session, &key, &element) {
            debug!(%key, "unhandled stream element");
        }
        return;
    }

    for key in lookup_keys(&element) {
        if dispatch(session, &key, &element) {
            return;
        }
        if session.is_closed() {
            return;
        }
    }

    match Stanza::parse(element) {
        Ok(stanza)
            if stanza.kind() == StanzaKind::Iq
                && matches!(
                    stanza.stanza_type(),
                    Some(StanzaType::Get) | Some(StanzaType::Set)
                ) =>
        {
            debug!(id = stanza.id(), "no handler for request");
            let reply = stanza.error_reply(&StanzaError::new(ErrorCondition::ServiceUnavailable));
            session.send(&reply);
        }
        Ok(stanza) => session.emit(StreamEvent::Stanza(stanza)),
        Err(err) => warn!(%err, "dropping invalid stanza"),
    }
}

#[cfg(test)]
mod tests;
