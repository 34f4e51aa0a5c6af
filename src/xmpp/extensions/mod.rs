/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Request builders and response decoders of the IQ based extensions.
//!
//! Every builder is pure and returns a stanza with a generated id. The
//! decoders turn the `result` or `error` answer into a `Result`, so both
//! outcomes reach the caller through the same id keyed handler that
//! `request` registers. There are no timeouts, a request whose answer
//! never comes is released when the session ends.

pub mod disco;
pub mod last;
pub mod privacy;
pub mod pubsub;
pub mod register;
pub mod roster;
pub mod version;

use std::error::Error;
use std::fmt::Display;

use tracing::debug;

use crate::Element;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::Session;
use crate::xmpp::stanza::BadStanza;
use crate::xmpp::stanza::ErrorCondition;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaError;
use crate::xmpp::stanza::StanzaType;
use crate::xmpp::stanza::generate_id;

/// Failure of an IQ request.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum IqError {
    /// The entity answered with an error stanza.
    Stanza(StanzaError),
    /// The answer could not be parsed as a stanza.
    BadResponse(BadStanza),
    /// The answer is a stanza but its payload is not what was expected.
    Malformed(&'static str),
}

impl Display for IqError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IqError::Stanza(err) => write!(f, "request failed: {err}"),
            IqError::BadResponse(err) => write!(f, "bad response: {err}"),
            IqError::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl Error for IqError {}

impl From<BadStanza> for IqError {
    fn from(err: BadStanza) -> Self {
        IqError::BadResponse(err)
    }
}

impl From<StanzaError> for IqError {
    fn from(err: StanzaError) -> Self {
        IqError::Stanza(err)
    }
}

/// Splits an IQ answer into its `result` stanza or the error it carries.
pub fn classify(response: &Element) -> Result<Stanza, IqError> {
    let stanza = Stanza::parse(response.clone())?;
    match stanza.stanza_type() {
        Some(StanzaType::Result) => Ok(stanza),
        Some(StanzaType::Error) => Err(IqError::Stanza(
            stanza
                .error()
                .unwrap_or_else(|| StanzaError::new(ErrorCondition::UndefinedCondition)),
        )),
        _ => Err(IqError::Malformed("not an IQ answer")),
    }
}

/// Sends an IQ request and calls `callback` with the decoded answer.
///
/// Returns the id of the request.
pub fn request<T, D, F>(session: &mut Session, mut stanza: Stanza, decode: D, callback: F) -> String
where
    D: FnOnce(&Stanza) -> Result<T, IqError> + Send + 'static,
    F: FnOnce(&mut Session, Result<T, IqError>) + Send + 'static,
{
    let id = match stanza.id() {
        Some(id) => id.to_string(),
        None => {
            let id = generate_id();
            stanza.set_id(Some(&id));
            id
        }
    };
    let mut pending = Some((decode, callback));
    session.register(
        DispatchKey::iq_response(&id),
        move |session: &mut Session, response: &Element| {
            if let Some((decode, callback)) = pending.take() {
                let result = classify(response).and_then(|stanza| decode(&stanza));
                callback(session, result);
            }
        },
        true,
    );
    debug!(%id, "sending request");
    session.send(&stanza);
    id
}

/// Acknowledges a server push with an empty result.
pub(crate) fn acknowledge(session: &mut Session, push: &Element) {
    match Stanza::parse(push.clone()) {
        Ok(stanza) => session.send(&stanza.result_reply()),
        Err(err) => debug!(%err, "cannot acknowledge push"),
    }
}

/// Answers a push that cannot be processed with an error.
pub(crate) fn reject(session: &mut Session, push: &Element, condition: ErrorCondition) {
    match Stanza::parse(push.clone()) {
        Ok(stanza) => session.send(&stanza.error_reply(&StanzaError::new(condition))),
        Err(err) => debug!(%err, "cannot reject push"),
    }
}

/// True if a push comes from our own account or the server.
pub(crate) fn from_own_account(session: &Session, push: &Element) -> bool {
    let Some(from) = push.attribute("from") else {
        return true;
    };
    let own = session
        .state()
        .jid()
        .unwrap_or(&session.config().jid)
        .clone();
    from == own.bare() || from == own.domainpart() || from == own.full()
}

/// Handlers every session installs: roster and privacy list pushes, and
/// the version and disco#info responders when configured.
pub(crate) fn register_default_handlers(session: &mut Session) {
    roster::register_push_handler(session);
    privacy::register_push_handler(session);
    if session.config().software.is_some() {
        version::register_responder(session);
    }
    if session.config().identity.is_some() || !session.config().features.is_empty() {
        disco::register_responder(session);
    }
}

/// Child element `name` in `namespace` of the answer, the usual query.
pub(crate) fn query<'a>(
    stanza: &'a Stanza,
    name: &str,
    namespace: &str,
) -> Result<&'a Element, IqError> {
    stanza
        .find_child(name, namespace)
        .ok_or(IqError::Malformed("expected payload is missing"))
}

pub(crate) fn get(payload: Element) -> Stanza {
    Stanza::iq_get().with_child(payload)
}

pub(crate) fn set(payload: Element) -> Stanza {
    Stanza::iq_set().with_child(payload)
}

pub(crate) fn addressed(stanza: Stanza, to: Option<&Jid>) -> Stanza {
    match to {
        Some(to) => stanza.with_to(to.clone()),
        None => stanza,
    }
}
