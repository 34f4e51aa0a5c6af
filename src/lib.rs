/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod element;
mod entities;
mod xmpp;

pub use element::Element;

pub use xmpp::constants;
pub use xmpp::extensions;
pub use xmpp::sasl;

#[cfg(feature = "client")]
pub use xmpp::XmppClient;
#[cfg(feature = "client")]
pub use xmpp::XmppClientBuilder;

pub use xmpp::BadJid;
pub use xmpp::Jid;

pub use xmpp::BadStanza;
pub use xmpp::ErrorCondition;
pub use xmpp::ErrorType;
pub use xmpp::Stanza;
pub use xmpp::StanzaError;
pub use xmpp::StanzaKind;
pub use xmpp::StanzaType;
pub use xmpp::build_stanza_error;
pub use xmpp::generate_id;

pub use xmpp::Callback;
pub use xmpp::Dispatch;
pub use xmpp::DispatchKey;
pub use xmpp::DispatchRegistry;
pub use xmpp::dispatch;

pub use xmpp::DEFAULT_MAX_ELEMENT_SIZE;
pub use xmpp::StreamCondition;
pub use xmpp::StreamElement;
pub use xmpp::StreamError;
pub use xmpp::StreamFault;
pub use xmpp::StreamParser;
pub use xmpp::XmppClientError;

pub use xmpp::BoundCallback;
pub use xmpp::DiscoIdentity;
pub use xmpp::Session;
pub use xmpp::SessionConfig;
pub use xmpp::SessionState;
pub use xmpp::SoftwareVersion;
pub use xmpp::Status;
pub use xmpp::StreamEngine;
pub use xmpp::StreamEngineBuilder;
pub use xmpp::StreamEvent;
pub use xmpp::lookup_keys;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
