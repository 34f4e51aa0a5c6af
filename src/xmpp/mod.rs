/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

#[cfg(feature = "client")]
mod client;
pub mod constants;
mod dispatch;
mod error;
pub mod extensions;
mod jid;
mod parser;
mod protocol;
pub mod sasl;
mod stanza;

#[cfg(feature = "client")]
pub use client::XmppClient;
#[cfg(feature = "client")]
pub use client::XmppClientBuilder;
pub use dispatch::Callback;
pub use dispatch::Dispatch;
pub use dispatch::DispatchKey;
pub use dispatch::DispatchRegistry;
pub use dispatch::dispatch;
pub use error::StreamCondition;
pub use error::StreamError;
pub use error::StreamFault;
pub use error::XmppClientError;
pub use jid::BadJid;
pub use jid::Jid;
pub use parser::DEFAULT_MAX_ELEMENT_SIZE;
pub use parser::StreamElement;
pub use parser::StreamParser;
pub use protocol::BoundCallback;
pub use protocol::DiscoIdentity;
pub use protocol::Session;
pub use protocol::SessionConfig;
pub use protocol::SessionState;
pub use protocol::SoftwareVersion;
pub use protocol::Status;
pub use protocol::StreamEngine;
pub use protocol::StreamEngineBuilder;
pub use protocol::StreamEvent;
pub use protocol::lookup_keys;
pub use stanza::BadStanza;
pub use stanza::ErrorCondition;
pub use stanza::ErrorType;
pub use stanza::Stanza;
pub use stanza::StanzaError;
pub use stanza::StanzaKind;
pub use stanza::StanzaType;
pub use stanza::build_stanza_error;
pub use stanza::generate_id;
