/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;

use super::jid::BadJid;
use super::sasl::SaslError;
use super::stanza::StanzaError;

#[derive(Debug)]
pub enum XmppClientError {
    StreamError(StreamError),
    StreamFault(StreamFault),
    AuthFailed(SaslError),
    BindFailed(StanzaError),
    BadJid(BadJid),
    IOError(std::io::Error),
    #[cfg(feature = "client")]
    TlsError(rustls::Error),
    InvalidServerName(String),
    Disconnected,
}

impl Display for XmppClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XmppClientError::StreamError(err) => err.fmt(f),
            XmppClientError::StreamFault(err) => err.fmt(f),
            XmppClientError::AuthFailed(err) => write!(f, "authentication failed: {err}"),
            XmppClientError::BindFailed(err) => write!(f, "resource binding failed: {err}"),
            XmppClientError::BadJid(err) => err.fmt(f),
            XmppClientError::IOError(err) => err.fmt(f),
            #[cfg(feature = "client")]
            XmppClientError::TlsError(err) => write!(f, "TLS error: {err}"),
            XmppClientError::InvalidServerName(name) => {
                write!(f, "invalid server name for TLS: {name}")
            }
            XmppClientError::Disconnected => write!(f, "stream is disconnected"),
        }
    }
}

impl Error for XmppClientError {}

impl From<StreamError> for XmppClientError {
    fn from(err: StreamError) -> Self {
        XmppClientError::StreamError(err)
    }
}

impl From<StreamFault> for XmppClientError {
    fn from(err: StreamFault) -> Self {
        XmppClientError::StreamFault(err)
    }
}

impl From<SaslError> for XmppClientError {
    fn from(err: SaslError) -> Self {
        XmppClientError::AuthFailed(err)
    }
}

impl From<BadJid> for XmppClientError {
    fn from(err: BadJid) -> Self {
        XmppClientError::BadJid(err)
    }
}

impl From<std::io::Error> for XmppClientError {
    fn from(err: std::io::Error) -> Self {
        XmppClientError::IOError(err)
    }
}

#[cfg(feature = "client")]
impl From<rustls::Error> for XmppClientError {
    fn from(err: rustls::Error) -> Self {
        XmppClientError::TlsError(err)
    }
}

/// Local failure while reading the incoming stream.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum StreamError {
    BadXml(&'static str),
    BadStream(&'static str),
    /// A top level element grew past the given number of bytes.
    ElementTooLarge(usize),
}

impl StreamError {
    /// Condition of the `<stream:error/>` sent back for this failure.
    pub fn condition(&self) -> StreamCondition {
        match self {
            StreamError::BadXml(_) | StreamError::BadStream(_) => StreamCondition::XmlNotWellFormed,
            StreamError::ElementTooLarge(_) => StreamCondition::PolicyViolation,
        }
    }
}

impl Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::BadXml(msg) => write!(f, "invalid XML syntax: {msg}"),
            StreamError::BadStream(msg) => write!(f, "invalid stream protocol: {msg}"),
            StreamError::ElementTooLarge(max) => write!(f, "element is larger than {max} bytes"),
        }
    }
}

impl Error for StreamError {}

macro_rules! stream_conditions {
    ($($variant:ident => $name:literal,)*) => {
        /// Defined conditions of a `<stream:error/>` (RFC 3920 section 4.7.3).
        #[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
        pub enum StreamCondition {
            $($variant,)*
        }

        impl StreamCondition {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(StreamCondition::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<StreamCondition> {
                match name {
                    $($name => Some(StreamCondition::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

stream_conditions! {
    BadFormat => "bad-format",
    BadNamespacePrefix => "bad-namespace-prefix",
    Conflict => "conflict",
    ConnectionTimeout => "connection-timeout",
    HostGone => "host-gone",
    HostUnknown => "host-unknown",
    ImproperAddressing => "improper-addressing",
    InternalServerError => "internal-server-error",
    InvalidFrom => "invalid-from",
    InvalidId => "invalid-id",
    InvalidNamespace => "invalid-namespace",
    InvalidXml => "invalid-xml",
    NotAuthorized => "not-authorized",
    PolicyViolation => "policy-violation",
    RemoteConnectionFailed => "remote-connection-failed",
    ResourceConstraint => "resource-constraint",
    RestrictedXml => "restricted-xml",
    SeeOtherHost => "see-other-host",
    SystemShutdown => "system-shutdown",
    UndefinedCondition => "undefined-condition",
    UnsupportedEncoding => "unsupported-encoding",
    UnsupportedStanzaType => "unsupported-stanza-type",
    UnsupportedVersion => "unsupported-version",
    XmlNotWellFormed => "xml-not-well-formed",
}

impl Display for StreamCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal `<stream:error/>` received from or sent to the peer.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct StreamFault {
    pub condition: StreamCondition,
    pub text: Option<String>,
    /// Character data of the condition element, the new host for
    /// `see-other-host`.
    pub detail: Option<String>,
}

impl Display for StreamFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream error: {}", self.condition)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        if let Some(text) = &self.text {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}

impl Error for StreamFault {}

pub(super) mod description {
    pub(in super::super) const UNCLOSED_MARKUP: &str = "markup is not closed properly";
    pub(in super::super) const BAD_ENCODING: &str = "character data is not valid UTF-8";
    pub(in super::super) const BAD_ENTITY: &str = "unknown or malformed entity reference";
    pub(in super::super) const UNDECLARED_PREFIX: &str = "namespace prefix is not declared";
    pub(in super::super) const BAD_ATTRIBUTE: &str = "malformed attribute";
    pub(in super::super) const NO_STREAM: &str = "element received before the stream header";
    pub(in super::super) const STREAM_END: &str = "stream is already closed";
}
