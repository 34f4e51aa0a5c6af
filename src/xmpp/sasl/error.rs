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

/// Failure of a SASL exchange, either computed locally or reported by
/// the server in a `<failure/>` element.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum SaslError {
    NotAuthorized,
    InvalidMechanism,
    Aborted,
    MalformedChallenge(&'static str),
    MissingDigestUri,
    AuthenticationFailure,
    NoMechanism,
    BadCharset,
    RspauthMismatch,
    /// Any other condition from the server's `<failure/>`.
    Failure(String),
}

impl SaslError {
    /// Maps a `<failure/>` condition name.
    pub fn from_condition(name: &str) -> SaslError {
        match name {
            "not-authorized" => SaslError::NotAuthorized,
            "invalid-mechanism" => SaslError::InvalidMechanism,
            "aborted" => SaslError::Aborted,
            other => SaslError::Failure(other.to_string()),
        }
    }
}

impl Display for SaslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaslError::NotAuthorized => write!(f, "not authorized"),
            SaslError::InvalidMechanism => write!(f, "invalid mechanism"),
            SaslError::Aborted => write!(f, "exchange aborted"),
            SaslError::MalformedChallenge(msg) => write!(f, "malformed challenge: {msg}"),
            SaslError::MissingDigestUri => write!(f, "digest-uri is missing"),
            SaslError::AuthenticationFailure => write!(f, "malformed credentials"),
            SaslError::NoMechanism => write!(f, "no usable mechanism offered"),
            SaslError::BadCharset => {
                write!(f, "credentials cannot be encoded in ISO-8859-1")
            }
            SaslError::RspauthMismatch => write!(f, "server proof does not match"),
            SaslError::Failure(condition) => write!(f, "server failure: {condition}"),
        }
    }
}

impl Error for SaslError {}

pub(super) mod description {
    pub(in super::super) const BAD_BASE64: &str = "challenge is not valid base64";
    pub(in super::super) const BAD_UTF8: &str = "challenge is not valid UTF-8";
    pub(in super::super) const BAD_PAIR: &str = "expected key=value pair";
    pub(in super::super) const UNTERMINATED_QUOTE: &str = "quoted value is not terminated";
    pub(in super::super) const NO_NONCE: &str = "nonce is missing";
    pub(in super::super) const BAD_ALGORITHM: &str = "algorithm is not md5-sess";
    pub(in super::super) const BAD_QOP: &str = "no supported qop offered";
}
