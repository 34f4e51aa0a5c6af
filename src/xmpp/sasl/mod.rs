/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! SASL mechanisms used during stream negotiation.

mod digest;
mod error;
mod plain;

pub use digest::SaslChallengeParams;
pub use digest::compute_digest_response;
pub use digest::compute_rspauth;
pub use digest::decode_challenge;
pub use digest::generate_cnonce;
pub use error::SaslError;
pub use plain::PlainCredentials;
pub use plain::generate_google_token_credential;
pub use plain::generate_plain_credential;
pub use plain::validate_plain_credentials;

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum Mechanism {
    DigestMd5,
    Plain,
    XGoogleToken,
    Anonymous,
}

impl Mechanism {
    /// Supported mechanisms, most preferred first.
    pub const PREFERENCE: [Mechanism; 4] = [
        Mechanism::DigestMd5,
        Mechanism::Plain,
        Mechanism::XGoogleToken,
        Mechanism::Anonymous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::DigestMd5 => "DIGEST-MD5",
            Mechanism::Plain => "PLAIN",
            Mechanism::XGoogleToken => "X-GOOGLE-TOKEN",
            Mechanism::Anonymous => "ANONYMOUS",
        }
    }

    pub fn from_name(name: &str) -> Option<Mechanism> {
        Mechanism::PREFERENCE
            .into_iter()
            .find(|mechanism| mechanism.as_str() == name.trim())
    }

    /// Picks the most preferred offered mechanism accepted by `usable`.
    pub fn select<'a, I, F>(offered: I, usable: F) -> Option<Mechanism>
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(Mechanism) -> bool,
    {
        let offered: Vec<Mechanism> = offered.into_iter().filter_map(Mechanism::from_name).collect();
        Mechanism::PREFERENCE
            .into_iter()
            .find(|mechanism| offered.contains(mechanism) && usable(*mechanism))
    }
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests;
