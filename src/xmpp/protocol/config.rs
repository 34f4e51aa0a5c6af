/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::xmpp::jid::Jid;
use crate::xmpp::parser::DEFAULT_MAX_ELEMENT_SIZE;
use crate::xmpp::sasl::Mechanism;

/// Software identity announced by the version responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareVersion {
    pub name: String,
    pub version: String,
    pub os: Option<String>,
}

/// Identity announced by the disco#info responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoIdentity {
    pub category: String,
    pub kind: String,
    pub name: Option<String>,
}

/// Everything the engine needs to negotiate a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jid: Jid,
    pub password: Option<String>,
    pub authzid: Option<String>,
    pub token: Option<String>,
    pub anonymous: bool,
    pub resource: Option<String>,
    pub use_tls: bool,
    pub allow_plain_without_tls: bool,
    pub lang: Option<String>,
    pub priority: Option<i8>,
    pub status: Option<String>,
    pub initial_presence: bool,
    pub software: Option<SoftwareVersion>,
    pub identity: Option<DiscoIdentity>,
    pub features: Vec<String>,
    pub max_element_size: usize,
}

impl SessionConfig {
    pub fn new(jid: Jid) -> SessionConfig {
        SessionConfig {
            jid,
            password: None,
            authzid: None,
            token: None,
            anonymous: false,
            resource: None,
            use_tls: true,
            allow_plain_without_tls: false,
            lang: None,
            priority: None,
            status: None,
            initial_presence: true,
            software: None,
            identity: None,
            features: Vec::new(),
            max_element_size: DEFAULT_MAX_ELEMENT_SIZE,
        }
    }

    /// Resource requested at bind time, explicit setting first.
    pub fn bind_resource(&self) -> Option<&str> {
        self.resource.as_deref().or(self.jid.resourcepart())
    }

    /// `xmpp/<domain>` as used by DIGEST-MD5.
    pub fn digest_uri(&self) -> String {
        format!("xmpp/{}", self.jid.domainpart())
    }

    /// True if the credentials at hand allow the mechanism.
    pub fn can_use(&self, mechanism: Mechanism, tls_active: bool) -> bool {
        let has_password = self.password.is_some() && self.jid.localpart().is_some();
        match mechanism {
            Mechanism::DigestMd5 => has_password,
            Mechanism::Plain => has_password && (tls_active || self.allow_plain_without_tls),
            Mechanism::XGoogleToken => self.token.is_some(),
            Mechanism::Anonymous => self.anonymous,
        }
    }
}
