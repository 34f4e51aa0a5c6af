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

use crate::Element;
use crate::xmpp::constants::STANZAS_ERROR_NS;
use crate::xmpp::constants::XML_LANG;
use crate::xmpp::jid::BadJid;

/// Local validation failure while constructing or parsing a stanza.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum BadStanza {
    NotAStanza,
    InvalidType,
    MissingAttribute(&'static str),
    BadAddress(BadJid),
}

impl Display for BadStanza {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BadStanza::NotAStanza => write!(f, "element is not a stanza"),
            BadStanza::InvalidType => write!(f, "invalid stanza type for this kind"),
            BadStanza::MissingAttribute(name) => write!(f, "missing stanza attribute: {name}"),
            BadStanza::BadAddress(err) => write!(f, "invalid stanza address: {err}"),
        }
    }
}

impl Error for BadStanza {}

impl From<BadJid> for BadStanza {
    fn from(err: BadJid) -> Self {
        BadStanza::BadAddress(err)
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum ErrorType {
    Auth,
    Cancel,
    Continue,
    Modify,
    Wait,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Auth => "auth",
            ErrorType::Cancel => "cancel",
            ErrorType::Continue => "continue",
            ErrorType::Modify => "modify",
            ErrorType::Wait => "wait",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorType> {
        match name {
            "auth" => Some(ErrorType::Auth),
            "cancel" => Some(ErrorType::Cancel),
            "continue" => Some(ErrorType::Continue),
            "modify" => Some(ErrorType::Modify),
            "wait" => Some(ErrorType::Wait),
            _ => None,
        }
    }
}

macro_rules! stanza_conditions {
    ($($variant:ident => $name:literal, $kind:ident, $code:literal;)*) => {
        /// Defined stanza error conditions (RFC 3920 section 9.3.3).
        #[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
        pub enum ErrorCondition {
            $($variant,)*
        }

        impl ErrorCondition {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ErrorCondition::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<ErrorCondition> {
                match name {
                    $($name => Some(ErrorCondition::$variant),)*
                    _ => None,
                }
            }

            /// Error type to use when the caller does not pick one.
            pub fn default_type(&self) -> ErrorType {
                match self {
                    $(ErrorCondition::$variant => ErrorType::$kind,)*
                }
            }

            /// Pre-RFC numeric code for old clients.
            pub fn legacy_code(&self) -> u16 {
                match self {
                    $(ErrorCondition::$variant => $code,)*
                }
            }
        }
    };
}

stanza_conditions! {
    BadRequest => "bad-request", Modify, 400;
    Conflict => "conflict", Cancel, 409;
    FeatureNotImplemented => "feature-not-implemented", Cancel, 501;
    Forbidden => "forbidden", Auth, 403;
    Gone => "gone", Modify, 302;
    InternalServerError => "internal-server-error", Wait, 500;
    ItemNotFound => "item-not-found", Cancel, 404;
    JidMalformed => "jid-malformed", Cancel, 400;
    NotAcceptable => "not-acceptable", Modify, 406;
    NotAllowed => "not-allowed", Cancel, 405;
    NotAuthorized => "not-authorized", Auth, 401;
    PaymentRequired => "payment-required", Auth, 402;
    RecipientUnavailable => "recipient-unavailable", Wait, 404;
    Redirect => "redirect", Modify, 302;
    RegistrationRequired => "registration-required", Auth, 407;
    RemoteServerNotFound => "remote-server-not-found", Cancel, 404;
    RemoteServerTimeout => "remote-server-timeout", Wait, 504;
    ResourceConstraint => "resource-constraint", Wait, 500;
    ServiceUnavailable => "service-unavailable", Cancel, 503;
    SubscriptionRequired => "subscription-required", Auth, 407;
    UndefinedCondition => "undefined-condition", Cancel, 500;
    UnexpectedRequest => "unexpected-request", Wait, 400;
}

impl ErrorCondition {
    /// Maps a legacy numeric code to its condition (XEP-0086).
    pub fn from_legacy_code(code: u16) -> Option<ErrorCondition> {
        let condition = match code {
            302 => ErrorCondition::Redirect,
            400 => ErrorCondition::BadRequest,
            401 => ErrorCondition::NotAuthorized,
            402 => ErrorCondition::PaymentRequired,
            403 => ErrorCondition::Forbidden,
            404 => ErrorCondition::ItemNotFound,
            405 => ErrorCondition::NotAllowed,
            406 => ErrorCondition::NotAcceptable,
            407 => ErrorCondition::RegistrationRequired,
            408 | 504 => ErrorCondition::RemoteServerTimeout,
            409 => ErrorCondition::Conflict,
            500 => ErrorCondition::InternalServerError,
            501 => ErrorCondition::FeatureNotImplemented,
            502 | 503 | 510 => ErrorCondition::ServiceUnavailable,
            _ => return None,
        };
        Some(condition)
    }
}

impl Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `<error/>` child of a stanza with `type='error'`.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct StanzaError {
    pub condition: ErrorCondition,
    pub error_type: ErrorType,
    pub code: Option<u16>,
    pub text: Option<String>,
    pub lang: Option<String>,
}

impl StanzaError {
    /// Error with the canonical type and legacy code of the condition.
    pub fn new(condition: ErrorCondition) -> StanzaError {
        StanzaError {
            condition,
            error_type: condition.default_type(),
            code: Some(condition.legacy_code()),
            text: None,
            lang: None,
        }
    }

    pub fn with_type(mut self, error_type: ErrorType) -> StanzaError {
        self.error_type = error_type;
        self
    }

    /// Overrides the legacy code, None leaves the attribute out.
    pub fn with_code(mut self, code: Option<u16>) -> StanzaError {
        self.code = code;
        self
    }

    pub fn with_text(mut self, text: &str, lang: Option<&str>) -> StanzaError {
        self.text = Some(text.to_string());
        self.lang = lang.map(|lang| lang.to_string());
        self
    }

    pub fn to_element(&self) -> Element {
        let code = self.code.map(|code| code.to_string());
        let mut error = Element::bare("error")
            .with_attribute("type", self.error_type.as_str())
            .with_optional_attribute("code", code.as_deref());
        error.push_child(Element::new(self.condition.as_str(), STANZAS_ERROR_NS));
        if let Some(text) = &self.text {
            error.push_child(
                Element::new("text", STANZAS_ERROR_NS)
                    .with_optional_attribute(XML_LANG, self.lang.as_deref())
                    .with_text(text),
            );
        }
        error
    }

    /// Decodes a received `<error/>` element.
    ///
    /// Old servers send only the numeric code, which is mapped to the
    /// closest condition.
    pub fn from_element(error: &Element) -> Option<StanzaError> {
        let code = error.attribute("code").and_then(|code| code.parse().ok());
        let condition = error
            .children()
            .iter()
            .filter(|child| child.namespace() == Some(STANZAS_ERROR_NS))
            .find_map(|child| ErrorCondition::from_name(child.name()))
            .or_else(|| code.and_then(ErrorCondition::from_legacy_code))?;
        let error_type = error
            .attribute("type")
            .and_then(ErrorType::from_name)
            .unwrap_or(condition.default_type());
        let text = error.find_child("text", STANZAS_ERROR_NS);
        Some(StanzaError {
            condition,
            error_type,
            code,
            text: text.map(|text| text.text().to_string()),
            lang: text.and_then(|text| text.attribute(XML_LANG).map(|lang| lang.to_string())),
        })
    }
}

impl Display for StanzaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.condition, self.error_type.as_str())?;
        if let Some(text) = &self.text {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}

impl Error for StanzaError {}

/// Builds an `<error/>` child from its parts.
///
/// Type and code default to the canonical values of the condition.
pub fn build_stanza_error(
    condition: ErrorCondition,
    error_type: Option<ErrorType>,
    legacy_code: Option<u16>,
    text: Option<&str>,
    lang: Option<&str>,
) -> Element {
    let mut error = StanzaError::new(condition);
    if let Some(error_type) = error_type {
        error = error.with_type(error_type);
    }
    if legacy_code.is_some() {
        error = error.with_code(legacy_code);
    }
    if let Some(text) = text {
        error = error.with_text(text, lang);
    }
    error.to_element()
}
