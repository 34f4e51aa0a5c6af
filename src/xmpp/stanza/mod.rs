/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::Element;

use super::constants::CLIENT_NS;
use super::constants::XML_LANG;
use super::jid::Jid;

pub use error::BadStanza;
pub use error::ErrorCondition;
pub use error::ErrorType;
pub use error::StanzaError;
pub use error::build_stanza_error;

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum StanzaKind {
    Iq,
    Message,
    Presence,
}

impl StanzaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanzaKind::Iq => "iq",
            StanzaKind::Message => "message",
            StanzaKind::Presence => "presence",
        }
    }

    pub fn from_name(name: &str) -> Option<StanzaKind> {
        match name {
            "iq" => Some(StanzaKind::Iq),
            "message" => Some(StanzaKind::Message),
            "presence" => Some(StanzaKind::Presence),
            _ => None,
        }
    }

    /// True if the type is legal for this kind. A missing type is legal
    /// for messages and presences only.
    pub fn allows(&self, stanza_type: Option<StanzaType>) -> bool {
        let Some(stanza_type) = stanza_type else {
            return *self != StanzaKind::Iq;
        };
        match self {
            StanzaKind::Iq => matches!(
                stanza_type,
                StanzaType::Get | StanzaType::Set | StanzaType::Result | StanzaType::Error
            ),
            StanzaKind::Message => matches!(
                stanza_type,
                StanzaType::Chat
                    | StanzaType::Normal
                    | StanzaType::Groupchat
                    | StanzaType::Headline
                    | StanzaType::Error
            ),
            StanzaKind::Presence => matches!(
                stanza_type,
                StanzaType::Subscribe
                    | StanzaType::Unsubscribe
                    | StanzaType::Subscribed
                    | StanzaType::Unsubscribed
                    | StanzaType::Unavailable
                    | StanzaType::Probe
                    | StanzaType::Error
            ),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum StanzaType {
    Get,
    Set,
    Result,
    Error,
    Chat,
    Normal,
    Groupchat,
    Headline,
    Subscribe,
    Unsubscribe,
    Subscribed,
    Unsubscribed,
    Unavailable,
    Probe,
}

impl StanzaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanzaType::Get => "get",
            StanzaType::Set => "set",
            StanzaType::Result => "result",
            StanzaType::Error => "error",
            StanzaType::Chat => "chat",
            StanzaType::Normal => "normal",
            StanzaType::Groupchat => "groupchat",
            StanzaType::Headline => "headline",
            StanzaType::Subscribe => "subscribe",
            StanzaType::Unsubscribe => "unsubscribe",
            StanzaType::Subscribed => "subscribed",
            StanzaType::Unsubscribed => "unsubscribed",
            StanzaType::Unavailable => "unavailable",
            StanzaType::Probe => "probe",
        }
    }

    pub fn from_name(name: &str) -> Option<StanzaType> {
        let stanza_type = match name {
            "get" => StanzaType::Get,
            "set" => StanzaType::Set,
            "result" => StanzaType::Result,
            "error" => StanzaType::Error,
            "chat" => StanzaType::Chat,
            "normal" => StanzaType::Normal,
            "groupchat" => StanzaType::Groupchat,
            "headline" => StanzaType::Headline,
            "subscribe" => StanzaType::Subscribe,
            "unsubscribe" => StanzaType::Unsubscribe,
            "subscribed" => StanzaType::Subscribed,
            "unsubscribed" => StanzaType::Unsubscribed,
            "unavailable" => StanzaType::Unavailable,
            "probe" => StanzaType::Probe,
            _ => return None,
        };
        Some(stanza_type)
    }
}

/// Generates a random stanza id.
///
/// Ids are random enough to not collide within a session, but callers
/// supplying their own ids are responsible for their uniqueness.
pub fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("iks{suffix}")
}

/// A typed IQ, message or presence stanza.
///
/// # Examples
///
/// ```
/// use iks_xmpp::{Jid, Stanza, StanzaType};
///
/// let message = Stanza::message(Some(StanzaType::Chat))
///     .unwrap()
///     .with_to(Jid::new("juliet@example.com").unwrap())
///     .with_body("Wherefore art thou?");
/// let element = message.to_element();
/// assert_eq!(Stanza::parse(element).unwrap(), message);
/// ```
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Stanza {
    kind: StanzaKind,
    from: Option<Jid>,
    to: Option<Jid>,
    stanza_type: Option<StanzaType>,
    id: Option<String>,
    lang: Option<String>,
    // Unknown attributes, sorted by name
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Stanza {
    /// Creates a stanza after checking the type against the kind.
    ///
    /// IQ stanzas get a generated id since every request needs one.
    pub fn new(kind: StanzaKind, stanza_type: Option<StanzaType>) -> Result<Stanza, BadStanza> {
        if !kind.allows(stanza_type) {
            return Err(BadStanza::InvalidType);
        }
        Ok(Stanza::unchecked(kind, stanza_type))
    }

    // Only for kind and type pairs known to be legal
    pub(crate) fn unchecked(kind: StanzaKind, stanza_type: Option<StanzaType>) -> Stanza {
        let id = match kind {
            StanzaKind::Iq => Some(generate_id()),
            _ => None,
        };
        Stanza {
            kind,
            from: None,
            to: None,
            stanza_type,
            id,
            lang: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn iq(stanza_type: StanzaType) -> Result<Stanza, BadStanza> {
        Stanza::new(StanzaKind::Iq, Some(stanza_type))
    }

    /// IQ get request with a generated id.
    pub fn iq_get() -> Stanza {
        Stanza::unchecked(StanzaKind::Iq, Some(StanzaType::Get))
    }

    /// IQ set request with a generated id.
    pub fn iq_set() -> Stanza {
        Stanza::unchecked(StanzaKind::Iq, Some(StanzaType::Set))
    }

    pub fn message(stanza_type: Option<StanzaType>) -> Result<Stanza, BadStanza> {
        Stanza::new(StanzaKind::Message, stanza_type)
    }

    pub fn presence(stanza_type: Option<StanzaType>) -> Result<Stanza, BadStanza> {
        Stanza::new(StanzaKind::Presence, stanza_type)
    }

    /// Parses a top level element from the stream.
    pub fn parse(mut element: Element) -> Result<Stanza, BadStanza> {
        match element.namespace() {
            None | Some(CLIENT_NS) => (),
            Some(_) => return Err(BadStanza::NotAStanza),
        }
        let kind = StanzaKind::from_name(element.name()).ok_or(BadStanza::NotAStanza)?;
        let stanza_type = match element.attribute("type") {
            Some(name) => Some(StanzaType::from_name(name).ok_or(BadStanza::InvalidType)?),
            None => None,
        };
        if !kind.allows(stanza_type) {
            return Err(BadStanza::InvalidType);
        }
        let mut stanza = Stanza {
            kind,
            from: None,
            to: None,
            stanza_type,
            id: None,
            lang: None,
            attributes: Vec::new(),
            children: element.take_children(),
        };
        for (key, value) in element.attributes() {
            match key {
                "from" => stanza.from = Some(Jid::new(value)?),
                "to" => stanza.to = Some(Jid::new(value)?),
                "id" => stanza.id = Some(value.to_string()),
                XML_LANG => stanza.lang = Some(value.to_string()),
                "type" => (),
                _ => stanza.attributes.push((key.to_string(), value.to_string())),
            }
        }
        if kind == StanzaKind::Iq && stanza.id.is_none() {
            return Err(BadStanza::MissingAttribute("id"));
        }
        stanza.attributes.sort();
        Ok(stanza)
    }

    pub fn to_element(&self) -> Element {
        self.clone().into_element()
    }

    pub fn into_element(self) -> Element {
        let mut element = Element::new(self.kind.as_str(), CLIENT_NS)
            .with_optional_attribute("to", self.to.as_ref().map(|jid| jid.full()))
            .with_optional_attribute("from", self.from.as_ref().map(|jid| jid.full()))
            .with_optional_attribute("type", self.stanza_type.map(|t| t.as_str()))
            .with_optional_attribute("id", self.id.as_deref())
            .with_optional_attribute(XML_LANG, self.lang.as_deref());
        for (key, value) in &self.attributes {
            element.set_attribute(key, value);
        }
        for child in self.children {
            element.push_child(child);
        }
        element
    }

    /// Serialized form as written inside a `jabber:client` stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_element().to_stream_string(CLIENT_NS).into_bytes()
    }

    //
    // Accessors
    //

    pub fn kind(&self) -> StanzaKind {
        self.kind
    }

    pub fn stanza_type(&self) -> Option<StanzaType> {
        self.stanza_type
    }

    pub fn from(&self) -> Option<&Jid> {
        self.from.as_ref()
    }

    pub fn to(&self) -> Option<&Jid> {
        self.to.as_ref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child element, the query of an IQ.
    pub fn payload(&self) -> Option<&Element> {
        self.children.first()
    }

    pub fn find_child(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.is(name, namespace))
    }

    pub fn take_children(&mut self) -> Vec<Element> {
        std::mem::take(&mut self.children)
    }

    /// Decoded `<error/>` child of an error stanza.
    pub fn error(&self) -> Option<StanzaError> {
        if self.stanza_type != Some(StanzaType::Error) {
            return None;
        }
        self.find_child("error", CLIENT_NS)
            .and_then(StanzaError::from_element)
    }

    //
    // Modifiers
    //

    pub fn set_to(&mut self, to: Option<Jid>) {
        self.to = to;
    }

    pub fn set_from(&mut self, from: Option<Jid>) {
        self.from = from;
    }

    pub fn set_id(&mut self, id: Option<&str>) {
        self.id = id.map(|id| id.to_string());
    }

    pub fn with_to(mut self, to: Jid) -> Stanza {
        self.to = Some(to);
        self
    }

    pub fn with_from(mut self, from: Jid) -> Stanza {
        self.from = Some(from);
        self
    }

    pub fn with_id(mut self, id: &str) -> Stanza {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_lang(mut self, lang: &str) -> Stanza {
        self.lang = Some(lang.to_string());
        self
    }

    pub fn push_child(&mut self, mut child: Element) -> &mut Element {
        child.inherit_namespace(CLIENT_NS);
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn with_child(mut self, child: Element) -> Stanza {
        self.push_child(child);
        self
    }

    //
    // Replies
    //

    fn reply(&self, stanza_type: Option<StanzaType>) -> Stanza {
        Stanza {
            kind: self.kind,
            from: self.to.clone(),
            to: self.from.clone(),
            stanza_type,
            id: self.id.clone(),
            lang: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Empty `result` answer to an IQ request.
    pub fn result_reply(&self) -> Stanza {
        self.reply(Some(StanzaType::Result))
    }

    /// Error answer carrying the original payload and the error.
    pub fn error_reply(&self, error: &StanzaError) -> Stanza {
        let mut reply = self.reply(Some(StanzaType::Error));
        reply.children = self.children.clone();
        reply.push_child(error.to_element());
        reply
    }

    //
    // Message helpers
    //

    pub fn body(&self) -> Option<&str> {
        self.find_child("body", CLIENT_NS).map(|body| body.text())
    }

    pub fn subject(&self) -> Option<&str> {
        self.find_child("subject", CLIENT_NS)
            .map(|subject| subject.text())
    }

    pub fn thread(&self) -> Option<&str> {
        self.find_child("thread", CLIENT_NS).map(|thread| thread.text())
    }

    pub fn with_body(self, body: &str) -> Stanza {
        self.with_child(Element::new("body", CLIENT_NS).with_text(body))
    }

    pub fn with_subject(self, subject: &str) -> Stanza {
        self.with_child(Element::new("subject", CLIENT_NS).with_text(subject))
    }

    pub fn with_thread(self, thread: &str) -> Stanza {
        self.with_child(Element::new("thread", CLIENT_NS).with_text(thread))
    }

    //
    // Presence helpers
    //

    pub fn show(&self) -> Option<&str> {
        self.find_child("show", CLIENT_NS).map(|show| show.text())
    }

    pub fn status(&self) -> Option<&str> {
        self.find_child("status", CLIENT_NS).map(|status| status.text())
    }

    pub fn priority(&self) -> Option<i8> {
        self.find_child("priority", CLIENT_NS)
            .and_then(|priority| priority.text().trim().parse().ok())
    }

    pub fn with_show(self, show: &str) -> Stanza {
        self.with_child(Element::new("show", CLIENT_NS).with_text(show))
    }

    pub fn with_status(self, status: &str) -> Stanza {
        self.with_child(Element::new("status", CLIENT_NS).with_text(status))
    }

    pub fn with_priority(self, priority: i8) -> Stanza {
        self.with_child(Element::new("priority", CLIENT_NS).with_text(&priority.to_string()))
    }
}

#[cfg(test)]
mod tests;
