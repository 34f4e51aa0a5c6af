/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;
use crate::xmpp::constants::ROSTER_NS;
use crate::xmpp::constants::STANZAS_ERROR_NS;

#[test]
fn legal_types() {
    assert!(Stanza::iq(StanzaType::Get).is_ok());
    assert!(Stanza::iq(StanzaType::Error).is_ok());
    assert_eq!(
        Stanza::iq(StanzaType::Chat).unwrap_err(),
        BadStanza::InvalidType
    );
    assert_eq!(
        Stanza::new(StanzaKind::Iq, None).unwrap_err(),
        BadStanza::InvalidType
    );
    assert!(Stanza::message(None).is_ok());
    assert!(Stanza::message(Some(StanzaType::Groupchat)).is_ok());
    assert_eq!(
        Stanza::message(Some(StanzaType::Subscribe)).unwrap_err(),
        BadStanza::InvalidType
    );
    assert!(Stanza::presence(None).is_ok());
    assert!(Stanza::presence(Some(StanzaType::Probe)).is_ok());
    assert_eq!(
        Stanza::presence(Some(StanzaType::Set)).unwrap_err(),
        BadStanza::InvalidType
    );
}

#[test]
fn iq_gets_generated_id() {
    let a = Stanza::iq(StanzaType::Get).unwrap();
    let b = Stanza::iq(StanzaType::Get).unwrap();
    assert!(a.id().is_some());
    assert_ne!(a.id(), b.id());
    assert!(Stanza::message(None).unwrap().id().is_none());
}

#[test]
fn parse_stanza() {
    let element = Element::new("iq", CLIENT_NS)
        .with_attribute("type", "result")
        .with_attribute("id", "r1")
        .with_attribute("from", "example.com")
        .with_attribute("to", "juliet@example.com/balcony")
        .with_attribute("xml:lang", "en")
        .with_child(Element::new("query", ROSTER_NS));
    let stanza = Stanza::parse(element).unwrap();
    assert_eq!(stanza.kind(), StanzaKind::Iq);
    assert_eq!(stanza.stanza_type(), Some(StanzaType::Result));
    assert_eq!(stanza.id(), Some("r1"));
    assert_eq!(stanza.from().unwrap().full(), "example.com");
    assert_eq!(stanza.to().unwrap().resourcepart(), Some("balcony"));
    assert_eq!(stanza.lang(), Some("en"));
    assert!(stanza.payload().unwrap().is("query", ROSTER_NS));
}

#[test]
fn parse_rejects() {
    assert_eq!(
        Stanza::parse(Element::new("features", "http://etherx.jabber.org/streams")),
        Err(BadStanza::NotAStanza)
    );
    assert_eq!(
        Stanza::parse(Element::new("success", "urn:ietf:params:xml:ns:xmpp-sasl")),
        Err(BadStanza::NotAStanza)
    );
    assert_eq!(
        Stanza::parse(Element::new("iq", CLIENT_NS).with_attribute("type", "get")),
        Err(BadStanza::MissingAttribute("id"))
    );
    assert_eq!(
        Stanza::parse(Element::new("message", CLIENT_NS).with_attribute("type", "weird")),
        Err(BadStanza::InvalidType)
    );
    assert!(matches!(
        Stanza::parse(Element::new("message", CLIENT_NS).with_attribute("to", "@example.com")),
        Err(BadStanza::BadAddress(_))
    ));
}

#[test]
fn unknown_attributes_survive() {
    let element = Element::new("presence", CLIENT_NS)
        .with_attribute("zeta", "1")
        .with_attribute("alpha", "2");
    let stanza = Stanza::parse(element.clone()).unwrap();
    assert_eq!(stanza.attribute("alpha"), Some("2"));
    assert_eq!(stanza.to_element(), element);
}

#[test]
fn message_and_presence_helpers() {
    let message = Stanza::message(Some(StanzaType::Chat))
        .unwrap()
        .with_subject("Balcony")
        .with_body("Art thou not Romeo?")
        .with_thread("t1");
    assert_eq!(message.body(), Some("Art thou not Romeo?"));
    assert_eq!(message.subject(), Some("Balcony"));
    assert_eq!(message.thread(), Some("t1"));

    let presence = Stanza::presence(None)
        .unwrap()
        .with_show("away")
        .with_status("in the orchard")
        .with_priority(-3);
    assert_eq!(presence.show(), Some("away"));
    assert_eq!(presence.status(), Some("in the orchard"));
    assert_eq!(presence.priority(), Some(-3));
    assert_eq!(
        String::from_utf8(presence.to_bytes()).unwrap(),
        "<presence><show>away</show><status>in the orchard</status><priority>-3</priority></presence>"
    );
}

#[test]
fn error_codes() {
    let conflict = build_stanza_error(
        ErrorCondition::Conflict,
        Some(ErrorType::Cancel),
        None,
        None,
        None,
    );
    assert_eq!(conflict.attribute("code"), Some("409"));
    assert_eq!(conflict.attribute("type"), Some("cancel"));
    assert!(conflict.find_child("conflict", STANZAS_ERROR_NS).is_some());

    let not_found = build_stanza_error(
        ErrorCondition::ItemNotFound,
        Some(ErrorType::Cancel),
        None,
        None,
        None,
    );
    assert_eq!(not_found.attribute("code"), Some("404"));

    let table = [
        (ErrorCondition::BadRequest, ErrorType::Modify, 400),
        (ErrorCondition::FeatureNotImplemented, ErrorType::Cancel, 501),
        (ErrorCondition::Forbidden, ErrorType::Auth, 403),
        (ErrorCondition::JidMalformed, ErrorType::Cancel, 400),
        (ErrorCondition::NotAcceptable, ErrorType::Modify, 406),
        (ErrorCondition::NotAuthorized, ErrorType::Auth, 401),
        (ErrorCondition::RecipientUnavailable, ErrorType::Wait, 404),
        (ErrorCondition::RegistrationRequired, ErrorType::Auth, 407),
        (ErrorCondition::RemoteServerNotFound, ErrorType::Cancel, 404),
        (ErrorCondition::RemoteServerTimeout, ErrorType::Wait, 504),
        (ErrorCondition::ResourceConstraint, ErrorType::Wait, 500),
        (ErrorCondition::ServiceUnavailable, ErrorType::Cancel, 503),
        (ErrorCondition::SubscriptionRequired, ErrorType::Auth, 407),
        (ErrorCondition::UnexpectedRequest, ErrorType::Wait, 400),
    ];
    for (condition, error_type, code) in table {
        let error = StanzaError::new(condition);
        assert_eq!(error.error_type, error_type, "{condition}");
        assert_eq!(error.code, Some(code), "{condition}");
    }
}

#[test]
fn error_with_text() {
    let element = StanzaError::new(ErrorCondition::NotAllowed)
        .with_code(None)
        .with_text("no way", Some("en"))
        .to_element();
    assert_eq!(element.attribute("code"), None);
    let text = element.find_child("text", STANZAS_ERROR_NS).unwrap();
    assert_eq!(text.text(), "no way");
    assert_eq!(text.attribute("xml:lang"), Some("en"));

    let decoded = StanzaError::from_element(&element).unwrap();
    assert_eq!(decoded.condition, ErrorCondition::NotAllowed);
    assert_eq!(decoded.error_type, ErrorType::Cancel);
    assert_eq!(decoded.text.as_deref(), Some("no way"));
    assert_eq!(decoded.lang.as_deref(), Some("en"));
}

#[test]
fn legacy_error_decoding() {
    let element = Element::bare("error").with_attribute("code", "409");
    let decoded = StanzaError::from_element(&element).unwrap();
    assert_eq!(decoded.condition, ErrorCondition::Conflict);
    assert_eq!(decoded.error_type, ErrorType::Cancel);

    let element = Element::bare("error").with_attribute("code", "999");
    assert!(StanzaError::from_element(&element).is_none());
}

#[test]
fn replies() {
    let request = Stanza::parse(
        Element::new("iq", CLIENT_NS)
            .with_attribute("type", "get")
            .with_attribute("id", "v1")
            .with_attribute("from", "romeo@example.net/orchard")
            .with_attribute("to", "juliet@example.com/balcony")
            .with_child(Element::new("query", "jabber:iq:version")),
    )
    .unwrap();

    let result = request.result_reply();
    assert_eq!(result.stanza_type(), Some(StanzaType::Result));
    assert_eq!(result.id(), Some("v1"));
    assert_eq!(result.to().unwrap().full(), "romeo@example.net/orchard");
    assert_eq!(result.from().unwrap().full(), "juliet@example.com/balcony");
    assert!(result.children().is_empty());

    let error = request.error_reply(&StanzaError::new(ErrorCondition::ServiceUnavailable));
    assert_eq!(error.stanza_type(), Some(StanzaType::Error));
    assert_eq!(error.children().len(), 2);
    let decoded = error.error().unwrap();
    assert_eq!(decoded.condition, ErrorCondition::ServiceUnavailable);
    assert_eq!(decoded.code, Some(503));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn any_kind_and_type() -> impl Strategy<Value = (StanzaKind, Option<StanzaType>)> {
        prop_oneof![
            prop_oneof![
                Just(StanzaType::Get),
                Just(StanzaType::Set),
                Just(StanzaType::Result),
                Just(StanzaType::Error),
            ]
            .prop_map(|t| (StanzaKind::Iq, Some(t))),
            proptest::option::of(prop_oneof![
                Just(StanzaType::Chat),
                Just(StanzaType::Normal),
                Just(StanzaType::Groupchat),
                Just(StanzaType::Headline),
            ])
            .prop_map(|t| (StanzaKind::Message, t)),
            proptest::option::of(prop_oneof![
                Just(StanzaType::Subscribe),
                Just(StanzaType::Unsubscribed),
                Just(StanzaType::Unavailable),
                Just(StanzaType::Probe),
            ])
            .prop_map(|t| (StanzaKind::Presence, t)),
        ]
    }

    proptest! {
        #[test]
        fn parse_of_serialize_is_identity(
            (kind, stanza_type) in any_kind_and_type(),
            to in proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com(/[a-z]{1,5})?"),
            id in proptest::option::of("[a-zA-Z0-9]{1,12}"),
            lang in proptest::option::of("(en|tr|de)"),
            texts in proptest::collection::vec("[ -~]{0,20}", 0..4),
        ) {
            let mut stanza = Stanza::new(kind, stanza_type).unwrap();
            if let Some(to) = &to {
                stanza = stanza.with_to(Jid::new(to).unwrap());
            }
            if let Some(id) = &id {
                stanza = stanza.with_id(id);
            }
            if let Some(lang) = &lang {
                stanza = stanza.with_lang(lang);
            }
            for (i, text) in texts.iter().enumerate() {
                stanza.push_child(
                    Element::new(&format!("x{i}"), "urn:example:test")
                        .with_attribute("n", text)
                        .with_text(text),
                );
            }
            let parsed = Stanza::parse(stanza.to_element()).unwrap();
            prop_assert_eq!(parsed, stanza);
        }
    }
}
