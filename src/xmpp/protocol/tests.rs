/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::sync::Arc;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::*;
use crate::xmpp::constants::ROSTER_NS;
use crate::xmpp::constants::SESSION_NS;
use crate::xmpp::constants::STREAMS_ERROR_NS;
use crate::xmpp::error::StreamCondition;
use crate::xmpp::error::StreamFault;
use crate::xmpp::extensions::roster::RosterItem;
use crate::xmpp::extensions::roster::Subscription;
use crate::xmpp::sasl::Mechanism;
use crate::xmpp::sasl::SaslChallengeParams;
use crate::xmpp::sasl::SaslError;
use crate::xmpp::sasl::compute_rspauth;
use crate::xmpp::sasl::decode_challenge;
use crate::xmpp::sasl::generate_plain_credential;

const HEADER: &str = "<stream:stream xmlns='jabber:client' \
                      xmlns:stream='http://etherx.jabber.org/streams' id='s1' version='1.0'>";

const HEADER_AFTER_AUTH: &str = "<stream:stream xmlns='jabber:client' \
                                 xmlns:stream='http://etherx.jabber.org/streams' id='s2' version='1.0'>";

const DIGEST_FEATURES: &str = "<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                               <mechanism>PLAIN</mechanism><mechanism>DIGEST-MD5</mechanism>\
                               </mechanisms></stream:features>";

const CHALLENGE: &str = "realm=\"example.com\",nonce=\"OA6MG9tEQGm2hh\",qop=\"auth\",\
                         charset=utf-8,algorithm=md5-sess";

const SASL_ABORT: &str = "<abort xmlns=\"urn:ietf:params:xml:ns:xmpp-sasl\"/>";

fn jid(text: &str) -> Jid {
    Jid::new(text).unwrap()
}

fn builder() -> StreamEngineBuilder {
    StreamEngine::builder(jid("juliet@example.com/balcony")).password("r0m30")
}

fn parse_xml(xml: &str) -> Element {
    let mut parser = StreamParser::new();
    parser.feed(HEADER.as_bytes());
    parser.feed(xml.as_bytes());
    assert!(matches!(
        parser.next_element(),
        Ok(Some(StreamElement::Start(_)))
    ));
    match parser.next_element() {
        Ok(Some(StreamElement::Element(element))) => element,
        other => panic!("no element in {xml}: {other:?}"),
    }
}

fn sent_stanza(xml: &str) -> Stanza {
    Stanza::parse(parse_xml(xml)).unwrap()
}

fn drain(engine: &mut StreamEngine) -> (Vec<String>, Vec<StreamEvent>) {
    let mut sent = Vec::new();
    let mut events = Vec::new();
    for event in engine.events() {
        match event {
            StreamEvent::Send(bytes) => sent.push(String::from_utf8(bytes).unwrap()),
            other => events.push(other),
        }
    }
    (sent, events)
}

fn challenge(text: &str) -> String {
    format!(
        "<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</challenge>",
        STANDARD.encode(text)
    )
}

fn connected(builder: StreamEngineBuilder) -> StreamEngine {
    let mut engine = builder.build();
    engine.initiate();
    engine.receive_bytes(HEADER.as_bytes()).unwrap();
    drain(&mut engine);
    engine
}

/// Runs DIGEST-MD5 up to the first response and returns the server proof
/// the engine will expect.
fn digest_until_response(engine: &mut StreamEngine) -> String {
    engine.receive_bytes(DIGEST_FEATURES.as_bytes()).unwrap();
    let (sent, _) = drain(engine);
    assert_eq!(
        sent,
        vec!["<auth xmlns=\"urn:ietf:params:xml:ns:xmpp-sasl\" mechanism=\"DIGEST-MD5\"/>"]
    );
    assert_eq!(engine.state().mechanism(), Some(Mechanism::DigestMd5));

    engine.receive_bytes(challenge(CHALLENGE).as_bytes()).unwrap();
    let (sent, events) = drain(engine);
    assert!(events.is_empty());
    assert_eq!(sent.len(), 1);
    let response = parse_xml(&sent[0]);
    assert_eq!(response.name(), "response");
    let fields = decode_challenge(response.text()).unwrap();
    assert_eq!(fields.get("username"), Some("juliet"));
    assert_eq!(fields.get("digest-uri"), Some("xmpp/example.com"));
    assert_eq!(fields.get("nc"), Some("00000001"));
    assert_eq!(fields.get("qop"), Some("auth"));
    let cnonce = fields.get("cnonce").unwrap();

    let params = SaslChallengeParams::parse(CHALLENGE).unwrap();
    compute_rspauth(
        &params,
        "juliet",
        "r0m30",
        None,
        Some("xmpp/example.com"),
        cnonce,
        "00000001",
    )
    .unwrap()
}

#[test]
fn full_login() {
    let bound_calls = Arc::new(Mutex::new(0));
    let counter = bound_calls.clone();
    let mut engine = builder()
        .on_bound(move |session: &mut Session| {
            *counter.lock().unwrap() += 1;
            let marker = Stanza::message(None)
                .unwrap()
                .with_to(jid("romeo@example.net"))
                .with_body("ready");
            session.send(&marker);
        })
        .build();

    engine.initiate();
    assert_eq!(engine.state().status(), Status::Disconnected);
    let (sent, _) = drain(&mut engine);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with(
        "<?xml version='1.0'?><stream:stream xmlns='jabber:client' \
         xmlns:stream='http://etherx.jabber.org/streams' to='example.com' version='1.0'"
    ));

    engine.receive_bytes(HEADER.as_bytes()).unwrap();
    assert_eq!(engine.state().status(), Status::Connected);
    assert_eq!(engine.session().stream_id(), Some("s1"));

    let rspauth = digest_until_response(&mut engine);
    engine
        .receive_bytes(challenge(&format!("rspauth={rspauth}")).as_bytes())
        .unwrap();
    let (sent, _) = drain(&mut engine);
    assert_eq!(
        sent,
        vec!["<response xmlns=\"urn:ietf:params:xml:ns:xmpp-sasl\"/>"]
    );

    engine
        .receive_bytes(b"<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>")
        .unwrap();
    assert_eq!(engine.state().status(), Status::Authenticated);
    let (sent, _) = drain(&mut engine);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("<?xml version='1.0'?><stream:stream"));

    let features = format!(
        "{HEADER_AFTER_AUTH}<stream:features><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/>\
         <session xmlns='urn:ietf:params:xml:ns:xmpp-session'/></stream:features>"
    );
    engine.receive_bytes(features.as_bytes()).unwrap();
    assert_eq!(engine.session().stream_id(), Some("s2"));
    let (sent, _) = drain(&mut engine);
    assert_eq!(sent.len(), 1);
    let bind = sent_stanza(&sent[0]);
    assert_eq!(bind.stanza_type(), Some(StanzaType::Set));
    assert_eq!(
        bind.payload().unwrap().to_string(),
        "<bind xmlns=\"urn:ietf:params:xml:ns:xmpp-bind\"><resource>balcony</resource></bind>"
    );

    let result = format!(
        "<iq type='result' id='{}'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
         <jid>juliet@example.com/balcony</jid></bind></iq>",
        bind.id().unwrap()
    );
    engine.receive_bytes(result.as_bytes()).unwrap();
    assert_eq!(engine.state().status(), Status::Bound);
    assert_eq!(
        engine.state().jid(),
        Some(&jid("juliet@example.com/balcony"))
    );
    let events: Vec<StreamEvent> = engine.events().collect();
    assert_eq!(events.len(), 5);
    let text = |event: &StreamEvent| match event {
        StreamEvent::Send(bytes) => String::from_utf8(bytes.clone()).unwrap(),
        other => panic!("expected output, got {other:?}"),
    };
    let session_iq = sent_stanza(&text(&events[0]));
    assert!(session_iq.find_child("session", SESSION_NS).is_some());
    let roster_iq = sent_stanza(&text(&events[1]));
    assert!(roster_iq.find_child("query", ROSTER_NS).is_some());
    assert_eq!(text(&events[2]), "<presence/>");
    assert_eq!(
        events[3],
        StreamEvent::Bound(jid("juliet@example.com/balcony"))
    );
    assert!(text(&events[4]).contains("<body>ready</body>"));
    assert_eq!(*bound_calls.lock().unwrap(), 1);

    let roster = format!(
        "<iq type='result' id='{}'><query xmlns='jabber:iq:roster'>\
         <item jid='romeo@example.net' subscription='both'/></query></iq>",
        roster_iq.id().unwrap()
    );
    engine.receive_bytes(roster.as_bytes()).unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(sent.is_empty());
    let mut item = RosterItem::new(jid("romeo@example.net"));
    item.subscription = Subscription::Both;
    assert_eq!(events, vec![StreamEvent::Roster(vec![item])]);
    assert_eq!(*bound_calls.lock().unwrap(), 1);
}

#[test]
fn starttls_restarts_stream() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>\
              <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>PLAIN</mechanism>\
              </mechanisms></stream:features>",
        )
        .unwrap();
    let (sent, _) = drain(&mut engine);
    assert_eq!(
        sent,
        vec!["<starttls xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"/>"]
    );

    // Anything after proceed belongs to the old stream
    engine
        .receive_bytes(b"<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/><iq type='get' id='x'/>")
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(sent.is_empty());
    assert_eq!(events, vec![StreamEvent::StartTls]);

    engine.tls_established();
    assert!(engine.state().tls_active());
    let (sent, _) = drain(&mut engine);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("<?xml version='1.0'?><stream:stream"));

    let features = format!(
        "{HEADER}<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
         <mechanism>PLAIN</mechanism></mechanisms></stream:features>"
    );
    engine.receive_bytes(features.as_bytes()).unwrap();
    let (sent, _) = drain(&mut engine);
    assert_eq!(
        sent,
        vec![format!(
            "<auth xmlns=\"urn:ietf:params:xml:ns:xmpp-sasl\" mechanism=\"PLAIN\">{}</auth>",
            generate_plain_credential(None, "juliet", "r0m30")
        )]
    );
}

#[test]
fn tls_failure_closes_stream() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/></stream:features>\
              <failure xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent.last().map(String::as_str), Some("</stream:stream>"));
    assert_eq!(events, vec![StreamEvent::End]);
    assert!(engine.session().is_closed());
}

#[test]
fn no_usable_mechanism() {
    let mut engine = connected(builder().use_tls(false));
    engine
        .receive_bytes(
            b"<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
              <mechanism>PLAIN</mechanism><mechanism>SCRAM-SHA-1</mechanism>\
              </mechanisms></stream:features>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent, vec![SASL_ABORT]);
    assert_eq!(events, vec![StreamEvent::AuthFailed(SaslError::NoMechanism)]);

    // The server's answer to our abort is not reported again
    engine
        .receive_bytes(b"<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><aborted/></failure>")
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(sent.is_empty());
    assert!(events.is_empty());
}

#[test]
fn plain_allowed_without_tls_on_request() {
    let mut engine = connected(builder().use_tls(false).allow_plain_without_tls(true));
    engine
        .receive_bytes(
            b"<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
              <mechanism>PLAIN</mechanism></mechanisms></stream:features>",
        )
        .unwrap();
    assert_eq!(engine.state().mechanism(), Some(Mechanism::Plain));
}

#[test]
fn sasl_failure() {
    let mut engine = connected(builder());
    engine.receive_bytes(DIGEST_FEATURES.as_bytes()).unwrap();
    drain(&mut engine);
    engine
        .receive_bytes(
            b"<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/>\
              <text>Wrong password</text></failure>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(sent.is_empty());
    assert_eq!(
        events,
        vec![StreamEvent::AuthFailed(SaslError::NotAuthorized)]
    );
    assert_eq!(engine.state().status(), Status::Connected);
}

#[test]
fn rspauth_mismatch() {
    let mut engine = connected(builder());
    digest_until_response(&mut engine);
    engine
        .receive_bytes(challenge("rspauth=00000000000000000000000000000000").as_bytes())
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent, vec![SASL_ABORT]);
    assert_eq!(
        events,
        vec![StreamEvent::AuthFailed(SaslError::RspauthMismatch)]
    );
}

#[test]
fn rspauth_in_success() {
    let mut engine = connected(builder());
    let rspauth = digest_until_response(&mut engine);
    let success = format!(
        "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</success>",
        STANDARD.encode(format!("rspauth={rspauth}"))
    );
    engine.receive_bytes(success.as_bytes()).unwrap();
    assert_eq!(engine.state().status(), Status::Authenticated);

    let mut engine = connected(builder());
    digest_until_response(&mut engine);
    let success = format!(
        "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>{}</success>",
        STANDARD.encode("rspauth=ffffffffffffffffffffffffffffffff")
    );
    engine.receive_bytes(success.as_bytes()).unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent, vec!["</stream:stream>"]);
    assert_eq!(
        events,
        vec![
            StreamEvent::AuthFailed(SaslError::RspauthMismatch),
            StreamEvent::End
        ]
    );
    assert_eq!(engine.state().status(), Status::Disconnected);
}

#[test]
fn challenge_for_other_mechanism() {
    let mut engine = connected(builder().allow_plain_without_tls(true));
    engine
        .receive_bytes(
            b"<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
              <mechanism>PLAIN</mechanism></mechanisms></stream:features>",
        )
        .unwrap();
    drain(&mut engine);
    engine.receive_bytes(challenge(CHALLENGE).as_bytes()).unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent, vec![SASL_ABORT]);
    assert_eq!(
        events,
        vec![StreamEvent::AuthFailed(SaslError::InvalidMechanism)]
    );
}

#[test]
fn input_after_success_is_discarded() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>\
              <iq type='get' id='stale'><query xmlns='jabber:iq:version'/></iq>",
        )
        .unwrap();
    let (sent, _) = drain(&mut engine);
    // Only the new stream header, no answer to the stale request
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("<?xml"));

    engine
        .receive_bytes(HEADER_AFTER_AUTH.as_bytes())
        .unwrap();
    assert_eq!(engine.session().stream_id(), Some("s2"));
}

#[test]
fn stream_errors() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<stream:error><conflict xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
              <text xmlns='urn:ietf:params:xml:ns:xmpp-streams'>Replaced by new connection</text>\
              </stream:error>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent, vec!["</stream:stream>"]);
    assert_eq!(
        events,
        vec![
            StreamEvent::StreamFault(StreamFault {
                condition: StreamCondition::Conflict,
                text: Some("Replaced by new connection".to_string()),
                detail: None,
            }),
            StreamEvent::End,
        ]
    );

    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<stream:error><see-other-host xmlns='urn:ietf:params:xml:ns:xmpp-streams'>\
              other.example.com</see-other-host></stream:error>",
        )
        .unwrap();
    let (_, events) = drain(&mut engine);
    assert_eq!(
        events[0],
        StreamEvent::StreamFault(StreamFault {
            condition: StreamCondition::SeeOtherHost,
            text: None,
            detail: Some("other.example.com".to_string()),
        })
    );
}

#[test]
fn stream_error_without_condition() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<stream:error><text xmlns='urn:ietf:params:xml:ns:xmpp-streams'>huh</text>\
              </stream:error>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(
        sent,
        vec![
            "<stream:error><bad-format xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
             </stream:error></stream:stream>"
        ]
    );
    assert_eq!(
        events,
        vec![
            StreamEvent::StreamFault(StreamFault {
                condition: StreamCondition::BadFormat,
                text: Some("huh".to_string()),
                detail: None,
            }),
            StreamEvent::End,
        ]
    );
}

#[test]
fn stream_error_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = seen.clone();
    let mut engine = connected(builder().handler(
        DispatchKey::new("system-shutdown", STREAMS_ERROR_NS),
        move |_: &mut Session, error: &Element| {
            store.lock().unwrap().push(error.name().to_string());
        },
        true,
    ));
    engine
        .receive_bytes(
            b"<stream:error><system-shutdown xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
              </stream:error>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(*seen.lock().unwrap(), vec!["error"]);
    assert_eq!(sent, vec!["</stream:stream>"]);
    assert_eq!(events, vec![StreamEvent::End]);
}

#[test]
fn malformed_input() {
    let mut engine = connected(builder());
    let err = engine
        .receive_bytes(b"<message><body>hi</message>")
        .unwrap_err();
    assert!(matches!(err, StreamError::BadXml(_)));
    let (sent, events) = drain(&mut engine);
    assert_eq!(
        sent,
        vec![
            "<stream:error><xml-not-well-formed xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
             </stream:error></stream:stream>"
        ]
    );
    assert_eq!(events, vec![StreamEvent::End]);

    // Closed streams ignore further input
    engine
        .receive_bytes(b"<message><body>again</body></message>")
        .unwrap();
    assert!(engine.poll_event().is_none());
}

#[test]
fn server_closes_stream() {
    let mut engine = connected(builder());
    engine.receive_bytes(b"</stream:stream>").unwrap();
    let (sent, events) = drain(&mut engine);
    assert_eq!(sent, vec!["</stream:stream>"]);
    assert_eq!(events, vec![StreamEvent::End]);
    assert_eq!(engine.state().status(), Status::Disconnected);
}

#[test]
fn unhandled_stanzas() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<iq type='get' id='u1' from='romeo@example.net/orchard'>\
              <ping xmlns='urn:xmpp:ping'/></iq>",
        )
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(events.is_empty());
    assert_eq!(sent.len(), 1);
    let reply = sent_stanza(&sent[0]);
    assert_eq!(reply.to(), Some(&jid("romeo@example.net/orchard")));
    assert_eq!(reply.id(), Some("u1"));
    assert_eq!(
        reply.error().unwrap().condition,
        ErrorCondition::ServiceUnavailable
    );
    assert!(reply.find_child("ping", "urn:xmpp:ping").is_some());

    engine
        .receive_bytes(b"<message from='romeo@example.net' type='chat'><body>hi</body></message>")
        .unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(sent.is_empty());
    match events.as_slice() {
        [StreamEvent::Stanza(message)] => assert_eq!(message.body(), Some("hi")),
        other => panic!("unexpected {other:?}"),
    }

    // An IQ without an id is not a valid stanza and is dropped
    engine.receive_bytes(b"<iq type='get'/>").unwrap();
    let (sent, events) = drain(&mut engine);
    assert!(sent.is_empty());
    assert!(events.is_empty());
}

#[test]
fn handlers_take_stanzas() {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let store = bodies.clone();
    let mut engine = connected(builder());
    engine.register(
        DispatchKey::new("body", CLIENT_NS)
            .with_type("chat")
            .with_sender(&jid("romeo@example.net")),
        move |_: &mut Session, message: &Element| {
            if let Some(body) = message.child_text("body", CLIENT_NS) {
                store.lock().unwrap().push(body.to_string());
            }
        },
        false,
    );
    engine
        .receive_bytes(
            b"<message from='romeo@example.net/orchard' type='chat'><body>one</body></message>\
              <message from='romeo@example.net/garden' type='chat'><body>two</body></message>\
              <message from='tybalt@example.com' type='chat'><body>three</body></message>",
        )
        .unwrap();
    let (_, events) = drain(&mut engine);
    assert_eq!(*bodies.lock().unwrap(), vec!["one", "two"]);
    assert_eq!(events.len(), 1);

    assert!(engine.unregister(
        &DispatchKey::new("body", CLIENT_NS)
            .with_type("chat")
            .with_sender(&jid("romeo@example.net"))
    ));
}

#[test]
fn terminate_session() {
    let called = Arc::new(Mutex::new(false));
    let flag = called.clone();
    let mut engine = connected(builder());
    engine.register(
        DispatchKey::iq_response("late"),
        move |_: &mut Session, _: &Element| *flag.lock().unwrap() = true,
        true,
    );
    engine.session().state.status = Status::Bound;
    engine.terminate();
    let (sent, events) = drain(&mut engine);
    assert_eq!(
        sent,
        vec!["<presence type=\"unavailable\"/>", "</stream:stream>"]
    );
    assert_eq!(events, vec![StreamEvent::End]);
    assert_eq!(engine.state().status(), Status::Disconnected);

    engine
        .receive_bytes(b"<iq type='result' id='late'/>")
        .unwrap();
    assert!(engine.poll_event().is_none());
    assert!(!*called.lock().unwrap());

    // Idempotent
    engine.terminate();
    assert!(engine.poll_event().is_none());
}

#[test]
fn lookup_order() {
    let stanza = parse_xml(
        "<iq type='result' id='r1' from='romeo@example.net/orchard'>\
         <query xmlns='jabber:iq:version'/></iq>",
    );
    let romeo = jid("romeo@example.net");
    let query = DispatchKey::new("query", "jabber:iq:version");
    let iq = DispatchKey::new("iq", CLIENT_NS);
    assert_eq!(
        lookup_keys(&stanza),
        vec![
            DispatchKey::iq_response("r1"),
            query.clone().with_type("result").with_sender(&romeo),
            query.clone().with_type("result"),
            query.clone().with_sender(&romeo),
            query,
            iq.clone().with_type("result").with_sender(&romeo),
            iq.clone().with_type("result"),
            iq.clone().with_sender(&romeo),
            iq,
        ]
    );

    let presence = parse_xml("<presence/>");
    assert_eq!(
        lookup_keys(&presence),
        vec![DispatchKey::new("presence", CLIENT_NS)]
    );
}

#[test]
fn oversized_element() {
    let mut engine = connected(builder().max_element_size(256));
    let message = format!(
        "<message from='romeo@example.net'><body>{}</body></message>",
        "x".repeat(1024)
    );
    let mut failure = None;
    for chunk in message.as_bytes().chunks(100) {
        if let Err(err) = engine.receive_bytes(chunk) {
            failure = Some(err);
            break;
        }
    }
    assert_eq!(failure, Some(StreamError::ElementTooLarge(256)));
    let (sent, events) = drain(&mut engine);
    assert_eq!(
        sent,
        vec![
            "<stream:error><policy-violation xmlns='urn:ietf:params:xml:ns:xmpp-streams'/>\
             </stream:error></stream:stream>"
        ]
    );
    assert_eq!(events, vec![StreamEvent::End]);
}

#[test]
fn error_replies_declare_attribute_prefixes() {
    let mut engine = connected(builder());
    engine
        .receive_bytes(
            b"<iq type='get' id='u2' from='romeo@example.net/orchard' xmlns:f='urn:f'>\
              <query xmlns='urn:x' f:a='1'/></iq>",
        )
        .unwrap();
    let (sent, _) = drain(&mut engine);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("<query xmlns=\"urn:x\" xmlns:f=\"urn:f\" f:a=\"1\"/>"));
    let reply = sent_stanza(&sent[0]);
    assert_eq!(
        reply.find_child("query", "urn:x").unwrap().attribute("f:a"),
        Some("1")
    );
}

#[test]
fn builder_settings() {
    let builder = builder()
        .resource("terrace")
        .lang("en")
        .priority(5)
        .status("Wherefore art thou")
        .use_tls(false)
        .max_element_size(4096);
    let config = builder.config();
    assert_eq!(config.max_element_size, 4096);
    assert_eq!(config.bind_resource(), Some("terrace"));
    assert_eq!(config.digest_uri(), "xmpp/example.com");
    assert!(!config.use_tls);
    assert!(config.can_use(Mechanism::DigestMd5, false));
    assert!(!config.can_use(Mechanism::Plain, false));
    assert!(config.can_use(Mechanism::Plain, true));
    assert!(!config.can_use(Mechanism::Anonymous, false));

    let mut engine = builder.build();
    engine.initiate();
    let (sent, _) = drain(&mut engine);
    assert!(sent[0].contains("xml:lang='en'"));
}
