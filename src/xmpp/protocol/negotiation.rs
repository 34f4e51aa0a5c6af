/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::Element;
use crate::entities::escape;
use crate::xmpp::constants::BIND_NS;
use crate::xmpp::constants::SASL_NS;
use crate::xmpp::constants::SESSION_NS;
use crate::xmpp::constants::STREAM_NS;
use crate::xmpp::constants::STREAMS_ERROR_NS;
use crate::xmpp::constants::TLS_NS;
use crate::xmpp::dispatch::Dispatch;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::dispatch::dispatch;
use crate::xmpp::error::StreamCondition;
use crate::xmpp::error::StreamFault;
use crate::xmpp::extensions::roster;
use crate::xmpp::jid::Jid;
use crate::xmpp::sasl::Mechanism;
use crate::xmpp::sasl::SaslChallengeParams;
use crate::xmpp::sasl::SaslError;
use crate::xmpp::sasl::compute_digest_response;
use crate::xmpp::sasl::compute_rspauth;
use crate::xmpp::sasl::decode_challenge;
use crate::xmpp::sasl::generate_cnonce;
use crate::xmpp::sasl::generate_google_token_credential;
use crate::xmpp::sasl::generate_plain_credential;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaKind;
use crate::xmpp::stanza::StanzaType;
use crate::xmpp::stanza::generate_id;

use super::config::SessionConfig;
use super::session::SaslState;
use super::session::Session;
use super::session::Status;
use super::session::StreamEvent;

const STREAM_CLOSE: &[u8] = b"</stream:stream>";

const NONCE_COUNT: &str = "00000001";

pub(super) fn stream_header(config: &SessionConfig) -> Vec<u8> {
    let mut header = String::from(
        "<?xml version='1.0'?><stream:stream xmlns='jabber:client' \
         xmlns:stream='http://etherx.jabber.org/streams' to='",
    );
    escape(config.jid.domainpart(), &mut header);
    header.push_str("' version='1.0' id='");
    header.push_str(&generate_id());
    if let Some(lang) = &config.lang {
        header.push_str("' xml:lang='");
        escape(lang, &mut header);
    }
    header.push_str("'>");
    header.into_bytes()
}

/// A `<stream:error/>` followed by the closing tag.
pub(super) fn stream_error(condition: StreamCondition) -> Vec<u8> {
    format!(
        "<stream:error><{condition} xmlns='{STREAMS_ERROR_NS}'/></stream:error></stream:stream>"
    )
    .into_bytes()
}

pub(super) fn register_stream_handlers(session: &mut Session) {
    let registry = session.registry();
    registry.register(DispatchKey::new("features", STREAM_NS), on_features, false);
    registry.register(DispatchKey::new("proceed", TLS_NS), on_tls_proceed, false);
    registry.register(DispatchKey::new("failure", TLS_NS), on_tls_failure, false);
    registry.register(DispatchKey::new("challenge", SASL_NS), on_challenge, false);
    registry.register(DispatchKey::new("success", SASL_NS), on_success, false);
    registry.register(DispatchKey::new("failure", SASL_NS), on_sasl_failure, false);
    registry.register(DispatchKey::new("error", STREAM_NS), on_stream_error, false);
}

/// Sends the closing tag and ends the session.
pub(super) fn close_stream(session: &mut Session) {
    session.send_raw(STREAM_CLOSE.to_vec());
    session.close();
}

fn abort_auth(session: &mut Session, err: SaslError) {
    warn!(%err, "aborting authentication");
    session.send_element(&Element::new("abort", SASL_NS));
    session.sasl.failed = true;
    session.emit(StreamEvent::AuthFailed(err));
}

//
// Features before authentication
//

fn on_features(session: &mut Session, features: &Element) {
    if session.config().use_tls
        && !session.state().tls_active()
        && features.find_child("starttls", TLS_NS).is_some()
    {
        info!("starting TLS negotiation");
        session.send_element(&Element::new("starttls", TLS_NS));
        return;
    }

    let offered: Vec<String> = features
        .find_child("mechanisms", SASL_NS)
        .map(|mechanisms| {
            mechanisms
                .children_named("mechanism", SASL_NS)
                .map(|mechanism| mechanism.text().trim().to_string())
                .collect()
        })
        .unwrap_or_default();
    let tls_active = session.state().tls_active();
    let selected = Mechanism::select(offered.iter().map(String::as_str), |mechanism| {
        session.config().can_use(mechanism, tls_active)
    });
    let Some(mechanism) = selected else {
        warn!(?offered, "no usable SASL mechanism");
        abort_auth(session, SaslError::NoMechanism);
        return;
    };

    info!(%mechanism, "authenticating");
    let config = session.config();
    let mut auth = Element::new("auth", SASL_NS).with_attribute("mechanism", mechanism.as_str());
    match mechanism {
        Mechanism::DigestMd5 | Mechanism::Anonymous => (),
        Mechanism::Plain => auth.set_text(&generate_plain_credential(
            config.authzid.as_deref(),
            config.jid.localpart().unwrap_or_default(),
            config.password.as_deref().unwrap_or_default(),
        )),
        Mechanism::XGoogleToken => auth.set_text(&generate_google_token_credential(
            config.jid.bare(),
            config.token.as_deref().unwrap_or_default(),
        )),
    }
    session.sasl = SaslState::default();
    session.state.mechanism = Some(mechanism);
    session.send_element(&auth);
}

//
// StartTLS
//

fn on_tls_proceed(session: &mut Session, _: &Element) {
    debug!("server is ready for TLS");
    session.reset_requested = true;
    session.emit(StreamEvent::StartTls);
}

fn on_tls_failure(session: &mut Session, _: &Element) {
    warn!("server refused TLS negotiation");
    close_stream(session);
}

//
// SASL
//

fn digest_response(
    config: &SessionConfig,
    params: &SaslChallengeParams,
) -> Result<(String, String), SaslError> {
    let username = config.jid.localpart().unwrap_or_default();
    let password = config.password.as_deref().unwrap_or_default();
    let authzid = config.authzid.as_deref();
    let digest_uri = config.digest_uri();
    let cnonce = generate_cnonce();
    let response = compute_digest_response(
        params,
        username,
        password,
        authzid,
        Some(&digest_uri),
        Some(&cnonce),
        NONCE_COUNT,
    )?;
    let rspauth = compute_rspauth(
        params,
        username,
        password,
        authzid,
        Some(&digest_uri),
        &cnonce,
        NONCE_COUNT,
    )?;
    Ok((response, rspauth))
}

fn on_challenge(session: &mut Session, challenge: &Element) {
    if session.state().mechanism() != Some(Mechanism::DigestMd5) {
        abort_auth(session, SaslError::InvalidMechanism);
        return;
    }
    let params = match decode_challenge(challenge.text()) {
        Ok(params) => params,
        Err(err) => {
            abort_auth(session, err);
            return;
        }
    };

    if let Some(rspauth) = params.get("rspauth") {
        if session.sasl.expected_rspauth.as_deref() != Some(rspauth) {
            abort_auth(session, SaslError::RspauthMismatch);
            return;
        }
        debug!("server proof verified");
        session.sasl.verified = true;
        session.send_element(&Element::new("response", SASL_NS));
        return;
    }

    match digest_response(session.config(), &params) {
        Ok((response, rspauth)) => {
            session.sasl.expected_rspauth = Some(rspauth);
            session.send_element(&Element::new("response", SASL_NS).with_text(&response));
        }
        Err(err) => abort_auth(session, err),
    }
}

// Servers may put the final DIGEST-MD5 proof into <success/> instead
// of a second challenge.
fn success_proof_matches(session: &Session, success: &Element) -> bool {
    if session.state().mechanism() != Some(Mechanism::DigestMd5) || session.sasl.verified {
        return true;
    }
    let text = success.text().trim();
    if text.is_empty() {
        return true;
    }
    match decode_challenge(text) {
        Ok(params) => match params.get("rspauth") {
            Some(rspauth) => session.sasl.expected_rspauth.as_deref() == Some(rspauth),
            None => true,
        },
        Err(_) => false,
    }
}

fn on_success(session: &mut Session, success: &Element) {
    if !success_proof_matches(session, success) {
        warn!("server proof in success does not match");
        session.emit(StreamEvent::AuthFailed(SaslError::RspauthMismatch));
        close_stream(session);
        return;
    }
    info!("authenticated");
    session.state.status = Status::Authenticated;
    session.reset_requested = true;
    let header = stream_header(session.config());
    session.send_raw(header);
    session.register(
        DispatchKey::new("features", STREAM_NS),
        on_bind_features,
        false,
    );
}

fn on_sasl_failure(session: &mut Session, failure: &Element) {
    if session.sasl.failed {
        debug!("ignoring failure after abort");
        return;
    }
    session.sasl.failed = true;
    let err = failure
        .children()
        .iter()
        .find(|child| child.namespace() == Some(SASL_NS) && child.name() != "text")
        .map(|child| SaslError::from_condition(child.name()))
        .unwrap_or(SaslError::NotAuthorized);
    warn!(%err, "authentication failed");
    session.emit(StreamEvent::AuthFailed(err));
}

//
// Resource binding
//

fn on_bind_features(session: &mut Session, features: &Element) {
    session.session_offered = features.find_child("session", SESSION_NS).is_some();
    if features.find_child("bind", BIND_NS).is_none() {
        warn!("server did not offer resource binding");
        return;
    }
    let mut bind = Element::new("bind", BIND_NS);
    if let Some(resource) = session.config().bind_resource() {
        bind.push_child(Element::new("resource", BIND_NS).with_text(resource));
    }
    let iq = Stanza::iq_set().with_child(bind);
    if let Some(id) = iq.id() {
        session.register(DispatchKey::iq_response(id), on_bind_result, true);
    }
    session.send(&iq);
}

fn on_bind_result(session: &mut Session, result: &Element) {
    if result.attribute("type") == Some(StanzaType::Error.as_str()) {
        warn!("resource binding failed");
        if let Ok(stanza) = Stanza::parse(result.clone()) {
            session.emit(StreamEvent::Stanza(stanza));
        }
        return;
    }
    let jid = result
        .find_child("bind", BIND_NS)
        .and_then(|bind| bind.child_text("jid", BIND_NS))
        .and_then(|jid| Jid::new(jid.trim()).ok())
        .unwrap_or_else(|| session.config().jid.clone());
    info!(%jid, "resource bound");
    session.state.status = Status::Bound;
    session.state.jid = Some(jid.clone());

    if session.session_offered {
        let iq = Stanza::iq_set().with_child(Element::new("session", SESSION_NS));
        if let Some(id) = iq.id() {
            session.register(DispatchKey::iq_response(id), |_: &mut Session, _: &Element| (), true);
        }
        session.send(&iq);
    }

    roster::request_roster(session, |session: &mut Session, result| match result {
        Ok(items) => session.emit(StreamEvent::Roster(items)),
        Err(err) => warn!(%err, "roster request failed"),
    });

    if session.config().initial_presence {
        let mut presence = Stanza::unchecked(StanzaKind::Presence, None);
        if let Some(status) = &session.config().status {
            presence = presence.with_status(status);
        }
        if let Some(priority) = session.config().priority {
            presence = presence.with_priority(priority);
        }
        session.send(&presence);
    }

    session.emit(StreamEvent::Bound(jid));
    if let Some(callback) = session.on_bound.take() {
        callback(session);
    }
}

//
// Stream errors
//

fn on_stream_error(session: &mut Session, error: &Element) {
    let text = error
        .child_text("text", STREAMS_ERROR_NS)
        .map(|text| text.to_string());
    let condition = error
        .children()
        .iter()
        .filter(|child| child.namespace() == Some(STREAMS_ERROR_NS))
        .find_map(|child| StreamCondition::from_name(child.name()).map(|cond| (cond, child)));

    let Some((condition, child)) = condition else {
        warn!("stream error without a known condition");
        session.send_raw(stream_error(StreamCondition::BadFormat));
        session.emit(StreamEvent::StreamFault(StreamFault {
            condition: StreamCondition::BadFormat,
            text,
            detail: None,
        }));
        session.close();
        return;
    };

    warn!(%condition, "stream error");
    let detail = Some(child.text().trim())
        .filter(|detail| !detail.is_empty())
        .map(|detail| detail.to_string());
    let key = DispatchKey::new(condition.as_str(), STREAMS_ERROR_NS);
    if !dispatch(session, &key, error) {
        session.emit(StreamEvent::StreamFault(StreamFault {
            condition,
            text,
            detail,
        }));
    }
    close_stream(session);
}
