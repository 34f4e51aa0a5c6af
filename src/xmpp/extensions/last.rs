/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Last activity (XEP-0012).

use crate::Element;
use crate::xmpp::constants::LAST_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::Session;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaType;

use super::IqError;

/// Idle time of a client, uptime of a server, or time since logout of an
/// account, depending on what was queried.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct LastActivity {
    pub seconds: u64,
    pub status: Option<String>,
}

pub fn query_request(to: &Jid) -> Stanza {
    super::get(Element::new("query", LAST_NS)).with_to(to.clone())
}

pub fn parse_last(stanza: &Stanza) -> Result<LastActivity, IqError> {
    let query = super::query(stanza, "query", LAST_NS)?;
    let seconds = query
        .attribute("seconds")
        .and_then(|seconds| seconds.trim().parse().ok())
        .ok_or(IqError::Malformed("seconds attribute is missing"))?;
    let status = query.text().trim();
    Ok(LastActivity {
        seconds,
        status: (!status.is_empty()).then(|| status.to_string()),
    })
}

pub fn response(request: &Stanza, activity: &LastActivity) -> Stanza {
    let mut query =
        Element::new("query", LAST_NS).with_attribute("seconds", &activity.seconds.to_string());
    if let Some(status) = &activity.status {
        query.set_text(status);
    }
    request.result_reply().with_child(query)
}

pub fn fetch<F>(session: &mut Session, to: &Jid, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<LastActivity, IqError>) + Send + 'static,
{
    super::request(session, query_request(to), parse_last, callback)
}

/// Answers last activity queries with what `activity` returns at the time
/// of the query.
pub fn register_responder<F>(session: &mut Session, mut activity: F)
where
    F: FnMut() -> LastActivity + Send + 'static,
{
    session.register(
        DispatchKey::new("query", LAST_NS).with_type(StanzaType::Get.as_str()),
        move |session: &mut Session, element: &Element| {
            if let Ok(request) = Stanza::parse(element.clone()) {
                session.send(&response(&request, &activity()));
            }
        },
        false,
    );
}
