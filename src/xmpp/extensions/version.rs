/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Software version (XEP-0092).

use crate::Element;
use crate::xmpp::constants::VERSION_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::Session;
use crate::xmpp::protocol::SoftwareVersion;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaType;

use super::IqError;

pub fn query_request(to: &Jid) -> Stanza {
    super::get(Element::new("query", VERSION_NS)).with_to(to.clone())
}

pub fn parse_version(stanza: &Stanza) -> Result<SoftwareVersion, IqError> {
    let query = super::query(stanza, "query", VERSION_NS)?;
    Ok(SoftwareVersion {
        name: query
            .child_text("name", VERSION_NS)
            .ok_or(IqError::Malformed("version has no name"))?
            .to_string(),
        version: query
            .child_text("version", VERSION_NS)
            .ok_or(IqError::Malformed("version has no version"))?
            .to_string(),
        os: query.child_text("os", VERSION_NS).map(|os| os.to_string()),
    })
}

pub fn response(request: &Stanza, software: &SoftwareVersion) -> Stanza {
    let mut query = Element::new("query", VERSION_NS)
        .with_child(Element::new("name", VERSION_NS).with_text(&software.name))
        .with_child(Element::new("version", VERSION_NS).with_text(&software.version));
    if let Some(os) = &software.os {
        query.push_child(Element::new("os", VERSION_NS).with_text(os));
    }
    request.result_reply().with_child(query)
}

pub fn fetch<F>(session: &mut Session, to: &Jid, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<SoftwareVersion, IqError>) + Send + 'static,
{
    super::request(session, query_request(to), parse_version, callback)
}

pub(crate) fn register_responder(session: &mut Session) {
    session.register(
        DispatchKey::new("query", VERSION_NS).with_type(StanzaType::Get.as_str()),
        |session: &mut Session, element: &Element| {
            let Some(software) = session.config().software.clone() else {
                return;
            };
            if let Ok(request) = Stanza::parse(element.clone()) {
                session.send(&response(&request, &software));
            }
        },
        false,
    );
}
