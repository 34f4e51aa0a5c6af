/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Service discovery (XEP-0030).

use crate::Element;
use crate::xmpp::constants::DISCO_INFO_NS;
use crate::xmpp::constants::DISCO_ITEMS_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::DiscoIdentity;
use crate::xmpp::protocol::Session;
use crate::xmpp::stanza::ErrorCondition;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaError;
use crate::xmpp::stanza::StanzaType;

use super::IqError;

#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct DiscoInfo {
    pub node: Option<String>,
    pub identities: Vec<DiscoIdentity>,
    pub features: Vec<String>,
}

impl DiscoInfo {
    pub fn has_feature(&self, namespace: &str) -> bool {
        self.features.iter().any(|feature| feature == namespace)
    }

    pub fn to_element(&self) -> Element {
        let mut query = Element::new("query", DISCO_INFO_NS)
            .with_optional_attribute("node", self.node.as_deref());
        for identity in &self.identities {
            query.push_child(
                Element::new("identity", DISCO_INFO_NS)
                    .with_attribute("category", &identity.category)
                    .with_attribute("type", &identity.kind)
                    .with_optional_attribute("name", identity.name.as_deref()),
            );
        }
        for feature in &self.features {
            query.push_child(Element::new("feature", DISCO_INFO_NS).with_attribute("var", feature));
        }
        query
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct DiscoItem {
    pub jid: Jid,
    pub node: Option<String>,
    pub name: Option<String>,
}

fn node_query(namespace: &str, node: Option<&str>) -> Element {
    Element::new("query", namespace).with_optional_attribute("node", node)
}

pub fn info_request(to: &Jid, node: Option<&str>) -> Stanza {
    super::get(node_query(DISCO_INFO_NS, node)).with_to(to.clone())
}

pub fn items_request(to: &Jid, node: Option<&str>) -> Stanza {
    super::get(node_query(DISCO_ITEMS_NS, node)).with_to(to.clone())
}

pub fn parse_info(stanza: &Stanza) -> Result<DiscoInfo, IqError> {
    let query = super::query(stanza, "query", DISCO_INFO_NS)?;
    let identities = query
        .children_named("identity", DISCO_INFO_NS)
        .map(|identity| -> Result<DiscoIdentity, IqError> {
            Ok(DiscoIdentity {
                category: identity
                    .attribute("category")
                    .ok_or(IqError::Malformed("identity has no category"))?
                    .to_string(),
                kind: identity
                    .attribute("type")
                    .ok_or(IqError::Malformed("identity has no type"))?
                    .to_string(),
                name: identity.attribute("name").map(|name| name.to_string()),
            })
        })
        .collect::<Result<_, _>>()?;
    let features = query
        .children_named("feature", DISCO_INFO_NS)
        .filter_map(|feature| feature.attribute("var"))
        .map(|var| var.to_string())
        .collect();
    Ok(DiscoInfo {
        node: query.attribute("node").map(|node| node.to_string()),
        identities,
        features,
    })
}

pub fn parse_items(stanza: &Stanza) -> Result<Vec<DiscoItem>, IqError> {
    let query = super::query(stanza, "query", DISCO_ITEMS_NS)?;
    query
        .children_named("item", DISCO_ITEMS_NS)
        .map(|item| -> Result<DiscoItem, IqError> {
            let jid = item
                .attribute("jid")
                .and_then(|jid| Jid::new(jid).ok())
                .ok_or(IqError::Malformed("item has no valid jid"))?;
            Ok(DiscoItem {
                jid,
                node: item.attribute("node").map(|node| node.to_string()),
                name: item.attribute("name").map(|name| name.to_string()),
            })
        })
        .collect()
}

pub fn fetch_info<F>(session: &mut Session, to: &Jid, node: Option<&str>, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<DiscoInfo, IqError>) + Send + 'static,
{
    super::request(session, info_request(to, node), parse_info, callback)
}

pub fn fetch_items<F>(session: &mut Session, to: &Jid, node: Option<&str>, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<Vec<DiscoItem>, IqError>) + Send + 'static,
{
    super::request(session, items_request(to, node), parse_items, callback)
}

/// What this session answers to disco#info queries.
pub fn local_info(session: &Session) -> DiscoInfo {
    let config = session.config();
    let mut features = vec![DISCO_INFO_NS.to_string()];
    for feature in &config.features {
        if !features.contains(feature) {
            features.push(feature.clone());
        }
    }
    DiscoInfo {
        node: None,
        identities: config.identity.iter().cloned().collect(),
        features,
    }
}

/// Answer to a disco#info request, item-not-found for unknown nodes.
pub fn info_response(request: &Stanza, info: &DiscoInfo) -> Stanza {
    let requested = request
        .find_child("query", DISCO_INFO_NS)
        .and_then(|query| query.attribute("node"));
    if requested != info.node.as_deref() {
        return request.error_reply(&StanzaError::new(ErrorCondition::ItemNotFound));
    }
    request.result_reply().with_child(info.to_element())
}

pub(crate) fn register_responder(session: &mut Session) {
    session.register(
        DispatchKey::new("query", DISCO_INFO_NS).with_type(StanzaType::Get.as_str()),
        |session: &mut Session, element: &Element| {
            if let Ok(request) = Stanza::parse(element.clone()) {
                let info = local_info(session);
                session.send(&info_response(&request, &info));
            }
        },
        false,
    );
}
