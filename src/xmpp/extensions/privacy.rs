/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Privacy lists (XEP-0016).

use tracing::debug;

use crate::Element;
use crate::xmpp::constants::PRIVACY_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::protocol::Session;
use crate::xmpp::protocol::StreamEvent;
use crate::xmpp::stanza::ErrorCondition;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaType;

use super::IqError;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum PrivacyKind {
    Jid,
    Group,
    Subscription,
}

impl PrivacyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyKind::Jid => "jid",
            PrivacyKind::Group => "group",
            PrivacyKind::Subscription => "subscription",
        }
    }

    pub fn from_name(name: &str) -> Option<PrivacyKind> {
        match name {
            "jid" => Some(PrivacyKind::Jid),
            "group" => Some(PrivacyKind::Group),
            "subscription" => Some(PrivacyKind::Subscription),
            _ => None,
        }
    }
}

/// Stanzas an item applies to. An item without any applies to all.
pub const PRIVACY_STANZAS: [&str; 4] = ["message", "iq", "presence-in", "presence-out"];

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PrivacyItem {
    /// `None` is the fall-through item matching everything.
    pub kind: Option<PrivacyKind>,
    pub value: Option<String>,
    pub allow: bool,
    pub order: u32,
    pub stanzas: Vec<String>,
}

impl PrivacyItem {
    pub fn from_element(item: &Element) -> Result<PrivacyItem, IqError> {
        let allow = match item.attribute("action") {
            Some("allow") => true,
            Some("deny") => false,
            _ => return Err(IqError::Malformed("privacy item has no valid action")),
        };
        let order = item
            .attribute("order")
            .and_then(|order| order.parse().ok())
            .ok_or(IqError::Malformed("privacy item has no valid order"))?;
        let kind = match item.attribute("type") {
            Some(kind) => Some(
                PrivacyKind::from_name(kind)
                    .ok_or(IqError::Malformed("unknown privacy item type"))?,
            ),
            None => None,
        };
        Ok(PrivacyItem {
            kind,
            value: item.attribute("value").map(|value| value.to_string()),
            allow,
            order,
            stanzas: item
                .children()
                .iter()
                .filter(|child| PRIVACY_STANZAS.iter().any(|name| *name == child.name()))
                .map(|child| child.name().to_string())
                .collect(),
        })
    }

    pub fn to_element(&self) -> Element {
        let mut item = Element::new("item", PRIVACY_NS)
            .with_optional_attribute("type", self.kind.map(|kind| kind.as_str()))
            .with_optional_attribute("value", self.value.as_deref())
            .with_attribute("action", if self.allow { "allow" } else { "deny" })
            .with_attribute("order", &self.order.to_string());
        for stanza in &self.stanzas {
            item.push_child(Element::new(stanza, PRIVACY_NS));
        }
        item
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PrivacyList {
    pub name: String,
    pub items: Vec<PrivacyItem>,
}

/// Names of the stored lists and which of them are active and default.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct PrivacyLists {
    pub active: Option<String>,
    pub default: Option<String>,
    pub names: Vec<String>,
}

fn privacy_query() -> Element {
    Element::new("query", PRIVACY_NS)
}

fn named(name: &str, list_name: Option<&str>) -> Element {
    Element::new(name, PRIVACY_NS).with_optional_attribute("name", list_name)
}

pub fn list_names() -> Stanza {
    super::get(privacy_query())
}

pub fn fetch_list(name: &str) -> Stanza {
    super::get(privacy_query().with_child(named("list", Some(name))))
}

/// Stores a list, an empty list removes it.
pub fn store_list(list: &PrivacyList) -> Stanza {
    let mut element = named("list", Some(&list.name));
    for item in &list.items {
        element.push_child(item.to_element());
    }
    super::set(privacy_query().with_child(element))
}

/// Activates a list for this session, `None` declines the active list.
pub fn set_active(name: Option<&str>) -> Stanza {
    super::set(privacy_query().with_child(named("active", name)))
}

/// Sets the default list of the account, `None` declines it.
pub fn set_default(name: Option<&str>) -> Stanza {
    super::set(privacy_query().with_child(named("default", name)))
}

pub fn parse_list_names(stanza: &Stanza) -> Result<PrivacyLists, IqError> {
    let query = super::query(stanza, "query", PRIVACY_NS)?;
    let name_of = |element: &Element| element.attribute("name").map(|name| name.to_string());
    Ok(PrivacyLists {
        active: query.find_child("active", PRIVACY_NS).and_then(name_of),
        default: query.find_child("default", PRIVACY_NS).and_then(name_of),
        names: query
            .children_named("list", PRIVACY_NS)
            .filter_map(name_of)
            .collect(),
    })
}

/// The list of a fetch answer, items sorted by their order.
pub fn parse_list(stanza: &Stanza) -> Result<PrivacyList, IqError> {
    let list = super::query(stanza, "query", PRIVACY_NS)?
        .find_child("list", PRIVACY_NS)
        .ok_or(IqError::Malformed("privacy list is missing"))?;
    let name = list
        .attribute("name")
        .ok_or(IqError::Malformed("privacy list has no name"))?;
    let mut items = list
        .children_named("item", PRIVACY_NS)
        .map(PrivacyItem::from_element)
        .collect::<Result<Vec<_>, _>>()?;
    items.sort_by_key(|item| item.order);
    Ok(PrivacyList {
        name: name.to_string(),
        items,
    })
}

pub fn request_list_names<F>(session: &mut Session, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<PrivacyLists, IqError>) + Send + 'static,
{
    super::request(session, list_names(), parse_list_names, callback)
}

pub fn request_list<F>(session: &mut Session, name: &str, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<PrivacyList, IqError>) + Send + 'static,
{
    super::request(session, fetch_list(name), parse_list, callback)
}

pub(crate) fn register_push_handler(session: &mut Session) {
    session.register(
        DispatchKey::new("query", PRIVACY_NS).with_type(StanzaType::Set.as_str()),
        |session: &mut Session, push: &Element| {
            if !super::from_own_account(session, push) {
                debug!(from = push.attribute("from"), "ignoring foreign privacy push");
                return;
            }
            let name = push
                .find_child("query", PRIVACY_NS)
                .and_then(|query| query.find_child("list", PRIVACY_NS))
                .and_then(|list| list.attribute("name"));
            let Some(name) = name else {
                debug!("privacy push without a list name");
                super::reject(session, push, ErrorCondition::BadRequest);
                return;
            };
            debug!(name, "privacy list changed");
            super::acknowledge(session, push);
            session.emit(StreamEvent::PrivacyPush(name.to_string()));
        },
        false,
    );
}
