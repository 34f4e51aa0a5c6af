/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Roster management and presence subscriptions (RFC 3921 sections 6-8).

use tracing::debug;
use tracing::warn;

use crate::Element;
use crate::xmpp::constants::ROSTER_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::Session;
use crate::xmpp::protocol::StreamEvent;
use crate::xmpp::stanza::ErrorCondition;
use crate::xmpp::stanza::Stanza;
use crate::xmpp::stanza::StanzaKind;
use crate::xmpp::stanza::StanzaType;

use super::IqError;

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum Subscription {
    None,
    To,
    From,
    Both,
    Remove,
}

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subscription::None => "none",
            Subscription::To => "to",
            Subscription::From => "from",
            Subscription::Both => "both",
            Subscription::Remove => "remove",
        }
    }

    pub fn from_name(name: &str) -> Option<Subscription> {
        match name {
            "none" => Some(Subscription::None),
            "to" => Some(Subscription::To),
            "from" => Some(Subscription::From),
            "both" => Some(Subscription::Both),
            "remove" => Some(Subscription::Remove),
            _ => None,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct RosterItem {
    pub jid: Jid,
    pub name: Option<String>,
    pub subscription: Subscription,
    /// A subscription request is pending.
    pub ask: bool,
    pub groups: Vec<String>,
}

impl RosterItem {
    pub fn new(jid: Jid) -> RosterItem {
        RosterItem {
            jid,
            name: None,
            subscription: Subscription::None,
            ask: false,
            groups: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> RosterItem {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> RosterItem {
        self.groups.push(group.to_string());
        self
    }

    pub fn from_element(item: &Element) -> Result<RosterItem, IqError> {
        let jid = item
            .attribute("jid")
            .and_then(|jid| Jid::new(jid).ok())
            .ok_or(IqError::Malformed("roster item has no valid jid"))?;
        let subscription = item
            .attribute("subscription")
            .and_then(Subscription::from_name)
            .unwrap_or(Subscription::None);
        Ok(RosterItem {
            jid,
            name: item.attribute("name").map(|name| name.to_string()),
            subscription,
            ask: item.attribute("ask") == Some("subscribe"),
            groups: item
                .children_named("group", ROSTER_NS)
                .map(|group| group.text().to_string())
                .collect(),
        })
    }

    /// Item as sent in a roster set. Subscription state is owned by the
    /// server, so only a removal is written.
    pub fn to_element(&self) -> Element {
        let mut item = Element::new("item", ROSTER_NS)
            .with_attribute("jid", self.jid.full())
            .with_optional_attribute("name", self.name.as_deref());
        if self.subscription == Subscription::Remove {
            item.set_attribute("subscription", Subscription::Remove.as_str());
        }
        for group in &self.groups {
            item.push_child(Element::new("group", ROSTER_NS).with_text(group));
        }
        item
    }
}

fn roster_query() -> Element {
    Element::new("query", ROSTER_NS)
}

pub fn get_request() -> Stanza {
    super::get(roster_query())
}

/// Adds or updates an item.
pub fn set_item_request(item: &RosterItem) -> Stanza {
    super::set(roster_query().with_child(item.to_element()))
}

pub fn remove_request(jid: &Jid) -> Stanza {
    let mut item = RosterItem::new(jid.clone());
    item.subscription = Subscription::Remove;
    set_item_request(&item)
}

pub fn parse_items(query: &Element) -> Result<Vec<RosterItem>, IqError> {
    query
        .children_named("item", ROSTER_NS)
        .map(RosterItem::from_element)
        .collect()
}

/// Items of a roster result. An empty result means an empty roster.
pub fn parse_roster(stanza: &Stanza) -> Result<Vec<RosterItem>, IqError> {
    match stanza.find_child("query", ROSTER_NS) {
        Some(query) => parse_items(query),
        None => Ok(Vec::new()),
    }
}

pub fn request_roster<F>(session: &mut Session, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<Vec<RosterItem>, IqError>) + Send + 'static,
{
    super::request(session, get_request(), parse_roster, callback)
}

pub fn update_item<F>(session: &mut Session, item: &RosterItem, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<(), IqError>) + Send + 'static,
{
    super::request(session, set_item_request(item), |_| Ok(()), callback)
}

pub fn remove_item<F>(session: &mut Session, jid: &Jid, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<(), IqError>) + Send + 'static,
{
    super::request(session, remove_request(jid), |_| Ok(()), callback)
}

pub(crate) fn register_push_handler(session: &mut Session) {
    session.register(
        DispatchKey::new("query", ROSTER_NS).with_type(StanzaType::Set.as_str()),
        on_push,
        false,
    );
}

fn on_push(session: &mut Session, push: &Element) {
    if !super::from_own_account(session, push) {
        warn!(from = push.attribute("from"), "ignoring roster push from a foreign entity");
        return;
    }
    let items = match push.find_child("query", ROSTER_NS).map(parse_items) {
        Some(Ok(items)) => items,
        Some(Err(err)) => {
            warn!(%err, "malformed roster push");
            super::reject(session, push, ErrorCondition::BadRequest);
            return;
        }
        None => Vec::new(),
    };
    debug!(count = items.len(), "roster push");
    super::acknowledge(session, push);
    session.emit(StreamEvent::RosterPush(items));
}

//
// Presence subscriptions
//

fn subscription_presence(stanza_type: StanzaType, to: &Jid) -> Stanza {
    Stanza::unchecked(StanzaKind::Presence, Some(stanza_type)).with_to(to.to_bare())
}

/// Asks to see the presence of `to`.
pub fn subscribe(to: &Jid) -> Stanza {
    subscription_presence(StanzaType::Subscribe, to)
}

/// Allows `to` to see our presence.
pub fn subscribed(to: &Jid) -> Stanza {
    subscription_presence(StanzaType::Subscribed, to)
}

pub fn unsubscribe(to: &Jid) -> Stanza {
    subscription_presence(StanzaType::Unsubscribe, to)
}

pub fn unsubscribed(to: &Jid) -> Stanza {
    subscription_presence(StanzaType::Unsubscribed, to)
}
