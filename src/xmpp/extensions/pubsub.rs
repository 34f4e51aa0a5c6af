/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Publish-subscribe (XEP-0060).
//!
//! Node management goes through IQ requests to the service, items arrive
//! asynchronously in `<message/>` notifications decoded by `parse_event`.

use tracing::debug;

use crate::Element;
use crate::xmpp::constants::DATA_FORMS_NS;
use crate::xmpp::constants::PUBSUB_EVENT_NS;
use crate::xmpp::constants::PUBSUB_NS;
use crate::xmpp::constants::PUBSUB_OWNER_NS;
use crate::xmpp::dispatch::DispatchKey;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::Session;
use crate::xmpp::stanza::Stanza;

use super::IqError;

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PubSubItem {
    pub id: Option<String>,
    pub payload: Option<Element>,
}

impl PubSubItem {
    fn from_element(item: &Element) -> PubSubItem {
        PubSubItem {
            id: item.attribute("id").map(|id| id.to_string()),
            payload: item.first_child().cloned(),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SubscriptionState {
    None,
    Pending,
    Unconfigured,
    Subscribed,
}

impl SubscriptionState {
    pub fn from_name(name: &str) -> Option<SubscriptionState> {
        match name {
            "none" => Some(SubscriptionState::None),
            "pending" => Some(SubscriptionState::Pending),
            "unconfigured" => Some(SubscriptionState::Unconfigured),
            "subscribed" => Some(SubscriptionState::Subscribed),
            _ => None,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct NodeSubscription {
    pub node: Option<String>,
    pub jid: Jid,
    pub state: SubscriptionState,
    pub subid: Option<String>,
}

impl NodeSubscription {
    fn from_element(subscription: &Element) -> Result<NodeSubscription, IqError> {
        let jid = subscription
            .attribute("jid")
            .and_then(|jid| Jid::new(jid).ok())
            .ok_or(IqError::Malformed("subscription has no valid jid"))?;
        Ok(NodeSubscription {
            node: subscription.attribute("node").map(|node| node.to_string()),
            jid,
            state: subscription
                .attribute("subscription")
                .and_then(SubscriptionState::from_name)
                .unwrap_or(SubscriptionState::None),
            subid: subscription.attribute("subid").map(|subid| subid.to_string()),
        })
    }
}

/// One field of a node configuration form.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ConfigField {
    pub var: String,
    pub values: Vec<String>,
}

/// Notification carried by a pubsub `<event/>`.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum PubSubEvent {
    Items { node: String, items: Vec<PubSubItem> },
    Retract { node: String, ids: Vec<String> },
    Purge { node: String },
    Delete { node: String, redirect: Option<String> },
}

//
// Requests
//

fn pubsub(child: Element) -> Element {
    Element::new("pubsub", PUBSUB_NS).with_child(child)
}

fn owner(child: Element) -> Element {
    Element::new("pubsub", PUBSUB_OWNER_NS).with_child(child)
}

fn node_element(name: &str, namespace: &str, node: &str) -> Element {
    Element::new(name, namespace).with_attribute("node", node)
}

pub fn create_node(service: &Jid, node: &str) -> Stanza {
    super::set(pubsub(node_element("create", PUBSUB_NS, node))).with_to(service.clone())
}

pub fn delete_node(service: &Jid, node: &str) -> Stanza {
    super::set(owner(node_element("delete", PUBSUB_OWNER_NS, node))).with_to(service.clone())
}

/// Removes every item of the node.
pub fn purge_node(service: &Jid, node: &str) -> Stanza {
    super::set(owner(node_element("purge", PUBSUB_OWNER_NS, node))).with_to(service.clone())
}

pub fn subscribe(service: &Jid, node: &str, jid: &Jid) -> Stanza {
    let subscribe = node_element("subscribe", PUBSUB_NS, node).with_attribute("jid", jid.full());
    super::set(pubsub(subscribe)).with_to(service.clone())
}

pub fn unsubscribe(service: &Jid, node: &str, jid: &Jid, subid: Option<&str>) -> Stanza {
    let unsubscribe = node_element("unsubscribe", PUBSUB_NS, node)
        .with_attribute("jid", jid.full())
        .with_optional_attribute("subid", subid);
    super::set(pubsub(unsubscribe)).with_to(service.clone())
}

/// Publishes `payload`, the service assigns an id if none is given.
pub fn publish(service: &Jid, node: &str, item_id: Option<&str>, payload: Element) -> Stanza {
    let item = Element::new("item", PUBSUB_NS)
        .with_optional_attribute("id", item_id)
        .with_child(payload);
    let publish = node_element("publish", PUBSUB_NS, node).with_child(item);
    super::set(pubsub(publish)).with_to(service.clone())
}

pub fn retract(service: &Jid, node: &str, item_id: &str, notify: bool) -> Stanza {
    let mut retract = node_element("retract", PUBSUB_NS, node)
        .with_child(Element::new("item", PUBSUB_NS).with_attribute("id", item_id));
    if notify {
        retract.set_attribute("notify", "true");
    }
    super::set(pubsub(retract)).with_to(service.clone())
}

pub fn retrieve_items(service: &Jid, node: &str, max_items: Option<u32>) -> Stanza {
    let max_items = max_items.map(|max| max.to_string());
    let items = node_element("items", PUBSUB_NS, node)
        .with_optional_attribute("max_items", max_items.as_deref());
    super::get(pubsub(items)).with_to(service.clone())
}

/// Our subscriptions at the service, or at one node of it.
pub fn subscriptions(service: &Jid, node: Option<&str>) -> Stanza {
    let subscriptions =
        Element::new("subscriptions", PUBSUB_NS).with_optional_attribute("node", node);
    super::get(pubsub(subscriptions)).with_to(service.clone())
}

pub fn node_configuration(service: &Jid, node: &str) -> Stanza {
    super::get(owner(node_element("configure", PUBSUB_OWNER_NS, node))).with_to(service.clone())
}

//
// Responses
//

pub fn parse_items(stanza: &Stanza) -> Result<Vec<PubSubItem>, IqError> {
    let items = super::query(stanza, "pubsub", PUBSUB_NS)?
        .find_child("items", PUBSUB_NS)
        .ok_or(IqError::Malformed("items are missing"))?;
    Ok(items
        .children_named("item", PUBSUB_NS)
        .map(PubSubItem::from_element)
        .collect())
}

/// Id of a published item. Services may answer with an empty result when
/// the id was chosen by the publisher.
pub fn parse_published(stanza: &Stanza) -> Result<Option<String>, IqError> {
    let id = stanza
        .find_child("pubsub", PUBSUB_NS)
        .and_then(|pubsub| pubsub.find_child("publish", PUBSUB_NS))
        .and_then(|publish| publish.find_child("item", PUBSUB_NS))
        .and_then(|item| item.attribute("id"))
        .map(|id| id.to_string());
    Ok(id)
}

/// The subscription created by a subscribe request.
pub fn parse_subscription(stanza: &Stanza) -> Result<NodeSubscription, IqError> {
    let subscription = super::query(stanza, "pubsub", PUBSUB_NS)?
        .find_child("subscription", PUBSUB_NS)
        .ok_or(IqError::Malformed("subscription is missing"))?;
    NodeSubscription::from_element(subscription)
}

pub fn parse_subscriptions(stanza: &Stanza) -> Result<Vec<NodeSubscription>, IqError> {
    let subscriptions = super::query(stanza, "pubsub", PUBSUB_NS)?
        .find_child("subscriptions", PUBSUB_NS)
        .ok_or(IqError::Malformed("subscriptions are missing"))?;
    subscriptions
        .children_named("subscription", PUBSUB_NS)
        .map(NodeSubscription::from_element)
        .collect()
}

pub fn parse_configuration(stanza: &Stanza) -> Result<Vec<ConfigField>, IqError> {
    let form = super::query(stanza, "pubsub", PUBSUB_OWNER_NS)?
        .find_child("configure", PUBSUB_OWNER_NS)
        .and_then(|configure| configure.find_child("x", DATA_FORMS_NS))
        .ok_or(IqError::Malformed("configuration form is missing"))?;
    Ok(form
        .children_named("field", DATA_FORMS_NS)
        .filter_map(|field| {
            let var = field.attribute("var")?;
            Some(ConfigField {
                var: var.to_string(),
                values: field
                    .children_named("value", DATA_FORMS_NS)
                    .map(|value| value.text().to_string())
                    .collect(),
            })
        })
        .collect())
}

pub fn fetch_items<F>(
    session: &mut Session,
    service: &Jid,
    node: &str,
    max_items: Option<u32>,
    callback: F,
) -> String
where
    F: FnOnce(&mut Session, Result<Vec<PubSubItem>, IqError>) + Send + 'static,
{
    super::request(session, retrieve_items(service, node, max_items), parse_items, callback)
}

//
// Notifications
//

fn node_of(element: &Element) -> Option<String> {
    element.attribute("node").map(|node| node.to_string())
}

/// Decodes the `<event/>` of a notification message.
pub fn parse_event(message: &Element) -> Vec<PubSubEvent> {
    let Some(event) = message.find_child("event", PUBSUB_EVENT_NS) else {
        return Vec::new();
    };
    let mut events = Vec::new();
    for child in event.children() {
        let Some(node) = node_of(child) else {
            continue;
        };
        match child.name() {
            "items" => {
                let items: Vec<PubSubItem> = child
                    .children_named("item", PUBSUB_EVENT_NS)
                    .map(PubSubItem::from_element)
                    .collect();
                let ids: Vec<String> = child
                    .children_named("retract", PUBSUB_EVENT_NS)
                    .filter_map(|retract| retract.attribute("id"))
                    .map(|id| id.to_string())
                    .collect();
                if !items.is_empty() || ids.is_empty() {
                    events.push(PubSubEvent::Items {
                        node: node.clone(),
                        items,
                    });
                }
                if !ids.is_empty() {
                    events.push(PubSubEvent::Retract { node, ids });
                }
            }
            "purge" => events.push(PubSubEvent::Purge { node }),
            "delete" => events.push(PubSubEvent::Delete {
                node,
                redirect: child
                    .find_child("redirect", PUBSUB_EVENT_NS)
                    .and_then(|redirect| redirect.attribute("uri"))
                    .map(|uri| uri.to_string()),
            }),
            other => debug!(name = other, "unknown pubsub event"),
        }
    }
    events
}

/// Calls `callback` for every notification, from any service or only from
/// the given one.
pub fn register_event_handler<F>(session: &mut Session, service: Option<&Jid>, mut callback: F)
where
    F: FnMut(&mut Session, Option<&Jid>, Vec<PubSubEvent>) + Send + 'static,
{
    let mut key = DispatchKey::new("event", PUBSUB_EVENT_NS);
    if let Some(service) = service {
        key = key.with_sender(service);
    }
    session.register(
        key,
        move |session: &mut Session, message: &Element| {
            let from = message.attribute("from").and_then(|from| Jid::new(from).ok());
            let events = parse_event(message);
            if !events.is_empty() {
                callback(session, from.as_ref(), events);
            }
        },
        false,
    );
}
