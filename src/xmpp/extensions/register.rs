/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! In-band registration (XEP-0077).

use crate::Element;
use crate::xmpp::constants::REGISTER_NS;
use crate::xmpp::jid::Jid;
use crate::xmpp::protocol::Session;
use crate::xmpp::stanza::Stanza;

use super::IqError;

/// Fields the service asks for. `fields` holds the field names with any
/// value the service filled in, in document order.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct RegistrationForm {
    pub instructions: Option<String>,
    pub fields: Vec<(String, Option<String>)>,
    /// The account is already registered.
    pub registered: bool,
}

impl RegistrationForm {
    pub fn field(&self, name: &str) -> Option<&(String, Option<String>)> {
        self.fields.iter().find(|(field, _)| field == name)
    }
}

fn register_query() -> Element {
    Element::new("query", REGISTER_NS)
}

/// Asks for the registration fields, of the server when `to` is `None`.
pub fn fields_request(to: Option<&Jid>) -> Stanza {
    super::addressed(super::get(register_query()), to)
}

pub fn submit(to: Option<&Jid>, fields: &[(&str, &str)]) -> Stanza {
    let mut query = register_query();
    for (name, value) in fields {
        query.push_child(Element::new(name, REGISTER_NS).with_text(value));
    }
    super::addressed(super::set(query), to)
}

/// Removes the registration, the whole account when sent to the server.
pub fn cancel(to: Option<&Jid>) -> Stanza {
    let query = register_query().with_child(Element::new("remove", REGISTER_NS));
    super::addressed(super::set(query), to)
}

pub fn change_password(server: &Jid, username: &str, password: &str) -> Stanza {
    submit(
        Some(&server.to_bare()),
        &[("username", username), ("password", password)],
    )
}

pub fn parse_fields(stanza: &Stanza) -> Result<RegistrationForm, IqError> {
    let query = super::query(stanza, "query", REGISTER_NS)?;
    let mut form = RegistrationForm::default();
    for child in query.children() {
        if child.namespace() != Some(REGISTER_NS) {
            continue;
        }
        match child.name() {
            "instructions" => form.instructions = Some(child.text().to_string()),
            "registered" => form.registered = true,
            name => {
                let value = child.text();
                form.fields.push((
                    name.to_string(),
                    (!value.is_empty()).then(|| value.to_string()),
                ));
            }
        }
    }
    Ok(form)
}

pub fn fetch_fields<F>(session: &mut Session, to: Option<&Jid>, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<RegistrationForm, IqError>) + Send + 'static,
{
    super::request(session, fields_request(to), parse_fields, callback)
}

pub fn register<F>(
    session: &mut Session,
    to: Option<&Jid>,
    fields: &[(&str, &str)],
    callback: F,
) -> String
where
    F: FnOnce(&mut Session, Result<(), IqError>) + Send + 'static,
{
    super::request(session, submit(to, fields), |_| Ok(()), callback)
}

pub fn unregister<F>(session: &mut Session, to: Option<&Jid>, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<(), IqError>) + Send + 'static,
{
    super::request(session, cancel(to), |_| Ok(()), callback)
}

/// Changes the password of the logged in account.
pub fn update_password<F>(session: &mut Session, password: &str, callback: F) -> String
where
    F: FnOnce(&mut Session, Result<(), IqError>) + Send + 'static,
{
    let jid = session.config().jid.clone();
    let username = jid.localpart().unwrap_or_default();
    let server = match Jid::new(jid.domainpart()) {
        Ok(server) => server,
        Err(_) => jid.to_bare(),
    };
    super::request(
        session,
        change_password(&server, username, password),
        |_| Ok(()),
        callback,
    )
}
