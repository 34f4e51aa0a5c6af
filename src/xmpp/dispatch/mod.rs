/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::HashMap;
use std::fmt::Display;

use crate::Element;
use crate::xmpp::constants::CLIENT_NS;
use crate::xmpp::jid::Jid;

/// Lookup key of a handler.
///
/// A key always has a local name and namespace, and can be refined with
/// the stanza type, the stanza id and the bare Jid of the sender. The
/// canonical string form lists the fields in a fixed order, so two keys
/// built with the same refinements in any order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    name: String,
    namespace: String,
    stanza_type: Option<String>,
    id: Option<String>,
    sender: Option<String>,
}

impl DispatchKey {
    pub fn new(name: &str, namespace: &str) -> DispatchKey {
        DispatchKey {
            name: name.to_string(),
            namespace: namespace.to_string(),
            stanza_type: None,
            id: None,
            sender: None,
        }
    }

    /// Key of the response to the IQ request with the given id.
    pub fn iq_response(id: &str) -> DispatchKey {
        DispatchKey::new("iq", CLIENT_NS).with_id(id)
    }

    pub fn with_type(mut self, stanza_type: &str) -> DispatchKey {
        self.stanza_type = Some(stanza_type.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> DispatchKey {
        self.id = Some(id.to_string());
        self
    }

    /// Refines the key by the sender. Only the bare part of the Jid is used.
    pub fn with_sender(mut self, sender: &Jid) -> DispatchKey {
        self.sender = Some(sender.bare().to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Display for DispatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)?;
        if let Some(stanza_type) = &self.stanza_type {
            write!(f, " type={stanza_type}")?;
        }
        if let Some(id) = &self.id {
            write!(f, " id={id}")?;
        }
        if let Some(sender) = &self.sender {
            write!(f, " from={sender}")?;
        }
        Ok(())
    }
}

pub type Callback<C> = Box<dyn FnMut(&mut C, &Element) + Send>;

struct Registration<C> {
    callback: Callback<C>,
    once: bool,
}

/// Handler table keyed by `DispatchKey`.
///
/// There is at most one handler per key, registering again replaces the
/// previous one. Handlers receive the context that owns the registry so
/// they can send data and register or unregister other handlers while
/// running.
pub struct DispatchRegistry<C> {
    handlers: HashMap<DispatchKey, Registration<C>>,
    // Keys being dispatched, and whether they were replaced or removed
    // by their own callback
    in_flight: Vec<(DispatchKey, bool)>,
}

impl<C> DispatchRegistry<C> {
    pub fn new() -> DispatchRegistry<C> {
        DispatchRegistry {
            handlers: HashMap::new(),
            in_flight: Vec::new(),
        }
    }

    fn touch(&mut self, key: &DispatchKey) {
        for (active, touched) in self.in_flight.iter_mut() {
            if active == key {
                *touched = true;
            }
        }
    }

    pub fn register<F>(&mut self, key: DispatchKey, callback: F, once: bool)
    where
        F: FnMut(&mut C, &Element) + Send + 'static,
    {
        self.touch(&key);
        self.handlers.insert(
            key,
            Registration {
                callback: Box::new(callback),
                once,
            },
        );
    }

    /// Removes the handler, returns false if there was none.
    pub fn unregister(&mut self, key: &DispatchKey) -> bool {
        self.touch(key);
        self.handlers.remove(key).is_some()
    }

    pub fn contains(&self, key: &DispatchKey) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Drops every handler without calling it.
    pub fn clear(&mut self) {
        for (_, touched) in self.in_flight.iter_mut() {
            *touched = true;
        }
        self.handlers.clear();
    }
}

impl<C> Default for DispatchRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A context which owns a registry and is passed to its handlers.
pub trait Dispatch: Sized {
    fn registry(&mut self) -> &mut DispatchRegistry<Self>;
}

/// Calls the handler registered for `key`, returns true if there was one.
///
/// The registration is taken out of the table while the callback runs.
/// Once handlers are dropped afterwards. Persistent handlers are put back
/// unless the callback registered or unregistered the same key, in which
/// case its change stays in effect.
pub fn dispatch<C: Dispatch>(ctx: &mut C, key: &DispatchKey, element: &Element) -> bool {
    let Some(mut registration) = ctx.registry().handlers.remove(key) else {
        return false;
    };
    ctx.registry().in_flight.push((key.clone(), false));
    (registration.callback)(ctx, element);
    let registry = ctx.registry();
    let touched = registry
        .in_flight
        .pop()
        .map(|(_, touched)| touched)
        .unwrap_or(true);
    if !registration.once && !touched {
        registry.handlers.insert(key.clone(), registration);
    }
    true
}
